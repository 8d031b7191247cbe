use std::sync::Arc;

use challenge_core::fallback_challenge;
use challenge_persistence::{
    ChallengeLookup, CompletionStore, InsertOutcome, LocalCompletionStore, SourceResultLookup,
    StoreError,
};
use challenge_types::{
    ChallengeCompletion, GameType, MissingResource, RecordDecision, RecordRequest, UserId,
};
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("authoritative store rejected the completion: {0}")]
    Store(StoreError),
    #[error("could not capture the completion locally: {0}")]
    LocalCapture(StoreError),
}

/// What a precondition lookup learned before the authoritative store
/// stopped answering.
pub(crate) enum Lookup<T> {
    Found(T),
    Missing(MissingResource),
    Unreachable(StoreError),
    Failed(StoreError),
}

/// The checks every completion must pass before it reaches the
/// authoritative store, whether recorded live or replayed after an outage.
#[derive(Clone)]
pub(crate) struct Preconditions {
    challenges: Arc<dyn ChallengeLookup>,
    results: Arc<dyn SourceResultLookup>,
}

impl Preconditions {
    pub(crate) fn new(
        challenges: Arc<dyn ChallengeLookup>,
        results: Arc<dyn SourceResultLookup>,
    ) -> Self {
        Self {
            challenges,
            results,
        }
    }

    /// The source result must exist and belong to the user.
    pub(crate) async fn source_result(&self, user_id: UserId, id: &str) -> Lookup<()> {
        match self.results.find_source_result(id).await {
            Ok(Some(result)) if result.user_id == user_id => Lookup::Found(()),
            Ok(Some(_)) => {
                warn!("Source result {} does not belong to user {}", id, user_id);
                Lookup::Missing(MissingResource::SourceResult)
            }
            Ok(None) => Lookup::Missing(MissingResource::SourceResult),
            Err(err) if err.is_transient() => Lookup::Unreachable(err),
            // Unreadable stored results count as missing.
            Err(err) => {
                warn!("Source result {} is unreadable: {}", id, err);
                Lookup::Missing(MissingResource::SourceResult)
            }
        }
    }

    /// Points of the challenge published for that day.
    pub(crate) async fn published_points(&self, date: NaiveDate) -> Lookup<u32> {
        match self.challenges.active_challenge_on(date).await {
            Ok(Some(challenge)) => Lookup::Found(challenge.points),
            Ok(None) => Lookup::Missing(MissingResource::DailyChallenge),
            Err(err) if err.is_transient() => Lookup::Unreachable(err),
            Err(err) => Lookup::Failed(err),
        }
    }
}

pub struct CompletionRecorder {
    completions: Arc<dyn CompletionStore>,
    checks: Preconditions,
    local: Arc<LocalCompletionStore>,
}

impl CompletionRecorder {
    pub fn new(
        completions: Arc<dyn CompletionStore>,
        challenges: Arc<dyn ChallengeLookup>,
        results: Arc<dyn SourceResultLookup>,
        local: Arc<LocalCompletionStore>,
    ) -> Self {
        Self {
            completions,
            checks: Preconditions::new(challenges, results),
            local,
        }
    }

    pub async fn record(&self, request: RecordRequest) -> Result<RecordDecision, RecordError> {
        self.record_at(request, Utc::now()).await
    }

    pub async fn record_at(
        &self,
        request: RecordRequest,
        now: DateTime<Utc>,
    ) -> Result<RecordDecision, RecordError> {
        let game_type = match validate(&request) {
            Ok(game_type) => game_type,
            Err(reason) => {
                debug!("Rejected completion for user {}: {}", request.user_id, reason);
                return Ok(RecordDecision::Invalid { reason });
            }
        };

        match self
            .checks
            .source_result(request.user_id, request.source_result_id.trim())
            .await
        {
            Lookup::Found(()) => {}
            Lookup::Missing(resource) => return Ok(RecordDecision::NotFound { resource }),
            Lookup::Unreachable(err) => {
                return self.capture_locally(&request, game_type, now, err).await;
            }
            Lookup::Failed(err) => return Err(RecordError::Store(err)),
        }

        let earned_points = match self.checks.published_points(request.challenge_date).await {
            Lookup::Found(points) => points,
            Lookup::Missing(resource) => return Ok(RecordDecision::NotFound { resource }),
            Lookup::Unreachable(err) => {
                return self.capture_locally(&request, game_type, now, err).await;
            }
            Lookup::Failed(err) => return Err(RecordError::Store(err)),
        };

        let completion = new_completion(&request, game_type, earned_points, now);
        match self.completions.insert_if_absent(completion).await {
            Ok(InsertOutcome::Inserted(completion)) => {
                info!(
                    "Recorded {} completion for user {} on {} ({} points)",
                    completion.game_type, completion.user_id, completion.challenge_date, earned_points
                );
                if let Err(err) = self.local.replace_with_authoritative(completion.clone()).await {
                    warn!("Failed to mirror completion into local store: {}", err);
                }
                Ok(RecordDecision::Recorded {
                    completion,
                    earned_points,
                })
            }
            Ok(InsertOutcome::Conflict) => Ok(RecordDecision::AlreadyCompleted {
                challenge_date: request.challenge_date,
            }),
            Err(err) if err.is_transient() => {
                self.capture_locally(&request, game_type, now, err).await
            }
            Err(err) => Err(RecordError::Store(err)),
        }
    }

    /// Keep the completion on this device until reconciliation can push it.
    /// The fallback challenge's points stand in for the local view; the
    /// reconciler re-checks the completion and stores the published value.
    async fn capture_locally(
        &self,
        request: &RecordRequest,
        game_type: GameType,
        now: DateTime<Utc>,
        cause: StoreError,
    ) -> Result<RecordDecision, RecordError> {
        warn!(
            "Authoritative store unreachable ({}), capturing completion for user {} locally",
            cause, request.user_id
        );

        let earned_points = fallback_challenge(request.challenge_date).points;
        let completion = new_completion(request, game_type, earned_points, now);
        match self.local.insert_entry(completion, false).await {
            Ok(InsertOutcome::Inserted(completion)) => Ok(RecordDecision::PendingSync {
                completion,
                earned_points,
            }),
            Ok(InsertOutcome::Conflict) => Ok(RecordDecision::AlreadyCompleted {
                challenge_date: request.challenge_date,
            }),
            Err(err) => Err(RecordError::LocalCapture(err)),
        }
    }
}

fn validate(request: &RecordRequest) -> Result<GameType, String> {
    if request.user_id.is_nil() {
        return Err("user_id must not be nil".to_string());
    }
    if request.source_result_id.trim().is_empty() {
        return Err("source_result_id must not be blank".to_string());
    }
    request.game_type.parse().map_err(|e| format!("{}", e))
}

fn new_completion(
    request: &RecordRequest,
    game_type: GameType,
    earned_points: u32,
    now: DateTime<Utc>,
) -> ChallengeCompletion {
    ChallengeCompletion {
        id: Uuid::new_v4(),
        user_id: request.user_id,
        challenge_date: request.challenge_date,
        completed_at: now,
        game_type,
        earned_points,
        source_result_id: request.source_result_id.trim().to_string(),
    }
}

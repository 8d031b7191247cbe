use std::sync::Arc;

use challenge_persistence::{
    ChallengeLookup, CompletionStore, InsertOutcome, LocalCompletionStore, SourceResultLookup,
    StoreError,
};
use challenge_types::{ChallengeCompletion, DateRange, ReconcileReport, UserId};
use tracing::{info, warn};

use crate::recorder::{Lookup, Preconditions};

/// Pushes completions captured while offline into the authoritative store.
pub struct CompletionReconciler {
    authoritative: Arc<dyn CompletionStore>,
    checks: Preconditions,
    local: Arc<LocalCompletionStore>,
}

/// What to do with one pending entry.
enum Replay {
    Push(ChallengeCompletion),
    Reject,
    Pause,
}

impl CompletionReconciler {
    pub fn new(
        authoritative: Arc<dyn CompletionStore>,
        challenges: Arc<dyn ChallengeLookup>,
        results: Arc<dyn SourceResultLookup>,
        local: Arc<LocalCompletionStore>,
    ) -> Self {
        Self {
            authoritative,
            checks: Preconditions::new(challenges, results),
            local,
        }
    }

    /// Replays unsynced local entries oldest first. Each entry passes the
    /// same checks as a live recording and is stored with the published
    /// challenge's points. Stops at the first transient failure; whatever is
    /// left stays unsynced for the next run.
    pub async fn reconcile(&self, user_id: UserId) -> Result<ReconcileReport, StoreError> {
        let pending = self.local.unsynced(user_id).await;
        let mut report = ReconcileReport::default();

        for (index, captured) in pending.iter().enumerate() {
            let day = captured.challenge_date;
            let completion = match self.prepare(captured).await? {
                Replay::Push(completion) => completion,
                Replay::Reject => {
                    self.local.discard(user_id, day).await?;
                    report.rejected += 1;
                    continue;
                }
                Replay::Pause => {
                    report.remaining = (pending.len() - index) as u32;
                    break;
                }
            };

            match self.authoritative.insert_if_absent(completion).await {
                Ok(InsertOutcome::Inserted(stored)) => {
                    self.local.replace_with_authoritative(stored).await?;
                    report.synced += 1;
                }
                Ok(InsertOutcome::Conflict) => {
                    // The day was already recorded elsewhere; adopt that record
                    // so the day's points are counted once.
                    let existing = self
                        .authoritative
                        .find(user_id, DateRange { start: day, end: day })
                        .await;
                    match existing {
                        Ok(found) => match found.into_iter().next() {
                            Some(authoritative) => {
                                self.local.replace_with_authoritative(authoritative).await?
                            }
                            None => {
                                self.local.mark_synced(user_id, day).await?;
                            }
                        },
                        Err(err) => {
                            warn!("Could not read back conflicting completion on {}: {}", day, err);
                            report.remaining = (pending.len() - index) as u32;
                            break;
                        }
                    }
                    report.already_present += 1;
                }
                Err(err) if err.is_transient() => {
                    warn!(
                        "Reconciliation for user {} paused on {}: {}",
                        user_id, day, err
                    );
                    report.remaining = (pending.len() - index) as u32;
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            "Reconciled user {}: {} synced, {} already present, {} rejected, {} remaining",
            user_id, report.synced, report.already_present, report.rejected, report.remaining
        );
        Ok(report)
    }

    async fn prepare(&self, captured: &ChallengeCompletion) -> Result<Replay, StoreError> {
        match self
            .checks
            .source_result(captured.user_id, &captured.source_result_id)
            .await
        {
            Lookup::Found(()) => {}
            Lookup::Missing(resource) => {
                warn!(
                    "Dropping offline completion for user {} on {}: {:?} not found",
                    captured.user_id, captured.challenge_date, resource
                );
                return Ok(Replay::Reject);
            }
            Lookup::Unreachable(err) => {
                warn!("Reconciliation paused on {}: {}", captured.challenge_date, err);
                return Ok(Replay::Pause);
            }
            Lookup::Failed(err) => return Err(err),
        }

        match self.checks.published_points(captured.challenge_date).await {
            Lookup::Found(points) => Ok(Replay::Push(ChallengeCompletion {
                earned_points: points,
                ..captured.clone()
            })),
            Lookup::Missing(resource) => {
                warn!(
                    "Dropping offline completion for user {} on {}: {:?} not found",
                    captured.user_id, captured.challenge_date, resource
                );
                Ok(Replay::Reject)
            }
            Lookup::Unreachable(err) => {
                warn!("Reconciliation paused on {}: {}", captured.challenge_date, err);
                Ok(Replay::Pause)
            }
            Lookup::Failed(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use challenge_types::{DailyChallenge, Difficulty, GameType, SourceResult};
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::sync::Mutex;
    use uuid::Uuid;

    /// In-memory authoritative store that can be told to go offline after a
    /// number of successful inserts.
    struct ScriptedStore {
        rows: Mutex<Vec<ChallengeCompletion>>,
        inserts_before_outage: Option<usize>,
    }

    #[async_trait]
    impl CompletionStore for ScriptedStore {
        async fn find(
            &self,
            user_id: UserId,
            range: DateRange,
        ) -> Result<Vec<ChallengeCompletion>, StoreError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .filter(|c| c.user_id == user_id && range.contains(c.challenge_date))
                .cloned()
                .collect())
        }

        async fn insert_if_absent(
            &self,
            completion: ChallengeCompletion,
        ) -> Result<InsertOutcome, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            if self.inserts_before_outage.is_some_and(|limit| rows.len() >= limit) {
                return Err(StoreError::Unavailable("offline".to_string()));
            }
            if rows
                .iter()
                .any(|c| c.user_id == completion.user_id && c.challenge_date == completion.challenge_date)
            {
                return Ok(InsertOutcome::Conflict);
            }
            rows.push(completion.clone());
            Ok(InsertOutcome::Inserted(completion))
        }
    }

    /// Every result belongs to `owner` and every day has a challenge worth
    /// `points`.
    struct Published {
        owner: UserId,
        points: u32,
    }

    #[async_trait]
    impl ChallengeLookup for Published {
        async fn active_challenge_on(
            &self,
            date: NaiveDate,
        ) -> Result<Option<DailyChallenge>, StoreError> {
            Ok(Some(DailyChallenge {
                date,
                title: "Pattern Recognition".to_string(),
                description: "Spot the odd one out".to_string(),
                points: self.points,
                game_type: GameType::Attention,
                difficulty: Difficulty::Medium,
                link: "/tools/patterns".to_string(),
                is_active: true,
            }))
        }
    }

    #[async_trait]
    impl SourceResultLookup for Published {
        async fn find_source_result(&self, id: &str) -> Result<Option<SourceResult>, StoreError> {
            Ok(Some(SourceResult {
                id: id.to_string(),
                user_id: self.owner,
                game_type: GameType::Attention,
                score: 7,
                completed_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            }))
        }
    }

    fn reconciler(
        store: Arc<ScriptedStore>,
        local: Arc<LocalCompletionStore>,
        owner: UserId,
        points: u32,
    ) -> CompletionReconciler {
        let published = Arc::new(Published { owner, points });
        CompletionReconciler::new(store, published.clone(), published, local)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn completion(user_id: UserId, date: NaiveDate, points: u32) -> ChallengeCompletion {
        ChallengeCompletion {
            id: Uuid::new_v4(),
            user_id,
            challenge_date: date,
            completed_at: Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap()),
            game_type: GameType::Attention,
            earned_points: points,
            source_result_id: format!("r-{}", date),
        }
    }

    #[tokio::test]
    async fn test_conflicting_day_adopts_authoritative_record() {
        let user_id = Uuid::new_v4();
        let existing = completion(user_id, day(2), 125);
        let store = Arc::new(ScriptedStore {
            rows: Mutex::new(vec![existing.clone()]),
            inserts_before_outage: None,
        });
        let local = Arc::new(LocalCompletionStore::in_memory(10));
        local.insert_entry(completion(user_id, day(1), 75), false).await.unwrap();
        local.insert_entry(completion(user_id, day(2), 75), false).await.unwrap();

        let report = reconciler(store.clone(), local.clone(), user_id, 100)
            .reconcile(user_id)
            .await
            .unwrap();

        assert_eq!(
            report,
            ReconcileReport {
                synced: 1,
                already_present: 1,
                rejected: 0,
                remaining: 0
            }
        );
        assert!(local.unsynced(user_id).await.is_empty());
        let entries = local.entries(user_id).await;
        assert_eq!(entries[0].completion.earned_points, 100);
        assert_eq!(entries[1].completion, existing);
        assert_eq!(store.rows.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_outage_leaves_rest_unsynced() {
        let user_id = Uuid::new_v4();
        let store = Arc::new(ScriptedStore {
            rows: Mutex::new(Vec::new()),
            inserts_before_outage: Some(1),
        });
        let local = Arc::new(LocalCompletionStore::in_memory(10));
        for d in [3, 4, 5] {
            local.insert_entry(completion(user_id, day(d), 90), false).await.unwrap();
        }

        let report = reconciler(store, local.clone(), user_id, 90)
            .reconcile(user_id)
            .await
            .unwrap();

        assert_eq!(report.synced, 1);
        assert_eq!(report.remaining, 2);
        let pending: Vec<NaiveDate> = local
            .unsynced(user_id)
            .await
            .into_iter()
            .map(|c| c.challenge_date)
            .collect();
        assert_eq!(pending, vec![day(4), day(5)]);
    }

    #[tokio::test]
    async fn test_nothing_to_do() {
        let store = Arc::new(ScriptedStore {
            rows: Mutex::new(Vec::new()),
            inserts_before_outage: None,
        });
        let user_id = Uuid::new_v4();
        let report = reconciler(store, Arc::new(LocalCompletionStore::in_memory(10)), user_id, 90)
            .reconcile(user_id)
            .await
            .unwrap();
        assert_eq!(report, ReconcileReport::default());
    }

    #[tokio::test]
    async fn test_results_of_other_users_are_dropped() {
        let user_id = Uuid::new_v4();
        let store = Arc::new(ScriptedStore {
            rows: Mutex::new(Vec::new()),
            inserts_before_outage: None,
        });
        let local = Arc::new(LocalCompletionStore::in_memory(10));
        local.insert_entry(completion(user_id, day(6), 90), false).await.unwrap();

        let report = reconciler(store.clone(), local.clone(), Uuid::new_v4(), 100)
            .reconcile(user_id)
            .await
            .unwrap();

        assert_eq!(report.rejected, 1);
        assert_eq!(report.synced, 0);
        assert!(local.entries(user_id).await.is_empty());
        assert!(store.rows.lock().unwrap().is_empty());
    }
}

use async_trait::async_trait;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, SqlErr,
};
use tracing::debug;

use crate::entities::{challenge_completions, prelude::*};
use crate::store::{CompletionStore, InsertOutcome, StoreError};
use challenge_types::{ChallengeCompletion, DateRange, GameType, UserId};

/// The authoritative completion store.
pub struct CompletionRepository {
    db: DatabaseConnection,
}

impl CompletionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_completion(
        model: challenge_completions::Model,
    ) -> Result<ChallengeCompletion, StoreError> {
        let game_type: GameType = model
            .game_type
            .parse()
            .map_err(|e| StoreError::InvalidRecord(format!("completion {}: {}", model.id, e)))?;
        let earned_points = u32::try_from(model.earned_points).map_err(|_| {
            StoreError::InvalidRecord(format!(
                "completion {} has negative points {}",
                model.id, model.earned_points
            ))
        })?;

        Ok(ChallengeCompletion {
            id: model.id,
            user_id: model.user_id,
            challenge_date: model.challenge_date,
            completed_at: model.completed_at,
            game_type,
            earned_points,
            source_result_id: model.source_result_id,
        })
    }

    pub async fn find_on(
        &self,
        user_id: UserId,
        day: chrono::NaiveDate,
    ) -> Result<Option<ChallengeCompletion>, StoreError> {
        ChallengeCompletions::find()
            .filter(challenge_completions::Column::UserId.eq(user_id))
            .filter(challenge_completions::Column::ChallengeDate.eq(day))
            .one(&self.db)
            .await?
            .map(Self::model_to_completion)
            .transpose()
    }
}

#[async_trait]
impl CompletionStore for CompletionRepository {
    async fn find(
        &self,
        user_id: UserId,
        range: DateRange,
    ) -> Result<Vec<ChallengeCompletion>, StoreError> {
        let models = ChallengeCompletions::find()
            .filter(challenge_completions::Column::UserId.eq(user_id))
            .filter(challenge_completions::Column::ChallengeDate.between(range.start, range.end))
            .order_by_desc(challenge_completions::Column::ChallengeDate)
            .all(&self.db)
            .await?;

        debug!("Found {} completions for user {}", models.len(), user_id);
        models.into_iter().map(Self::model_to_completion).collect()
    }

    async fn insert_if_absent(
        &self,
        completion: ChallengeCompletion,
    ) -> Result<InsertOutcome, StoreError> {
        let earned_points = i32::try_from(completion.earned_points).map_err(|_| {
            StoreError::InvalidRecord(format!("points {} out of range", completion.earned_points))
        })?;

        let model = challenge_completions::ActiveModel {
            id: ActiveValue::Set(completion.id),
            user_id: ActiveValue::Set(completion.user_id),
            challenge_date: ActiveValue::Set(completion.challenge_date),
            completed_at: ActiveValue::Set(completion.completed_at),
            game_type: ActiveValue::Set(completion.game_type.to_string()),
            earned_points: ActiveValue::Set(earned_points),
            source_result_id: ActiveValue::Set(completion.source_result_id.clone()),
        };

        // The unique (user_id, challenge_date) index makes this the single
        // de-duplication point, even for concurrent writers.
        match ChallengeCompletions::insert(model).exec(&self.db).await {
            Ok(_) => Ok(InsertOutcome::Inserted(completion)),
            Err(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    debug!(
                        "Completion for user {} on {} already exists",
                        completion.user_id, completion.challenge_date
                    );
                    Ok(InsertOutcome::Conflict)
                }
                _ => Err(err.into()),
            },
        }
    }
}

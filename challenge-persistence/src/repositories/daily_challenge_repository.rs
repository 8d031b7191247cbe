use anyhow::Result;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, SqlErr,
};

use crate::entities::{daily_challenges, prelude::*};
use crate::store::{ChallengeLookup, StoreError};
use challenge_types::DailyChallenge;

/// Longest window `upcoming` will return.
pub const MAX_UPCOMING_DAYS: u32 = 7;

pub struct DailyChallengeRepository {
    db: DatabaseConnection,
}

impl DailyChallengeRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_challenge(model: daily_challenges::Model) -> Result<DailyChallenge, StoreError> {
        let invalid = |what: String| StoreError::InvalidRecord(format!("challenge {}: {}", model.date, what));
        Ok(DailyChallenge {
            date: model.date,
            game_type: model.game_type.parse().map_err(|e| invalid(format!("{}", e)))?,
            difficulty: model.difficulty.parse().map_err(invalid)?,
            points: u32::try_from(model.points)
                .map_err(|_| invalid(format!("negative points {}", model.points)))?,
            title: model.title,
            description: model.description,
            link: model.link,
            is_active: model.is_active,
        })
    }

    /// Publish the challenge for its day. Published challenges are never
    /// replaced; returns `None` when the day already has one.
    pub async fn publish(&self, challenge: DailyChallenge) -> Result<Option<DailyChallenge>> {
        if DailyChallenges::find_by_id(challenge.date)
            .one(&self.db)
            .await?
            .is_some()
        {
            return Ok(None);
        }

        let model = daily_challenges::ActiveModel {
            date: ActiveValue::Set(challenge.date),
            title: ActiveValue::Set(challenge.title.clone()),
            description: ActiveValue::Set(challenge.description.clone()),
            points: ActiveValue::Set(i32::try_from(challenge.points)?),
            game_type: ActiveValue::Set(challenge.game_type.to_string()),
            difficulty: ActiveValue::Set(challenge.difficulty.as_str().to_string()),
            link: ActiveValue::Set(challenge.link.clone()),
            is_active: ActiveValue::Set(challenge.is_active),
        };
        // A concurrent publish for the same day can land between the read
        // and the insert; the primary key settles it.
        if let Err(err) = DailyChallenges::insert(model).exec(&self.db).await {
            return match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => Ok(None),
                _ => Err(err.into()),
            };
        }

        tracing::info!("Published daily challenge '{}' for {}", challenge.title, challenge.date);
        Ok(Some(challenge))
    }

    /// Active challenges from `start` for up to `days` days (clamped to 1..=7).
    pub async fn upcoming(&self, start: NaiveDate, days: u32) -> Result<Vec<DailyChallenge>> {
        let days = days.clamp(1, MAX_UPCOMING_DAYS);
        let end = start
            .checked_add_days(Days::new(u64::from(days - 1)))
            .unwrap_or(NaiveDate::MAX);

        let models = DailyChallenges::find()
            .filter(daily_challenges::Column::Date.between(start, end))
            .filter(daily_challenges::Column::IsActive.eq(true))
            .order_by_asc(daily_challenges::Column::Date)
            .all(&self.db)
            .await?;

        let challenges = models
            .into_iter()
            .map(Self::model_to_challenge)
            .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(challenges)
    }
}

#[async_trait]
impl ChallengeLookup for DailyChallengeRepository {
    async fn active_challenge_on(
        &self,
        date: NaiveDate,
    ) -> Result<Option<DailyChallenge>, StoreError> {
        DailyChallenges::find_by_id(date)
            .filter(daily_challenges::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .map(Self::model_to_challenge)
            .transpose()
    }
}

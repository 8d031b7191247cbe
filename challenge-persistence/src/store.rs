use async_trait::async_trait;
use challenge_types::{ChallengeCompletion, DailyChallenge, DateRange, SourceResult, UserId};
use chrono::NaiveDate;
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store operation timed out")]
    Timeout,
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("local store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("local store contents are corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("stored record is invalid: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Failures worth retrying later or routing around, as opposed to bad data.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) | StoreError::Timeout | StoreError::Io(_) => true,
            StoreError::Database(err) => matches!(
                err,
                DbErr::Conn(_) | DbErr::ConnectionAcquire(_) | DbErr::Exec(_) | DbErr::Query(_)
            ),
            StoreError::Corrupt(_) | StoreError::InvalidRecord(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(ChallengeCompletion),
    /// A completion for the same user and day already exists.
    Conflict,
}

/// Completion storage as the recorder and the stats service see it. The
/// "one completion per user per day" rule must be enforced atomically by
/// `insert_if_absent`, never by a separate read.
#[async_trait]
pub trait CompletionStore: Send + Sync {
    async fn find(
        &self,
        user_id: UserId,
        range: DateRange,
    ) -> Result<Vec<ChallengeCompletion>, StoreError>;

    async fn insert_if_absent(
        &self,
        completion: ChallengeCompletion,
    ) -> Result<InsertOutcome, StoreError>;
}

#[async_trait]
pub trait ChallengeLookup: Send + Sync {
    async fn active_challenge_on(&self, date: NaiveDate)
    -> Result<Option<DailyChallenge>, StoreError>;
}

#[async_trait]
pub trait SourceResultLookup: Send + Sync {
    async fn find_source_result(&self, id: &str) -> Result<Option<SourceResult>, StoreError>;
}

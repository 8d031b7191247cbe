use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{ChallengeCompletion, DailyChallenge, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecordRequest {
    pub user_id: UserId,
    pub challenge_date: NaiveDate,
    pub source_result_id: String,
    pub game_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum MissingResource {
    SourceResult,
    DailyChallenge,
}

/// Outcome of recording a completion. Duplicates, missing references and bad
/// input are decisions the caller renders, not failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
#[ts(export)]
pub enum RecordDecision {
    Recorded {
        completion: ChallengeCompletion,
        earned_points: u32,
    },
    /// Captured locally while the authoritative store was unreachable.
    PendingSync {
        completion: ChallengeCompletion,
        earned_points: u32,
    },
    AlreadyCompleted {
        challenge_date: NaiveDate,
    },
    NotFound {
        resource: MissingResource,
    },
    Invalid {
        reason: String,
    },
}

impl RecordDecision {
    pub fn completion(&self) -> Option<&ChallengeCompletion> {
        match self {
            RecordDecision::Recorded { completion, .. }
            | RecordDecision::PendingSync { completion, .. } => Some(completion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsQuery {
    pub user_id: UserId,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncRequest {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReconcileReport {
    pub synced: u32,
    pub already_present: u32,
    /// Offline captures dropped because the result or the day's challenge
    /// turned out not to exist.
    pub rejected: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TodayChallenge {
    pub challenge: DailyChallenge,
    pub fallback: bool,
}

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Request-level failures reported to HTTP clients as `{"error": message}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ChallengeError {
    InvalidDateRange,
    StoreUnavailable,
}

impl ChallengeError {
    pub fn message(&self) -> String {
        match self {
            ChallengeError::InvalidDateRange => "start_date must not be after end_date".to_string(),
            ChallengeError::StoreUnavailable => "Challenge store is unavailable".to_string(),
        }
    }
}

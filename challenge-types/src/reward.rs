use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RequirementType {
    Streak,
    Points,
}

/// An unlockable badge. Whether a user has it is always computed from their
/// streak and points, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Reward {
    pub id: String,
    pub title: String,
    pub requirement_type: RequirementType,
    pub requirement_value: u32,
}

impl Reward {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        requirement_type: RequirementType,
        requirement_value: u32,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            requirement_type,
            requirement_value,
        }
    }
}

/// The next reward of one requirement type and how close the user is to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RewardProgress {
    pub reward: Reward,
    pub current: u32,
    pub progress_percent: u8,
    pub remaining: u32,
}

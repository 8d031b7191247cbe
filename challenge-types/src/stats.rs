use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{Reward, RewardProgress};

/// Inclusive range of day-keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// The `days` days before `today` plus `today` itself.
    pub fn last_days(today: NaiveDate, days: u32) -> Self {
        let start = today
            .checked_sub_days(Days::new(days as u64))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: today }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum HistoryStatus {
    Completed,
    InProgress,
    Missed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyChallengeHistory {
    pub date: NaiveDate,
    pub formatted_date: String,
    pub completed_challenges: Vec<String>,
    pub total_challenges: u32,
    pub points: u32,
    pub status: HistoryStatus,
}

/// Derived view over a user's completions. Recomputed on every query and
/// never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChallengeStats {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_active_day: Option<NaiveDate>,
    pub total_points: u32,
    pub completed_today: Vec<String>,
    pub challenge_history: Vec<DailyChallengeHistory>,
    pub unlocked_rewards: Vec<Reward>,
    pub next_rewards: Vec<RewardProgress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum StatsSource {
    Authoritative,
    LocalFallback,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatsReport {
    pub stats: ChallengeStats,
    pub source: StatsSource,
    /// Set when the stats did not come from the authoritative store.
    pub degraded: bool,
}

#![allow(dead_code)]

use challenge_types::{ChallengeCompletion, GameType};
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

/// The fixed "today" every scenario is evaluated against.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 14).unwrap()
}

/// Mid-afternoon on `today()`.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 14, 16, 30, 0).unwrap()
}

pub fn days_ago(n: u64) -> NaiveDate {
    today().checked_sub_days(Days::new(n)).unwrap()
}

/// Creates a completion on `day` worth `points`.
pub fn completion(day: NaiveDate, points: u32) -> ChallengeCompletion {
    completion_with(day, points, GameType::Memory)
}

pub fn completion_with(day: NaiveDate, points: u32, game_type: GameType) -> ChallengeCompletion {
    ChallengeCompletion {
        id: Uuid::new_v4(),
        user_id: Uuid::from_u128(7),
        challenge_date: day,
        completed_at: Utc.from_utc_datetime(&day.and_hms_opt(9, 15, 0).unwrap()),
        game_type,
        earned_points: points,
        source_result_id: format!("result-{}", day),
    }
}

/// One 100-point completion on each of the given days.
pub fn completions_on(days: &[NaiveDate]) -> Vec<ChallengeCompletion> {
    days.iter().map(|day| completion(*day, 100)).collect()
}

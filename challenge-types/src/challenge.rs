use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum GameType {
    Memory,
    Verbal,
    Pattern,
    Reaction,
    Sequence,
    Attention,
}

impl GameType {
    pub const ALL: [GameType; 6] = [
        GameType::Memory,
        GameType::Verbal,
        GameType::Pattern,
        GameType::Reaction,
        GameType::Sequence,
        GameType::Attention,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Memory => "memory",
            GameType::Verbal => "verbal",
            GameType::Pattern => "pattern",
            GameType::Reaction => "reaction",
            GameType::Sequence => "sequence",
            GameType::Attention => "attention",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGameType(pub String);

impl fmt::Display for UnknownGameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown game type '{}'", self.0)
    }
}

impl std::error::Error for UnknownGameType {}

impl FromStr for GameType {
    type Err = UnknownGameType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        GameType::ALL
            .into_iter()
            .find(|game_type| game_type.as_str() == normalized)
            .ok_or_else(|| UnknownGameType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// The challenge published for a single calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyChallenge {
    pub date: NaiveDate,
    pub title: String,
    pub description: String,
    pub points: u32,
    pub game_type: GameType,
    pub difficulty: Difficulty,
    pub link: String,
    pub is_active: bool,
}

/// One user's completion of the challenge for `challenge_date`.
///
/// `challenge_date` is a day-key in the canonical timezone, never a
/// timestamp. At most one completion exists per `(user_id, challenge_date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChallengeCompletion {
    pub id: Uuid,
    pub user_id: UserId,
    pub challenge_date: NaiveDate,
    pub completed_at: DateTime<Utc>,
    pub game_type: GameType,
    pub earned_points: u32,
    pub source_result_id: String,
}

/// A finished game that a completion points back to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SourceResult {
    pub id: String,
    pub user_id: UserId,
    pub game_type: GameType,
    pub score: i32,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_type_parsing_is_case_insensitive() {
        assert_eq!("Memory".parse::<GameType>(), Ok(GameType::Memory));
        assert_eq!(" verbal ".parse::<GameType>(), Ok(GameType::Verbal));
        assert!("chess".parse::<GameType>().is_err());
    }

    #[test]
    fn test_game_type_serializes_lowercase() {
        let json = serde_json::to_string(&GameType::Attention).unwrap();
        assert_eq!(json, "\"attention\"");
    }
}

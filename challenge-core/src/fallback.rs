use challenge_types::{DailyChallenge, Difficulty, GameType};
use chrono::{Datelike, NaiveDate};

struct FallbackTemplate {
    title: &'static str,
    description: &'static str,
    points: u32,
    game_type: GameType,
    difficulty: Difficulty,
    link: &'static str,
}

const FALLBACK_CHALLENGES: [FallbackTemplate; 5] = [
    FallbackTemplate {
        title: "Memory Matrix",
        description: "Memorize and recall a sequence of highlighted squares in a grid",
        points: 100,
        game_type: GameType::Memory,
        difficulty: Difficulty::Medium,
        link: "/tools/memory-game",
    },
    FallbackTemplate {
        title: "Word Association",
        description: "Test your verbal fluency by naming related words within a time limit",
        points: 75,
        game_type: GameType::Verbal,
        difficulty: Difficulty::Easy,
        link: "/tools/verbal-fluency",
    },
    FallbackTemplate {
        title: "Pattern Completion",
        description: "Identify the missing element in visual or numerical patterns",
        points: 125,
        game_type: GameType::Pattern,
        difficulty: Difficulty::Hard,
        link: "/tools/pattern-recognition",
    },
    FallbackTemplate {
        title: "Quick Reaction",
        description: "Test your processing speed with this reaction time challenge",
        points: 90,
        game_type: GameType::Reaction,
        difficulty: Difficulty::Medium,
        link: "/tools/reaction-game",
    },
    FallbackTemplate {
        title: "Sequence Memory",
        description: "Remember and reproduce increasingly complex sequences",
        points: 110,
        game_type: GameType::Sequence,
        difficulty: Difficulty::Medium,
        link: "/tools/sequence-memory",
    },
];

/// The locally known challenge for `date`, used whenever the published one
/// cannot be fetched. Selection depends only on the day of month, so every
/// node picks the same challenge for the same day.
pub fn fallback_challenge(date: NaiveDate) -> DailyChallenge {
    let template = &FALLBACK_CHALLENGES[date.day() as usize % FALLBACK_CHALLENGES.len()];
    DailyChallenge {
        date,
        title: template.title.to_string(),
        description: template.description.to_string(),
        points: template.points,
        game_type: template.game_type,
        difficulty: template.difficulty,
        link: template.link.to_string(),
        is_active: true,
    }
}

pub use super::challenge_completions::Entity as ChallengeCompletions;
pub use super::daily_challenges::Entity as DailyChallenges;
pub use super::source_results::Entity as SourceResults;

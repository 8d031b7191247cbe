pub mod prelude;

pub mod challenge_completions;
pub mod daily_challenges;
pub mod source_results;

pub mod completion_repository;
pub mod daily_challenge_repository;
pub mod source_result_repository;

pub use completion_repository::CompletionRepository;
pub use daily_challenge_repository::DailyChallengeRepository;
pub use source_result_repository::SourceResultRepository;

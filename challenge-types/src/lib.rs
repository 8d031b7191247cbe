pub mod challenge;
pub mod errors;
pub mod messages;
pub mod reward;
pub mod stats;

// Re-export all types
pub use challenge::*;
pub use errors::*;
pub use messages::*;
pub use reward::*;
pub use stats::*;

pub type UserId = uuid::Uuid;

pub mod day_clock;
pub mod fallback;
pub mod prediction;
pub mod rewards;
pub mod streaks;

// Re-export main components
pub use day_clock::*;
pub use fallback::*;
pub use prediction::*;
pub use rewards::*;
pub use streaks::*;

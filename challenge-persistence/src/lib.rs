pub mod connection;
pub mod entities;
pub mod local_store;
pub mod repositories;
pub mod store;

pub use local_store::{LocalCompletionStore, LocalEntry};
pub use store::{ChallengeLookup, CompletionStore, InsertOutcome, SourceResultLookup, StoreError};

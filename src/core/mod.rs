//! Core business logic abstractions

pub mod config;
pub mod error;
pub mod feed;
pub mod log;
pub mod rate;
pub mod store;

// Re-export main types for cleaner imports
pub use error::{FeedError, ParseError, StoreError};
pub use feed::RateFeed;
pub use rate::{AttemptId, AttemptStatus, FetchAttempt, RateRecord, StoredRate};
pub use store::RateStore;

//! Rate feed abstraction

use crate::core::error::FeedError;
use crate::core::rate::RateRecord;
use async_trait::async_trait;

#[async_trait]
pub trait RateFeed: Send + Sync {
    /// Endpoint recorded in the audit trail for each attempt.
    fn url(&self) -> &str;

    /// Retrieves and decodes the current feed; all records or an error.
    async fn fetch_rates(&self) -> Result<Vec<RateRecord>, FeedError>;
}

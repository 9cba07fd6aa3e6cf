//! Persistence abstraction for attempts and the rates they produced

use crate::core::error::StoreError;
use crate::core::rate::{AttemptId, AttemptStatus, FetchAttempt, RateRecord, StoredRate};
use async_trait::async_trait;

#[async_trait]
pub trait RateStore: Send + Sync {
    /// Creates the `requests` and `responses` tables if they are missing.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Inserts and commits one audit row, returning its id.
    async fn record_attempt(&self, api_url: &str, status: AttemptStatus)
    -> Result<AttemptId, StoreError>;

    /// Inserts every record for `attempt_id` in one transaction.
    async fn record_rates(
        &self,
        attempt_id: AttemptId,
        records: &[RateRecord],
    ) -> Result<(), StoreError>;

    /// Most recent attempts first.
    async fn list_attempts(&self, limit: i64) -> Result<Vec<FetchAttempt>, StoreError>;

    /// Rates of one attempt in insertion order.
    async fn list_rates(&self, attempt_id: AttemptId) -> Result<Vec<StoredRate>, StoreError>;

    /// Releases the underlying connection. Further calls fail.
    async fn close(&self);
}

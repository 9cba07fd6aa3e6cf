//! SQLite backend for local runs and tests. Rates are kept as decimal text
//! because SQLite has no fixed-point type.
use super::{AttemptRow, RateRow};
use crate::core::{
    AttemptId, AttemptStatus, FetchAttempt, RateRecord, RateStore, StoreError, StoredRate,
};
use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

const CREATE_REQUESTS: &str = r#"
    CREATE TABLE IF NOT EXISTS requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        request_time TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        api_url VARCHAR(255) NOT NULL,
        status VARCHAR(50),
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    )
"#;

const CREATE_RESPONSES: &str = r#"
    CREATE TABLE IF NOT EXISTS responses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        request_id INTEGER NOT NULL REFERENCES requests(id) ON DELETE CASCADE,
        currency_code VARCHAR(3) NOT NULL,
        currency_name VARCHAR(100),
        rate TEXT NOT NULL,
        nominal INTEGER DEFAULT 1,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    )
"#;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str(url)
            .map_err(StoreError::Connect)?
            .create_if_missing(true)
            .foreign_keys(true);

        // One connection that is never recycled, so `sqlite::memory:`
        // keeps its data for the lifetime of the store.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(StoreError::Connect)?;
        info!("Connection to database successful");
        Ok(Self { pool })
    }

    /// Direct access for maintenance statements the store itself never issues.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RateStore for SqliteStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let schema_error = |e| StoreError::classify(e, StoreError::Schema);
        let mut tx = self.pool.begin().await.map_err(schema_error)?;
        for ddl in [CREATE_REQUESTS, CREATE_RESPONSES] {
            sqlx::query(ddl)
                .execute(&mut *tx)
                .await
                .map_err(schema_error)?;
        }
        tx.commit().await.map_err(schema_error)?;
        info!("Tables successfully created");
        Ok(())
    }

    async fn record_attempt(
        &self,
        api_url: &str,
        status: AttemptStatus,
    ) -> Result<AttemptId, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO requests (api_url, status, request_time, created_at)
            VALUES (?1, ?2, ?3, ?3)
            RETURNING id
            "#,
        )
        .bind(api_url)
        .bind(status.as_str())
        .bind(chrono::Utc::now().naive_utc())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::classify(e, StoreError::AttemptInsert))?;
        debug!(request_id = id, %status, "Inserted request");
        Ok(id)
    }

    async fn record_rates(
        &self,
        attempt_id: AttemptId,
        records: &[RateRecord],
    ) -> Result<(), StoreError> {
        let rate_error =
            move |e| StoreError::classify(e, |source| StoreError::RateInsert { attempt_id, source });

        let created_at = chrono::Utc::now().naive_utc();
        let mut tx = self.pool.begin().await.map_err(rate_error)?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO responses
                (request_id, currency_code, currency_name, rate, nominal, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(attempt_id)
            .bind(&record.code)
            .bind(&record.name)
            .bind(record.rate.to_string())
            .bind(record.nominal)
            .bind(created_at)
            .execute(&mut *tx)
            .await
            .map_err(rate_error)?;
        }
        tx.commit().await.map_err(rate_error)?;
        info!(
            "Saved {} currencies for request_id {}",
            records.len(),
            attempt_id
        );
        Ok(())
    }

    async fn list_attempts(&self, limit: i64) -> Result<Vec<FetchAttempt>, StoreError> {
        let rows: Vec<AttemptRow> = sqlx::query_as(
            r#"
            SELECT id, request_time, api_url, status, created_at
            FROM requests
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::classify(e, StoreError::Query))?;
        rows.into_iter().map(FetchAttempt::try_from).collect()
    }

    async fn list_rates(&self, attempt_id: AttemptId) -> Result<Vec<StoredRate>, StoreError> {
        let rows: Vec<RateRow> = sqlx::query_as(
            r#"
            SELECT id, request_id, currency_code, currency_name, rate, nominal, created_at
            FROM responses
            WHERE request_id = ?
            ORDER BY id
            "#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::classify(e, StoreError::Query))?;
        rows.into_iter().map(StoredRate::try_from).collect()
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Connection to database closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    async fn memory_store() -> SqliteStore {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store.ensure_schema().await.unwrap();
        store
    }

    fn record(code: &str, rate: &str, nominal: i32) -> RateRecord {
        RateRecord {
            code: code.to_string(),
            name: format!("{code} name"),
            rate: Decimal::from_str(rate).unwrap(),
            nominal,
        }
    }

    async fn count(store: &SqliteStore, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(store.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let store = memory_store().await;
        let id = store
            .record_attempt("http://localhost/feed", AttemptStatus::Success)
            .await
            .unwrap();
        store
            .record_rates(id, &[record("USD", "91.2345", 1)])
            .await
            .unwrap();

        store.ensure_schema().await.unwrap();

        assert_eq!(count(&store, "requests").await, 1);
        assert_eq!(count(&store, "responses").await, 1);
    }

    #[tokio::test]
    async fn test_attempt_ids_are_sequential() {
        let store = memory_store().await;
        let first = store
            .record_attempt("http://localhost/feed", AttemptStatus::Failed)
            .await
            .unwrap();
        let second = store
            .record_attempt("http://localhost/feed", AttemptStatus::Success)
            .await
            .unwrap();
        assert_eq!(second, first + 1);

        let attempts = store.list_attempts(10).await.unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].id, second);
        assert_eq!(attempts[0].status, AttemptStatus::Success);
        assert_eq!(attempts[1].status, AttemptStatus::Failed);
        assert_eq!(attempts[1].api_url, "http://localhost/feed");
    }

    #[tokio::test]
    async fn test_attempt_timestamps_share_one_clock() {
        let store = memory_store().await;
        let before = chrono::Utc::now().naive_utc();
        store
            .record_attempt("http://localhost/feed", AttemptStatus::Success)
            .await
            .unwrap();
        let after = chrono::Utc::now().naive_utc();

        let attempt = &store.list_attempts(1).await.unwrap()[0];
        assert_eq!(attempt.created_at, attempt.request_time);
        assert!(attempt.request_time >= before && attempt.request_time <= after);
    }

    #[tokio::test]
    async fn test_rates_keep_exact_values_and_order() {
        let store = memory_store().await;
        let id = store
            .record_attempt("http://localhost/feed", AttemptStatus::Success)
            .await
            .unwrap();
        let records = vec![
            record("USD", "91.2345", 1),
            record("AMD", "23.7654", 100),
            record("USD", "91.2345", 1),
        ];
        store.record_rates(id, &records).await.unwrap();

        let stored = store.list_rates(id).await.unwrap();
        let restored: Vec<RateRecord> = stored.into_iter().map(|s| s.record).collect();
        assert_eq!(restored, records);
    }

    #[tokio::test]
    async fn test_rate_insert_is_all_or_nothing() {
        let store = memory_store().await;
        // No such request row: the foreign key rejects every insert.
        let err = store
            .record_rates(42, &[record("USD", "1.0", 1), record("EUR", "2.0", 1)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "rate-insert");
        assert_eq!(count(&store, "responses").await, 0);

        // A failure on the last row rolls back the rows before it.
        let id = store
            .record_attempt("http://localhost/feed", AttemptStatus::Success)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TRIGGER reject_xxx BEFORE INSERT ON responses \
             WHEN NEW.currency_code = 'XXX' BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(store.pool())
        .await
        .unwrap();
        let err = store
            .record_rates(id, &[record("USD", "1.0", 1), record("XXX", "2.0", 1)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "rate-insert");
        assert_eq!(count(&store, "responses").await, 0);
        // The attempt row committed before is left in place.
        assert_eq!(count(&store, "requests").await, 1);
    }

    #[tokio::test]
    async fn test_deleting_an_attempt_cascades_to_its_rates_only() {
        let store = memory_store().await;
        let kept = store
            .record_attempt("http://localhost/feed", AttemptStatus::Success)
            .await
            .unwrap();
        let dropped = store
            .record_attempt("http://localhost/feed", AttemptStatus::Success)
            .await
            .unwrap();
        store
            .record_rates(kept, &[record("USD", "90.0", 1)])
            .await
            .unwrap();
        store
            .record_rates(dropped, &[record("EUR", "99.0", 1), record("CNY", "12.5", 1)])
            .await
            .unwrap();

        sqlx::query("DELETE FROM requests WHERE id = ?")
            .bind(dropped)
            .execute(store.pool())
            .await
            .unwrap();

        assert!(store.list_rates(dropped).await.unwrap().is_empty());
        assert_eq!(store.list_rates(kept).await.unwrap().len(), 1);
        assert_eq!(count(&store, "responses").await, 1);
    }

    #[tokio::test]
    async fn test_closed_store_reports_lost_connection() {
        let store = memory_store().await;
        store.close().await;

        let err = store
            .record_attempt("http://localhost/feed", AttemptStatus::Failed)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "connection-lost");
    }
}

//! PostgreSQL backend, the service's production database.
use super::{AttemptRow, RateRow};
use crate::core::{
    AttemptId, AttemptStatus, FetchAttempt, RateRecord, RateStore, StoreError, StoredRate,
};
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info};

const CREATE_REQUESTS: &str = r#"
    CREATE TABLE IF NOT EXISTS requests (
        id SERIAL PRIMARY KEY,
        request_time TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        api_url VARCHAR(255) NOT NULL,
        status VARCHAR(50),
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
"#;

const CREATE_RESPONSES: &str = r#"
    CREATE TABLE IF NOT EXISTS responses (
        id SERIAL PRIMARY KEY,
        request_id INTEGER NOT NULL REFERENCES requests(id) ON DELETE CASCADE,
        currency_code VARCHAR(3) NOT NULL,
        currency_name VARCHAR(100),
        rate DECIMAL(10, 4) NOT NULL,
        nominal INTEGER DEFAULT 1,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
"#;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        // A single long-lived connection; cycles never overlap.
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(StoreError::Connect)?;
        info!("Connection to database successful");
        Ok(Self { pool })
    }
}

#[async_trait]
impl RateStore for PostgresStore {
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
            VALUES ($1, $2, $3, $3)
            RETURNING id::BIGINT
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
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(attempt_id)
            .bind(&record.code)
            .bind(&record.name)
            .bind(record.rate)
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
            SELECT id::BIGINT AS id, request_time, api_url, status, created_at
            FROM requests
            ORDER BY id DESC
            LIMIT $1
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
            SELECT id::BIGINT AS id, request_id::BIGINT AS request_id, currency_code,
                   currency_name, rate::TEXT AS rate, nominal::BIGINT AS nominal, created_at
            FROM responses
            WHERE request_id = $1
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

pub mod postgres;
pub mod sqlite;

use crate::core::{FetchAttempt, RateRecord, RateStore, StoreError, StoredRate};
use chrono::NaiveDateTime;
use postgres::PostgresStore;
use rust_decimal::Decimal;
use sqlite::SqliteStore;
use std::str::FromStr;

/// Opens the backend matching the URL scheme.
pub async fn connect(database_url: &str) -> Result<Box<dyn RateStore>, StoreError> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok(Box::new(PostgresStore::connect(database_url).await?))
    } else if database_url.starts_with("sqlite:") {
        Ok(Box::new(SqliteStore::connect(database_url).await?))
    } else {
        let scheme = database_url.split(':').next().unwrap_or_default();
        Err(StoreError::UnsupportedUrl(format!("{scheme}://...")))
    }
}

fn decode_error(msg: String) -> StoreError {
    StoreError::Query(sqlx::Error::Decode(msg.into()))
}

#[derive(Debug, sqlx::FromRow)]
struct AttemptRow {
    id: i64,
    request_time: NaiveDateTime,
    api_url: String,
    status: Option<String>,
    created_at: Option<NaiveDateTime>,
}

impl TryFrom<AttemptRow> for FetchAttempt {
    type Error = StoreError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .ok_or_else(|| decode_error(format!("request {} has no status", row.id)))?
            .parse()
            .map_err(decode_error)?;
        Ok(FetchAttempt {
            id: row.id,
            request_time: row.request_time,
            api_url: row.api_url,
            status,
            created_at: row.created_at.unwrap_or(row.request_time),
        })
    }
}

/// `rate` is selected as text on every backend so the fixed-point value
/// survives unchanged.
#[derive(Debug, sqlx::FromRow)]
struct RateRow {
    id: i64,
    request_id: i64,
    currency_code: String,
    currency_name: Option<String>,
    rate: String,
    nominal: Option<i64>,
    created_at: Option<NaiveDateTime>,
}

impl TryFrom<RateRow> for StoredRate {
    type Error = StoreError;

    fn try_from(row: RateRow) -> Result<Self, Self::Error> {
        let rate = Decimal::from_str(&row.rate)
            .map_err(|e| decode_error(format!("response {} rate '{}': {e}", row.id, row.rate)))?;
        let nominal = i32::try_from(row.nominal.unwrap_or(1))
            .map_err(|e| decode_error(format!("response {} nominal: {e}", row.id)))?;
        Ok(StoredRate {
            id: row.id,
            attempt_id: row.request_id,
            record: RateRecord {
                code: row.currency_code,
                name: row.currency_name.unwrap_or_default(),
                rate,
                nominal,
            },
            created_at: row.created_at.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_scheme_is_rejected() {
        let result = connect("mysql://root@localhost/rates").await;
        match result {
            Err(StoreError::UnsupportedUrl(scheme)) => assert_eq!(scheme, "mysql://..."),
            Err(other) => panic!("Unexpected error: {other}"),
            Ok(_) => panic!("Expected an error"),
        }
    }

    #[test]
    fn test_rate_row_with_legacy_nulls_is_decoded() {
        let row = RateRow {
            id: 7,
            request_id: 3,
            currency_code: "USD".into(),
            currency_name: None,
            rate: "91.2345".into(),
            nominal: None,
            created_at: None,
        };
        let stored = StoredRate::try_from(row).unwrap();
        assert_eq!(stored.attempt_id, 3);
        assert_eq!(stored.record.name, "");
        assert_eq!(stored.record.nominal, 1);
        assert_eq!(stored.record.rate, Decimal::from_str("91.2345").unwrap());
    }

    #[test]
    fn test_attempt_row_without_status_is_an_error() {
        let row = AttemptRow {
            id: 1,
            request_time: NaiveDateTime::default(),
            api_url: "http://localhost".into(),
            status: None,
            created_at: None,
        };
        assert_eq!(FetchAttempt::try_from(row).unwrap_err().kind(), "query");
    }
}

//! Exchange-rate records and the audit trail of fetch attempts

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Identity of a row in the `requests` table.
pub type AttemptId = i64;

/// Outcome of a single fetch cycle as stored in the audit table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Success,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Success => "success",
            AttemptStatus::Failed => "failed",
        }
    }
}

impl Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(AttemptStatus::Success),
            "failed" => Ok(AttemptStatus::Failed),
            other => Err(format!("Unknown attempt status: {other}")),
        }
    }
}

/// One currency quote as published by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRecord {
    pub code: String,
    pub name: String,
    /// Price of `nominal` units, 4 fractional digits.
    pub rate: Decimal,
    pub nominal: i32,
}

/// A persisted row of the `requests` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchAttempt {
    pub id: AttemptId,
    pub request_time: NaiveDateTime,
    pub api_url: String,
    pub status: AttemptStatus,
    pub created_at: NaiveDateTime,
}

/// A persisted row of the `responses` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRate {
    pub id: i64,
    pub attempt_id: AttemptId,
    pub record: RateRecord,
    pub created_at: NaiveDateTime,
}

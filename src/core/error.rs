//! Typed failures of the fetch, parse and persist stages

use crate::core::rate::AttemptId;
use std::time::Duration;
use thiserror::Error;

/// Failure to turn the feed document into rate records.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document itself is not well-formed XML.
    #[error("Malformed XML: {0}")]
    Xml(String),
    /// The document is well-formed but a currency element carries a bad field.
    #[error("Invalid {field} in currency element #{index}: {reason}")]
    Field {
        index: usize,
        field: &'static str,
        reason: String,
    },
}

impl ParseError {
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::Xml(_) => "xml",
            ParseError::Field { .. } => "field",
        }
    }
}

/// Failure of a single feed retrieval, network or payload.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Server did not respond within {} seconds: {url}", .timeout.as_secs())]
    Timeout { url: String, timeout: Duration },
    #[error("Connection error for {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP error: {status} for {url}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("Request error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl FeedError {
    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::Timeout { .. } => "timeout",
            FeedError::Connection { .. } => "connection",
            FeedError::HttpStatus { .. } => "http-status",
            FeedError::Transport { .. } => "transport",
            FeedError::Parse(e) => e.kind(),
        }
    }
}

/// Failure talking to the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("Unsupported database URL: {0}")]
    UnsupportedUrl(String),
    #[error("Error creating tables: {0}")]
    Schema(#[source] sqlx::Error),
    #[error("Error inserting into requests: {0}")]
    AttemptInsert(#[source] sqlx::Error),
    #[error("Error inserting into responses for request_id {attempt_id}: {source}")]
    RateInsert {
        attempt_id: AttemptId,
        #[source]
        source: sqlx::Error,
    },
    #[error("Error reading stored data: {0}")]
    Query(#[source] sqlx::Error),
    #[error("Database connection lost: {0}")]
    ConnectionLost(#[source] sqlx::Error),
}

impl StoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Connect(_) | StoreError::UnsupportedUrl(_) => "connect",
            StoreError::Schema(_) => "schema",
            StoreError::AttemptInsert(_) => "attempt-insert",
            StoreError::RateInsert { .. } => "rate-insert",
            StoreError::Query(_) => "query",
            StoreError::ConnectionLost(_) => "connection-lost",
        }
    }

    /// Wraps a driver error, reporting a dropped connection as such
    /// instead of as a failure of the statement that noticed it.
    pub(crate) fn classify(err: sqlx::Error, wrap: impl FnOnce(sqlx::Error) -> StoreError) -> Self {
        match err {
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
                StoreError::ConnectionLost(err)
            }
            other => wrap(other),
        }
    }
}

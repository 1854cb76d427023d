//! Error types for the harness

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the harness.
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("playwright driver not found. Install with: npm install playwright && npx playwright install")]
    DriverNotFound,

    #[error("driver failed to start: {0}")]
    DriverStartup(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("driver protocol error: {0}")]
    Protocol(String),

    #[error("no driver reply within {0:?}")]
    ReplyTimeout(Duration),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("tracking backend returned status {status} for {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("tracking response missing field: {0}")]
    MissingField(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

//! # Error Types
//!
//! One `thiserror` enum per concern. Only `RefreshError` crosses the
//! pipeline boundary; per-entry `ReconcileError`s and `StoreError`s raised
//! inside the refresh loop are collected into the report instead.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by an external data source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Every configured endpoint failed. Each entry reads `"<endpoint>: <reason>"`.
    #[error("all {} endpoints failed: {}", failures.len(), failures.join("; "))]
    Unavailable { failures: Vec<String> },
    /// The HTTP client could not be built (bad endpoint URL, TLS setup, ...).
    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// Errors raised while turning one raw country entry into a draft.
#[derive(Debug, Error, PartialEq)]
pub enum ReconcileError {
    #[error("entry is not a JSON object")]
    NotAnObject,
    #[error("entry has no usable name")]
    MissingName,
    #[error("invalid population: {0}")]
    InvalidPopulation(String),
}

/// Custom error types for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),
    #[error("Query execution failed: {0}")]
    QueryError(String),
    #[error("Constraint violated: {0}")]
    Constraint(String),
}

/// Errors raised while rendering or caching the summary image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image encoding failed: {0}")]
    Encode(String),
    #[error("image cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Whole-operation failures of a refresh.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The country list could not be fetched from any endpoint; nothing was written.
    #[error("Could not fetch data from Countries API: {}", failures.join("; "))]
    SourceUnavailable { failures: Vec<String> },
    /// The refresh exceeded its wall-clock budget.
    #[error("refresh exceeded its {}s budget", budget.as_secs())]
    Timeout { budget: Duration },
    /// The store failed outside the per-entry loop (e.g. counting records).
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SourceError> for RefreshError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unavailable { failures } => RefreshError::SourceUnavailable { failures },
            SourceError::Client(reason) => RefreshError::SourceUnavailable { failures: vec![reason] },
        }
    }
}

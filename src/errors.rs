//! Error taxonomy for the ingestion pipeline and the query paths.
//!
//! Nothing in here is fatal to the process. Feed and row errors end the
//! current tick, store and upstream errors degrade a query to "no data".

use std::{io, time::Duration};

use thiserror::Error;

// ---

/// The CSV feed could not be opened or read.
#[derive(Debug, Error)]
pub enum FeedError {
    // ---
    /// Opening the source failed (missing file, permissions, ...).
    #[error("feed unavailable at {source_name}: {source}")]
    Unavailable {
        source_name: String,
        #[source]
        source: io::Error,
    },

    /// A record could not be read after the feed was opened.
    #[error("failed reading feed after line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: csv::Error,
    },
}

/// Structural problem with a raw row. Unparseable numbers are not errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowRejection {
    #[error("expected {expected} columns but found {found}")]
    ColumnCountMismatch { expected: usize, found: usize },

    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure fetching the latest reading from a remote monitoring service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),
}

/// Invalid input on the averages query path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("invalid month '{0}', expected YYYY-MM")]
    InvalidMonth(String),

    #[error("invalid window '{0}', expected 'overall' or 'month'")]
    InvalidWindow(String),
}

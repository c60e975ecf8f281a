//! Error types for the sampling harness.
//!
//! Two layers:
//! - [`ErrorKind`] is the per-sample failure recorded inside a [`Sample`](crate::Sample).
//!   It never aborts a run.
//! - [`Error`] is a harness or reporting failure returned to the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single probe invocation produced no value.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ErrorKind {
    /// The probe did not answer within its allotted time.
    #[error("timed out")]
    Timeout,

    /// The backend was reachable but returned an error or a non-zero status.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// The backend answered but no numeric value could be extracted.
    #[error("parse failed: {0}")]
    ParseFailed(String),
}

impl ErrorKind {
    /// Short label used in tables.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::QueryFailed(_) => "query_failed",
            Self::ParseFailed(_) => "parse_failed",
        }
    }
}

/// Harness-level error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("series for probe '{0}' is empty")]
    EmptySeries(String),

    #[error("probe '{0}' is already registered")]
    DuplicateProbe(String),

    #[error("no probes registered")]
    NoProbes,

    #[error("unknown probe: {0}")]
    UnknownProbe(String),

    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("sample for probe '{probe}' at {offset_us}us is not after {last_us}us")]
    OutOfOrder {
        probe: String,
        offset_us: u64,
        last_us: u64,
    },

    #[error("could not start probe worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

use serde::Serialize;
use thiserror::Error;

/// Named captures extracted from one access-log line.
///
/// Borrows from the line being processed and never outlives a single
/// worker iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParsedFields<'a> {
    pub remote: &'a str,
    pub user: &'a str,
    pub time: &'a str,
    pub method: &'a str,
    /// Empty when the request line carried only a method.
    pub path: &'a str,
    pub code: &'a str,
    pub size: &'a str,
    pub content_type: &'a str,
    pub referer: &'a str,
    pub agent: &'a str,
    pub scheme: &'a str,
}

/// The accepted, transformed representation of a line.
///
/// Field order is the JSON key order on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord<'a> {
    /// RFC3339, UTC
    pub time: String,
    pub method: &'a str,
    pub path: &'a str,
    /// Verbatim from input; may carry leading zeros or non-numeric text.
    pub code: &'a str,
    pub size: u64,
    pub agent: &'a str,
    pub scheme: &'a str,
    pub remote: &'a str,
}

/// Per-line failures. None of these ever stop a worker.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("line does not match access log grammar")]
    NoMatch,

    #[error("path {0:?} outside accepted prefix")]
    PathRejected(String),

    #[error("method {0:?} not allowed")]
    MethodRejected(String),

    #[error("parse time failed: {0:?} is not DD/Mon/YYYY:HH:MM:SS +HHMM")]
    MalformedTimestamp(String),

    #[error("parse time failed: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),

    #[error("parse size failed: {0}")]
    InvalidSize(#[from] std::num::ParseIntError),

    #[error("json marshal failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RecordError {
    /// Whether the failure points at malformed input worth surfacing on the
    /// diagnostic channel, as opposed to a routine filter decision.
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            RecordError::MalformedTimestamp(_)
                | RecordError::InvalidTimestamp(_)
                | RecordError::InvalidSize(_)
                | RecordError::Encode(_)
        )
    }

    pub fn is_filtered(&self) -> bool {
        matches!(self, RecordError::PathRejected(_) | RecordError::MethodRejected(_))
    }
}

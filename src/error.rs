//! Error types for the aggregation engine

use chrono::NaiveDate;
use thiserror::Error;

/// Errors surfaced to callers of the engine.
///
/// Malformed log lines and failed reverse lookups are never reported through this type: they
/// degrade to skipped lines and empty host names respectively.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// No day groups were supplied, so no bucket can be established.
    #[error("no log entries to aggregate")]
    EmptyInput,

    /// A bucketing unit other than `week` or `month` was requested.
    #[error("{0:?} is not a recognized interval, use: week, month")]
    UnrecognizedUnit(String),

    /// A day group is dated before the bucket window currently being filled.
    #[error("day groups are not sorted: {next} comes after {previous}")]
    OutOfOrder {
        /// Start of the window that was being filled
        previous: NaiveDate,
        /// Date of the offending day group
        next: NaiveDate,
    },
}

/// A raw log line that could not be turned into a [`LogEntry`](crate::record::LogEntry).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed log line ({reason}): {line:?}")]
pub struct ParseError {
    /// The offending line, without its line terminator
    pub line: String,
    /// What was wrong with it
    pub reason: &'static str,
}

impl ParseError {
    pub(crate) fn new(line: &str, reason: &'static str) -> Self {
        Self {
            line: line.to_owned(),
            reason,
        }
    }
}

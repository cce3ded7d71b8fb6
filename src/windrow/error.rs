//! Scan error types with proper context preservation
//!
//! Malformed input and configuration problems each carry enough context to
//! point at the offending line or column. Exhaustion (end of file, end of
//! partition) is deliberately *not* represented here: it is a normal terminal
//! signal carried in status enums, never an error value.

use thiserror::Error;

/// Main error type for partitioned scans
#[derive(Debug, Error)]
pub enum ScanError {
    /// The header row could not be read or was empty
    #[error("cannot read column header from '{path}'")]
    MalformedHeader { path: String },

    /// A data row did not match the header width
    #[error("malformed row at line {line}: expected {expected} cells, found {found}")]
    MalformedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// The timestamp cell of a row did not parse as an integer
    #[error("line {line}: timestamp cell '{value}' in column '{column}' is not an integer")]
    MalformedTimestamp {
        line: usize,
        column: String,
        value: String,
    },

    /// The designated timestamp column is absent from the header
    #[error("timestamp column '{column}' not found in header")]
    TimestampColumnMissing { column: String },

    /// A manual type map did not cover every column
    #[error("missing key in type map: '{column}'")]
    MissingTypeMapping { column: String },

    /// Type inference was requested with no partition buffered and none readable
    #[error("cannot infer types: no partition data available")]
    NoPartition,

    /// Caller error: `slide_forward` before the first `load_partition`.
    ///
    /// This is an invariant violation in the driving code, not a recoverable
    /// condition; it is distinguished so the misuse is visible at the seam.
    #[error("cannot slide with no matrix loaded; load a partition first")]
    SlideBeforeLoad,

    /// A sampling worker panicked; its tally was discarded
    #[error("type-inference sampling worker panicked")]
    SamplerPanicked,

    /// Underlying file I/O failure
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A configuration property had an unusable value
    #[error("invalid value for property '{key}': {reason}")]
    InvalidProperty { key: String, reason: String },
}

impl ScanError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the crate
pub type ScanResult<T> = Result<T, ScanError>;

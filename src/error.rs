//! Unified error handling for the history-engine library.
//!
//! Data-quality problems (missing fields, unparseable dates, unresolvable
//! stakeholders) never surface as errors: they degrade into fallback values
//! or a skipped record, logged at the call site. The variants here cover the
//! strict entry points where a caller explicitly asked for failure details.

use std::fmt;

/// Unified error type for history-engine operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// Record carried neither a junction id nor an activity id.
    MissingIdentity {
        /// Name of the source shape the record came from.
        shape: &'static str,
    },
    /// Input was not the shape the adapter expects (e.g. a non-object row).
    MalformedInput { message: String },
    /// Date text failed to parse in every accepted format.
    InvalidDate { value: String },
    /// Explicit date range with the end day before the start day.
    InvalidRange { start: String, end: String },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::MissingIdentity { shape } => {
                write!(f, "{} record has no resolvable identity field", shape)
            }
            HistoryError::MalformedInput { message } => {
                write!(f, "Malformed input: {}", message)
            }
            HistoryError::InvalidDate { value } => {
                write!(f, "Date '{}' is not parseable", value)
            }
            HistoryError::InvalidRange { start, end } => {
                write!(f, "Range end {} is before start {}", end, start)
            }
        }
    }
}

impl std::error::Error for HistoryError {}

/// Result type alias for history-engine operations.
pub type Result<T> = std::result::Result<T, HistoryError>;

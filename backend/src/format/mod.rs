//! The persisted textual exchange format for calibrated records.

pub mod processed_log;

pub use processed_log::{parse_processed_log, render_processed_log, FORMAT_VERSION, PLACEHOLDER};

/// Result type for format operations.
pub type FormatResult<T> = Result<T, FormatError>;

/// Errors raised while rendering or parsing a processed log.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The file declares a format version this reader does not know.
    /// Readers must reject rather than guess field order.
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(String),

    /// A mandatory header field is absent.
    #[error("missing header field: {0}")]
    MissingField(&'static str),

    /// A header field is present but unreadable.
    #[error("invalid header field {field}: {reason}")]
    InvalidHeader { field: &'static str, reason: String },

    /// The declared column list does not match this version's contract.
    #[error("unsupported column list: {0}")]
    UnsupportedColumns(String),

    /// A data row does not match the declared columns.
    #[error("invalid data row {line}: {reason}")]
    InvalidRow { line: usize, reason: String },
}

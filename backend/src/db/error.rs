//! Error types for archive operations.

use std::path::PathBuf;

use crate::format::FormatError;

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors raised by the archive index and object store.
///
/// `DuplicateKey`, `NotFound`, and `InvalidQuery` are caller programming
/// errors and always surface; they are never swallowed or retried.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// An entry with the same (flight_number, date, device_id) exists.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// No entry exists for the requested key.
    #[error("not found: {0}")]
    NotFound(String),

    /// The query or operation arguments are malformed (e.g. a search with
    /// no criteria, or a reprocess whose record carries a different key).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Object store I/O failure.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Index backend failure.
    #[error("index error: {0}")]
    Index(String),

    /// A stored processed log could not be rendered or parsed.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Backend selection or open-time configuration problem.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ArchiveError {
    /// Wrap an I/O error with the path it occurred at.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}

#[cfg(feature = "sqlite-repo")]
impl From<rusqlite::Error> for ArchiveError {
    fn from(err: rusqlite::Error) -> Self {
        ArchiveError::Index(err.to_string())
    }
}

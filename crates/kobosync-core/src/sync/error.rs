//! Sync error handling
//!
//! Every failure a run can meet, split into fatal kinds that abort the run
//! before the cursor moves and per-book or cursor kinds that are logged and
//! reported while the run carries on.

use thiserror::Error;

use crate::remote::RemoteError;

/// Errors that can occur during a sync run
#[derive(Error, Debug)]
pub enum SyncError {
    /// Highlight database cannot be opened or queried
    #[error("Highlight source unavailable: {details}")]
    SourceUnavailable { details: String },

    /// A source row could not be decoded
    #[error("Unable to decode highlight row: {details}")]
    RowDecodeFailure { details: String },

    /// Remote client cannot be constructed
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(#[source] RemoteError),

    /// Stored cursor could not be read
    #[error("Unable to read sync cursor '{path}': {details}")]
    CursorReadFailure { path: String, details: String },

    /// Cursor could not be stored
    #[error("Unable to write sync cursor '{path}': {source}")]
    CursorWriteFailure {
        path: String,
        #[source]
        source: RemoteError,
    },

    /// Template missing, malformed or referencing unknown fields
    #[error("Unable to render '{title}': {details}")]
    RenderFailure { title: String, details: String },

    /// A step of the document write protocol failed
    #[error("Unable to write '{path}' ({step}): {source}")]
    RemoteWriteFailure {
        path: String,
        step: &'static str,
        #[source]
        source: RemoteError,
    },
}

impl SyncError {
    /// Whether the error aborts the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::SourceUnavailable { .. }
                | SyncError::RowDecodeFailure { .. }
                | SyncError::RemoteUnavailable(_)
        )
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::InvalidColumnIndex(_)
            | rusqlite::Error::InvalidColumnName(_) => SyncError::RowDecodeFailure {
                details: e.to_string(),
            },
            _ => SyncError::SourceUnavailable {
                details: e.to_string(),
            },
        }
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let fatal = SyncError::SourceUnavailable {
            details: "no such table".to_string(),
        };
        assert!(fatal.is_fatal());

        let decode = SyncError::RowDecodeFailure {
            details: "bad column".to_string(),
        };
        assert!(decode.is_fatal());

        let per_book = SyncError::RenderFailure {
            title: "Book".to_string(),
            details: "unknown field".to_string(),
        };
        assert!(!per_book.is_fatal());

        let cursor = SyncError::CursorWriteFailure {
            path: "/kobo/.sync_status".to_string(),
            source: RemoteError::Lock("poisoned".to_string()),
        };
        assert!(!cursor.is_fatal());
    }

    #[test]
    fn test_rusqlite_conversion() {
        let err: SyncError = rusqlite::Error::InvalidColumnType(
            0,
            "Text".to_string(),
            rusqlite::types::Type::Integer,
        )
        .into();
        assert!(matches!(err, SyncError::RowDecodeFailure { .. }));

        let err: SyncError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, SyncError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_write_failure_display() {
        let err = SyncError::RemoteWriteFailure {
            path: "/kobo/Book.md".to_string(),
            step: "rename",
            source: RemoteError::Lock("poisoned".to_string()),
        };

        let msg = err.to_string();
        assert!(msg.contains("/kobo/Book.md"));
        assert!(msg.contains("rename"));
    }
}

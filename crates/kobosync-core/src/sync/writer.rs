//! Atomic document writer
//!
//! Replaces a book's document without ever exposing a half-written file:
//! the new content goes to `<doc>.tmp` first and is renamed over the
//! document in one step. A crash at any point leaves the document either
//! fully updated or untouched.
//!
//! Protocol:
//! 1. Stat the document; read it when it exists
//! 2. Existing content stands in for the header
//! 3. Copy the prior document to `<doc>.backup` (when enabled)
//! 4. Write header + body to `<doc>.tmp`
//! 5. Rename the temp file over the document
//! 6. Remove the backup

use tracing::{debug, warn};

use super::error::{SyncError, SyncResult};
use crate::remote::{RemoteError, RemoteStore};
use crate::sanitize::document_path;

const TEMP_SUFFIX: &str = ".tmp";
const BACKUP_SUFFIX: &str = ".backup";

/// What a successful save did
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    /// Canonical path of the document
    pub path: String,
    /// Whether the document did not exist before
    pub created: bool,
    /// Size of the document after the write
    pub bytes_written: usize,
}

/// Writes book documents under a base path
pub struct AtomicWriter<'a, R: RemoteStore> {
    remote: &'a R,
    base_path: String,
    write_backup: bool,
}

impl<'a, R: RemoteStore> AtomicWriter<'a, R> {
    pub fn new(remote: &'a R, base_path: impl Into<String>, write_backup: bool) -> Self {
        Self {
            remote,
            base_path: base_path.into(),
            write_backup,
        }
    }

    /// Canonical path of a book's document
    pub fn path_for(&self, title: &str) -> String {
        document_path(&self.base_path, title)
    }

    /// Read a book's current document, `None` when there is none
    pub fn read_existing(&self, title: &str) -> SyncResult<Option<String>> {
        let path = self.path_for(title);
        match self.remote.read(&path) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(source) => Err(write_failure(&path, "read", source)),
        }
    }

    /// Append `body` to a book's document
    ///
    /// `header` is used only when the document does not exist yet; an
    /// existing document keeps its content as is, whatever header it has.
    pub fn save(&self, title: &str, header: &str, body: &str) -> SyncResult<WriteOutcome> {
        let path = self.path_for(title);
        let temp_path = format!("{}{}", path, TEMP_SUFFIX);
        let backup_path = format!("{}{}", path, BACKUP_SUFFIX);

        let exists = self
            .remote
            .stat(&path)
            .map_err(|source| write_failure(&path, "stat", source))?;

        let existing = if exists {
            Some(
                self.remote
                    .read(&path)
                    .map_err(|source| write_failure(&path, "read", source))?,
            )
        } else {
            None
        };

        let mut content = match &existing {
            Some(bytes) => bytes.clone(),
            None => header.as_bytes().to_vec(),
        };
        content.extend_from_slice(body.as_bytes());

        let backed_up = match &existing {
            Some(bytes) if self.write_backup => {
                debug!("backing up {} to {}", path, backup_path);
                self.remote
                    .write(&backup_path, bytes)
                    .map_err(|source| write_failure(&path, "backup", source))?;
                true
            }
            _ => false,
        };

        debug!("writing {} bytes to {}", content.len(), temp_path);
        if let Err(source) = self.remote.write(&temp_path, &content) {
            self.discard(&temp_path);
            return Err(write_failure(&path, "write", source));
        }

        if let Err(source) = self.remote.rename(&temp_path, &path, true) {
            self.discard(&temp_path);
            return Err(write_failure(&path, "rename", source));
        }

        if backed_up {
            self.discard(&backup_path);
        }

        Ok(WriteOutcome {
            path,
            created: existing.is_none(),
            bytes_written: content.len(),
        })
    }

    /// Best-effort removal of a leftover file
    fn discard(&self, path: &str) {
        if let Err(e) = self.remote.remove(path) {
            warn!("could not remove {}: {}", path, e);
        }
    }
}

fn write_failure(path: &str, step: &'static str, source: RemoteError) -> SyncError {
    SyncError::RemoteWriteFailure {
        path: path.to_string(),
        step,
        source,
    }
}

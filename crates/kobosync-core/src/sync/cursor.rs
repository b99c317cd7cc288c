//! Sync cursor persistence
//!
//! The cursor is the instant up to which highlights have been synced. It is
//! kept on the remote store next to the documents as a single RFC 3339
//! timestamp in `<base>/.sync_status`, so any device syncing to the same
//! folder picks up where the last run left off.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use super::error::{SyncError, SyncResult};
use crate::remote::{join_remote_path, RemoteStore};
use crate::source::TIMESTAMP_FORMAT;

/// Name of the cursor blob inside the base folder
pub const CURSOR_FILE: &str = ".sync_status";

/// Instant up to which highlights are synced
///
/// The epoch means "never synced": the next run fetches everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SyncCursor(DateTime<Utc>);

impl SyncCursor {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// The "never synced" sentinel
    pub fn epoch() -> Self {
        Self(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn is_epoch(&self) -> bool {
        self.0.timestamp() <= 0
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.0
    }

    /// Cursor in the source's timestamp format, for comparing against rows
    pub fn storage_format(&self) -> String {
        self.0.naive_utc().format(TIMESTAMP_FORMAT).to_string()
    }

    /// Persisted form
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn parse(text: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }
}

impl std::fmt::Display for SyncCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_epoch() {
            write!(f, "never")
        } else {
            write!(f, "{}", self.to_rfc3339())
        }
    }
}

/// Reads and writes the cursor blob
pub struct CursorStore<'a, R: RemoteStore> {
    remote: &'a R,
    path: String,
}

impl<'a, R: RemoteStore> CursorStore<'a, R> {
    pub fn new(remote: &'a R, base_path: &str) -> Self {
        Self {
            remote,
            path: join_remote_path(base_path, CURSOR_FILE),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Read the cursor, falling back to the epoch
    ///
    /// A missing, unreadable or malformed blob never fails the run; it only
    /// means the next fetch covers everything.
    pub fn get(&self) -> SyncCursor {
        match self.try_get() {
            Ok(Some(cursor)) => cursor,
            Ok(None) => {
                info!("no sync cursor at {}, syncing all highlights", self.path);
                SyncCursor::epoch()
            }
            Err(e) => {
                warn!("{}; syncing all highlights", e);
                SyncCursor::epoch()
            }
        }
    }

    /// Read the cursor, distinguishing absence from failure
    pub fn try_get(&self) -> SyncResult<Option<SyncCursor>> {
        let bytes = match self.remote.read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => {
                return Err(SyncError::CursorReadFailure {
                    path: self.path.clone(),
                    details: e.to_string(),
                })
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        SyncCursor::parse(&text)
            .map(Some)
            .ok_or_else(|| SyncError::CursorReadFailure {
                path: self.path.clone(),
                details: format!("invalid timestamp {:?}", text.trim()),
            })
    }

    /// Persist a new cursor
    pub fn set(&self, cursor: SyncCursor) -> SyncResult<()> {
        self.remote
            .write(&self.path, cursor.to_rfc3339().as_bytes())
            .map_err(|source| SyncError::CursorWriteFailure {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{InMemoryStore, RemoteError, RemoteResult};
    use chrono::TimeZone;

    struct BrokenStore;

    impl RemoteStore for BrokenStore {
        fn read(&self, _path: &str) -> RemoteResult<Vec<u8>> {
            Err(RemoteError::Lock("offline".to_string()))
        }
        fn write(&self, _path: &str, _bytes: &[u8]) -> RemoteResult<()> {
            Err(RemoteError::Lock("offline".to_string()))
        }
        fn stat(&self, _path: &str) -> RemoteResult<bool> {
            Ok(false)
        }
        fn rename(&self, _from: &str, _to: &str, _overwrite: bool) -> RemoteResult<()> {
            Ok(())
        }
        fn remove(&self, _path: &str) -> RemoteResult<()> {
            Ok(())
        }
        fn describe(&self) -> String {
            "broken".to_string()
        }
    }

    #[test]
    fn test_round_trip() {
        let remote = InMemoryStore::new();
        let store = CursorStore::new(&remote, "/kobo-highlights");
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 18, 30, 5).unwrap();

        store.set(SyncCursor::new(at)).unwrap();

        assert_eq!(
            remote.get_string("/kobo-highlights/.sync_status").as_deref(),
            Some("2024-03-09T18:30:05Z")
        );
        assert_eq!(store.get().at(), at);
    }

    #[test]
    fn test_missing_blob_is_epoch() {
        let remote = InMemoryStore::new();
        let store = CursorStore::new(&remote, "/kobo-highlights");

        assert!(store.try_get().unwrap().is_none());
        assert!(store.get().is_epoch());
    }

    #[test]
    fn test_garbage_blob_is_epoch() {
        let remote = InMemoryStore::with_files([("/kobo-highlights/.sync_status", "yesterday")]);
        let store = CursorStore::new(&remote, "/kobo-highlights");

        assert!(matches!(
            store.try_get(),
            Err(SyncError::CursorReadFailure { .. })
        ));
        assert!(store.get().is_epoch());
    }

    #[test]
    fn test_unreadable_store_is_epoch() {
        let store = CursorStore::new(&BrokenStore, "/kobo-highlights");
        assert!(store.get().is_epoch());

        let err = store.set(SyncCursor::epoch()).unwrap_err();
        assert!(matches!(err, SyncError::CursorWriteFailure { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_parse_accepts_offsets_and_whitespace() {
        let cursor = SyncCursor::parse(" 2024-03-09T20:30:05+02:00\n").unwrap();
        assert_eq!(cursor.to_rfc3339(), "2024-03-09T18:30:05Z");
    }

    #[test]
    fn test_storage_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 8, 5, 1).unwrap();
        assert_eq!(SyncCursor::new(at).storage_format(), "2024-03-09T08:05:01.000");
    }

    #[test]
    fn test_display() {
        assert_eq!(SyncCursor::epoch().to_string(), "never");
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 8, 5, 1).unwrap();
        assert_eq!(SyncCursor::new(at).to_string(), "2024-03-09T08:05:01Z");
    }
}

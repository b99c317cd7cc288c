//! Highlight source
//!
//! Reads highlights from the e-reader's SQLite database. The database is
//! opened read-only and never modified.
//!
//! Rows come from `Bookmark` entries of type `highlight`. The book of a
//! highlight is the title of its volume in `content`, or the raw volume id
//! when the volume is unknown.

use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::models::Highlight;
use crate::sync::error::{SyncError, SyncResult};

/// Timestamp format of `Bookmark.DateCreated`
///
/// Fixed width and zero padded, so timestamps compare correctly as strings.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

const SELECT_HIGHLIGHTS: &str = "
    SELECT b.Text,
           b.Annotation,
           COALESCE(
               (SELECT c.Title FROM content c WHERE c.ContentID = b.VolumeID LIMIT 1),
               b.VolumeID
           ),
           b.DateCreated
    FROM Bookmark b
    WHERE b.Type = 'highlight'";

/// Something highlights can be fetched from
pub trait HighlightSource {
    /// Every highlight
    fn fetch_all(&self) -> SyncResult<Vec<Highlight>>;

    /// Highlights created strictly after `since` (storage format)
    fn fetch_since(&self, since: &str) -> SyncResult<Vec<Highlight>>;
}

/// The e-reader database
pub struct KoboDatabase {
    conn: Connection,
}

impl KoboDatabase {
    /// Open the database at `path` read-only
    pub fn open(path: &Path) -> SyncResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| SyncError::SourceUnavailable {
            details: format!("{}: {}", path.display(), e),
        })?;
        Ok(Self { conn })
    }

    /// Wrap an already open connection
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn query(&self, since: Option<&str>) -> SyncResult<Vec<Highlight>> {
        let sql = match since {
            Some(_) => format!("{} AND b.DateCreated > ?1 ORDER BY b.DateCreated", SELECT_HIGHLIGHTS),
            None => format!("{} ORDER BY b.DateCreated", SELECT_HIGHLIGHTS),
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = match since {
            Some(since) => stmt.query([since])?,
            None => stmt.query([])?,
        };

        let mut highlights = Vec::new();
        while let Some(row) = rows.next()? {
            highlights.push(Highlight::new(
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
            ));
        }

        debug!("fetched {} highlight rows", highlights.len());
        Ok(highlights)
    }
}

impl HighlightSource for KoboDatabase {
    fn fetch_all(&self) -> SyncResult<Vec<Highlight>> {
        self.query(None)
    }

    fn fetch_since(&self, since: &str) -> SyncResult<Vec<Highlight>> {
        self.query(Some(since))
    }
}

/// Parse a source timestamp
///
/// Accepts the storage format with any number of fractional digits (or
/// none) and an optional trailing `Z`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    let raw = raw.strip_suffix('Z').unwrap_or(raw);
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

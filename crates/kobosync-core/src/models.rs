//! Data models for kobosync
//!
//! Defines the highlight row read from the e-reader, the per-book grouping
//! used during a sync run, and the run summary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One excerpt a reader marked
///
/// Every field may be missing in the source database. Two highlights with
/// the same text, note and timestamp are the same highlight.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Highlight {
    /// The quoted passage
    pub text: Option<String>,
    /// Reader's annotation; an empty note is stored as `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Title of the containing work
    pub book: Option<String>,
    /// Creation time in source format (`2006-01-02T15:04:05.000`)
    pub timestamp: Option<String>,
}

impl Highlight {
    /// Build a highlight, normalizing an empty note to `None`
    pub fn new(
        text: Option<String>,
        note: Option<String>,
        book: Option<String>,
        timestamp: Option<String>,
    ) -> Self {
        Self {
            text,
            note: note.filter(|n| !n.is_empty()),
            book,
            timestamp,
        }
    }

    /// Deduplication key: text, note and timestamp joined by a unit separator
    ///
    /// Absent and empty fields produce the same key.
    pub fn identity_key(&self) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}",
            self.text.as_deref().unwrap_or(""),
            self.note.as_deref().unwrap_or(""),
            self.timestamp.as_deref().unwrap_or("")
        )
    }
}

/// Highlights grouped under one title
#[derive(Debug, Clone, PartialEq)]
pub struct BookHighlightSet {
    pub title: String,
    pub highlights: Vec<Highlight>,
}

impl BookHighlightSet {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            highlights: Vec::new(),
        }
    }
}

/// Result of grouping query rows by book
#[derive(Debug, Default)]
pub struct Grouped {
    pub books: Vec<BookHighlightSet>,
    /// Rows dropped because they carry no book
    pub without_book: usize,
}

/// Group highlights by book title, discarding rows without one
///
/// Books keep the order in which they first appear; highlights keep row order.
pub fn group_by_book(highlights: Vec<Highlight>) -> Grouped {
    let mut grouped = Grouped::default();
    let mut index: HashMap<String, usize> = HashMap::new();

    for highlight in highlights {
        let Some(title) = highlight.book.clone() else {
            grouped.without_book += 1;
            continue;
        };

        let slot = *index.entry(title.clone()).or_insert_with(|| {
            grouped.books.push(BookHighlightSet::new(title));
            grouped.books.len() - 1
        });
        grouped.books[slot].highlights.push(highlight);
    }

    grouped
}

/// A book that could not be synced during a run
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookFailure {
    pub title: String,
    pub error: String,
}

/// Summary of one sync run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// When the run started; becomes the new cursor
    pub started_at: Option<DateTime<Utc>>,
    /// Whether every highlight was requested (no usable cursor)
    pub full_sync: bool,
    /// Highlights returned by the source
    pub highlights_found: usize,
    /// Highlights discarded because they have no book
    pub highlights_without_book: usize,
    /// Highlights appended to documents
    pub highlights_written: usize,
    pub books_attempted: usize,
    pub books_written: usize,
    /// Books whose highlights were all already present remotely
    pub books_unchanged: usize,
    pub failures: Vec<BookFailure>,
    pub cursor_committed: bool,
    /// Error text when the cursor could not be stored
    pub cursor_error: Option<String>,
    pub dry_run: bool,
}

impl SyncReport {
    /// Books that were written or needed no write
    pub fn books_succeeded(&self) -> usize {
        self.books_written + self.books_unchanged
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.cursor_error.is_none()
    }
}

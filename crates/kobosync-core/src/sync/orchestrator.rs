//! Sync run orchestration
//!
//! One run moves through:
//!
//! ```text
//! Idle -> CursorLoaded -> HighlightsFetched -> PerBook -> CursorCommitted -> Done
//!   \___________________________\___________________________________________-> Aborted
//! ```
//!
//! Only source and remote-construction failures abort a run. Everything
//! that goes wrong for one book is logged, recorded in the report, and the
//! next book is tried. The cursor is stored once, after every book has been
//! attempted, so a crashed or partial run only causes the next run to fetch
//! highlights again; the merge makes that harmless.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::cursor::{CursorStore, SyncCursor};
use super::error::{SyncError, SyncResult};
use super::merge::new_entries;
use super::writer::AtomicWriter;
use crate::config::{Config, Templates};
use crate::models::{group_by_book, BookFailure, BookHighlightSet, SyncReport};
use crate::remote::{open_store, RemoteStore};
use crate::render::{parse_entries, Renderer};
use crate::source::{HighlightSource, KoboDatabase};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    CursorLoaded,
    HighlightsFetched,
    PerBook,
    CursorCommitted,
    Done,
    Aborted,
}

/// Knobs for a single run
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Fetch, merge and render without writing anything
    pub dry_run: bool,
    /// Keep a `.backup` copy while replacing a document
    pub write_backup: bool,
    pub templates: Templates,
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            dry_run: false,
            write_backup: config.write_backup,
            templates: config.load_templates()?,
        })
    }
}

enum BookOutcome {
    Unchanged,
    Written(usize),
}

/// Drives one sync run against a source and a remote store
pub struct Orchestrator<'a, S: HighlightSource, R: RemoteStore> {
    source: &'a S,
    remote: &'a R,
    base_path: String,
    options: SyncOptions,
    state: SyncState,
}

impl<'a, S: HighlightSource, R: RemoteStore> Orchestrator<'a, S, R> {
    pub fn new(source: &'a S, remote: &'a R, base_path: impl Into<String>, options: SyncOptions) -> Self {
        Self {
            source,
            remote,
            base_path: base_path.into(),
            options,
            state: SyncState::Idle,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Run now
    pub fn run(&mut self) -> SyncResult<SyncReport> {
        self.run_at(Utc::now())
    }

    /// Run with `started_at` as the run start; it becomes the new cursor
    pub fn run_at(&mut self, started_at: DateTime<Utc>) -> SyncResult<SyncReport> {
        let result = self.execute(started_at);
        self.state = match result {
            Ok(_) => SyncState::Done,
            Err(_) => SyncState::Aborted,
        };
        result
    }

    fn execute(&mut self, started_at: DateTime<Utc>) -> SyncResult<SyncReport> {
        let mut report = SyncReport {
            started_at: Some(started_at),
            dry_run: self.options.dry_run,
            ..SyncReport::default()
        };

        let cursors = CursorStore::new(self.remote, &self.base_path);
        let cursor = cursors.get();
        self.state = SyncState::CursorLoaded;
        info!("syncing to {} (last sync: {})", self.remote.describe(), cursor);

        report.full_sync = cursor.is_epoch();
        let highlights = if report.full_sync {
            self.source.fetch_all()?
        } else {
            self.source.fetch_since(&cursor.storage_format())?
        };
        self.state = SyncState::HighlightsFetched;
        report.highlights_found = highlights.len();

        let grouped = group_by_book(highlights);
        report.highlights_without_book = grouped.without_book;
        if grouped.without_book > 0 {
            info!("skipping {} highlights without a book", grouped.without_book);
        }
        info!(
            "found {} highlights in {} books",
            report.highlights_found - grouped.without_book,
            grouped.books.len()
        );

        self.state = SyncState::PerBook;
        let renderer = Renderer::new(&self.options.templates, started_at);
        let writer = AtomicWriter::new(self.remote, self.base_path.as_str(), self.options.write_backup);

        for book in &grouped.books {
            report.books_attempted += 1;
            match self.sync_book(&renderer, &writer, book) {
                Ok(BookOutcome::Unchanged) => {
                    debug!("'{}' is up to date", book.title);
                    report.books_unchanged += 1;
                }
                Ok(BookOutcome::Written(count)) => {
                    report.books_written += 1;
                    report.highlights_written += count;
                }
                Err(e) => {
                    warn!("failed to sync '{}': {}", book.title, e);
                    report.failures.push(BookFailure {
                        title: book.title.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if self.options.dry_run {
            info!("dry run, cursor left at {}", cursor);
        } else {
            match cursors.set(SyncCursor::new(started_at)) {
                Ok(()) => {
                    report.cursor_committed = true;
                    self.state = SyncState::CursorCommitted;
                }
                Err(e) => {
                    warn!("{}", e);
                    report.cursor_error = Some(e.to_string());
                }
            }
        }

        info!(
            "sync finished: {} written, {} unchanged, {} failed",
            report.books_written,
            report.books_unchanged,
            report.failures.len()
        );
        Ok(report)
    }

    fn sync_book(
        &self,
        renderer: &Renderer,
        writer: &AtomicWriter<'_, R>,
        book: &BookHighlightSet,
    ) -> SyncResult<BookOutcome> {
        let existing = writer
            .read_existing(&book.title)?
            .map(|doc| parse_entries(&doc))
            .unwrap_or_default();

        let fresh = new_entries(&existing, &book.highlights);
        if fresh.is_empty() {
            return Ok(BookOutcome::Unchanged);
        }

        let rendered = renderer.render(&book.title, &fresh)?;

        if self.options.dry_run {
            info!(
                "would append {} highlights to {}",
                fresh.len(),
                writer.path_for(&book.title)
            );
            return Ok(BookOutcome::Written(fresh.len()));
        }

        let outcome = writer.save(&book.title, &rendered.header, &rendered.body)?;
        info!(
            "{} {} ({} new highlights)",
            if outcome.created { "created" } else { "updated" },
            outcome.path,
            fresh.len()
        );
        Ok(BookOutcome::Written(fresh.len()))
    }
}

/// Run a sync with everything taken from `config`
///
/// Opens the e-reader database and the configured remote store; failing to
/// open either aborts before anything is read or written.
pub fn run_sync(config: &Config, dry_run: bool) -> anyhow::Result<SyncReport> {
    let started_at = Utc::now();
    let options = SyncOptions {
        dry_run,
        ..SyncOptions::from_config(config)?
    };

    let remote = open_store(config).map_err(SyncError::RemoteUnavailable)?;
    let source = KoboDatabase::open(&config.database_path)?;

    let mut orchestrator = Orchestrator::new(&source, &remote, config.base_path(), options);
    Ok(orchestrator.run_at(started_at)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Highlight;
    use crate::remote::{InMemoryStore, RemoteError, RemoteResult};
    use chrono::TimeZone;
    use std::cell::RefCell;

    const BASE: &str = "/kobo-highlights";

    /// Source serving canned rows and recording which query was made
    struct FakeSource {
        rows: Vec<Highlight>,
        queries: RefCell<Vec<Option<String>>>,
        fail: bool,
    }

    impl FakeSource {
        fn new(rows: Vec<Highlight>) -> Self {
            Self {
                rows,
                queries: RefCell::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }
    }

    impl HighlightSource for FakeSource {
        fn fetch_all(&self) -> SyncResult<Vec<Highlight>> {
            self.queries.borrow_mut().push(None);
            if self.fail {
                return Err(SyncError::SourceUnavailable {
                    details: "database locked".to_string(),
                });
            }
            Ok(self.rows.clone())
        }

        fn fetch_since(&self, since: &str) -> SyncResult<Vec<Highlight>> {
            self.queries.borrow_mut().push(Some(since.to_string()));
            Ok(self
                .rows
                .iter()
                .filter(|h| h.timestamp.as_deref().is_some_and(|ts| ts > since))
                .cloned()
                .collect())
        }
    }

    /// Store that refuses to rename onto paths containing `poison`
    struct PoisonedStore {
        inner: InMemoryStore,
        poison: &'static str,
        fail_cursor: bool,
    }

    impl RemoteStore for PoisonedStore {
        fn read(&self, path: &str) -> RemoteResult<Vec<u8>> {
            self.inner.read(path)
        }
        fn write(&self, path: &str, bytes: &[u8]) -> RemoteResult<()> {
            if self.fail_cursor && path.ends_with(".sync_status") {
                return Err(RemoteError::Protocol("quota exceeded".to_string()));
            }
            self.inner.write(path, bytes)
        }
        fn stat(&self, path: &str) -> RemoteResult<bool> {
            self.inner.stat(path)
        }
        fn rename(&self, from: &str, to: &str, overwrite: bool) -> RemoteResult<()> {
            if to.contains(self.poison) {
                return Err(RemoteError::Protocol("rename refused".to_string()));
            }
            self.inner.rename(from, to, overwrite)
        }
        fn remove(&self, path: &str) -> RemoteResult<()> {
            self.inner.remove(path)
        }
        fn describe(&self) -> String {
            "poisoned".to_string()
        }
    }

    fn h(text: &str, note: Option<&str>, book: Option<&str>, ts: &str) -> Highlight {
        Highlight::new(
            Some(text.to_string()),
            note.map(String::from),
            book.map(String::from),
            Some(ts.to_string()),
        )
    }

    fn run_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap()
    }

    fn options() -> SyncOptions {
        SyncOptions {
            write_backup: true,
            ..SyncOptions::default()
        }
    }

    fn sample_rows() -> Vec<Highlight> {
        vec![
            h("later passage", Some("a thought"), Some("Book A"), "2024-01-02T10:00:00.000"),
            h("earlier passage", None, Some("Book A"), "2024-01-01T10:00:00.000"),
            h("orphan", None, None, "2024-01-01T12:00:00.000"),
        ]
    }

    #[test]
    fn test_first_run_writes_one_document_and_cursor() {
        let source = FakeSource::new(sample_rows());
        let remote = InMemoryStore::new();
        let mut orchestrator = Orchestrator::new(&source, &remote, BASE, options());

        let report = orchestrator.run_at(run_start()).unwrap();

        assert_eq!(orchestrator.state(), SyncState::Done);
        assert_eq!(source.queries.borrow().as_slice(), &[None]);
        assert!(report.full_sync);
        assert_eq!(report.highlights_found, 3);
        assert_eq!(report.highlights_without_book, 1);
        assert_eq!(report.books_written, 1);
        assert_eq!(report.highlights_written, 2);
        assert!(report.cursor_committed);
        assert!(report.is_clean());

        assert_eq!(
            remote.paths(),
            vec![
                "/kobo-highlights/.sync_status".to_string(),
                "/kobo-highlights/Book_A.md".to_string(),
            ]
        );

        let doc = remote.get_string("/kobo-highlights/Book_A.md").unwrap();
        assert!(doc.starts_with("# Book A\n\n"));
        let earlier = doc.find("> earlier passage").unwrap();
        let later = doc.find("> later passage").unwrap();
        assert!(earlier < later);
        assert!(doc.contains("*a thought*"));
        assert!(!doc.contains("orphan"));

        assert_eq!(
            remote.get_string("/kobo-highlights/.sync_status").as_deref(),
            Some("2024-02-01T08:00:00Z")
        );
    }

    #[test]
    fn test_rerun_without_new_rows_only_moves_cursor() {
        let remote = InMemoryStore::new();
        let source = FakeSource::new(sample_rows());
        Orchestrator::new(&source, &remote, BASE, options())
            .run_at(run_start())
            .unwrap();
        let before = remote.get_string("/kobo-highlights/Book_A.md").unwrap();

        let source = FakeSource::new(sample_rows());
        let second_start = Utc.with_ymd_and_hms(2024, 2, 2, 8, 0, 0).unwrap();
        let report = Orchestrator::new(&source, &remote, BASE, options())
            .run_at(second_start)
            .unwrap();

        assert!(!report.full_sync);
        assert_eq!(
            source.queries.borrow().as_slice(),
            &[Some("2024-02-01T08:00:00.000".to_string())]
        );
        assert_eq!(report.books_attempted, 0);
        assert_eq!(remote.get_string("/kobo-highlights/Book_A.md").unwrap(), before);
        assert_eq!(
            remote.get_string("/kobo-highlights/.sync_status").as_deref(),
            Some("2024-02-02T08:00:00Z")
        );
    }

    #[test]
    fn test_refetched_highlights_are_not_duplicated() {
        // A previous run wrote the document but never stored its cursor
        let remote = InMemoryStore::new();
        let source = FakeSource::new(sample_rows());
        Orchestrator::new(&source, &remote, BASE, options())
            .run_at(run_start())
            .unwrap();
        remote.remove("/kobo-highlights/.sync_status").unwrap();
        let before = remote.get_string("/kobo-highlights/Book_A.md").unwrap();

        let mut rows = sample_rows();
        rows.push(h("new passage", None, Some("Book A"), "2024-01-03T10:00:00.000"));
        let source = FakeSource::new(rows);
        let report = Orchestrator::new(&source, &remote, BASE, options())
            .run_at(run_start())
            .unwrap();

        assert!(report.full_sync);
        assert_eq!(report.highlights_written, 1);
        let after = remote.get_string("/kobo-highlights/Book_A.md").unwrap();
        assert!(after.starts_with(&before));
        assert_eq!(after.matches("> earlier passage").count(), 1);
        assert_eq!(after.matches("> new passage").count(), 1);
        // Header is not repeated on append
        assert_eq!(after.matches("# Book A").count(), 1);
    }

    #[test]
    fn test_identical_rerun_is_unchanged() {
        let remote = InMemoryStore::new();
        for _ in 0..2 {
            remote.remove("/kobo-highlights/.sync_status").unwrap();
            let source = FakeSource::new(sample_rows());
            Orchestrator::new(&source, &remote, BASE, options())
                .run_at(run_start())
                .unwrap();
        }

        let source = FakeSource::new(sample_rows());
        remote.remove("/kobo-highlights/.sync_status").unwrap();
        let report = Orchestrator::new(&source, &remote, BASE, options())
            .run_at(run_start())
            .unwrap();

        assert_eq!(report.books_unchanged, 1);
        assert_eq!(report.books_written, 0);
        let doc = remote.get_string("/kobo-highlights/Book_A.md").unwrap();
        assert_eq!(doc.matches("> later passage").count(), 1);
    }

    #[test]
    fn test_book_failure_is_isolated_and_cursor_still_moves() {
        let rows = vec![
            h("a", None, Some("Good Book"), "2024-01-01T10:00:00.000"),
            h("b", None, Some("Bad Book"), "2024-01-01T11:00:00.000"),
            h("c", None, Some("Other Book"), "2024-01-01T12:00:00.000"),
        ];
        let source = FakeSource::new(rows);
        let remote = PoisonedStore {
            inner: InMemoryStore::new(),
            poison: "Bad_Book",
            fail_cursor: false,
        };

        let report = Orchestrator::new(&source, &remote, BASE, options())
            .run_at(run_start())
            .unwrap();

        assert_eq!(report.books_attempted, 3);
        assert_eq!(report.books_written, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].title, "Bad Book");
        assert!(report.cursor_committed);
        assert!(remote.inner.get_string("/kobo-highlights/Bad_Book.md").is_none());
        assert!(remote.inner.get_string("/kobo-highlights/Bad_Book.md.tmp").is_none());
        assert!(remote.inner.get_string("/kobo-highlights/Other_Book.md").is_some());
    }

    #[test]
    fn test_render_failure_is_per_book() {
        let source = FakeSource::new(sample_rows());
        let remote = InMemoryStore::new();
        let opts = SyncOptions {
            templates: Templates {
                body: Some("{{#each highlights}}{{chapter}}{{/each}}".to_string()),
                header: None,
            },
            ..options()
        };

        let report = Orchestrator::new(&source, &remote, BASE, opts)
            .run_at(run_start())
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.contains("render"));
        assert!(report.cursor_committed);
    }

    #[test]
    fn test_cursor_failure_is_reported_not_fatal() {
        let source = FakeSource::new(sample_rows());
        let remote = PoisonedStore {
            inner: InMemoryStore::new(),
            poison: "nothing",
            fail_cursor: true,
        };

        let report = Orchestrator::new(&source, &remote, BASE, options())
            .run_at(run_start())
            .unwrap();

        assert_eq!(report.books_written, 1);
        assert!(!report.cursor_committed);
        assert!(report.cursor_error.is_some());
        assert!(!report.is_clean());
    }

    #[test]
    fn test_source_failure_aborts_without_cursor() {
        let source = FakeSource::failing();
        let remote = InMemoryStore::new();
        let mut orchestrator = Orchestrator::new(&source, &remote, BASE, options());

        let err = orchestrator.run_at(run_start()).unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(orchestrator.state(), SyncState::Aborted);
        assert!(remote.paths().is_empty());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let source = FakeSource::new(sample_rows());
        let remote = InMemoryStore::new();
        let opts = SyncOptions {
            dry_run: true,
            ..options()
        };

        let report = Orchestrator::new(&source, &remote, BASE, opts)
            .run_at(run_start())
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.books_written, 1);
        assert_eq!(report.highlights_written, 2);
        assert!(!report.cursor_committed);
        assert!(remote.paths().is_empty());
    }

    #[test]
    fn test_run_sync_with_missing_database_is_fatal() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = Config {
            database_path: temp.path().join("missing.sqlite"),
            local_dir: Some(temp.path().join("out")),
            ..Config::default()
        };

        let err = run_sync(&config, false).unwrap_err();
        let err = err.downcast_ref::<SyncError>().unwrap();
        assert!(matches!(err, SyncError::SourceUnavailable { .. }));
        assert!(!temp.path().join("out").join(".sync_status").exists());
    }
}

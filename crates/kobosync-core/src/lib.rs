//! kobosync core library
//!
//! Incremental sync of e-reader highlights into one markdown document per
//! book on a WebDAV share or a local directory.
//!
//! # Architecture
//!
//! ```text
//! KoboReader.sqlite -> source -> group by book -> merge -> render -> writer -> remote
//!                                                                       \-> cursor
//! ```
//!
//! Each run fetches the highlights created since the stored cursor, appends
//! the ones a book's document does not hold yet, and moves the cursor to the
//! run start once every book has been attempted.
//!
//! # Modules
//!
//! - `config`: Application configuration
//! - `models`: Highlights, per-book sets and the run report
//! - `source`: Reading the e-reader database
//! - `remote`: Blob stores (WebDAV, local directory, memory)
//! - `sanitize`: Book title to file name mapping
//! - `render`: Markdown rendering with handlebars templates
//! - `sync`: Cursor, merge, atomic writer and the run itself
//! - `readwise`: One-shot push to Readwise

pub mod config;
pub mod models;
pub mod readwise;
pub mod remote;
pub mod render;
pub mod sanitize;
pub mod source;
pub mod sync;

pub use config::{Config, Templates};
pub use models::{BookFailure, BookHighlightSet, Highlight, SyncReport};
pub use remote::{open_store, RemoteError, RemoteStore};
pub use source::{HighlightSource, KoboDatabase};
pub use sync::{run_sync, SyncCursor, SyncError};

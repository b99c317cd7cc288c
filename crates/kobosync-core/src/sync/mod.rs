//! Incremental sync engine
//!
//! - `cursor`: where the last run stopped
//! - `merge`: which fetched highlights a document does not hold yet
//! - `writer`: crash-safe document replacement
//! - `orchestrator`: one run end to end

pub mod cursor;
pub mod error;
pub mod merge;
pub mod orchestrator;
pub mod writer;

pub use cursor::{CursorStore, SyncCursor, CURSOR_FILE};
pub use error::{SyncError, SyncResult};
pub use merge::{merge, new_entries};
pub use orchestrator::{run_sync, Orchestrator, SyncOptions, SyncState};
pub use writer::{AtomicWriter, WriteOutcome};

//! Remote store layer
//!
//! The sync engine only needs five blob operations from wherever documents
//! live: read, write, stat, rename and remove. Each transport implements
//! [`RemoteStore`]:
//!
//! - `WebDavStore`: WebDAV server over HTTPS (blocking reqwest)
//! - `LocalDirStore`: a directory on a mounted filesystem
//! - `InMemoryStore`: a map of blobs, for tests and dry runs
//!
//! Paths are `/`-separated and absolute within the store.

pub mod error;
pub mod local;
pub mod memory;
pub mod tls;
pub mod webdav;

pub use error::{RemoteError, RemoteResult};
pub use local::LocalDirStore;
pub use memory::InMemoryStore;
pub use webdav::WebDavStore;

use crate::config::Config;

/// Blob operations the sync engine depends on
pub trait RemoteStore {
    /// Read a blob; `RemoteError::NotFound` when it does not exist
    fn read(&self, path: &str) -> RemoteResult<Vec<u8>>;

    /// Create or replace a blob
    fn write(&self, path: &str, bytes: &[u8]) -> RemoteResult<()>;

    /// Whether a blob exists
    fn stat(&self, path: &str) -> RemoteResult<bool>;

    /// Move `from` to `to` in one step
    ///
    /// With `overwrite`, an existing `to` is replaced; without it the call
    /// fails with `RemoteError::AlreadyExists`.
    fn rename(&self, from: &str, to: &str, overwrite: bool) -> RemoteResult<()>;

    /// Delete a blob; removing a missing blob is not an error
    fn remove(&self, path: &str) -> RemoteResult<()>;

    /// Human-readable description of where data goes
    fn describe(&self) -> String;
}

impl<T: RemoteStore + ?Sized> RemoteStore for &T {
    fn read(&self, path: &str) -> RemoteResult<Vec<u8>> {
        (**self).read(path)
    }

    fn write(&self, path: &str, bytes: &[u8]) -> RemoteResult<()> {
        (**self).write(path, bytes)
    }

    fn stat(&self, path: &str) -> RemoteResult<bool> {
        (**self).stat(path)
    }

    fn rename(&self, from: &str, to: &str, overwrite: bool) -> RemoteResult<()> {
        (**self).rename(from, to, overwrite)
    }

    fn remove(&self, path: &str) -> RemoteResult<()> {
        (**self).remove(path)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<T: RemoteStore + ?Sized> RemoteStore for Box<T> {
    fn read(&self, path: &str) -> RemoteResult<Vec<u8>> {
        (**self).read(path)
    }

    fn write(&self, path: &str, bytes: &[u8]) -> RemoteResult<()> {
        (**self).write(path, bytes)
    }

    fn stat(&self, path: &str) -> RemoteResult<bool> {
        (**self).stat(path)
    }

    fn rename(&self, from: &str, to: &str, overwrite: bool) -> RemoteResult<()> {
        (**self).rename(from, to, overwrite)
    }

    fn remove(&self, path: &str) -> RemoteResult<()> {
        (**self).remove(path)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Build the store the configuration points at
///
/// `local_dir` wins over the `[webdav]` section when both are set.
pub fn open_store(config: &Config) -> RemoteResult<Box<dyn RemoteStore>> {
    match &config.local_dir {
        Some(dir) => Ok(Box::new(LocalDirStore::new(dir.clone())?)),
        None => Ok(Box::new(WebDavStore::from_config(config)?)),
    }
}

/// Join a base folder and a file name into a store path
pub fn join_remote_path(base: &str, name: &str) -> String {
    let base = base.trim_matches('/');
    let name = name.trim_start_matches('/');
    if base.is_empty() {
        format!("/{name}")
    } else {
        format!("/{base}/{name}")
    }
}

/// Normalize a file path to a single leading slash and no trailing slash
pub(crate) fn normalize_file(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    format!("/{trimmed}")
}

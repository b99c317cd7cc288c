//! Local directory remote store
//!
//! Maps store paths onto files below a root directory, for syncing into a
//! mounted share or a folder picked up by another tool. `rename` is
//! `std::fs::rename`, which replaces the target atomically on the same
//! filesystem.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{normalize_file, RemoteError, RemoteResult, RemoteStore};

#[derive(Clone, Debug)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn new(root: PathBuf) -> RemoteResult<Self> {
        fs::create_dir_all(&root).map_err(|source| RemoteError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn local_path(&self, path: &str) -> PathBuf {
        let path = normalize_file(path);
        self.root.join(path.trim_start_matches('/'))
    }
}

impl RemoteStore for LocalDirStore {
    fn read(&self, path: &str) -> RemoteResult<Vec<u8>> {
        let local = self.local_path(path);
        fs::read(&local).map_err(|e| RemoteError::from_io(e, local, path))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> RemoteResult<()> {
        let local = self.local_path(path);
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).map_err(|source| RemoteError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let io_err = |source| RemoteError::Io {
            path: local.clone(),
            source,
        };
        let mut file = fs::File::create(&local).map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        // Sync to disk so a later rename never exposes a short file
        file.sync_all().map_err(io_err)?;
        Ok(())
    }

    fn stat(&self, path: &str) -> RemoteResult<bool> {
        let local = self.local_path(path);
        match fs::metadata(&local) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(RemoteError::Io {
                path: local,
                source,
            }),
        }
    }

    fn rename(&self, from: &str, to: &str, overwrite: bool) -> RemoteResult<()> {
        let from_local = self.local_path(from);
        let to_local = self.local_path(to);

        if !overwrite && to_local.exists() {
            return Err(RemoteError::AlreadyExists {
                path: normalize_file(to),
            });
        }

        fs::rename(&from_local, &to_local).map_err(|e| RemoteError::from_io(e, from_local, from))
    }

    fn remove(&self, path: &str) -> RemoteResult<()> {
        let local = self.local_path(path);
        match fs::remove_file(&local) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RemoteError::Io {
                path: local,
                source,
            }),
        }
    }

    fn describe(&self) -> String {
        format!("localdir:{}", self.root.display())
    }
}

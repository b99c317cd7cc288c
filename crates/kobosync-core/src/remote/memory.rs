//! In-memory remote store
//!
//! Keeps blobs in a map. Used by tests and by dry runs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{normalize_file, RemoteError, RemoteResult, RemoteStore};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing blobs
    pub fn with_files<I, P, B>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, B)>,
        P: AsRef<str>,
        B: Into<Vec<u8>>,
    {
        let files = files
            .into_iter()
            .map(|(p, b)| (normalize_file(p.as_ref()), b.into()))
            .collect();
        Self {
            files: Mutex::new(files),
        }
    }

    /// Snapshot of every stored path
    pub fn paths(&self) -> Vec<String> {
        self.lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Stored content as text, if present
    pub fn get_string(&self, path: &str) -> Option<String> {
        self.lock()
            .ok()?
            .get(&normalize_file(path))
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    fn lock(&self) -> RemoteResult<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.files
            .lock()
            .map_err(|e| RemoteError::Lock(e.to_string()))
    }
}

impl RemoteStore for InMemoryStore {
    fn read(&self, path: &str) -> RemoteResult<Vec<u8>> {
        let path = normalize_file(path);
        self.lock()?
            .get(&path)
            .cloned()
            .ok_or(RemoteError::NotFound { path })
    }

    fn write(&self, path: &str, bytes: &[u8]) -> RemoteResult<()> {
        self.lock()?.insert(normalize_file(path), bytes.to_vec());
        Ok(())
    }

    fn stat(&self, path: &str) -> RemoteResult<bool> {
        Ok(self.lock()?.contains_key(&normalize_file(path)))
    }

    fn rename(&self, from: &str, to: &str, overwrite: bool) -> RemoteResult<()> {
        let from = normalize_file(from);
        let to = normalize_file(to);
        let mut files = self.lock()?;

        if !overwrite && files.contains_key(&to) {
            return Err(RemoteError::AlreadyExists { path: to });
        }
        let bytes = files
            .remove(&from)
            .ok_or(RemoteError::NotFound { path: from })?;
        files.insert(to, bytes);
        Ok(())
    }

    fn remove(&self, path: &str) -> RemoteResult<()> {
        self.lock()?.remove(&normalize_file(path));
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

//! Core storage engine.
//!
//! `StorageEngine` keeps the working set in a RAM hash table and makes every
//! mutation durable through the WAL before it becomes visible.
//!
//! **Read path**: RAM only, concurrent via `RwLock`
//! **Write path**: WAL append (+ sync), then RAM
//! **Read-modify-write**: [`StorageEngine::update`] holds the writer lock
//! across the read, the caller's decision and the write

use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::format::Operation;
use crate::wal::{WalReader, WalWriter};

/// What an [`StorageEngine::update`] closure wants done with the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Store this value
    Put(Vec<u8>),
    /// Remove the key
    Delete,
    /// Leave the key untouched
    Keep,
}

/// RAM hash table + WAL.
///
/// All public methods take `&self`. Readers share the `RwLock`; writers
/// serialize on the WAL `Mutex` and hold the table write lock only long
/// enough to apply the change.
pub struct StorageEngine {
    data: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
    wal: Mutex<WalWriter>,
    path: PathBuf,
}

impl StorageEngine {
    /// Open or create an engine rooted at `path`.
    ///
    /// Validates `config`, creates `<path>/wal`, replays every segment into
    /// RAM and cuts any unreadable tail off the last segment before appending
    /// to it.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> EngineResult<Self> {
        config.validate()?;

        let path = path.as_ref().to_path_buf();
        let wal_dir = path.join("wal");
        std::fs::create_dir_all(&wal_dir)
            .map_err(|e| EngineError::io_at(&wal_dir, "Failed to create WAL directory", e))?;

        let mut data = HashMap::new();
        let recovery = WalReader::new(&wal_dir).recover_frames()?;
        let dropped = recovery.truncate_tail()?;
        if dropped > 0 {
            warn!(bytes = dropped, wal = %wal_dir.display(), "truncated unreadable WAL tail");
        }

        let replayed = recovery.frames.len();
        for frame in recovery.frames {
            match frame.op {
                Operation::Put => { data.insert(frame.key, frame.value); }
                Operation::Delete => { data.remove(&frame.key); }
            }
        }

        if replayed > 0 {
            info!(
                frames = replayed,
                keys = data.len(),
                wal = %wal_dir.display(),
                "recovered engine state from WAL"
            );
        }

        let wal = WalWriter::new(&wal_dir, &config)?;

        Ok(Self {
            data: RwLock::new(data),
            wal: Mutex::new(wal),
            path,
        })
    }

    /// Value for `key`, if present.
    pub fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    /// Insert or overwrite `key`.
    ///
    /// If the WAL append fails, RAM is never modified.
    pub fn put(&self, key: &[u8], value: &[u8]) -> EngineResult<()> {
        self.update(key, |_| Ok((Mutation::Put(value.to_vec()), ())))
    }

    /// Remove `key`. Removing an absent key still logs the delete.
    pub fn delete(&self, key: &[u8]) -> EngineResult<()> {
        self.update(key, |_| Ok((Mutation::Delete, ())))
    }

    /// Atomic read-modify-write of a single key.
    ///
    /// `f` sees the current value and returns the mutation to apply plus a
    /// result for the caller. The WAL lock is held from the read until the
    /// mutation is in RAM, so no other writer can interleave. Plain readers
    /// keep running and observe either the old or the new value.
    ///
    /// If `f` returns `Err`, nothing is written.
    pub fn update<F, T, E>(&self, key: &[u8], f: F) -> Result<T, E>
    where
        F: FnOnce(Option<&[u8]>) -> Result<(Mutation, T), E>,
        E: From<EngineError>,
    {
        let mut wal = self.wal.lock();

        let current = self.data.read().get(key).cloned();
        let (mutation, out) = f(current.as_deref())?;

        match mutation {
            Mutation::Put(value) => {
                wal.append(key, &value, Operation::Put)?;
                self.data.write().insert(key.to_vec(), value);
            }
            Mutation::Delete => {
                wal.append(key, &[], Operation::Delete)?;
                self.data.write().remove(key);
            }
            Mutation::Keep => {}
        }
        Ok(out)
    }

    /// Make every appended frame durable. Only needed under
    /// [`crate::SyncMode::Batched`].
    pub fn sync(&self) -> EngineResult<()> {
        self.wal.lock().sync()
    }

    /// Compact the WAL down to one segment holding the live key set.
    ///
    /// Returns the number of keys written.
    pub fn checkpoint(&self) -> EngineResult<usize> {
        let mut wal = self.wal.lock();
        let data = self.data.read();
        let written = wal.checkpoint(data.iter().map(|(k, v)| (k.as_slice(), v.as_slice())))?;
        info!(keys = written, segment = %wal.current_path().display(), "WAL checkpoint complete");
        Ok(written)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.data.read().contains_key(key)
    }

    /// Number of keys in RAM.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Root directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All pairs whose key starts with `prefix`, prefix stripped, sorted by key.
    pub fn prefix_scan(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let data = self.data.read();
        let mut results: Vec<(Vec<u8>, Vec<u8>)> = data
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k[prefix.len()..].to_vec(), v.clone()))
            .collect();
        results.sort_by(|(a, _), (b, _)| a.cmp(b));
        results
    }

    /// Count of keys starting with `prefix`.
    pub fn prefix_count(&self, prefix: &[u8]) -> usize {
        self.data.read().keys().filter(|k| k.starts_with(prefix)).count()
    }
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("path", &self.path)
            .field("keys", &self.len())
            .finish()
    }
}

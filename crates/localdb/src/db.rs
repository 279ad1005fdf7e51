//! Database handle owning the storage engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use localdb_engine::{Config, StorageEngine};

use crate::error::LocalResult;
use crate::info::InfoStore;
use crate::local_docs::LocalDocumentStore;

/// One database instance: a storage engine plus the two stores over it.
///
/// Store handles share the engine through an `Arc` and can be cloned into
/// other threads freely.
pub struct LocalDatabase {
    engine: Arc<StorageEngine>,
    path: PathBuf,
}

impl LocalDatabase {
    /// Open or create a database at `path`, replaying its WAL.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> LocalResult<Self> {
        let path = path.as_ref().to_path_buf();
        let engine = StorageEngine::open(&path, config)?;
        Ok(Self { engine: Arc::new(engine), path })
    }

    pub fn local_docs(&self) -> LocalDocumentStore {
        LocalDocumentStore::new(Arc::clone(&self.engine))
    }

    pub fn info(&self) -> InfoStore {
        InfoStore::new(Arc::clone(&self.engine))
    }

    /// Flush the WAL; only needed under `SyncMode::Batched`.
    pub fn sync(&self) -> LocalResult<()> {
        Ok(self.engine.sync()?)
    }

    /// Compact the WAL to the current rows, tombstones included.
    pub fn checkpoint(&self) -> LocalResult<usize> {
        Ok(self.engine.checkpoint()?)
    }

    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for LocalDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDatabase")
            .field("path", &self.path)
            .field("rows", &self.engine.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_and_debug() {
        let dir = TempDir::new().unwrap();
        let db = LocalDatabase::open(dir.path(), Config::default()).unwrap();
        assert!(format!("{:?}", db).contains("LocalDatabase"));
        assert_eq!(db.path(), dir.path());
    }

    #[test]
    fn test_invalid_config_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.max_key_size = 0;
        let err = LocalDatabase::open(dir.path(), config).unwrap_err();
        assert!(matches!(err, crate::LocalError::Storage(_)));
    }

    #[test]
    fn test_stores_share_engine() {
        let dir = TempDir::new().unwrap();
        let db = LocalDatabase::open(dir.path(), Config::default()).unwrap();
        db.local_docs().put("d", b"x", None, true).unwrap();
        db.info().set("k", "v").unwrap();
        assert_eq!(db.engine().len(), 2);
    }
}

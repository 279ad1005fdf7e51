//! Unversioned info records: string keys to string values, last write wins.

use std::sync::Arc;

use localdb_engine::StorageEngine;

use crate::error::{LocalError, LocalResult};
use crate::tables::{table_key, INFO};

/// Handle onto the info table. Cheap to clone.
#[derive(Clone)]
pub struct InfoStore {
    engine: Arc<StorageEngine>,
}

impl InfoStore {
    pub fn new(engine: Arc<StorageEngine>) -> Self {
        Self { engine }
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> LocalResult<Option<String>> {
        self.engine
            .get(&table_key(INFO, key))?
            .map(|raw| decode_value(key, raw))
            .transpose()
    }

    /// Insert or overwrite `key`. No precondition.
    pub fn set(&self, key: &str, value: &str) -> LocalResult<()> {
        self.engine.put(&table_key(INFO, key), value.as_bytes())?;
        Ok(())
    }

    /// All info keys, sorted.
    pub fn keys(&self) -> LocalResult<Vec<String>> {
        self.engine
            .prefix_scan(&[INFO])
            .into_iter()
            .map(|(name, _)| {
                String::from_utf8(name).map_err(|e| LocalError::CorruptRecord {
                    name: String::from_utf8_lossy(e.as_bytes()).into_owned(),
                    reason: "info key is not UTF-8".to_string(),
                })
            })
            .collect()
    }
}

fn decode_value(key: &str, raw: Vec<u8>) -> LocalResult<String> {
    String::from_utf8(raw).map_err(|e| LocalError::CorruptRecord {
        name: key.to_string(),
        reason: format!("info value is not UTF-8: {}", e),
    })
}

impl std::fmt::Debug for InfoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfoStore")
            .field("rows", &self.engine.prefix_count(&[INFO]))
            .finish()
    }
}

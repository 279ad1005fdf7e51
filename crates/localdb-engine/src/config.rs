//! Engine configuration
//!
//! Presets for different hardware classes plus validation.

use crate::error::{EngineError, EngineResult};

/// How WAL appends reach persistent storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Every append is followed by a durable sync before the write is acknowledged.
    Durable,
    /// Appends land in the OS page cache; the caller makes them durable with `sync()`.
    Batched,
}

/// Engine configuration with hardware-class presets
#[derive(Debug, Clone)]
pub struct Config {
    /// WAL segment rotation threshold (bytes)
    pub wal_rotation_size_bytes: u64,
    /// Maximum key size in bytes
    pub max_key_size: usize,
    /// Maximum value size in bytes
    pub max_value_size: usize,
    /// Append durability
    pub sync_mode: SyncMode,
}

impl Config {
    /// Server-class machine
    pub fn server() -> Self {
        Self {
            wal_rotation_size_bytes: 64 * 1024 * 1024,
            max_key_size: 512,
            max_value_size: 16 * 1024 * 1024,
            sync_mode: SyncMode::Durable,
        }
    }

    /// Phone or tablet
    pub fn mobile() -> Self {
        Self {
            wal_rotation_size_bytes: 16 * 1024 * 1024,
            max_key_size: 256,
            max_value_size: 4 * 1024 * 1024,
            sync_mode: SyncMode::Durable,
        }
    }

    /// Small embedded device
    pub fn embedded() -> Self {
        Self {
            wal_rotation_size_bytes: 4 * 1024 * 1024,
            max_key_size: 128,
            max_value_size: 1024 * 1024,
            sync_mode: SyncMode::Durable,
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> EngineResult<()> {
        if self.wal_rotation_size_bytes < 64 * 1024 {
            return Err(EngineError::InvalidConfig(
                "wal_rotation_size_bytes must be >= 64KB".into(),
            ));
        }
        if self.max_key_size == 0 || self.max_key_size > u16::MAX as usize {
            return Err(EngineError::InvalidConfig(
                "max_key_size must be in [1, 65535]".into(),
            ));
        }
        if self.max_value_size == 0 || self.max_value_size > 128 * 1024 * 1024 {
            return Err(EngineError::InvalidConfig(
                "max_value_size must be in [1, 128MB]".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self { Self::server() }
}

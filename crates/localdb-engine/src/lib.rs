//! localdb-engine — RAM-first keyed storage with a crash-safe WAL
//!
//! The durable storage collaborator underneath `localdb`. It offers keyed
//! get/put/delete, prefix scans, and a single-key atomic read-modify-write
//! ([`StorageEngine::update`]) that higher layers build compare-and-swap
//! semantics on.
//!
//! # Architecture
//!
//! - **Read path**: served from a RAM hash table
//! - **Write path**: WAL-first, then RAM
//! - **Recovery**: WAL segments replayed on open; torn tails and corrupt
//!   frames are skipped
//! - **Checkpoint**: rewrites the live set into one fresh segment

pub mod config;
pub mod durability;
pub mod engine;
pub mod error;
pub mod format;
pub mod wal;

pub use config::{Config, SyncMode};
pub use engine::{Mutation, StorageEngine};
pub use error::{EngineError, EngineResult};
pub use format::Operation;

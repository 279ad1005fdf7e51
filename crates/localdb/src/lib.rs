//! localdb — local documents and info records
//!
//! Database-scoped records that are never replicated: replication
//! checkpoints, client bookkeeping, scalar flags.
//!
//! - [`LocalDocumentStore`]: documents versioned by `"<generation>-<suffix>"`
//!   revision ids and mutated under optimistic concurrency control
//! - [`InfoStore`]: plain string key/value pairs, last write wins
//!
//! Both live in their own table of a [`localdb_engine::StorageEngine`];
//! keys are `[table_id][name]`, so the two never see each other's rows.

pub mod db;
pub mod error;
pub mod info;
pub mod local_docs;
pub mod record;
pub mod revision;
pub mod tables;

pub use db::LocalDatabase;
pub use error::{LocalError, LocalResult};
pub use info::InfoStore;
pub use local_docs::{LocalDocument, LocalDocumentStore};
pub use localdb_engine::{Config, SyncMode};
pub use revision::RevisionId;

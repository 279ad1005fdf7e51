//! Errors surfaced by the local document and info stores.

use localdb_engine::EngineError;
use thiserror::Error;

/// Local store errors.
///
/// `Conflict`, `NotFound` and `RevisionMismatch` are recoverable: re-read
/// and retry, or report the conflict upward. `Storage` and `CorruptRecord`
/// are hard failures of the surrounding operation.
#[derive(Debug, Clone, Error)]
pub enum LocalError {
    /// MVCC precondition failed
    #[error("Conflict on local document {doc_id:?}: expected revision {expected:?}, current is {current:?}")]
    Conflict {
        doc_id: String,
        /// Precondition the caller supplied
        expected: Option<String>,
        /// Revision actually stored, tombstones included
        current: Option<String>,
    },

    /// A read demanded a revision of a document that has no live record
    #[error("Local document {doc_id:?} not found at revision {rev_id}")]
    NotFound { doc_id: String, rev_id: String },

    /// A read demanded a revision other than the live one
    #[error("Local document {doc_id:?} is at revision {current}, not {requested}")]
    RevisionMismatch {
        doc_id: String,
        requested: String,
        current: String,
    },

    /// String is not of the form `<generation>-<suffix>`
    #[error("Malformed revision id {0:?}")]
    InvalidRevision(String),

    /// Stored row could not be decoded
    #[error("Corrupt record {name:?}: {reason}")]
    CorruptRecord { name: String, reason: String },

    /// Storage engine fault, unchanged
    #[error(transparent)]
    Storage(#[from] EngineError),
}

impl LocalError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, LocalError::Conflict { .. })
    }

    /// True when the caller can re-read and try again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LocalError::Conflict { .. } | LocalError::NotFound { .. } | LocalError::RevisionMismatch { .. }
        )
    }
}

/// Result type alias for local store operations
pub type LocalResult<T> = Result<T, LocalError>;

//! Revisioned local documents under optimistic concurrency control.
//!
//! Every mutation names the revision the caller believes is current. The
//! read, the comparison and the write all happen inside one
//! [`StorageEngine::update`] call, so two writers holding the same stale
//! revision can never both succeed.
//!
//! Deletes leave a tombstone row behind. Readers see the document as absent,
//! but the tombstone's revision still counts for preconditions and the
//! generation carries on from it when the document is re-created.

use std::sync::Arc;

use localdb_engine::{Mutation, StorageEngine};
use tracing::debug;

use crate::error::{LocalError, LocalResult};
use crate::record::StoredRecord;
use crate::revision::RevisionId;
use crate::tables::{table_key, LOCAL_DOCS};

/// Live local document as seen by readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDocument {
    pub doc_id: String,
    pub rev_id: RevisionId,
    pub body: Vec<u8>,
    /// Always false for documents returned by [`LocalDocumentStore::get`].
    pub deleted: bool,
}

/// Empty strings mean "no prior revision", same as `None`.
fn precondition(rev_id: Option<&str>) -> Option<&str> {
    rev_id.filter(|r| !r.is_empty())
}

fn conflict(doc_id: &str, expected: Option<&str>, current: Option<&StoredRecord>) -> LocalError {
    debug!(doc_id, ?expected, current = ?current.map(|c| c.rev_id.to_string()), "local document conflict");
    LocalError::Conflict {
        doc_id: doc_id.to_string(),
        expected: expected.map(str::to_string),
        current: current.map(|c| c.rev_id.to_string()),
    }
}

/// Handle onto the local document table. Cheap to clone.
#[derive(Clone)]
pub struct LocalDocumentStore {
    engine: Arc<StorageEngine>,
}

impl LocalDocumentStore {
    pub fn new(engine: Arc<StorageEngine>) -> Self {
        Self { engine }
    }

    fn load(&self, doc_id: &str) -> LocalResult<Option<StoredRecord>> {
        self.engine
            .get(&table_key(LOCAL_DOCS, doc_id))?
            .map(|raw| StoredRecord::decode(doc_id, &raw))
            .transpose()
    }

    /// Current live document.
    ///
    /// Without `rev_id`, a missing or deleted document is `Ok(None)`. With
    /// `rev_id`, a missing or deleted document is [`LocalError::NotFound`]
    /// and a live document at another revision is
    /// [`LocalError::RevisionMismatch`].
    pub fn get(&self, doc_id: &str, rev_id: Option<&str>) -> LocalResult<Option<LocalDocument>> {
        let live = self.load(doc_id)?.filter(|r| !r.deleted);

        match (precondition(rev_id), live) {
            (None, live) => Ok(live.map(|r| Self::to_document(doc_id, r))),
            (Some(requested), None) => Err(LocalError::NotFound {
                doc_id: doc_id.to_string(),
                rev_id: requested.to_string(),
            }),
            (Some(requested), Some(rec)) => {
                let current = rec.rev_id.to_string();
                if current == requested {
                    Ok(Some(Self::to_document(doc_id, rec)))
                } else {
                    Err(LocalError::RevisionMismatch {
                        doc_id: doc_id.to_string(),
                        requested: requested.to_string(),
                        current,
                    })
                }
            }
        }
    }

    fn to_document(doc_id: &str, rec: StoredRecord) -> LocalDocument {
        LocalDocument {
            doc_id: doc_id.to_string(),
            rev_id: rec.rev_id,
            body: rec.body,
            deleted: false,
        }
    }

    /// Revision stored for `doc_id`, tombstones included.
    pub fn current_revision(&self, doc_id: &str) -> LocalResult<Option<RevisionId>> {
        Ok(self.load(doc_id)?.map(|r| r.rev_id))
    }

    /// Write `body` as the new current revision.
    ///
    /// With `obey_mvcc`, `prev_rev_id` must equal the stored revision, or be
    /// empty when no live document exists. A tombstone accepts either its
    /// own revision or an empty precondition. Without `obey_mvcc` the write
    /// always goes through; reserve that for administrative paths.
    ///
    /// The new generation is the stored one (tombstones included) plus 1.
    pub fn put(
        &self,
        doc_id: &str,
        body: &[u8],
        prev_rev_id: Option<&str>,
        obey_mvcc: bool,
    ) -> LocalResult<RevisionId> {
        let key = table_key(LOCAL_DOCS, doc_id);
        let expected = precondition(prev_rev_id);

        let rev = self.engine.update(&key, |raw| -> LocalResult<(Mutation, RevisionId)> {
            let current = raw.map(|b| StoredRecord::decode(doc_id, b)).transpose()?;

            if obey_mvcc {
                let accepted = match (expected, current.as_ref()) {
                    (None, None) => true,
                    (None, Some(cur)) => cur.deleted,
                    (Some(_), None) => false,
                    (Some(exp), Some(cur)) => cur.rev_id.to_string() == exp,
                };
                if !accepted {
                    return Err(conflict(doc_id, expected, current.as_ref()));
                }
            }

            let rev = RevisionId::after(current.as_ref().map(|c| &c.rev_id));
            let row = StoredRecord::live(rev.clone(), body.to_vec()).encode(doc_id)?;
            Ok((Mutation::Put(row), rev))
        })?;

        debug!(doc_id, rev = %rev, bytes = body.len(), obey_mvcc, "put local document");
        Ok(rev)
    }

    /// Tombstone the live document.
    ///
    /// With `obey_mvcc`, `rev_id` must equal the live revision; deleting a
    /// missing or already-deleted document is a conflict. Without it the
    /// delete always succeeds and is a no-op when nothing is live.
    ///
    /// Returns the tombstone's revision, or `None` for the no-op case.
    pub fn delete(&self, doc_id: &str, rev_id: Option<&str>, obey_mvcc: bool) -> LocalResult<Option<RevisionId>> {
        let key = table_key(LOCAL_DOCS, doc_id);
        let expected = precondition(rev_id);

        let rev = self.engine.update(&key, |raw| -> LocalResult<(Mutation, Option<RevisionId>)> {
            let current = raw.map(|b| StoredRecord::decode(doc_id, b)).transpose()?;
            let live = current.as_ref().filter(|c| !c.deleted);

            if obey_mvcc {
                let accepted = matches!(
                    (expected, live),
                    (Some(exp), Some(cur)) if cur.rev_id.to_string() == exp
                );
                if !accepted {
                    return Err(conflict(doc_id, expected, current.as_ref()));
                }
            }

            match live {
                None => Ok((Mutation::Keep, None)),
                Some(cur) => {
                    let rev = cur.rev_id.next();
                    let row = StoredRecord::tombstone(rev.clone()).encode(doc_id)?;
                    Ok((Mutation::Put(row), Some(rev)))
                }
            }
        })?;

        match &rev {
            Some(rev) => debug!(doc_id, rev = %rev, obey_mvcc, "deleted local document"),
            None => debug!(doc_id, "delete of absent local document ignored"),
        }
        Ok(rev)
    }

    /// Ids of live documents, sorted.
    pub fn doc_ids(&self) -> LocalResult<Vec<String>> {
        let mut ids = Vec::new();
        for (name, raw) in self.engine.prefix_scan(&[LOCAL_DOCS]) {
            let doc_id = String::from_utf8(name).map_err(|e| LocalError::CorruptRecord {
                name: String::from_utf8_lossy(e.as_bytes()).into_owned(),
                reason: "document id is not UTF-8".to_string(),
            })?;
            if !StoredRecord::decode(&doc_id, &raw)?.deleted {
                ids.push(doc_id);
            }
        }
        Ok(ids)
    }
}

impl std::fmt::Debug for LocalDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDocumentStore")
            .field("rows", &self.engine.prefix_count(&[LOCAL_DOCS]))
            .finish()
    }
}

//! Row layout for the local document table.
//!
//! ```text
//! [0]      version   u8, currently 1
//! [1]      flags     u8, bit 0 = deleted
//! [2..4]   rev_len   u16 LE
//! [4..]    rev bytes (UTF-8), then body
//! ```

use crate::error::{LocalError, LocalResult};
use crate::revision::RevisionId;

const FORMAT_VERSION: u8 = 1;
const FLAG_DELETED: u8 = 0x01;
const FIXED_LEN: usize = 4;

/// Stored state of one local document, tombstones included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub rev_id: RevisionId,
    pub deleted: bool,
    pub body: Vec<u8>,
}

impl StoredRecord {
    pub fn live(rev_id: RevisionId, body: Vec<u8>) -> Self {
        Self { rev_id, deleted: false, body }
    }

    pub fn tombstone(rev_id: RevisionId) -> Self {
        Self { rev_id, deleted: true, body: Vec::new() }
    }

    /// Encode the row stored for `doc_id`. Fails if the revision id does not
    /// fit the u16 length field.
    pub fn encode(&self, doc_id: &str) -> LocalResult<Vec<u8>> {
        let rev = self.rev_id.to_string();
        let rev_len = u16::try_from(rev.len()).map_err(|_| LocalError::CorruptRecord {
            name: doc_id.to_string(),
            reason: format!("revision is {} bytes, row limit is {}", rev.len(), u16::MAX),
        })?;

        let mut buf = Vec::with_capacity(FIXED_LEN + rev.len() + self.body.len());
        buf.push(FORMAT_VERSION);
        buf.push(if self.deleted { FLAG_DELETED } else { 0 });
        buf.extend_from_slice(&rev_len.to_le_bytes());
        buf.extend_from_slice(rev.as_bytes());
        buf.extend_from_slice(&self.body);
        Ok(buf)
    }

    /// Decode a row read back for `doc_id` (used only in error context).
    pub fn decode(doc_id: &str, bytes: &[u8]) -> LocalResult<Self> {
        let corrupt = |reason: String| LocalError::CorruptRecord { name: doc_id.to_string(), reason };

        if bytes.len() < FIXED_LEN {
            return Err(corrupt(format!("row is {} bytes, header needs {}", bytes.len(), FIXED_LEN)));
        }
        if bytes[0] != FORMAT_VERSION {
            return Err(corrupt(format!("unknown row version {}", bytes[0])));
        }
        let flags = bytes[1];
        let rev_len = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
        let rev_end = FIXED_LEN + rev_len;
        if bytes.len() < rev_end {
            return Err(corrupt(format!("revision needs {} bytes, row has {}", rev_len, bytes.len() - FIXED_LEN)));
        }

        let rev = std::str::from_utf8(&bytes[FIXED_LEN..rev_end])
            .map_err(|e| corrupt(format!("revision is not UTF-8: {}", e)))?;
        let rev_id: RevisionId = rev
            .parse()
            .map_err(|_| corrupt(format!("malformed revision {:?}", rev)))?;

        Ok(Self {
            rev_id,
            deleted: flags & FLAG_DELETED != 0,
            body: bytes[rev_end..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_row() {
        let rec = StoredRecord::live("4-abc".parse().unwrap(), b"{\"seq\":7}".to_vec());
        let decoded = StoredRecord::decode("chk", &rec.encode("chk").unwrap()).unwrap();
        assert_eq!(decoded, rec);
        assert!(!decoded.deleted);
    }

    #[test]
    fn test_tombstone_row() {
        let rec = StoredRecord::tombstone("9-dead".parse().unwrap());
        let bytes = rec.encode("chk").unwrap();
        assert_eq!(bytes[1], FLAG_DELETED);
        let decoded = StoredRecord::decode("chk", &bytes).unwrap();
        assert!(decoded.deleted);
        assert!(decoded.body.is_empty());
        assert_eq!(decoded.rev_id.generation(), 9);
    }

    #[test]
    fn test_corrupt_rows() {
        assert!(matches!(StoredRecord::decode("d", &[1, 0]), Err(LocalError::CorruptRecord { .. })));
        assert!(matches!(StoredRecord::decode("d", &[7, 0, 0, 0]), Err(LocalError::CorruptRecord { .. })));
        assert!(matches!(StoredRecord::decode("d", &[1, 0, 10, 0, b'1']), Err(LocalError::CorruptRecord { .. })));

        let mut bad_rev = vec![1, 0, 3, 0];
        bad_rev.extend_from_slice(b"0-x");
        let err = StoredRecord::decode("doc", &bad_rev).unwrap_err();
        assert!(err.to_string().contains("doc"));
    }

    #[test]
    fn test_overlong_revision_rejected() {
        let rev: RevisionId = format!("1-{}", "x".repeat(70_000)).parse().unwrap();
        let err = StoredRecord::live(rev, b"{}".to_vec()).encode("huge").unwrap_err();
        match err {
            LocalError::CorruptRecord { name, reason } => {
                assert_eq!(name, "huge");
                assert!(reason.contains("70002"));
            }
            other => panic!("expected CorruptRecord, got {:?}", other),
        }

        let max: RevisionId = format!("1-{}", "y".repeat(u16::MAX as usize - 2)).parse().unwrap();
        let bytes = StoredRecord::tombstone(max.clone()).encode("edge").unwrap();
        assert_eq!(StoredRecord::decode("edge", &bytes).unwrap().rev_id, max);
    }
}

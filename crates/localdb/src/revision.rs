//! Revision ids: `"<generation>-<suffix>"`.
//!
//! The generation counts successful mutations of a document, starting at 1.
//! The suffix is an opaque token that keeps two writers producing the same
//! generation from minting equal ids.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::error::LocalError;

static SUFFIX_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Parsed revision id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevisionId {
    generation: u64,
    suffix: String,
}

impl RevisionId {
    /// First revision of a document.
    pub fn first() -> Self {
        Self::with_generation(1)
    }

    /// Revision that follows `prev`, or the first one when there is none.
    pub fn after(prev: Option<&RevisionId>) -> Self {
        match prev {
            Some(prev) => prev.next(),
            None => Self::first(),
        }
    }

    /// Generation + 1 with a fresh suffix.
    pub fn next(&self) -> Self {
        Self::with_generation(self.generation + 1)
    }

    fn with_generation(generation: u64) -> Self {
        Self { generation, suffix: fresh_suffix() }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

/// 64 random bits followed by a process-wide counter, hex encoded.
fn fresh_suffix() -> String {
    let random: u64 = rand::thread_rng().gen();
    let count = SUFFIX_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:016x}{:x}", random, count)
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.suffix)
    }
}

impl FromStr for RevisionId {
    type Err = LocalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LocalError::InvalidRevision(s.to_string());
        let (generation, suffix) = s.split_once('-').ok_or_else(invalid)?;
        if generation.is_empty() || !generation.bytes().all(|b| b.is_ascii_digit()) || suffix.is_empty() {
            return Err(invalid());
        }
        let generation: u64 = generation.parse().map_err(|_| invalid())?;
        if generation == 0 {
            return Err(invalid());
        }
        Ok(Self { generation, suffix: suffix.to_string() })
    }
}

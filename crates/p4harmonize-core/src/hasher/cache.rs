use super::Digester;
use crate::model::{Digest, FileEntry};
use dashmap::DashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

/// Per-run memo of source digests. A path is hashed at most once, no matter
/// how many workers ask for it.
pub struct DigestCache<'a> {
    digester: &'a dyn Digester,
    memo: DashMap<String, Digest>,
    computed: AtomicUsize,
}

impl<'a> DigestCache<'a> {
    pub fn new(digester: &'a dyn Digester) -> Self {
        Self {
            digester,
            memo: DashMap::new(),
            computed: AtomicUsize::new(0),
        }
    }

    /// Digest of a source entry: the entry's own digest if it carries one,
    /// then the memo, then the digester.
    pub fn get_or_compute(&self, entry: &FileEntry, text: bool) -> io::Result<Digest> {
        if let Some(digest) = &entry.digest {
            return Ok(digest.clone());
        }
        if let Some(digest) = self.memo.get(&entry.path) {
            trace!("Found digest for {} in cache", entry.path);
            return Ok(digest.clone());
        }

        let digest = self.digester.digest(entry, text)?;
        self.computed.fetch_add(1, Ordering::Relaxed);
        trace!("Computed digest {} for {}", digest, entry.path);
        Ok(self
            .memo
            .entry(entry.path.clone())
            .or_insert(digest)
            .clone())
    }

    /// Number of digests actually computed (memo and entry hits excluded).
    pub fn computed(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}

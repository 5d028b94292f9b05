use crate::error::Error;
use crate::platform;
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Destination,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Destination => write!(f, "destination"),
        }
    }
}

/// Uppercase hex content digest, the form Perforce reports in `fstat -Ol`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest(String);

impl Digest {
    pub fn new(hex: &str) -> Self {
        Digest(hex.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an inventoried file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    /// Tracked in the git tree.
    Git,
    /// Downloaded by GitDependencies and listed in `.uedependencies`.
    DependencyManifest,
    /// Versioned in the destination depot.
    Depot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Forward-slash path relative to the side's root, case as reported.
    pub path: String,
    pub size: u64,
    pub is_binary: bool,
    /// Tracked by git as a symbolic link (mode `120000`).
    pub is_symlink: bool,
    pub digest: Option<Digest>,
    /// Perforce head type (e.g. `binary+l`), destination only.
    pub file_type: Option<String>,
    pub origin: EntryOrigin,
}

impl FileEntry {
    pub fn source(path: &str, size: u64, is_binary: bool) -> Self {
        Self {
            path: platform::normalize_relative_path(path),
            size,
            is_binary,
            is_symlink: false,
            digest: None,
            file_type: None,
            origin: EntryOrigin::Git,
        }
    }

    pub fn destination(path: &str, size: u64, is_binary: bool, digest: Option<Digest>) -> Self {
        Self {
            path: platform::normalize_relative_path(path),
            size,
            is_binary,
            is_symlink: false,
            digest,
            file_type: None,
            origin: EntryOrigin::Depot,
        }
    }

    pub fn with_origin(mut self, origin: EntryOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_symlink(mut self, is_symlink: bool) -> Self {
        self.is_symlink = is_symlink;
        self
    }

    pub fn with_file_type(mut self, file_type: &str) -> Self {
        self.file_type = Some(file_type.to_string());
        self
    }

    pub fn key(&self) -> String {
        identity_key(&self.path)
    }

    /// Whether this entry's digest is taken over LF line endings. Perforce
    /// does so for every `text` flavor and for `utf8`.
    pub fn has_normalized_digest(&self) -> bool {
        match &self.file_type {
            Some(t) => t.contains("text") || t.contains("utf8"),
            None => !self.is_binary,
        }
    }

    /// Whether the reported size is the exact byte count of the content, so
    /// a size difference alone proves an edit. Only holds for `binary` types.
    pub fn has_exact_size(&self) -> bool {
        match &self.file_type {
            Some(t) => t.starts_with("binary"),
            None => self.is_binary,
        }
    }
}

/// Case-folded path used to match files across the two sides.
pub fn identity_key(path: &str) -> String {
    path.to_lowercase()
}

/// Every file on one side of the comparison, keyed by identity key.
/// Built once per run and never modified.
#[derive(Debug, Clone)]
pub struct Inventory {
    side: Side,
    entries: BTreeMap<String, FileEntry>,
}

impl Inventory {
    /// Fails with [`Error::Ambiguity`] when two paths differ only in case.
    /// An exact duplicate path keeps the first entry.
    pub fn build(side: Side, entries: impl IntoIterator<Item = FileEntry>) -> Result<Self, Error> {
        let mut map: BTreeMap<String, FileEntry> = BTreeMap::new();

        for entry in entries {
            match map.entry(entry.key()) {
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
                btree_map::Entry::Occupied(existing) => {
                    if existing.get().path == entry.path {
                        debug!("Ignoring duplicate {} entry '{}'", side, entry.path);
                        continue;
                    }
                    return Err(Error::Ambiguity {
                        side,
                        first: existing.get().path.clone(),
                        second: entry.path,
                    });
                }
            }
        }

        Ok(Self { side, entries: map })
    }

    pub fn empty(side: Side) -> Self {
        Self {
            side,
            entries: BTreeMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&FileEntry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Entries in identity-key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileEntry)> {
        self.entries.iter()
    }
}

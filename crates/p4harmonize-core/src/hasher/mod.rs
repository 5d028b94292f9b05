pub mod cache;
pub mod md5;

use crate::model::{Digest, FileEntry};
use crate::platform;
use std::io;
use std::path::{Path, PathBuf};

pub use cache::DigestCache;

/// Computes the digest of a source-side file.
///
/// Must produce the same algorithm and form as the depot's `digest` field,
/// otherwise every comparison reports a change.
pub trait Digester: Send + Sync {
    /// `text` selects line-ending normalization before hashing.
    fn digest(&self, entry: &FileEntry, text: bool) -> io::Result<Digest>;
}

/// MD5 of files under the source root, as Perforce computes it.
pub struct Md5Digester {
    root: PathBuf,
}

impl Md5Digester {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl Digester for Md5Digester {
    fn digest(&self, entry: &FileEntry, text: bool) -> io::Result<Digest> {
        let path = platform::local_path(&self.root, &entry.path);
        // Perforce stores a symlink as its target path.
        if let Some(target) = platform::symlink_target(&path)? {
            return md5::digest_reader(target.as_bytes(), false);
        }
        // With core.symlinks off, git checks a link out as a file holding the target.
        md5::digest_file(&path, text && !entry.is_symlink)
    }
}

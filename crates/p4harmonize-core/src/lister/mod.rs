pub mod depot;
pub mod git;
pub mod manifest;

use crate::error::Error;
use crate::model::FileEntry;
use glob::{MatchOptions, Pattern};

pub use depot::DepotLister;
pub use git::GitLister;

/// Produces the source inventory: every tracked file at the selected commit,
/// ignore patterns already applied.
pub trait SourceLister: Send + Sync {
    fn list(&self) -> Result<Vec<FileEntry>, Error>;
}

/// Produces the destination inventory: every file at head in the stream,
/// with size, type and digest from depot metadata.
pub trait DestinationLister: Send + Sync {
    fn list(&self) -> Result<Vec<FileEntry>, Error>;
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Glob patterns matched against forward-slash relative paths, without
/// regard to case.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
}

impl IgnoreRules {
    pub fn new(globs: &[String]) -> Result<Self, Error> {
        let patterns = globs
            .iter()
            .map(|glob| Pattern::new(glob))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(path, MATCH_OPTIONS))
    }

    /// Drop ignored entries, returning how many were removed.
    pub fn retain(&self, entries: &mut Vec<FileEntry>) -> usize {
        let before = entries.len();
        entries.retain(|entry| !self.is_ignored(&entry.path));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

//! Applying a [`Plan`](crate::reconcile::Plan) to the destination workspace.

pub mod dry_run;
pub mod executor;
pub mod p4;

use crate::error::{Error, PathError};
use crate::platform;
use std::fs;
use std::io;
use std::path::Path;

pub use dry_run::{DryRunCopier, DryRunStager};
pub use executor::{ExecutionReport, ExecutionState, Executor};
pub use p4::P4Stager;

/// Destination version-control operations, over paths relative to the
/// workspace root.
///
/// The outer error aborts the run. Failures of individual paths come back
/// in the vector and the run continues.
pub trait Stager: Send + Sync {
    fn add(&self, paths: &[String]) -> Result<Vec<PathError>, Error>;
    fn edit(&self, paths: &[String]) -> Result<Vec<PathError>, Error>;
    fn delete(&self, paths: &[String]) -> Result<Vec<PathError>, Error>;
    /// Rename `from` to `to`, keeping history. The new content is already in
    /// place at `to`.
    fn move_file(&self, from: &str, to: &str) -> Result<Vec<PathError>, Error>;
    /// Revert the listed open files whose content is identical to the depot
    /// and return the ones actually reverted.
    fn revert_unchanged(&self, paths: &[String]) -> Result<Vec<String>, Error>;
}

/// Byte-exact file copy, called from many threads at once.
pub trait FileCopier: Send + Sync {
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Copies through the local filesystem, creating parent directories and
/// overwriting read-only workspace files. A symlink is recreated as a link
/// with the same target.
pub struct FsCopier;

impl FileCopier for FsCopier {
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Ok(metadata) = fs::symlink_metadata(to) {
            let mut permissions = metadata.permissions();
            if permissions.readonly() {
                #[allow(clippy::permissions_set_readonly_false)]
                permissions.set_readonly(false);
                fs::set_permissions(to, permissions)?;
            }
        }
        if let Some(target) = platform::symlink_target(from)? {
            return platform::create_symlink(Path::new(&target), to);
        }
        fs::copy(from, to)?;
        Ok(())
    }
}

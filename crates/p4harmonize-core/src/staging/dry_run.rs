use super::{FileCopier, Stager};
use crate::error::{Error, PathError};
use std::io;
use std::path::Path;
use tracing::{debug, info};

/// Logs each staging call and touches nothing.
pub struct DryRunStager;

impl DryRunStager {
    fn log(&self, operation: &str, paths: &[String]) -> Result<Vec<PathError>, Error> {
        info!("[dry run] p4 {} ({} files)", operation, paths.len());
        for path in paths {
            debug!("[dry run]   {}", path);
        }
        Ok(Vec::new())
    }
}

impl Stager for DryRunStager {
    fn add(&self, paths: &[String]) -> Result<Vec<PathError>, Error> {
        self.log("add", paths)
    }

    fn edit(&self, paths: &[String]) -> Result<Vec<PathError>, Error> {
        self.log("edit", paths)
    }

    fn delete(&self, paths: &[String]) -> Result<Vec<PathError>, Error> {
        self.log("delete", paths)
    }

    fn move_file(&self, from: &str, to: &str) -> Result<Vec<PathError>, Error> {
        info!("[dry run] p4 move {} {}", from, to);
        Ok(Vec::new())
    }

    fn revert_unchanged(&self, paths: &[String]) -> Result<Vec<String>, Error> {
        info!("[dry run] p4 revert -a ({} files)", paths.len());
        Ok(Vec::new())
    }
}

pub struct DryRunCopier;

impl FileCopier for DryRunCopier {
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        debug!("[dry run] copy {} -> {}", from.display(), to.display());
        Ok(())
    }
}

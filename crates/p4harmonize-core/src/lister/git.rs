use super::{manifest, IgnoreRules, SourceLister};
use crate::error::Error;
use crate::model::{FileEntry, Side};
use crate::process::ToolCommand;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Lists the git tree at a commit, plus the Unreal dependency manifest when
/// enabled.
pub struct GitLister {
    root: PathBuf,
    commit: String,
    ignore: IgnoreRules,
    dependency_manifest: bool,
}

impl GitLister {
    pub fn new(root: &Path, commit: &str, ignore: IgnoreRules, dependency_manifest: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            commit: commit.to_string(),
            ignore,
            dependency_manifest,
        }
    }

    fn git(&self) -> ToolCommand {
        ToolCommand::new("git").arg("-C").arg(self.root.to_string_lossy())
    }

    fn run_git(&self, args: &[&str]) -> Result<Vec<u8>, Error> {
        let output = self.git().args(args.iter().copied()).output()?;
        if !output.success() {
            return Err(Error::listing(
                Side::Source,
                format!("git {} failed: {}", args.join(" "), output.stderr.trim()),
            ));
        }
        Ok(output.stdout)
    }

    /// Full hash of the listed commit, for changelist descriptions.
    pub fn resolve_commit(&self) -> Result<String, Error> {
        let stdout = self.run_git(&["rev-parse", self.commit.as_str()])?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    /// Full hash of the listed commit, after checking the working tree holds
    /// exactly that commit. Digests and copies read the working tree, so a
    /// different checkout or local edits would stage content the listing
    /// never saw.
    pub fn verify_checkout(&self) -> Result<String, Error> {
        let commit = self.resolve_commit()?;
        let head = self.run_git(&["rev-parse", "HEAD"])?;
        let head = String::from_utf8_lossy(&head).trim().to_string();
        if head != commit {
            return Err(Error::Validation(format!(
                "Source checkout is at {} but {} resolves to {}. Check out the commit first",
                head, self.commit, commit
            )));
        }

        let status = self.run_git(&["status", "--porcelain", "--untracked-files=no"])?;
        let modified: Vec<String> = String::from_utf8_lossy(&status)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.get(3..).unwrap_or(l).to_string())
            .collect();
        if !modified.is_empty() {
            return Err(Error::Validation(format!(
                "Source working tree has {} modified tracked files (first: {})",
                modified.len(),
                modified[0]
            )));
        }
        Ok(commit)
    }
}

impl SourceLister for GitLister {
    fn list(&self) -> Result<Vec<FileEntry>, Error> {
        let start = Instant::now();

        let tree = self.run_git(&["ls-tree", "-r", "-l", "-z", self.commit.as_str()])?;
        let blobs = parse_ls_tree(&tree)?;
        info!("Found {} source files from git ls-tree", blobs.len());

        let eol = self.run_git(&["ls-files", "--eol", "-z"])?;
        let binary_flags = parse_ls_files_eol(&eol);

        let mut entries: Vec<FileEntry> = blobs
            .into_iter()
            .map(|blob| {
                let is_binary = binary_flags.get(&blob.path).copied().unwrap_or(false);
                FileEntry::source(&blob.path, blob.size, is_binary).with_symlink(blob.is_symlink)
            })
            .collect();

        if self.dependency_manifest {
            let dependencies = manifest::list_manifest_files(&self.root)?;
            info!(
                "Found {} source files from {}",
                dependencies.len(),
                manifest::MANIFEST_FILE_NAME
            );
            entries.extend(dependencies);
        }

        let ignored = self.ignore.retain(&mut entries);
        debug!(
            "Listed {} source files ({} ignored) in {:.2}s",
            entries.len(),
            ignored,
            start.elapsed().as_secs_f64()
        );
        Ok(entries)
    }
}

/// One blob from `git ls-tree -r -l`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeBlob {
    pub path: String,
    pub size: u64,
    pub is_symlink: bool,
}

const SYMLINK_MODE: &str = "120000";

/// Every blob in `git ls-tree -r -l -z` output. Submodule (`commit`)
/// entries are skipped.
pub fn parse_ls_tree(output: &[u8]) -> Result<Vec<TreeBlob>, Error> {
    let mut blobs = Vec::new();

    for record in output.split(|b| *b == 0).filter(|r| !r.is_empty()) {
        let record = String::from_utf8_lossy(record);
        let (info, path) = record.split_once('\t').ok_or_else(|| {
            Error::listing(Side::Source, format!("Malformed ls-tree record: {}", record))
        })?;

        let mut fields = info.split_whitespace();
        let (mode, kind, _object, size) = (fields.next(), fields.next(), fields.next(), fields.next());
        if kind != Some("blob") {
            continue;
        }
        let size = size
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| {
                Error::listing(Side::Source, format!("Missing size in ls-tree record: {}", record))
            })?;
        blobs.push(TreeBlob {
            path: path.to_string(),
            size,
            is_symlink: mode == Some(SYMLINK_MODE),
        });
    }

    Ok(blobs)
}

/// Binary flag per path from `git ls-files --eol -z`: binary when the index
/// content is `-text` or the `-text`/`binary` attribute is set.
pub fn parse_ls_files_eol(output: &[u8]) -> HashMap<String, bool> {
    output
        .split(|b| *b == 0)
        .filter(|r| !r.is_empty())
        .filter_map(|record| {
            let record = String::from_utf8_lossy(record);
            let (info, path) = record.split_once('\t')?;
            let mut fields = info.split_whitespace();
            let index = fields.next().unwrap_or_default();
            let attr = fields.find(|f| f.starts_with("attr/")).unwrap_or_default();
            let is_binary = index == "i/-text" || attr == "attr/-text";
            Some((path.to_string(), is_binary))
        })
        .collect()
}

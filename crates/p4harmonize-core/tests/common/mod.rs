#![allow(dead_code)]

use p4harmonize_core::error::{Error, PathError, PathErrorKind};
use p4harmonize_core::hasher::md5::digest_reader;
use p4harmonize_core::hasher::Digester;
use p4harmonize_core::lister::{DestinationLister, SourceLister};
use p4harmonize_core::model::Digest;
use p4harmonize_core::staging::Stager;
use p4harmonize_core::FileEntry;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct FakeSource(pub Vec<FileEntry>);

impl SourceLister for FakeSource {
    fn list(&self) -> Result<Vec<FileEntry>, Error> {
        Ok(self.0.clone())
    }
}

pub struct FakeDepot(pub Vec<FileEntry>);

impl DestinationLister for FakeDepot {
    fn list(&self) -> Result<Vec<FileEntry>, Error> {
        Ok(self.0.clone())
    }
}

/// Digests from a fixed table, counting every call.
pub struct FakeDigester {
    digests: HashMap<String, Digest>,
    calls: AtomicUsize,
}

impl FakeDigester {
    pub fn new(digests: &[(&str, &str)]) -> Self {
        Self {
            digests: digests
                .iter()
                .map(|(path, digest)| (path.to_string(), Digest::new(digest)))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Digester for FakeDigester {
    fn digest(&self, entry: &FileEntry, _text: bool) -> io::Result<Digest> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.digests
            .get(&entry.path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, entry.path.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Add(Vec<String>),
    Edit(Vec<String>),
    Delete(Vec<String>),
    Move(String, String),
    Revert(Vec<String>),
}

/// In-memory depot. Reverts compare workspace bytes against the depot's
/// head content, the way `p4 revert -a` does.
pub struct FakeStager {
    workspace: PathBuf,
    depot: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    fatal_on: Option<&'static str>,
    pub calls: Mutex<Vec<Call>>,
}

impl FakeStager {
    pub fn new(workspace: &Path) -> Self {
        Self {
            workspace: workspace.to_path_buf(),
            depot: HashMap::new(),
            failing: HashSet::new(),
            fatal_on: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_depot_file(mut self, path: &str, content: &[u8]) -> Self {
        self.depot.insert(path.to_string(), content.to_vec());
        self
    }

    pub fn failing_on(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    pub fn fatal_on(mut self, operation: &'static str) -> Self {
        self.fatal_on = Some(operation);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &str, call: Call, paths: &[String]) -> Result<Vec<PathError>, Error> {
        if self.fatal_on == Some(operation) {
            return Err(Error::Command {
                command: format!("p4 {}", operation),
                message: "connection lost".to_string(),
            });
        }
        self.calls.lock().unwrap().push(call);
        Ok(paths
            .iter()
            .filter(|p| self.failing.contains(*p))
            .map(|p| PathError::new(p.as_str(), PathErrorKind::Staging, "locked by another user"))
            .collect())
    }
}

impl Stager for FakeStager {
    fn add(&self, paths: &[String]) -> Result<Vec<PathError>, Error> {
        self.record("add", Call::Add(paths.to_vec()), paths)
    }

    fn edit(&self, paths: &[String]) -> Result<Vec<PathError>, Error> {
        self.record("edit", Call::Edit(paths.to_vec()), paths)
    }

    fn delete(&self, paths: &[String]) -> Result<Vec<PathError>, Error> {
        self.record("delete", Call::Delete(paths.to_vec()), paths)
    }

    fn move_file(&self, from: &str, to: &str) -> Result<Vec<PathError>, Error> {
        let paths = [to.to_string()];
        self.record("move", Call::Move(from.to_string(), to.to_string()), &paths)
    }

    fn revert_unchanged(&self, paths: &[String]) -> Result<Vec<String>, Error> {
        if self.fatal_on == Some("revert") {
            return Err(Error::Other("revert failed".to_string()));
        }
        self.calls.lock().unwrap().push(Call::Revert(paths.to_vec()));
        Ok(paths
            .iter()
            .filter(|p| {
                let local = fs::read(self.workspace.join(p.as_str())).ok();
                local.is_some() && local.as_ref() == self.depot.get(p.as_str())
            })
            .cloned()
            .collect())
    }
}

/// Write `files` under `root`, creating directories.
pub fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (path, content) in files {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
}

/// Depot-style digest of in-memory content.
pub fn depot_digest(content: &[u8], text: bool) -> Digest {
    digest_reader(content, text).unwrap()
}

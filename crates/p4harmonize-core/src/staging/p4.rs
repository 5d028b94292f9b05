use super::Stager;
use crate::error::{Error, PathError, PathErrorKind};
use crate::p4::{escape_path, parse_ztag, P4Connection, ZtagRecord};
use crate::platform::local_path;
use crate::process::{CommandOutput, ToolCommand};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Stages through the `p4` command line into one pending changelist.
///
/// Batches go through `p4 -x <file>` so any number of paths fits in one
/// invocation. Error lines are matched back to the paths they mention.
pub struct P4Stager {
    connection: P4Connection,
    root: PathBuf,
    changelist: Option<u32>,
}

impl P4Stager {
    pub fn new(connection: P4Connection, root: &Path, changelist: Option<u32>) -> Self {
        Self {
            connection,
            root: root.to_path_buf(),
            changelist,
        }
    }

    fn local(&self, path: &str) -> String {
        local_path(&self.root, path).to_string_lossy().into_owned()
    }

    fn with_changelist(&self, command: ToolCommand) -> ToolCommand {
        match self.changelist {
            Some(change) => command.args(["-c".to_string(), change.to_string()]),
            None => command,
        }
    }

    fn argument_file(&self, paths: &[String], escape: bool) -> Result<NamedTempFile, Error> {
        let mut file = tempfile::Builder::new()
            .prefix("p4harmonize-")
            .suffix(".txt")
            .tempfile()?;
        for path in paths {
            let local = self.local(path);
            if escape {
                writeln!(file, "{}", escape_path(&local))?;
            } else {
                writeln!(file, "{}", local)?;
            }
        }
        file.flush()?;
        Ok(file)
    }

    /// `p4 -x <file> <operation> [-c change] <flags>` over every path.
    fn run_batch(
        &self,
        operation: &str,
        flags: &[&str],
        paths: &[String],
        escape: bool,
    ) -> Result<Vec<PathError>, Error> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let file = self.argument_file(paths, escape)?;
        let command = self
            .connection
            .command()
            .arg("-x")
            .arg(file.path().to_string_lossy())
            .arg(operation);
        let output = self.with_changelist(command).args(flags.iter().copied()).output()?;
        Ok(attribute_errors(operation, paths, &output))
    }

    fn run_single(&self, operation: &str, flags: &[&str], paths: &[&str]) -> Result<CommandOutput, Error> {
        let command = self.connection.command().arg(operation);
        let command = self
            .with_changelist(command)
            .args(flags.iter().copied())
            .args(paths.iter().map(|p| escape_path(&self.local(p))));
        command.output()
    }
}

impl Stager for P4Stager {
    fn add(&self, paths: &[String]) -> Result<Vec<PathError>, Error> {
        // -f takes names literally, so they are not escaped
        self.run_batch("add", &["-f"], paths, false)
    }

    fn edit(&self, paths: &[String]) -> Result<Vec<PathError>, Error> {
        self.run_batch("edit", &["-k"], paths, true)
    }

    fn delete(&self, paths: &[String]) -> Result<Vec<PathError>, Error> {
        self.run_batch("delete", &[], paths, true)
    }

    fn move_file(&self, from: &str, to: &str) -> Result<Vec<PathError>, Error> {
        let from_paths = [from.to_string()];
        let output = self.run_single("edit", &["-k"], &[from])?;
        let errors = attribute_errors("edit", &from_paths, &output);
        if !errors.is_empty() {
            return Ok(errors);
        }

        let output = self.run_single("move", &["-k"], &[from, to])?;
        let to_paths = [to.to_string()];
        let mut errors = attribute_errors("move", &to_paths, &output);
        if errors.is_empty() {
            return Ok(errors);
        }

        // Leave nothing opened for a rename that did not happen.
        let output = self.run_single("revert", &["-k"], &[from])?;
        let note = if output.success() {
            format!("(reverted {})", from)
        } else {
            warn!("Failed to revert {} after move failure: {}", from, output.stderr.trim());
            format!("({} is still opened for edit)", from)
        };
        for error in &mut errors {
            error.message = format!("{} {}", error.message, note);
        }
        Ok(errors)
    }

    fn revert_unchanged(&self, paths: &[String]) -> Result<Vec<String>, Error> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let file = self.argument_file(paths, true)?;
        let command = self
            .connection
            .command()
            .arg("-x")
            .arg(file.path().to_string_lossy())
            .args(["-ztag", "revert", "-a"]);
        let output = self.with_changelist(command).output()?;
        let records = parse_ztag(&output.stdout_text());

        if !output.success() && records.is_empty() {
            let message = output.stderr.trim();
            if !message.is_empty() && !message.contains("not opened") {
                return Err(Error::Command {
                    command: "p4 revert -a".to_string(),
                    message: message.to_string(),
                });
            }
        }
        for line in output.stderr_lines() {
            debug!("revert: {}", line);
        }

        Ok(reverted_paths(paths, &records))
    }
}

/// Batch paths named by `revert -ztag` records, by client file when the
/// record has one and by depot file otherwise.
fn reverted_paths(paths: &[String], records: &[ZtagRecord]) -> Vec<String> {
    let index = PathIndex::new(paths);
    let mut reverted: Vec<String> = records
        .iter()
        .filter_map(|r| r.get("clientFile").or_else(|| r.get("depotFile")))
        .filter_map(|file| index.find(file))
        .map(|i| paths[i].clone())
        .collect();
    reverted.sort();
    reverted.dedup();
    reverted
}

/// Messages p4 prints for files already in the requested state.
fn is_benign_staging_warning(line: &str) -> bool {
    line.contains("currently opened for") || line.contains("already opened for")
}

/// Turn stderr lines into per-path errors.
///
/// A failed command with no line naming any path fails the whole batch.
fn attribute_errors(operation: &str, paths: &[String], output: &CommandOutput) -> Vec<PathError> {
    let index = PathIndex::new(paths);
    let mut messages: HashMap<usize, String> = HashMap::new();
    let mut unattributed = Vec::new();

    for line in output.stderr_lines() {
        if is_benign_staging_warning(line) {
            debug!("{}: {}", operation, line);
            continue;
        }
        match index.find_in_message(line) {
            Some(i) => {
                messages.entry(i).or_insert_with(|| line.to_string());
            }
            None => unattributed.push(line),
        }
    }

    if messages.is_empty() && !output.success() {
        let message = if unattributed.is_empty() {
            format!("p4 {} exited with code {}", operation, output.code.unwrap_or(-1))
        } else {
            unattributed.join("; ")
        };
        return paths
            .iter()
            .map(|p| PathError::new(p, PathErrorKind::Staging, message.clone()))
            .collect();
    }
    for line in unattributed {
        warn!("p4 {}: {}", operation, line);
    }

    let mut errors: Vec<PathError> = messages
        .into_iter()
        .map(|(i, message)| PathError::new(&paths[i], PathErrorKind::Staging, message))
        .collect();
    errors.sort_by(|a, b| a.path.cmp(&b.path));
    errors
}

/// Case-folded lookup from the way p4 prints a file back to a batch index.
struct PathIndex {
    by_key: HashMap<String, usize>,
}

impl PathIndex {
    fn new(paths: &[String]) -> Self {
        let mut by_key = HashMap::with_capacity(paths.len() * 2);
        for (i, path) in paths.iter().enumerate() {
            by_key.entry(path.to_lowercase()).or_insert(i);
            by_key.entry(escape_path(path).to_lowercase()).or_insert(i);
        }
        Self { by_key }
    }

    /// Match a local, client or depot path by its longest known suffix.
    fn find(&self, file: &str) -> Option<usize> {
        let normalized = file.trim().replace('\\', "/").to_lowercase();
        let mut rest = normalized.as_str();
        loop {
            if let Some(&i) = self.by_key.get(rest) {
                return Some(i);
            }
            let slash = rest.find('/')?;
            rest = &rest[slash + 1..];
        }
    }

    /// p4 messages read `<file>[#rev] - <message>`.
    fn find_in_message(&self, line: &str) -> Option<usize> {
        let subject = line.split(" - ").next()?;
        let subject = subject.split('#').next()?;
        self.find(subject)
    }
}

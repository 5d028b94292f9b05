use super::{FileCopier, Stager};
use crate::error::{Error, PathError, PathErrorKind};
use crate::platform::local_path;
use crate::progress::ProgressReporter;
use crate::reconcile::{Plan, StagingAction};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle of one plan execution. Moves forward only; `Failed` is terminal
/// and leaves whatever was staged in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Planned,
    Copying,
    /// Staging commands are being issued.
    Staged,
    Reverting,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub state: ExecutionState,
    /// Actions the stager accepted, in the order they were issued.
    pub staged: Vec<StagingAction>,
    /// Actions dropped because their copy or staging call failed.
    pub skipped: Vec<StagingAction>,
    /// Adds left for the next run.
    pub deferred: Vec<String>,
    /// Opened files the revert pass found identical to the depot.
    pub reverted: Vec<String>,
    pub errors: Vec<PathError>,
    pub copied: usize,
    /// Set when the run stopped early.
    pub failure: Option<String>,
}

impl ExecutionReport {
    fn new() -> Self {
        Self {
            state: ExecutionState::Planned,
            staged: Vec::new(),
            skipped: Vec::new(),
            deferred: Vec::new(),
            reverted: Vec::new(),
            errors: Vec::new(),
            copied: 0,
            failure: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == ExecutionState::Done && self.errors.is_empty()
    }

    /// Staged actions still open after the revert pass.
    pub fn surviving(&self) -> impl Iterator<Item = &StagingAction> {
        let reverted: HashSet<&str> = self.reverted.iter().map(String::as_str).collect();
        self.staged.iter().filter(move |action| match action {
            StagingAction::Edit { path, .. } => !reverted.contains(path.as_str()),
            _ => true,
        })
    }

    pub fn surviving_count(&self) -> usize {
        self.surviving().count()
    }
}

/// Copies source content into the workspace and drives a [`Stager`] through
/// a [`Plan`].
pub struct Executor<'a> {
    copier: &'a dyn FileCopier,
    stager: &'a dyn Stager,
    source_root: &'a Path,
    destination_root: &'a Path,
    reporter: &'a dyn ProgressReporter,
    state: ExecutionState,
}

impl<'a> Executor<'a> {
    pub fn new(
        copier: &'a dyn FileCopier,
        stager: &'a dyn Stager,
        source_root: &'a Path,
        destination_root: &'a Path,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            copier,
            stager,
            source_root,
            destination_root,
            reporter,
            state: ExecutionState::Planned,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Run the plan. Per-path failures are collected in the report; a stager
    /// error stops execution and leaves the report in `Failed`.
    pub fn execute(&mut self, plan: &Plan) -> ExecutionReport {
        let mut report = ExecutionReport::new();
        match self.run(plan, &mut report) {
            Ok(()) => self.transition(ExecutionState::Done),
            Err(e) => {
                error!("Execution stopped while {:?}: {}", self.state, e);
                report.failure = Some(e.to_string());
                self.transition(ExecutionState::Failed);
            }
        }
        report.state = self.state;
        report
    }

    fn transition(&mut self, next: ExecutionState) {
        debug!("Execution state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn run(&mut self, plan: &Plan, report: &mut ExecutionReport) -> Result<(), Error> {
        self.transition(ExecutionState::Copying);
        let failed_copies = self.copy_files(plan, report);

        self.transition(ExecutionState::Staged);
        let edited = self.stage(plan, &failed_copies, report)?;

        self.transition(ExecutionState::Reverting);
        self.revert(plan, &edited, report)
    }

    /// Copy every non-deferred add, edit and move target. Returns the paths
    /// that failed to copy.
    fn copy_files(&self, plan: &Plan, report: &mut ExecutionReport) -> HashSet<String> {
        let start = Instant::now();
        let jobs: Vec<&str> = plan
            .actions
            .iter()
            .filter_map(StagingAction::copy_path)
            .collect();
        let total = jobs.len();
        self.reporter.on_copy_start(total);
        info!("Copying {} files into the workspace...", total);

        let copier = self.copier;
        let reporter = self.reporter;
        let source_root = self.source_root;
        let destination_root = self.destination_root;
        let copied = AtomicUsize::new(0);

        let mut errors: Vec<PathError> = jobs
            .par_iter()
            .filter_map(|path| {
                let from = local_path(source_root, path);
                let to = local_path(destination_root, path);
                match copier.copy(&from, &to) {
                    Ok(()) => {
                        let n = copied.fetch_add(1, Ordering::Relaxed) + 1;
                        reporter.on_copy_progress(n, total);
                        None
                    }
                    Err(e) => {
                        error!("Failed to copy {}: {}", path, e);
                        Some(PathError::new(*path, PathErrorKind::Copy, e.to_string()))
                    }
                }
            })
            .collect();
        errors.sort_by(|a, b| a.path.cmp(&b.path));

        report.copied = copied.into_inner();
        self.reporter
            .on_copy_complete(report.copied, start.elapsed().as_secs_f64());
        debug!(
            "Copied {} files in {:.2}s ({} failed)",
            report.copied,
            start.elapsed().as_secs_f64(),
            errors.len()
        );

        let failed: HashSet<String> = errors.iter().map(|e| e.path.clone()).collect();
        report.skipped.extend(
            plan.actions
                .iter()
                .filter(|a| a.copy_path().map_or(false, |p| failed.contains(p)))
                .cloned(),
        );
        report.errors.extend(errors);
        failed
    }

    /// Issue staging calls: deletes, then moves, then adds, then edits.
    /// Returns the edit paths the stager accepted.
    fn stage(
        &self,
        plan: &Plan,
        failed_copies: &HashSet<String>,
        report: &mut ExecutionReport,
    ) -> Result<Vec<String>, Error> {
        let stager = self.stager;
        let copied = |action: &StagingAction| {
            action
                .copy_path()
                .map_or(true, |path| !failed_copies.contains(path))
        };

        let mut deletes = Vec::new();
        let mut moves = Vec::new();
        let mut adds = Vec::new();
        let mut edits = Vec::new();
        for action in &plan.actions {
            if !copied(action) {
                continue;
            }
            match action {
                StagingAction::Delete { path } => deletes.push((path.clone(), action.clone())),
                StagingAction::Move { .. } => moves.push(action.clone()),
                StagingAction::Add {
                    path,
                    deferred: true,
                } => {
                    debug!("Deferring add of {}", path);
                    report.deferred.push(path.clone());
                }
                StagingAction::Add { path, .. } => adds.push((path.clone(), action.clone())),
                StagingAction::Edit { path, .. } => edits.push((path.clone(), action.clone())),
                StagingAction::RevertIfUnchanged { .. } => {}
            }
        }

        self.stage_batch("delete", deletes, |paths| stager.delete(paths), report)?;

        if !moves.is_empty() {
            self.reporter.on_stage("move", moves.len());
        }
        for action in moves {
            if let StagingAction::Move { from, to } = &action {
                let errors = stager.move_file(from, to)?;
                if errors.is_empty() {
                    report.staged.push(action);
                } else {
                    report.errors.extend(errors);
                    report.skipped.push(action);
                }
            }
        }

        self.stage_batch("add", adds, |paths| stager.add(paths), report)?;
        self.stage_batch("edit", edits, |paths| stager.edit(paths), report)
    }

    fn stage_batch<F>(
        &self,
        operation: &str,
        batch: Vec<(String, StagingAction)>,
        run: F,
        report: &mut ExecutionReport,
    ) -> Result<Vec<String>, Error>
    where
        F: FnOnce(&[String]) -> Result<Vec<PathError>, Error>,
    {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let paths: Vec<String> = batch.iter().map(|(path, _)| path.clone()).collect();
        self.reporter.on_stage(operation, paths.len());
        info!("Staging {} {} actions...", paths.len(), operation);

        let errors = run(&paths)?;
        let failed: HashSet<String> = errors.iter().map(|e| e.path.clone()).collect();
        for error in &errors {
            warn!("{} failed: {}", operation, error);
        }
        report.errors.extend(errors);

        let mut accepted = Vec::with_capacity(batch.len());
        for (path, action) in batch {
            if failed.contains(&path) {
                report.skipped.push(action);
            } else {
                accepted.push(path);
                report.staged.push(action);
            }
        }
        Ok(accepted)
    }

    /// Revert every accepted edit whose workspace content matches the depot.
    fn revert(
        &self,
        plan: &Plan,
        edited: &[String],
        report: &mut ExecutionReport,
    ) -> Result<(), Error> {
        let accepted: HashSet<&str> = edited.iter().map(String::as_str).collect();
        let candidates: Vec<String> = plan
            .actions
            .iter()
            .filter_map(|a| match a {
                StagingAction::RevertIfUnchanged { paths } => Some(paths),
                _ => None,
            })
            .flatten()
            .filter(|p| accepted.contains(p.as_str()))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }

        info!("Reverting unchanged files among {} edits...", candidates.len());
        let reverted = self.stager.revert_unchanged(&candidates)?;
        let reverted_set: HashSet<&str> = reverted.iter().map(String::as_str).collect();

        for action in &plan.actions {
            if let StagingAction::Edit {
                path,
                expect_unchanged,
            } = action
            {
                if !accepted.contains(path.as_str()) {
                    continue;
                }
                match (*expect_unchanged, reverted_set.contains(path.as_str())) {
                    (true, false) => {
                        warn!("{} matched by digest but stayed open after revert", path)
                    }
                    (false, true) => debug!("{} reverted, content was identical", path),
                    _ => {}
                }
            }
        }

        self.reporter.on_revert_complete(reverted.len());
        info!("Reverted {} unchanged files", reverted.len());
        report.reverted = reverted;
        Ok(())
    }
}

use crate::config::AppConfig;
use crate::error::{Error, PathError};
use crate::hasher::{Digester, Md5Digester};
use crate::lister::{DepotLister, DestinationLister, GitLister, IgnoreRules, SourceLister};
use crate::model::{FileEntry, Inventory, Side};
use crate::p4::P4Connection;
use crate::platform;
use crate::process::ToolCommand;
use crate::progress::ProgressReporter;
use crate::reconcile::{self, CaseSensitivity, ReconcileStats, Reconciliation};
use crate::staging::{
    DryRunCopier, DryRunStager, ExecutionReport, Executor, FileCopier, FsCopier, P4Stager, Stager,
};
use chrono::{DateTime, Local};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Runs one harmonization of a git checkout into a Perforce stream.
pub struct Harmonizer {
    config: AppConfig,
    dry_run: bool,
}

#[derive(Debug)]
pub struct RunSummary {
    pub dry_run: bool,
    /// Resolved source commit hash.
    pub commit: String,
    pub changelist: Option<u32>,
    pub stats: ReconcileStats,
    /// Content checks that fell back to an edit.
    pub issues: Vec<PathError>,
    /// `None` when there was nothing to stage.
    pub report: Option<ExecutionReport>,
    pub second_pass_required: bool,
    pub list_duration: Duration,
    pub total_duration: Duration,
}

impl RunSummary {
    pub fn is_up_to_date(&self) -> bool {
        self.report.is_none()
    }

    pub fn is_success(&self) -> bool {
        self.issues.is_empty() && self.report.as_ref().map_or(true, ExecutionReport::is_success)
    }
}

impl Harmonizer {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Full pipeline:
    /// 1. Validate the destination (empty root, no client)
    /// 2. GitDependencies and stream client setup
    /// 3. List both sides and reconcile
    /// 4. Flush, open a pending changelist and execute the plan
    pub fn run(&self, reporter: &dyn ProgressReporter) -> Result<RunSummary, Error> {
        let start = Instant::now();
        self.config.validate()?;

        let source_root = PathBuf::from(&self.config.source.root);
        let destination_root = PathBuf::from(&self.config.destination.root);
        let stream = self.config.stream();
        let connection = P4Connection::new(&self.config.destination);

        self.validate_destination(&connection, &destination_root)?;
        let pool = build_pool(self.config.workers)?;

        if self.config.source.is_unreal {
            self.update_dependencies(&source_root)?;
        }

        let ignore = IgnoreRules::new(&self.config.source.ignore_patterns)?;
        let source = GitLister::new(
            &source_root,
            &self.config.source.commit,
            ignore.clone(),
            self.config.source.is_unreal,
        );
        let commit = source.verify_checkout()?;
        info!("Source commit: {}", commit);

        if self.dry_run {
            info!(
                "[dry run] create client {} for {} at {}",
                connection.client(),
                stream,
                destination_root.display()
            );
        } else {
            fs::create_dir_all(&destination_root)?;
            connection.create_stream_client(&self.config.destination.root, stream)?;
        }

        let case = match self.config.destination.case_sensitive {
            Some(sensitive) => sensitive,
            None => connection.is_case_sensitive()?,
        };
        let case = CaseSensitivity::from_sensitive(case);
        info!("Destination server is case {:?}", case);

        let destination = DepotLister::new(
            connection.clone(),
            stream,
            &self.config.destination.root,
            ignore,
        );
        let digester = Md5Digester::new(&source_root);

        let list_start = Instant::now();
        let reconciliation =
            pool.install(|| compare(&source, &destination, &digester, case, reporter))?;
        let list_duration = list_start.elapsed();

        let mut summary = RunSummary {
            dry_run: self.dry_run,
            commit,
            changelist: None,
            second_pass_required: reconciliation.plan.second_pass_required,
            stats: reconciliation.stats.clone(),
            issues: reconciliation.issues.clone(),
            report: None,
            list_duration,
            total_duration: Duration::ZERO,
        };

        if !reconciliation.stats.has_difference() {
            info!("All files in source and destination already match");
            summary.total_duration = start.elapsed();
            return Ok(summary);
        }

        let description = changelist_description(
            self.config.destination.description.as_deref(),
            &summary.commit,
            Local::now(),
        );
        let (copier, stager): (Box<dyn FileCopier>, Box<dyn Stager>) = if self.dry_run {
            info!("[dry run] flush {}/...", stream);
            info!("[dry run] create changelist:\n{}", description);
            (Box::new(DryRunCopier), Box::new(DryRunStager))
        } else {
            connection.flush(&format!("{}/...", stream))?;
            let change = connection.create_changelist(&description)?;
            info!("Created pending changelist {}", change);
            summary.changelist = Some(change);
            (
                Box::new(FsCopier),
                Box::new(P4Stager::new(connection, &destination_root, Some(change))),
            )
        };

        let report = pool.install(|| {
            apply(
                &reconciliation,
                copier.as_ref(),
                stager.as_ref(),
                &source_root,
                &destination_root,
                reporter,
            )
        });
        summary.report = Some(report);
        summary.total_duration = start.elapsed();
        debug!(
            "Run completed in {:.2}s",
            summary.total_duration.as_secs_f64()
        );
        Ok(summary)
    }

    /// Delete the destination client and its workspace directory.
    pub fn clean(&self) -> Result<(), Error> {
        self.config.validate()?;
        let connection = P4Connection::new(&self.config.destination);
        let destination_root = Path::new(&self.config.destination.root);

        if self.dry_run {
            info!("[dry run] delete client {}", connection.client());
            info!("[dry run] remove {}", destination_root.display());
            return Ok(());
        }

        connection.delete_client()?;
        if destination_root.exists() {
            info!("Deleting destination root: {}", destination_root.display());
            remove_workspace(destination_root)?;
        }
        Ok(())
    }

    fn validate_destination(&self, connection: &P4Connection, root: &Path) -> Result<(), Error> {
        if root.is_dir() && fs::read_dir(root)?.next().is_some() {
            return Err(Error::Validation(format!(
                "Destination root is not empty: {}. Run clean first",
                root.display()
            )));
        }
        if root.exists() && !root.is_dir() {
            return Err(Error::Validation(format!(
                "Destination root is not a directory: {}",
                root.display()
            )));
        }
        if connection.client_exists()? {
            return Err(Error::Validation(format!(
                "Destination client already exists: {}. Run clean first",
                connection.client()
            )));
        }
        Ok(())
    }

    fn update_dependencies(&self, source_root: &Path) -> Result<(), Error> {
        let executable = platform::git_dependencies_path(source_root);
        if !executable.is_file() {
            return Err(Error::Validation(format!(
                "GitDependencies not found: {}",
                executable.display()
            )));
        }
        if self.dry_run {
            info!("[dry run] {}", executable.display());
            return Ok(());
        }
        info!("Running {}", executable.display());
        ToolCommand::new(executable.to_string_lossy())
            .current_dir(source_root)
            .status()
    }
}

/// List both sides concurrently, build the inventories and reconcile them.
pub fn compare(
    source: &dyn SourceLister,
    destination: &dyn DestinationLister,
    digester: &dyn Digester,
    case: CaseSensitivity,
    reporter: &dyn ProgressReporter,
) -> Result<Reconciliation, Error> {
    let (source_inventory, destination_inventory) = rayon::join(
        || list_side(Side::Source, || source.list(), reporter),
        || list_side(Side::Destination, || destination.list(), reporter),
    );
    let source_inventory = source_inventory?;
    let destination_inventory = destination_inventory?;

    reconcile::reconcile(
        &source_inventory,
        &destination_inventory,
        digester,
        case,
        reporter,
    )
}

fn list_side<F>(side: Side, list: F, reporter: &dyn ProgressReporter) -> Result<Inventory, Error>
where
    F: FnOnce() -> Result<Vec<FileEntry>, Error>,
{
    let start = Instant::now();
    reporter.on_list_start(side);
    let inventory = Inventory::build(side, list()?)?;
    reporter.on_list_complete(side, inventory.len(), start.elapsed().as_secs_f64());
    Ok(inventory)
}

/// Copy and stage a reconciled plan.
pub fn apply(
    reconciliation: &Reconciliation,
    copier: &dyn FileCopier,
    stager: &dyn Stager,
    source_root: &Path,
    destination_root: &Path,
    reporter: &dyn ProgressReporter,
) -> ExecutionReport {
    let mut executor = Executor::new(copier, stager, source_root, destination_root, reporter);
    let report = executor.execute(&reconciliation.plan);
    if reconciliation.plan.second_pass_required {
        warn!(
            "{} case-only renames were split; submit this changelist and run again",
            report.deferred.len()
        );
    }
    report
}

pub fn changelist_description(custom: Option<&str>, commit: &str, now: DateTime<Local>) -> String {
    let headline = custom
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("Harmonize with git");
    format!(
        "{}\n\nSource commit: {}\nCreated by p4harmonize at {}",
        headline,
        commit,
        now.format("%Y-%m-%d %H:%M:%S")
    )
}

fn build_pool(workers: Option<usize>) -> Result<ThreadPool, Error> {
    let mut builder = ThreadPoolBuilder::new();
    if let Some(workers) = workers {
        builder = builder.num_threads(workers);
    }
    let pool = builder.build()?;
    debug!("Worker pool with {} threads", pool.current_num_threads());
    Ok(pool)
}

/// `remove_dir_all` that clears the read-only flag p4 leaves on synced files.
fn remove_workspace(root: &Path) -> Result<(), Error> {
    match fs::remove_dir_all(root) {
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            clear_read_only(root)?;
            fs::remove_dir_all(root)?;
            Ok(())
        }
        other => Ok(other?),
    }
}

fn clear_read_only(root: &Path) -> Result<(), Error> {
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(io::Error::from)?;
        let mut permissions = entry.metadata().map_err(io::Error::from)?.permissions();
        if permissions.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            permissions.set_readonly(false);
            fs::set_permissions(entry.path(), permissions)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_changelist_description() {
        let now = Local.with_ymd_and_hms(2024, 3, 1, 14, 5, 9).unwrap();
        let text = changelist_description(None, "abc123", now);
        assert!(text.starts_with("Harmonize with git\n\n"));
        assert!(text.contains("Source commit: abc123"));
        assert!(text.contains("2024-03-01 14:05:09"));

        let text = changelist_description(Some("  Weekly drop  "), "abc123", now);
        assert!(text.starts_with("Weekly drop\n"));
    }

    #[test]
    fn test_build_pool_honors_workers() {
        let pool = build_pool(Some(3)).unwrap();
        assert_eq!(pool.current_num_threads(), 3);
    }

    #[test]
    fn test_remove_workspace_with_read_only_files() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("ws");
        fs::create_dir_all(root.join("Engine")).unwrap();
        let file = root.join("Engine").join("synced.txt");
        fs::write(&file, "depot content").unwrap();
        let mut permissions = fs::metadata(&file).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&file, permissions).unwrap();

        remove_workspace(&root).unwrap();

        assert!(!root.exists());
    }
}

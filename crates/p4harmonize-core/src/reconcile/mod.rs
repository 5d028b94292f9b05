//! The reconciliation engine: classify the two inventories, resolve content
//! and case questions, and plan the staging actions.
//!
//! This is a pure function of two inventories plus an injected [`Digester`];
//! nothing here touches the destination.

pub mod classify;
pub mod plan;
pub mod resolve;

use crate::error::{Error, PathError};
use crate::hasher::{DigestCache, Digester};
use crate::model::{FileEntry, Inventory, Side};
use crate::progress::ProgressReporter;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub use classify::classify;
pub use plan::{plan, Plan, StagingAction};
pub use resolve::{resolve_case, resolve_content};

/// How the destination server compares client paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseSensitivity {
    Sensitive,
    Insensitive,
}

impl CaseSensitivity {
    pub fn from_sensitive(sensitive: bool) -> Self {
        if sensitive {
            CaseSensitivity::Sensitive
        } else {
            CaseSensitivity::Insensitive
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Only in the source.
    Add,
    /// Only in the destination.
    Delete,
    /// Case-only rename on a case-sensitive destination.
    Move,
    /// Same path on both sides, content not yet compared.
    EditCandidate,
    /// Same identity key, different case.
    CaseAmbiguous,
    RealEdit,
    Unchanged,
}

/// One classified path. Created by [`classify`], annotated by the resolvers,
/// consumed by [`plan`].
#[derive(Debug, Clone)]
pub struct ChangeRecord<'a> {
    pub key: &'a str,
    pub kind: ChangeKind,
    pub source: Option<&'a FileEntry>,
    pub destination: Option<&'a FileEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileStats {
    pub source_only: usize,
    pub destination_only: usize,
    pub case_mismatched: usize,
    pub real_edits: usize,
    pub unchanged: usize,
    pub digests_computed: usize,
    pub duration: Duration,
}

impl ReconcileStats {
    fn from_records(records: &[ChangeRecord<'_>]) -> Self {
        let mut stats = ReconcileStats::default();
        for record in records {
            match record.kind {
                ChangeKind::Add => stats.source_only += 1,
                ChangeKind::Delete => stats.destination_only += 1,
                ChangeKind::Move | ChangeKind::CaseAmbiguous => stats.case_mismatched += 1,
                ChangeKind::RealEdit | ChangeKind::EditCandidate => stats.real_edits += 1,
                ChangeKind::Unchanged => stats.unchanged += 1,
            }
        }
        stats
    }

    /// True when anything besides unchanged files needs staging.
    pub fn has_difference(&self) -> bool {
        self.source_only + self.destination_only + self.case_mismatched + self.real_edits > 0
    }
}

#[derive(Debug)]
pub struct Reconciliation {
    pub plan: Plan,
    /// Content checks that failed; those paths were planned as edits.
    pub issues: Vec<PathError>,
    pub stats: ReconcileStats,
}

/// Classify, resolve and plan. Digest work runs on the current rayon pool.
pub fn reconcile(
    source: &Inventory,
    destination: &Inventory,
    digester: &dyn Digester,
    case: CaseSensitivity,
    reporter: &dyn ProgressReporter,
) -> Result<Reconciliation, Error> {
    if source.side() != Side::Source || destination.side() != Side::Destination {
        return Err(Error::Other(
            "reconcile expects a source and a destination inventory".to_string(),
        ));
    }

    let start = Instant::now();
    info!(
        "Comparing {} source files against {} destination files...",
        source.len(),
        destination.len()
    );

    let mut records = classify(source, destination);

    let cache = DigestCache::new(digester);
    let issues = resolve_content(&mut records, &cache, reporter);
    resolve_case(&mut records, case);

    let mut stats = ReconcileStats::from_records(&records);
    stats.digests_computed = cache.computed();
    stats.duration = start.elapsed();

    let plan = plan(&records);

    info!("Source only: {}", stats.source_only);
    info!("Destination only: {}", stats.destination_only);
    info!("Case mismatch: {}", stats.case_mismatched);
    info!("Content changed: {}", stats.real_edits);
    debug!(
        "Finished comparison in {:.2}s ({} unchanged, {} digests computed)",
        stats.duration.as_secs_f64(),
        stats.unchanged,
        stats.digests_computed
    );

    Ok(Reconciliation {
        plan,
        issues,
        stats,
    })
}

use super::{CaseSensitivity, ChangeKind, ChangeRecord};
use crate::error::{PathError, PathErrorKind};
use crate::hasher::DigestCache;
use crate::model::FileEntry;
use crate::progress::ProgressReporter;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, error, trace};

/// Settle every `EditCandidate` as `RealEdit` or `Unchanged`.
///
/// Runs in parallel on the current rayon pool. A path whose source digest
/// cannot be computed is resolved as `RealEdit` and reported.
pub fn resolve_content(
    records: &mut [ChangeRecord<'_>],
    cache: &DigestCache<'_>,
    reporter: &dyn ProgressReporter,
) -> Vec<PathError> {
    let start = Instant::now();
    let total = records
        .iter()
        .filter(|r| r.kind == ChangeKind::EditCandidate)
        .count();
    reporter.on_resolve_start(total);

    let done = AtomicUsize::new(0);
    let mut issues: Vec<PathError> = records
        .par_iter_mut()
        .filter(|r| r.kind == ChangeKind::EditCandidate)
        .filter_map(|record| {
            let (kind, issue) = match (record.source, record.destination) {
                (Some(source), Some(destination)) => resolve_pair(source, destination, cache),
                _ => (ChangeKind::RealEdit, None),
            };
            record.kind = kind;
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            reporter.on_resolve_progress(n, total);
            issue
        })
        .collect();
    issues.sort_by(|a, b| a.path.cmp(&b.path));

    reporter.on_resolve_complete(cache.computed(), start.elapsed().as_secs_f64());
    debug!(
        "Resolved {} edit candidates in {:.2}s",
        total,
        start.elapsed().as_secs_f64()
    );
    issues
}

/// Content decision for one path present on both sides with the same case.
///
/// The destination's type decides the comparison: only `binary` types
/// report a size that must match the source byte for byte, and the depot
/// digest covers normalized line endings for text and utf8 types.
fn resolve_pair(
    source: &FileEntry,
    destination: &FileEntry,
    cache: &DigestCache<'_>,
) -> (ChangeKind, Option<PathError>) {
    if destination.has_exact_size() && source.size != destination.size {
        trace!(
            "{}: size {} vs {}, skipping digest",
            source.path,
            source.size,
            destination.size
        );
        return (ChangeKind::RealEdit, None);
    }

    let Some(expected) = &destination.digest else {
        trace!("{}: no destination digest", destination.path);
        return (ChangeKind::RealEdit, None);
    };

    match cache.get_or_compute(source, destination.has_normalized_digest()) {
        Ok(actual) if &actual == expected => (ChangeKind::Unchanged, None),
        Ok(_) => (ChangeKind::RealEdit, None),
        Err(e) => {
            error!("Failed to compute digest for {}: {}", source.path, e);
            let issue = PathError::new(&source.path, PathErrorKind::ContentCheck, e.to_string());
            (ChangeKind::RealEdit, Some(issue))
        }
    }
}

/// Settle every `CaseAmbiguous` record for the destination's case rules.
///
/// A case-sensitive server can rename in place, so the record becomes a
/// `Move`. A case-insensitive server keeps `CaseAmbiguous`, which plans as a
/// delete plus a deferred add.
pub fn resolve_case(records: &mut [ChangeRecord<'_>], case: CaseSensitivity) {
    if case == CaseSensitivity::Insensitive {
        return;
    }
    for record in records
        .iter_mut()
        .filter(|r| r.kind == ChangeKind::CaseAmbiguous)
    {
        record.kind = ChangeKind::Move;
    }
}

use crate::model::Side;

/// Trait for reporting run progress.
///
/// The CLI implements it with indicatif bars. All methods have default no-op
/// implementations, and every method may be called from worker threads.
pub trait ProgressReporter: Send + Sync {
    fn on_list_start(&self, _side: Side) {}
    fn on_list_complete(&self, _side: Side, _total_files: usize, _duration_secs: f64) {}
    fn on_resolve_start(&self, _candidates: usize) {}
    fn on_resolve_progress(&self, _resolved: usize, _candidates: usize) {}
    fn on_resolve_complete(&self, _digests_computed: usize, _duration_secs: f64) {}
    fn on_copy_start(&self, _total_files: usize) {}
    fn on_copy_progress(&self, _copied: usize, _total_files: usize) {}
    fn on_copy_complete(&self, _copied: usize, _duration_secs: f64) {}
    fn on_stage(&self, _operation: &str, _paths: usize) {}
    fn on_revert_complete(&self, _reverted: usize) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

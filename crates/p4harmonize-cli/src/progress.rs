use indicatif::{ProgressBar, ProgressStyle};
use p4harmonize_core::{ProgressReporter, Side};
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Spinners while listing, bars while hashing and copying.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn update(&self, position: usize, length: usize) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                if pb.length() != Some(length as u64) {
                    pb.set_length(length as u64);
                }
                pb.set_position(position as u64);
            }
        }
    }

    fn println(&self, message: String) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.println(message);
                return;
            }
        }
        eprintln!("{}", message);
    }

    fn spinner(&self, message: String) {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(TICK_CHARS);
        pb.set_style(style);
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn bar(&self, label: &str, length: usize) {
        let pb = ProgressBar::new(length as u64);
        let template = format!(
            "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} files ({{eta}} remaining)",
            label
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─")
            .tick_chars(TICK_CHARS);
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }
}

impl ProgressReporter for CliReporter {
    fn on_list_start(&self, side: Side) {
        // both sides list at once; one spinner covers them
        if side == Side::Source {
            self.spinner("Listing source and destination files...".to_string());
        }
    }

    fn on_list_complete(&self, side: Side, total_files: usize, duration_secs: f64) {
        self.println(format!(
            "  \x1b[32m✓\x1b[0m Listed {} {} files in {:.2}s",
            total_files, side, duration_secs
        ));
    }

    fn on_resolve_start(&self, candidates: usize) {
        self.bar("Comparing", candidates);
    }

    fn on_resolve_progress(&self, resolved: usize, candidates: usize) {
        self.update(resolved, candidates);
    }

    fn on_resolve_complete(&self, digests_computed: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Compare complete: {} digests computed in {:.2}s",
            digests_computed, duration_secs
        );
    }

    fn on_copy_start(&self, total_files: usize) {
        self.bar("Copying", total_files);
    }

    fn on_copy_progress(&self, copied: usize, total_files: usize) {
        self.update(copied, total_files);
    }

    fn on_copy_complete(&self, copied: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Copy complete: {} files in {:.2}s",
            copied, duration_secs
        );
    }

    fn on_stage(&self, operation: &str, paths: usize) {
        self.finish_bar();
        eprintln!("  \x1b[36m→\x1b[0m p4 {}: {} files", operation, paths);
    }

    fn on_revert_complete(&self, reverted: usize) {
        eprintln!("  \x1b[32m✓\x1b[0m Reverted {} unchanged files", reverted);
    }
}

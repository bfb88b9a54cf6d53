use indicatif::{ProgressBar, ProgressStyle};
use pixel_duper_core::{Phase, ProgressReporter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// Directory walk and cache save get a spinner; each pipeline phase gets a
/// bar tracking how many items have been handed to the workers.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.slot();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.slot().take() {
            pb.finish_and_clear();
        }
    }

    fn spinner(&self, msg: &'static str) {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style.tick_chars(TICK_CHARS));
        pb.set_message(msg);
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Hash => "Hashing",
        Phase::Process => "Fingerprinting",
        Phase::Match => "Matching",
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self) {
        self.spinner("Scanning files...");
    }

    fn on_scan_complete(&self, total_files: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Scan complete: {} files in {:.2}s",
            total_files, duration_secs
        );
    }

    fn on_phase_start(&self, phase: Phase, total: usize) {
        let template = format!(
            "  {{spinner:.cyan}} {:<14} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} ({{eta}} remaining)",
            phase_label(phase)
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let pb = ProgressBar::new(total as u64);
        pb.set_style(style.progress_chars("━╸─").tick_chars(TICK_CHARS));
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_phase_progress(&self, _phase: Phase, queued: usize, _total: usize) {
        if let Some(pb) = self.slot().as_ref() {
            pb.set_position(queued as u64);
        }
    }

    fn on_phase_complete(&self, phase: Phase, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m {} complete in {:.2}s",
            phase_label(phase),
            duration_secs
        );
    }

    fn on_cache_saved(&self, entries: usize, duration_secs: f64) {
        eprintln!(
            "  \x1b[32m✓\x1b[0m Cache saved: {} entries in {:.2}s",
            entries, duration_secs
        );
    }
}

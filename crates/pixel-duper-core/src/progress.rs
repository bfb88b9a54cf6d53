use crate::pipeline::Phase;

/// Trait for reporting scan progress.
///
/// The CLI implements it with indicatif progress bars. All methods have
/// default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_scan_complete(&self, _total_files: usize, _duration_secs: f64) {}
    /// `total` items are about to be queued for `phase`.
    fn on_phase_start(&self, _phase: Phase, _total: usize) {}
    /// `queued` of `total` items have been handed to the workers.
    fn on_phase_progress(&self, _phase: Phase, _queued: usize, _total: usize) {}
    /// Every worker has left `phase`.
    fn on_phase_complete(&self, _phase: Phase, _duration_secs: f64) {}
    fn on_cache_saved(&self, _entries: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

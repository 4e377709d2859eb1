/// Trait for reporting pipeline progress.
///
/// Presentation layers implement this however they render (progress bars,
/// logs, GUI events). All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_fingerprint_start(&self, _total: usize) {}
    fn on_fingerprint_progress(&self, _done: usize, _path: &str) {}
    fn on_fingerprint_complete(&self, _fingerprinted: usize, _duration_secs: f64) {}
    fn on_grouping_complete(&self, _groups: usize) {}
    fn on_recommend_complete(&self, _recommendations: usize) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

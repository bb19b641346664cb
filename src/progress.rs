use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Capability handed into long-running work (directory scans, waveform
/// builds) by the host. The library polls `is_cancelled` at checkpoints and
/// reports coarse progress; it never references a concrete UI type.
pub trait ProgressHandle {
    fn is_cancelled(&self) -> bool {
        false
    }

    fn set_total(&self, _total: u64) {}

    fn advance(&self, _delta: u64) {}
}

/// No-op handle for callers that don't track progress.
pub struct Silent;

impl ProgressHandle for Silent {}

/// Cancellation-only handle backed by a shared flag. Clones observe the same
/// flag, so the host can keep one end and pass the other into a scan.
#[derive(Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl ProgressHandle for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

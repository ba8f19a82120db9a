use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-process, non-reentrant flag that keeps reconciliation runs from
/// overlapping. It does not coordinate across processes.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    busy: Arc<AtomicBool>,
}

/// Held for the duration of a run; releases the guard on drop.
#[derive(Debug)]
pub struct RunPermit {
    busy: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the guard, or `None` if a run is already in progress.
    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

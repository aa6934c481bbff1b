use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Read-only "session is open" predicate shared with the shaper thread.
/// Only the orchestrator flips it.
#[derive(Debug, Clone, Default)]
pub struct SessionGate {
    open: Arc<AtomicBool>,
}

impl SessionGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, open: bool) {
        self.open.store(open, Ordering::Release);
    }
}

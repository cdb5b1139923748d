use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// External request to end a recording early. Polled once per capture-loop iteration.
pub trait CancellationSignal: Send + Sync {
    fn is_requested(&self) -> bool;

    /// Clear the request once the capture loop has observed it.
    fn acknowledge(&self);
}

/// In-process cancellation flag. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl CancellationSignal for CancellationFlag {
    fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn acknowledge(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Request-level cancellation flag shared between the requester and the
/// thread doing the slow work (scan, connect, model load).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The one cancellable request currently in progress, reachable from another
/// thread (the console reader cancels a connect the control thread is
/// blocked in).
#[derive(Debug, Clone, Default)]
pub struct ActiveRequest(Arc<Mutex<Option<CancelToken>>>);

impl ActiveRequest {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<CancelToken>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new request and return its token.
    pub fn begin(&self) -> CancelToken {
        let token = CancelToken::new();
        *self.slot() = Some(token.clone());
        token
    }

    pub fn finish(&self) {
        self.slot().take();
    }

    /// Cancel the active request, if any. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        match self.slot().take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot().is_some()
    }
}

//! Process-wide run-lock.
//!
//! At most one supergraph run or stop-all may be in flight. The lock is a
//! one-permit semaphore; holding a [`RunPermit`] means holding the lock.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Proof of holding the run-lock. Dropping it releases the lock.
pub struct RunPermit {
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for RunPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunPermit").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct RunLock {
    semaphore: Arc<Semaphore>,
}

impl RunLock {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Take the lock without waiting. Returns `None` when it is held.
    pub fn try_acquire(&self) -> Option<RunPermit> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        debug!("Run-lock acquired");
        Some(RunPermit { _permit: permit })
    }

    pub fn is_held(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

impl Default for RunLock {
    fn default() -> Self {
        Self::new()
    }
}

//! Non-blocking admission permits backed by a tokio semaphore

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded count of objects admitted but not yet persisted
///
/// A permit travels with its task and is returned when dropped.
#[derive(Debug)]
pub(crate) struct Permits {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl Permits {
    pub(crate) fn new(limit: usize) -> Self {
        let limit = limit.min(Semaphore::MAX_PERMITS);
        Self { semaphore: Arc::new(Semaphore::new(limit)), limit }
    }

    /// Take a permit if one is free; never waits
    pub(crate) fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).try_acquire_owned().ok()
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.limit.saturating_sub(self.semaphore.available_permits())
    }
}

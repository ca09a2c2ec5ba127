//! Admission and persistence counters

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Why an object was not admitted for persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Hub has been shut down
    Closed,
    /// Admission limit reached
    Saturated,
    /// Worker pool refused the task; the hub closes itself
    PoolUnavailable,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DropReason::Closed => "hub closed",
            DropReason::Saturated => "admission limit reached",
            DropReason::PoolUnavailable => "worker pool unavailable",
        })
    }
}

/// Point-in-time copy of a hub's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub accepted: u64,
    pub dropped: u64,
    pub persisted: u64,
    pub failed: u64,
}

impl HubStats {
    /// Accepted objects whose persistence task has not finished yet
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.accepted.saturating_sub(self.persisted + self.failed)
    }
}

impl fmt::Display for HubStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accepted={} dropped={} persisted={} failed={}",
            self.accepted, self.dropped, self.persisted, self.failed
        )
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    accepted: AtomicU64,
    dropped: AtomicU64,
    persisted: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    pub(crate) fn accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> HubStats {
        HubStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

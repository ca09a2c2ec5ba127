//! The hub: admission, dispatch and lifecycle

use log::{debug, error, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;

use super::config::HubConfig;
use super::permits::Permits;
use super::pool::WorkerPool;
use super::scope::TraceScope;
use super::stats::{Counters, DropReason, HubStats};
use super::storage::{FileStorage, NullStorage, Storage};
use crate::domain::{HubError, HubId, InspectError, TraceError, TraceId};
use crate::inspector::{Inspector, ProcfsInspector};
use crate::spans::SpanTracker;
use crate::trails::{Record, Snapshot, Trace, UserData};

/// State shared with persistence tasks
///
/// Kept apart from the pool so a task never holds the last reference to the
/// thread that runs it.
struct Ledger {
    hub_id: HubId,
    closed: AtomicBool,
    permits: Permits,
    counters: Counters,
    storage: Arc<dyn Storage>,
}

impl Ledger {
    fn drop_object(&self, record: &Record, reason: DropReason) {
        self.counters.dropped();
        warn!("Hub {} has dropped {} {} ({reason})", self.hub_id, record.kind(), record.oid());
    }

    fn persist(&self, record: &Record, permit: OwnedSemaphorePermit) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.storage.persist(record)));
        match outcome {
            Ok(Ok(())) => self.counters.persisted(),
            Ok(Err(e)) => {
                self.counters.failed();
                error!("Hub {} could not save {} {}: {e}", self.hub_id, record.kind(), record.oid());
            }
            Err(_) => {
                self.counters.failed();
                error!("Hub {} could not save {} {}: storage panicked", self.hub_id, record.kind(), record.oid());
            }
        }
        // Permits are left taken once closed; process teardown reclaims them.
        if self.closed.load(Ordering::Acquire) {
            permit.forget();
        }
    }
}

struct Inner {
    enabled: AtomicBool,
    shut_down: AtomicBool,
    compress: bool,
    ledger: Arc<Ledger>,
    pool: WorkerPool,
    inspector: Arc<dyn Inspector>,
    tracker: Arc<SpanTracker>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        shutdown(self);
    }
}

fn shutdown(inner: &Inner) {
    if inner.shut_down.swap(true, Ordering::AcqRel) {
        return;
    }
    inner.ledger.closed.store(true, Ordering::Release);
    debug!("Hub {} closing", inner.ledger.hub_id);
    inner.pool.shutdown();
    debug!("Hub {} closed ({})", inner.ledger.hub_id, inner.ledger.counters.snapshot());
}

/// Accepts finished traces and snapshots and persists them asynchronously
///
/// Cheap to clone; all clones share one admission state and worker pool.
/// The pool is drained and joined by [`Hub::shutdown`], or when the last clone
/// is dropped.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<Inner>,
}

/// Assembles a [`Hub`] with optional replacement collaborators
pub struct HubBuilder {
    config: HubConfig,
    storage: Option<Arc<dyn Storage>>,
    inspector: Option<Arc<dyn Inspector>>,
    tracker: Option<Arc<SpanTracker>>,
}

impl HubBuilder {
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    #[must_use]
    pub fn with_inspector(mut self, inspector: Arc<dyn Inspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<SpanTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Validate the output directory (for file storage) and start the workers
    ///
    /// # Errors
    /// [`HubError::NotADirectory`], [`HubError::NotWritable`] or
    /// [`HubError::WorkerSpawn`].
    pub fn build(self) -> Result<Hub, HubError> {
        let config = self.config;
        let storage = match self.storage {
            Some(storage) => storage,
            None => {
                FileStorage::validate(&config.output_dir)?;
                Arc::new(FileStorage::new(&config.output_dir, config.compress))
            }
        };
        let hub_id = HubId::generate();
        let pool = WorkerPool::new(config.num_workers.max(1), "chemtrails-worker").map_err(HubError::WorkerSpawn)?;
        debug!(
            "Hub {hub_id} started: {} workers, {} in flight, output {}",
            pool.size(),
            config.max_in_flight,
            config.output_dir.display()
        );
        Ok(Hub::assemble(
            hub_id,
            &config,
            storage,
            pool,
            self.inspector.unwrap_or_else(|| Arc::new(ProcfsInspector::new())),
            self.tracker.unwrap_or_else(SpanTracker::global),
        ))
    }
}

impl Hub {
    /// Hub writing archive files into `config.output_dir`
    ///
    /// # Errors
    /// See [`HubBuilder::build`].
    pub fn new(config: HubConfig) -> Result<Self, HubError> {
        Self::builder(config).build()
    }

    #[must_use]
    pub fn builder(config: HubConfig) -> HubBuilder {
        HubBuilder { config, storage: None, inspector: None, tracker: None }
    }

    /// A closed hub with no workers: every operation is a no-op
    #[must_use]
    pub fn inert() -> Self {
        let config = HubConfig::new(std::env::temp_dir()).with_enabled(false);
        let hub = Self::assemble(
            HubId::generate(),
            &config,
            Arc::new(NullStorage),
            WorkerPool::closed(),
            Arc::new(ProcfsInspector::new()),
            SpanTracker::global(),
        );
        hub.inner.ledger.closed.store(true, Ordering::Release);
        hub.inner.shut_down.store(true, Ordering::Release);
        hub
    }

    fn assemble(
        hub_id: HubId,
        config: &HubConfig,
        storage: Arc<dyn Storage>,
        pool: WorkerPool,
        inspector: Arc<dyn Inspector>,
        tracker: Arc<SpanTracker>,
    ) -> Self {
        let ledger = Ledger {
            hub_id,
            closed: AtomicBool::new(false),
            permits: Permits::new(config.max_in_flight),
            counters: Counters::default(),
            storage,
        };
        Self {
            inner: Arc::new(Inner {
                enabled: AtomicBool::new(config.enabled),
                shut_down: AtomicBool::new(false),
                compress: config.compress,
                ledger: Arc::new(ledger),
                pool,
                inspector,
                tracker,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> HubId {
        self.inner.ledger.hub_id
    }

    pub fn enable(&self) {
        if !self.inner.enabled.swap(true, Ordering::AcqRel) {
            debug!("Hub {} enabled", self.id());
        }
    }

    /// Stop creating new traces and snapshots; in-flight work continues
    pub fn disable(&self) {
        if self.inner.enabled.swap(false, Ordering::AcqRel) {
            debug!("Hub {} disabled", self.id());
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.ledger.closed.load(Ordering::Acquire)
    }

    /// Enabled and not closed
    #[must_use]
    pub fn is_working(&self) -> bool {
        self.is_enabled() && !self.is_closed()
    }

    #[must_use]
    pub fn compresses(&self) -> bool {
        self.inner.compress
    }

    #[must_use]
    pub fn tracker(&self) -> &Arc<SpanTracker> {
        &self.inner.tracker
    }

    #[must_use]
    pub fn stats(&self) -> HubStats {
        self.inner.ledger.counters.snapshot()
    }

    /// Objects admitted whose persistence has not finished
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.ledger.permits.in_flight()
    }

    /// Capture a snapshot now and submit it; no-op unless working
    ///
    /// # Errors
    /// Inspector failure, raised to the caller.
    pub fn take_snapshot(&self) -> Result<(), InspectError> {
        if !self.is_working() {
            return Ok(());
        }
        let snapshot = Snapshot::capture(self.id(), self.inner.inspector.as_ref())?;
        self.send_object(snapshot);
        Ok(())
    }

    /// Open a traced region
    ///
    /// Without a `trace_id`, the caller's `file:line` is used. When the hub
    /// is not working the returned scope is inert and records nothing.
    ///
    /// # Errors
    /// Failure to capture the opening snapshot.
    #[track_caller]
    pub fn trace(&self, trace_id: Option<TraceId>, with_snapshot: bool) -> Result<TraceScope, TraceError> {
        if !self.is_working() {
            return Ok(TraceScope::inert());
        }
        let trace_id = trace_id.unwrap_or_else(|| TraceId::from_location(std::panic::Location::caller()));
        let mut trace = Trace::new(self.id(), trace_id, with_snapshot);
        trace.enter(&self.inner.tracker, self.inner.inspector.as_ref())?;
        Ok(TraceScope::active(self.clone(), trace))
    }

    /// Run `body` inside a traced region
    ///
    /// The region is closed and submitted even if `body` panics.
    ///
    /// # Errors
    /// Snapshot capture or span discipline failures of the region itself.
    #[track_caller]
    pub fn traced<R>(
        &self,
        trace_id: Option<TraceId>,
        with_snapshot: bool,
        body: impl FnOnce(&mut UserData) -> R,
    ) -> Result<R, TraceError> {
        let mut scope = self.trace(trace_id, with_snapshot)?;
        let output = body(scope.user());
        scope.finish()?;
        Ok(output)
    }

    /// Close a trace opened by [`Hub::trace`] and submit it
    ///
    /// The trace is submitted even when the pop fails.
    pub(crate) fn complete(&self, mut trace: Trace) -> Result<(), TraceError> {
        let result = trace.exit(&self.inner.tracker, self.inner.inspector.as_ref());
        self.send_object(trace);
        result
    }

    /// Submit a finished object for asynchronous persistence
    ///
    /// Never blocks and never fails: an object that cannot be admitted is
    /// dropped with a warning. Returns whether it was admitted.
    pub fn send_object(&self, object: impl Into<Record>) -> bool {
        let record = object.into();
        let ledger = &self.inner.ledger;
        if ledger.closed.load(Ordering::Acquire) {
            ledger.drop_object(&record, DropReason::Closed);
            return false;
        }
        let Some(permit) = ledger.permits.try_acquire() else {
            ledger.drop_object(&record, DropReason::Saturated);
            return false;
        };

        let (kind, oid) = (record.kind(), record.oid().clone());
        let task_ledger = Arc::clone(ledger);
        let submitted = self.inner.pool.submit(Box::new(move || task_ledger.persist(&record, permit)));
        match submitted {
            Ok(()) => {
                ledger.counters.accepted();
                true
            }
            Err(_task) => {
                ledger.closed.store(true, Ordering::Release);
                ledger.counters.dropped();
                warn!("Hub {} has dropped {kind} {oid} ({})", ledger.hub_id, DropReason::PoolUnavailable);
                false
            }
        }
    }

    /// Stop admitting objects, wait for in-flight persistence, stop workers
    ///
    /// Idempotent; later calls return immediately.
    pub fn shutdown(&self) {
        shutdown(&self.inner);
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("id", &self.id())
            .field("enabled", &self.is_enabled())
            .field("closed", &self.is_closed())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

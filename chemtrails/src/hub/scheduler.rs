//! Periodic snapshots on a background thread

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{debug, warn};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::instance::Hub;

/// Calls [`Hub::take_snapshot`] every `period`
pub struct Scheduler {
    hub: Hub,
    period: Duration,
    limit: Option<u64>,
}

impl Scheduler {
    #[must_use]
    pub fn new(hub: Hub, period: Duration) -> Self {
        Self { hub, period, limit: None }
    }

    /// Stop by itself after `ticks` snapshots
    #[must_use]
    pub fn with_limit(mut self, ticks: u64) -> Self {
        self.limit = Some(ticks);
        self
    }

    /// Spawn the scheduler thread; the first tick fires after one period
    ///
    /// # Errors
    /// Thread spawn failure.
    pub fn start(self) -> io::Result<SchedulerHandle> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = thread::Builder::new().name("chemtrails-scheduler".to_string()).spawn(move || {
            let mut ticks = 0u64;
            while self.limit.map_or(true, |limit| ticks < limit) {
                match stop_rx.recv_timeout(self.period) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                ticks += 1;
                if let Err(e) = self.hub.take_snapshot() {
                    warn!("Hub {} periodic snapshot failed: {e}", self.hub.id());
                }
            }
            debug!("Scheduler for hub {} stopped after {ticks} ticks", self.hub.id());
            ticks
        })?;
        Ok(SchedulerHandle { stop: Some(stop_tx), thread: Some(thread) })
    }
}

/// Running scheduler; dropping it stops the thread
pub struct SchedulerHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<u64>>,
}

impl SchedulerHandle {
    /// Stop now and return the number of ticks that ran
    pub fn stop(mut self) -> u64 {
        self.shut(true)
    }

    /// Wait for a limited scheduler to finish on its own
    ///
    /// Blocks forever if no limit was set.
    pub fn wait(mut self) -> u64 {
        self.shut(false)
    }

    fn shut(&mut self, interrupt: bool) -> u64 {
        let stop = self.stop.take();
        if interrupt {
            if let Some(stop) = &stop {
                let _ = stop.try_send(());
            }
        }
        let ticks = self.thread.take().and_then(|thread| thread.join().ok()).unwrap_or(0);
        drop(stop);
        ticks
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shut(true);
    }
}

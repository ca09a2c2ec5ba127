//! Fixed-size pool of persistence threads

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// Worker threads fed from one shared channel
///
/// Queue depth is bounded by the hub's admission permits, not by the channel.
pub(crate) struct WorkerPool {
    sender: RwLock<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `size` named workers
    ///
    /// A size of zero yields a pool that rejects every task.
    pub(crate) fn new(size: usize, name: &str) -> io::Result<Self> {
        if size == 0 {
            return Ok(Self::closed());
        }
        let (sender, receiver) = unbounded::<Task>();
        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = receiver.clone();
            let spawned = thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || run_worker(&receiver));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Let the already running workers exit before reporting.
                    drop(sender);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self { sender: RwLock::new(Some(sender)), workers: Mutex::new(workers) })
    }

    pub(crate) fn closed() -> Self {
        Self { sender: RwLock::new(None), workers: Mutex::new(Vec::new()) }
    }

    /// Hand a task to the workers without waiting
    ///
    /// The task is returned if the pool is shutting down or shut down.
    pub(crate) fn submit(&self, task: Task) -> Result<(), Task> {
        let Ok(guard) = self.sender.try_read() else {
            return Err(task);
        };
        match guard.as_ref() {
            Some(sender) => sender.send(task).map_err(|e| e.into_inner()),
            None => Err(task),
        }
    }

    /// Stop accepting tasks, let workers drain the queue, then join them
    ///
    /// Safe to call more than once.
    pub(crate) fn shutdown(&self) {
        let sender = self.sender.write().unwrap_or_else(PoisonError::into_inner).take();
        drop(sender);
        let workers: Vec<_> = self.workers.lock().unwrap_or_else(PoisonError::into_inner).drain(..).collect();
        for handle in workers {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!("Worker {name} terminated abnormally");
            }
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn run_worker(receiver: &Receiver<Task>) {
    while let Ok(task) = receiver.recv() {
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!("Persistence task panicked");
        }
    }
    debug!("{} exiting", thread::current().name().unwrap_or("worker"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_shutdown_drains_queue() {
        let pool = WorkerPool::new(2, "test-pool").unwrap();
        assert_eq!(pool.size(), 2);
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let done = Arc::clone(&done);
            assert!(pool
                .submit(Box::new(move || {
                    done.fetch_add(1, Ordering::SeqCst);
                }))
                .is_ok());
        }
        pool.shutdown();
        assert_eq!(done.load(Ordering::SeqCst), 50);
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let pool = WorkerPool::new(1, "test-pool").unwrap();
        pool.shutdown();
        pool.shutdown();
        assert!(pool.submit(Box::new(|| {})).is_err());
        assert!(WorkerPool::closed().submit(Box::new(|| {})).is_err());
    }

    #[test]
    fn test_panicking_task_keeps_worker_alive() {
        let pool = WorkerPool::new(1, "test-pool").unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        assert!(pool.submit(Box::new(|| panic!("boom"))).is_ok());
        let counter = Arc::clone(&done);
        assert!(pool
            .submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .is_ok());
        pool.shutdown();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}

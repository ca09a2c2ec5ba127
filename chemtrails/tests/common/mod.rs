//! Shared fixtures for integration tests

#![allow(dead_code)]

use chemtrails::domain::{InspectError, PersistError};
use chemtrails::hub::{FileStorage, Storage};
use chemtrails::inspector::{Inspector, IoProbe, MemoryProbe, Probe, ProcessProbe};
use chemtrails::Record;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Inspector returning a fixed, cheap payload
pub fn fixed_inspector() -> Arc<dyn Inspector> {
    Arc::new(|| -> Result<Vec<Probe>, InspectError> {
        Ok(vec![
            Probe::Process(ProcessProbe { utime: 10, stime: 5, clock_ticks: 100, ..ProcessProbe::default() }),
            Probe::Memory(MemoryProbe { rss: 8 << 20, private_dirty: 1 << 20, ..MemoryProbe::default() }),
            Probe::Io(IoProbe::default()),
        ])
    })
}

/// File storage that holds every write until the gate opens
///
/// Each `release()` lets one write through; dropping the returned sender
/// opens the gate for good.
pub struct GatedStorage {
    inner: FileStorage,
    gate: Receiver<()>,
}

impl GatedStorage {
    pub fn new(dir: &Path) -> (Arc<Self>, Sender<()>) {
        let (tx, rx) = unbounded();
        (Arc::new(Self { inner: FileStorage::new(dir, false), gate: rx }), tx)
    }
}

impl Storage for GatedStorage {
    fn persist(&self, record: &Record) -> Result<(), PersistError> {
        let _ = self.gate.recv();
        self.inner.persist(record)
    }
}

pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("Failed to read output dir")
        .map(|entry| entry.expect("Failed to read dir entry").path())
        .collect();
    paths.sort();
    paths
}

pub fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    files_in(dir)
        .into_iter()
        .filter(|p| p.extension().is_some_and(|e| e == extension))
        .collect()
}

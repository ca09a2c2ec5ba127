//! Destinations for persisted objects

use log::debug;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::archive;
use crate::domain::{HubError, PersistError};
use crate::trails::Record;

/// Where worker tasks write finished objects
///
/// Called from worker threads only; implementations may block.
pub trait Storage: Send + Sync {
    /// Persist one record
    ///
    /// # Errors
    /// Any failure is reported back to the worker, which logs and counts it.
    fn persist(&self, record: &Record) -> Result<(), PersistError>;
}

/// Longest trace id fragment kept in a file name
pub const MAX_TRACE_ID_IN_NAME: usize = 100;

/// Deterministic, collision-free file name for a record
///
/// `{hub_id}_{trace_id}_{oid}.trace` or `{hub_id}_{oid}.snapshot`. The trace
/// id is reduced to file-name-safe characters and cut to
/// [`MAX_TRACE_ID_IN_NAME`] so the name stays under `NAME_MAX`; uniqueness
/// comes from the oid.
#[must_use]
pub fn destination_name(record: &Record) -> String {
    let base = record.base();
    let extension = record.kind().extension();
    match record.trace_id() {
        Some(trace_id) => {
            let mut safe = trace_id.filesystem_safe();
            safe.truncate(MAX_TRACE_ID_IN_NAME);
            format!("{}_{safe}_{}.{extension}", base.hub_id(), base.oid())
        }
        None => format!("{}_{}.{extension}", base.hub_id(), base.oid()),
    }
}

/// One archive file per object under an output directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    compress: bool,
}

impl FileStorage {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, compress: bool) -> Self {
        Self { dir: dir.into(), compress }
    }

    /// Check that `dir` exists, is a directory and accepts new files
    ///
    /// # Errors
    /// [`HubError::NotADirectory`] or [`HubError::NotWritable`].
    pub fn validate(dir: &Path) -> Result<(), HubError> {
        match fs::metadata(dir) {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(HubError::NotADirectory(dir.to_path_buf())),
        }
        let probe = dir.join(format!(".chemtrails-probe-{}", std::process::id()));
        let created = OpenOptions::new().write(true).create(true).truncate(true).open(&probe);
        match created {
            Ok(file) => {
                drop(file);
                let _ = fs::remove_file(&probe);
                Ok(())
            }
            Err(source) => Err(HubError::NotWritable { path: dir.to_path_buf(), source }),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, record: &Record) -> PathBuf {
        self.dir.join(destination_name(record))
    }

    fn write(&self, path: &Path, file: File, record: &Record) -> Result<(), PersistError> {
        let mut writer = BufWriter::new(file);
        archive::save(&mut writer, record, self.compress).map_err(|source| PersistError::Archive {
            oid: record.oid().clone(),
            trace_id: record.trace_id().cloned(),
            source,
        })?;
        let file = writer.into_inner().map_err(|e| PersistError::Io {
            oid: record.oid().clone(),
            source: e.into_error(),
        })?;
        file.sync_data().map_err(|source| PersistError::Io { oid: record.oid().clone(), source })?;
        debug!("Saved {}", path.display());
        Ok(())
    }
}

impl Storage for FileStorage {
    fn persist(&self, record: &Record) -> Result<(), PersistError> {
        let path = self.path_for(record);
        // create_new: never overwrite, never share a destination.
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| PersistError::Io { oid: record.oid().clone(), source })?;
        let result = self.write(&path, file, record);
        if result.is_err() {
            let _ = fs::remove_file(&path);
        }
        result
    }
}

/// Accepts everything and keeps nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStorage;

impl Storage for NullStorage {
    fn persist(&self, _record: &Record) -> Result<(), PersistError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HubId, TraceId};
    use crate::trails::{Snapshot, Trace};

    #[test]
    fn test_destination_names() {
        let hub = HubId::generate();
        let trace = Record::from(Trace::new(hub, TraceId::new("src/app.rs:42"), false));
        let name = destination_name(&trace);
        assert!(name.starts_with(&format!("{hub}_src_app.rs_42_")));
        assert!(name.ends_with(&format!("{}.trace", trace.oid())));

        let snapshot = Record::from(Snapshot::new(hub, Vec::new()));
        assert_eq!(destination_name(&snapshot), format!("{hub}_{}.snapshot", snapshot.oid()));
    }

    #[test]
    fn test_long_trace_id_is_cut_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), true);
        let hub = HubId::generate();
        let record = Record::from(Trace::new(hub, TraceId::new("x".repeat(200)), false));

        let name = destination_name(&record);
        assert!(name.len() < 255, "file name is {} bytes", name.len());
        assert!(name.starts_with(&format!("{hub}_{}_", "x".repeat(MAX_TRACE_ID_IN_NAME))));
        assert!(!name.contains(&"x".repeat(MAX_TRACE_ID_IN_NAME + 1)));

        storage.persist(&record).unwrap();
        let loaded = archive::load_any(File::open(storage.path_for(&record)).unwrap()).unwrap();
        assert_eq!(loaded.trace_id().map(|id| id.as_str().len()), Some(200));
    }

    #[test]
    fn test_persist_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), false);
        let record = Record::from(Snapshot::new(HubId::generate(), Vec::new()));
        storage.persist(&record).unwrap();
        assert!(storage.path_for(&record).is_file());
        assert!(matches!(storage.persist(&record), Err(PersistError::Io { .. })));
        // The original file is untouched.
        let loaded = archive::load_any(File::open(storage.path_for(&record)).unwrap()).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileStorage::validate(dir.path()).is_ok());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        let missing = dir.path().join("missing");
        assert!(matches!(FileStorage::validate(&missing), Err(HubError::NotADirectory(_))));

        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(FileStorage::validate(&file), Err(HubError::NotADirectory(_))));
    }
}

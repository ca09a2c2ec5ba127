//! Point-in-time process diagnostics

use serde::{Deserialize, Serialize};

use super::{Archived, Base, ClassMetadata, Record};
use crate::domain::{HubId, InspectError};
use crate::inspector::{
    FilesProbe, Inspector, IoProbe, MemoryProbe, Probe, ProbeCategory, ProcessProbe, SocketsProbe,
};

/// Immutable bundle of probes taken at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    base: Base,
    probes: Vec<Probe>,
}

impl Snapshot {
    #[must_use]
    pub fn new(hub_id: HubId, probes: Vec<Probe>) -> Self {
        Self { base: Base::new(hub_id), probes }
    }

    /// Capture a snapshot on the calling thread
    ///
    /// # Errors
    /// Propagates the inspector's failure
    pub fn capture(hub_id: HubId, inspector: &dyn Inspector) -> Result<Self, InspectError> {
        Ok(Self::new(hub_id, inspector.inspect()?))
    }

    #[must_use]
    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    #[must_use]
    pub fn process(&self) -> Option<&ProcessProbe> {
        self.probes.iter().find_map(|p| if let Probe::Process(v) = p { Some(v) } else { None })
    }

    #[must_use]
    pub fn memory(&self) -> Option<&MemoryProbe> {
        self.probes.iter().find_map(|p| if let Probe::Memory(v) = p { Some(v) } else { None })
    }

    #[must_use]
    pub fn io(&self) -> Option<&IoProbe> {
        self.probes.iter().find_map(|p| if let Probe::Io(v) = p { Some(v) } else { None })
    }

    #[must_use]
    pub fn sockets(&self) -> Option<&SocketsProbe> {
        self.probes.iter().find_map(|p| if let Probe::Sockets(v) = p { Some(v) } else { None })
    }

    #[must_use]
    pub fn files(&self) -> Option<&FilesProbe> {
        self.probes.iter().find_map(|p| if let Probe::Files(v) = p { Some(v) } else { None })
    }
}

impl Archived for Snapshot {
    const CLASS_NAME: &'static str = concat!(module_path!(), "::Snapshot");

    fn base(&self) -> &Base {
        &self.base
    }

    fn class_metadata(&self) -> ClassMetadata {
        let categories: Vec<ProbeCategory> = self.probes.iter().map(Probe::category).collect();
        let mut meta = ClassMetadata::new();
        meta.insert("probes".to_string(), serde_json::json!(categories));
        meta
    }

    fn into_record(self) -> Record {
        Record::Snapshot(self)
    }

    fn from_record(record: Record) -> Result<Self, Record> {
        match record {
            Record::Snapshot(snapshot) => Ok(snapshot),
            other => Err(other),
        }
    }
}

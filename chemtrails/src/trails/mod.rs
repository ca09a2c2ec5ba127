//! Persistable diagnostic objects
//!
//! Both object kinds share a [`Base`] record (hub id, oid, creation time).
//! The [`Record`] enum is the explicit discriminant used when deriving file
//! names and when decoding archives.

pub mod base;
pub mod snapshot;
pub mod trace;

pub use base::Base;
pub use snapshot::Snapshot;
pub use trace::{Trace, UserData};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{ObjectId, TraceId};

/// Free-form per-class metadata stored next to the payload of an archive
pub type ClassMetadata = serde_json::Map<String, serde_json::Value>;

/// A type that can be written to and loaded from an archive
pub trait Archived: Sized {
    /// Fully qualified name, stored in the archive and checked on load
    const CLASS_NAME: &'static str;

    fn base(&self) -> &Base;

    /// Metadata readable without decoding the payload
    fn class_metadata(&self) -> ClassMetadata {
        ClassMetadata::new()
    }

    fn into_record(self) -> Record;

    /// Extract `Self` from a decoded record, handing it back on a kind mismatch
    ///
    /// # Errors
    /// Returns the record unchanged if it holds another kind of object
    fn from_record(record: Record) -> Result<Self, Record>;
}

/// Kind of a persisted object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Trace,
    Snapshot,
}

impl ObjectKind {
    /// File extension used for this kind
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            ObjectKind::Trace => "trace",
            ObjectKind::Snapshot => "snapshot",
        }
    }

    /// Class name written into archives of this kind
    #[must_use]
    pub fn class_name(self) -> &'static str {
        match self {
            ObjectKind::Trace => Trace::CLASS_NAME,
            ObjectKind::Snapshot => Snapshot::CLASS_NAME,
        }
    }

    #[must_use]
    pub fn from_class_name(name: &str) -> Option<Self> {
        [ObjectKind::Trace, ObjectKind::Snapshot].into_iter().find(|kind| kind.class_name() == name)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Any persistable object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Trace(Trace),
    Snapshot(Snapshot),
}

impl Record {
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Record::Trace(_) => ObjectKind::Trace,
            Record::Snapshot(_) => ObjectKind::Snapshot,
        }
    }

    #[must_use]
    pub fn base(&self) -> &Base {
        match self {
            Record::Trace(trace) => trace.base(),
            Record::Snapshot(snapshot) => snapshot.base(),
        }
    }

    #[must_use]
    pub fn oid(&self) -> &ObjectId {
        self.base().oid()
    }

    /// Trace id, for traces only
    #[must_use]
    pub fn trace_id(&self) -> Option<&TraceId> {
        match self {
            Record::Trace(trace) => Some(&trace.trace_id),
            Record::Snapshot(_) => None,
        }
    }

    #[must_use]
    pub fn class_name(&self) -> &'static str {
        self.kind().class_name()
    }

    #[must_use]
    pub fn class_metadata(&self) -> ClassMetadata {
        match self {
            Record::Trace(trace) => trace.class_metadata(),
            Record::Snapshot(snapshot) => snapshot.class_metadata(),
        }
    }
}

impl From<Trace> for Record {
    fn from(trace: Trace) -> Self {
        Record::Trace(trace)
    }
}

impl From<Snapshot> for Record {
    fn from(snapshot: Snapshot) -> Self {
        Record::Snapshot(snapshot)
    }
}

//! Versioned, self-describing container for one persisted object
//!
//! # File Format
//!
//! ```text
//! +----------------------+
//! | Magic (10 bytes)     |  "CHEMTRAILS"
//! +----------------------+
//! | Version (2 bytes)    |  u16 little-endian
//! +----------------------+
//! | Flags (2 bytes)      |  u16 little-endian (bit 0 = gzip payload)
//! +----------------------+
//! | Meta len (4 bytes)   |  u32 little-endian
//! | Metadata (JSON)      |  {hub_id, oid, created_at, class}
//! +----------------------+
//! | Class len (4 bytes)  |  u32 little-endian
//! | Class meta (JSON)    |  free-form object supplied by the class
//! +----------------------+
//! | Payload len (8 bytes)|  u64 little-endian
//! | Payload              |  JSON of the record, optionally gzip
//! +----------------------+
//! ```
//!
//! The two metadata blocks can be read with [`sniff`] without touching the
//! payload. [`load`] validates version, then class name, then payload type.

mod codec;

pub use codec::{load, load_any, save, sniff};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{HubId, ObjectId};

/// Magic bytes at the start of every archive
pub const MAGIC: &[u8; 10] = b"CHEMTRAILS";

/// Current format version; any other version is rejected
pub const VERSION: u16 = 1;

/// Flag: payload is gzip compressed
pub const FLAG_COMPRESSED: u16 = 0x0001;

/// Identity block stored ahead of the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub hub_id: HubId,
    pub oid: ObjectId,
    pub created_at: DateTime<Utc>,
    /// Fully qualified class name of the payload
    pub class: String,
}

//! System inspector
//!
//! Produces the diagnostic payload of a [`crate::trails::Snapshot`]. The
//! pipeline only calls [`Inspector::inspect`] and stores whatever comes back;
//! the payload is a closed set of [`Probe`] variants so archives can be
//! validated on decode.
//!
//! - [`procfs`]: default implementation reading `/proc/self`
//! - [`probes`]: payload types, one per diagnostic category
//! - [`cpus`]: online CPU discovery, used to size the worker pool

pub mod cpus;
pub mod probes;
pub mod procfs;

pub use cpus::online_cpus;
pub use probes::{
    FilesProbe, IoProbe, MemoryProbe, OpenFile, Probe, ProbeCategory, ProcessProbe, SocketsProbe,
    TcpSocket, TcpState, UdpSocket,
};
pub use procfs::ProcfsInspector;

use crate::domain::InspectError;

/// Source of snapshot payloads
///
/// Called synchronously on the caller's thread; failures propagate to
/// whoever asked for the snapshot.
pub trait Inspector: Send + Sync {
    /// Gather one observation of the current process
    ///
    /// # Errors
    /// Returns [`InspectError`] if a mandatory source cannot be read or parsed
    fn inspect(&self) -> Result<Vec<Probe>, InspectError>;
}

impl<F> Inspector for F
where
    F: Fn() -> Result<Vec<Probe>, InspectError> + Send + Sync,
{
    fn inspect(&self) -> Result<Vec<Probe>, InspectError> {
        self()
    }
}

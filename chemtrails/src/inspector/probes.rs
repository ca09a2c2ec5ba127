//! Snapshot payload types
//!
//! One struct per diagnostic category, wrapped in the [`Probe`] enum. Values
//! are raw kernel counters; derived figures are methods so they never go
//! stale in an archive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// One diagnostic category of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Probe {
    Process(ProcessProbe),
    Memory(MemoryProbe),
    Io(IoProbe),
    Sockets(SocketsProbe),
    Files(FilesProbe),
}

/// Discriminant of [`Probe`], used in class metadata and for lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCategory {
    Process,
    Memory,
    Io,
    Sockets,
    Files,
}

impl Probe {
    #[must_use]
    pub fn category(&self) -> ProbeCategory {
        match self {
            Probe::Process(_) => ProbeCategory::Process,
            Probe::Memory(_) => ProbeCategory::Memory,
            Probe::Io(_) => ProbeCategory::Io,
            Probe::Sockets(_) => ProbeCategory::Sockets,
            Probe::Files(_) => ProbeCategory::Files,
        }
    }
}

impl fmt::Display for ProbeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProbeCategory::Process => "process",
            ProbeCategory::Memory => "memory",
            ProbeCategory::Io => "io",
            ProbeCategory::Sockets => "sockets",
            ProbeCategory::Files => "files",
        };
        f.write_str(name)
    }
}

/// Scheduling and CPU accounting from `/proc/self/stat`
///
/// Times are in clock ticks; `clock_ticks` is ticks per second.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessProbe {
    pub utime: u64,
    pub stime: u64,
    pub cutime: i64,
    pub cstime: i64,
    pub priority: i64,
    pub nice: i64,
    pub num_threads: i64,
    pub rsslim: u64,
    pub rt_priority: u64,
    pub delayacct_blkio_ticks: u64,
    pub guest_time: u64,
    pub cguest_time: i64,
    pub clock_ticks: u64,
}

impl ProcessProbe {
    /// User time without time spent running a guest
    #[must_use]
    pub fn user_time(&self) -> u64 {
        self.utime.saturating_sub(self.guest_time)
    }

    /// Waited-for children's kernel time without their guest time
    #[must_use]
    pub fn children_time(&self) -> i64 {
        self.cstime - self.cguest_time
    }
}

/// Memory usage from `/proc/self/smaps_rollup`, in bytes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryProbe {
    pub rss: u64,
    pub pss: u64,
    pub pss_anon: u64,
    pub pss_file: u64,
    pub pss_shmem: u64,
    pub shared_clean: u64,
    pub shared_dirty: u64,
    pub private_clean: u64,
    pub private_dirty: u64,
    pub referenced: u64,
    pub anonymous: u64,
    pub swap: u64,
    pub swap_pss: u64,
    pub locked: u64,
}

impl MemoryProbe {
    /// Unique set size: memory that would be freed if the process exited
    #[must_use]
    pub fn uss(&self) -> u64 {
        self.private_clean + self.private_dirty
    }

    #[must_use]
    pub fn shared(&self) -> u64 {
        self.shared_clean + self.shared_dirty
    }
}

/// I/O counters from `/proc/self/io`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoProbe {
    pub rchar: u64,
    pub wchar: u64,
    pub syscr: u64,
    pub syscw: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub cancelled_write_bytes: u64,
}

impl IoProbe {
    #[must_use]
    pub fn io_operations(&self) -> u64 {
        self.syscr + self.syscw
    }

    /// Bytes written to storage minus those later truncated away
    #[must_use]
    pub fn real_write_bytes(&self) -> i128 {
        i128::from(self.write_bytes) - i128::from(self.cancelled_write_bytes)
    }
}

/// TCP connection state as reported by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TcpState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    NewSynRecv,
    Unknown,
}

impl TcpState {
    /// Decode the `st` column of `/proc/net/tcp`
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => TcpState::Established,
            0x02 => TcpState::SynSent,
            0x03 => TcpState::SynRecv,
            0x04 => TcpState::FinWait1,
            0x05 => TcpState::FinWait2,
            0x06 => TcpState::TimeWait,
            0x07 => TcpState::Close,
            0x08 => TcpState::CloseWait,
            0x09 => TcpState::LastAck,
            0x0A => TcpState::Listen,
            0x0B => TcpState::Closing,
            0x0C => TcpState::NewSynRecv,
            _ => TcpState::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpSocket {
    pub local_address: SocketAddr,
    pub remote_address: SocketAddr,
    pub state: TcpState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpSocket {
    pub local_address: SocketAddr,
    pub remote_address: SocketAddr,
}

/// Internet sockets owned by this process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketsProbe {
    pub tcp: Vec<TcpSocket>,
    pub udp: Vec<UdpSocket>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFile {
    pub fd: u32,
    pub path: String,
    /// `open(2)` flags from `fdinfo`
    pub flags: u32,
}

/// Open file descriptors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesProbe {
    pub fd_count: usize,
    pub files: Vec<OpenFile>,
}

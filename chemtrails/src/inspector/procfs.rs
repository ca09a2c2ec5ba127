//! `/proc`-backed inspector
//!
//! Reads the calling process's own entries under `/proc/self`. Only the
//! process probe is mandatory; other sources are skipped (with a debug log)
//! when the kernel does not expose them or access is denied.

use log::debug;
use std::collections::HashSet;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};

use super::probes::{
    FilesProbe, IoProbe, MemoryProbe, OpenFile, Probe, ProcessProbe, SocketsProbe, TcpSocket,
    TcpState, UdpSocket,
};
use super::Inspector;
use crate::domain::InspectError;

/// Inspector reading a procfs directory of one process
#[derive(Debug, Clone)]
pub struct ProcfsInspector {
    root: PathBuf,
}

impl ProcfsInspector {
    /// Inspect the current process (`/proc/self`)
    #[must_use]
    pub fn new() -> Self {
        Self::with_root("/proc/self")
    }

    /// Inspect a procfs-shaped directory (another pid, or a fixture)
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Parse `stat`
    ///
    /// # Errors
    /// Returns an error if the file is missing or has fewer fields than expected
    pub fn read_process(&self) -> Result<ProcessProbe, InspectError> {
        let path = self.root.join("stat");
        let content = read(&path)?;

        // comm (field 2) may contain spaces and parentheses; fields resume after the last ')'
        let rest = content
            .rfind(')')
            .map(|idx| &content[idx + 1..])
            .ok_or_else(|| parse_error(&path, "missing comm terminator"))?;
        let fields: Vec<&str> = rest.split_whitespace().collect();
        if fields.len() < 42 {
            return Err(parse_error(&path, format!("expected at least 44 fields, got {}", fields.len() + 2)));
        }

        // fields[0] is field 3 (state) in proc(5) numbering
        let field = |n: usize| fields[n - 3];
        Ok(ProcessProbe {
            utime: parse_num(&path, field(14))?,
            stime: parse_num(&path, field(15))?,
            cutime: parse_num(&path, field(16))?,
            cstime: parse_num(&path, field(17))?,
            priority: parse_num(&path, field(18))?,
            nice: parse_num(&path, field(19))?,
            num_threads: parse_num(&path, field(20))?,
            rsslim: parse_num(&path, field(25))?,
            rt_priority: parse_num(&path, field(40))?,
            delayacct_blkio_ticks: parse_num(&path, field(42))?,
            guest_time: parse_num(&path, field(43))?,
            cguest_time: parse_num(&path, field(44))?,
            clock_ticks: clock_ticks(),
        })
    }

    /// Parse `smaps_rollup`
    ///
    /// # Errors
    /// Returns an error if the file is missing or a counter line is malformed
    pub fn read_memory(&self) -> Result<MemoryProbe, InspectError> {
        let path = self.root.join("smaps_rollup");
        let content = read(&path)?;
        let mut probe = MemoryProbe::default();

        // First line is the address range header
        for line in content.lines().skip(1).filter(|l| !l.trim().is_empty()) {
            let (key, value) =
                line.split_once(':').ok_or_else(|| parse_error(&path, format!("cannot parse '{line}'")))?;
            let kb = value
                .trim()
                .strip_suffix("kB")
                .ok_or_else(|| parse_error(&path, format!("no unit in '{line}'")))?;
            let bytes = parse_num::<u64>(&path, kb.trim())?
                .checked_mul(1024)
                .ok_or_else(|| parse_error(&path, format!("'{line}' overflows a byte count")))?;

            let slot = match key.to_ascii_lowercase().as_str() {
                "rss" => &mut probe.rss,
                "pss" => &mut probe.pss,
                "pss_anon" => &mut probe.pss_anon,
                "pss_file" => &mut probe.pss_file,
                "pss_shmem" => &mut probe.pss_shmem,
                "shared_clean" => &mut probe.shared_clean,
                "shared_dirty" => &mut probe.shared_dirty,
                "private_clean" => &mut probe.private_clean,
                "private_dirty" => &mut probe.private_dirty,
                "referenced" => &mut probe.referenced,
                "anonymous" => &mut probe.anonymous,
                "swap" => &mut probe.swap,
                "swappss" => &mut probe.swap_pss,
                "locked" => &mut probe.locked,
                _ => continue,
            };
            *slot = bytes;
        }

        Ok(probe)
    }

    /// Parse `io`
    ///
    /// # Errors
    /// Returns an error if the file is missing or a line is malformed
    pub fn read_io(&self) -> Result<IoProbe, InspectError> {
        let path = self.root.join("io");
        let content = read(&path)?;
        let mut probe = IoProbe::default();

        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let (key, value) =
                line.split_once(':').ok_or_else(|| parse_error(&path, format!("cannot parse '{line}'")))?;
            let value: u64 = parse_num(&path, value.trim())?;
            match key.trim() {
                "rchar" => probe.rchar = value,
                "wchar" => probe.wchar = value,
                "syscr" => probe.syscr = value,
                "syscw" => probe.syscw = value,
                "read_bytes" => probe.read_bytes = value,
                "write_bytes" => probe.write_bytes = value,
                "cancelled_write_bytes" => probe.cancelled_write_bytes = value,
                _ => {}
            }
        }

        Ok(probe)
    }

    /// Walk `fd/`, collecting open regular files and socket inodes
    ///
    /// # Errors
    /// Returns an error if the descriptor directory cannot be listed
    pub fn read_files(&self) -> Result<(FilesProbe, HashSet<u64>), InspectError> {
        let dir = self.root.join("fd");
        let entries = fs::read_dir(&dir).map_err(|source| InspectError::Io { path: dir.clone(), source })?;

        let mut probe = FilesProbe::default();
        let mut socket_inodes = HashSet::new();

        for entry in entries.flatten() {
            probe.fd_count += 1;

            let Ok(fd) = entry.file_name().to_string_lossy().parse::<u32>() else {
                continue;
            };
            // Descriptors may close between listing and readlink
            let Ok(target) = fs::read_link(entry.path()) else {
                continue;
            };
            let target = target.to_string_lossy().into_owned();

            if let Some(inode) = target.strip_prefix("socket:[").and_then(|s| s.strip_suffix(']')) {
                if let Ok(inode) = inode.parse() {
                    socket_inodes.insert(inode);
                }
                continue;
            }
            if !target.starts_with('/') || target.starts_with("/dev/pts") {
                continue;
            }

            let Ok(fdinfo) = fs::read_to_string(self.root.join("fdinfo").join(fd.to_string())) else {
                continue;
            };
            let flags = fdinfo
                .lines()
                .find_map(|l| l.strip_prefix("flags:"))
                .and_then(|v| u32::from_str_radix(v.trim(), 8).ok());
            if let Some(flags) = flags {
                probe.files.push(OpenFile { fd, path: target, flags });
            }
        }

        probe.files.sort_by(|a, b| a.path.cmp(&b.path).then(a.fd.cmp(&b.fd)));
        Ok((probe, socket_inodes))
    }

    /// Parse `net/{tcp,tcp6,udp,udp6}`, keeping only sockets in `inodes`
    ///
    /// # Errors
    /// Returns an error if a present table has a malformed line
    pub fn read_sockets(&self, inodes: &HashSet<u64>) -> Result<SocketsProbe, InspectError> {
        let mut probe = SocketsProbe::default();
        if inodes.is_empty() {
            return Ok(probe);
        }

        for table in ["tcp", "tcp6"] {
            for row in self.scan_net_table(table, inodes)? {
                probe.tcp.push(TcpSocket {
                    local_address: row.local,
                    remote_address: row.remote,
                    state: TcpState::from_code(row.state),
                });
            }
        }
        for table in ["udp", "udp6"] {
            for row in self.scan_net_table(table, inodes)? {
                probe.udp.push(UdpSocket { local_address: row.local, remote_address: row.remote });
            }
        }

        Ok(probe)
    }

    fn scan_net_table(&self, table: &str, inodes: &HashSet<u64>) -> Result<Vec<NetRow>, InspectError> {
        let path = self.root.join("net").join(table);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            // IPv6 tables are absent when the protocol is disabled
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(InspectError::Io { path, source }),
        };

        let mut rows = Vec::new();
        // Skip header
        for line in content.lines().skip(1).filter(|l| !l.trim().is_empty()) {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 10 {
                return Err(parse_error(&path, format!("cannot parse '{line}'")));
            }
            let inode: u64 = parse_num(&path, cols[9])?;
            if !inodes.contains(&inode) {
                continue;
            }
            rows.push(NetRow {
                local: parse_socket_addr(&path, cols[1])?,
                remote: parse_socket_addr(&path, cols[2])?,
                state: u8::from_str_radix(cols[3], 16)
                    .map_err(|_| parse_error(&path, format!("bad state {}", cols[3])))?,
            });
        }
        Ok(rows)
    }
}

impl Default for ProcfsInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector for ProcfsInspector {
    fn inspect(&self) -> Result<Vec<Probe>, InspectError> {
        let mut probes = vec![Probe::Process(self.read_process()?)];

        match self.read_memory() {
            Ok(memory) => probes.push(Probe::Memory(memory)),
            Err(e) => debug!("Skipping memory probe: {e}"),
        }
        match self.read_io() {
            Ok(io) => probes.push(Probe::Io(io)),
            Err(e) => debug!("Skipping io probe: {e}"),
        }
        match self.read_files() {
            Ok((files, inodes)) => {
                match self.read_sockets(&inodes) {
                    Ok(sockets) => probes.push(Probe::Sockets(sockets)),
                    Err(e) => debug!("Skipping sockets probe: {e}"),
                }
                probes.push(Probe::Files(files));
            }
            Err(e) => debug!("Skipping files probe: {e}"),
        }

        Ok(probes)
    }
}

struct NetRow {
    local: SocketAddr,
    remote: SocketAddr,
    state: u8,
}

/// Decode `0100007F:1F90` style addresses
///
/// The kernel prints each 32-bit word of the address in host byte order.
fn parse_socket_addr(path: &Path, raw: &str) -> Result<SocketAddr, InspectError> {
    let bad = || parse_error(path, format!("bad address {raw}"));
    let (ip_hex, port_hex) = raw.split_once(':').ok_or_else(bad)?;
    let port = u16::from_str_radix(port_hex, 16).map_err(|_| bad())?;

    let word = |i: usize| -> Result<[u8; 4], InspectError> {
        let chunk = ip_hex.get(i * 8..(i + 1) * 8).ok_or_else(bad)?;
        Ok(u32::from_str_radix(chunk, 16).map_err(|_| bad())?.to_ne_bytes())
    };

    let ip = match ip_hex.len() {
        8 => IpAddr::V4(Ipv4Addr::from(word(0)?)),
        32 => {
            let mut octets = [0u8; 16];
            for i in 0..4 {
                octets[i * 4..(i + 1) * 4].copy_from_slice(&word(i)?);
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return Err(bad()),
    };

    Ok(SocketAddr::new(ip, port))
}

fn clock_ticks() -> u64 {
    // SAFETY: sysconf has no preconditions
    #[allow(unsafe_code)]
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    u64::try_from(ticks).unwrap_or(100)
}

fn read(path: &Path) -> Result<String, InspectError> {
    fs::read_to_string(path).map_err(|source| InspectError::Io { path: path.to_path_buf(), source })
}

fn parse_num<T: std::str::FromStr>(path: &Path, raw: &str) -> Result<T, InspectError> {
    raw.parse().map_err(|_| parse_error(path, format!("not a number: '{raw}'")))
}

fn parse_error(path: &Path, detail: impl Into<String>) -> InspectError {
    InspectError::Parse { path: path.to_path_buf(), detail: detail.into() }
}

//! Human-readable rendering of loaded archives

#![allow(clippy::cast_precision_loss)]

use std::fmt::Write;

use crate::domain::Duration;
use crate::hub::HubStats;
use crate::inspector::Probe;
use crate::spans::Span;
use crate::trails::{Archived, Record, Snapshot, Trace};

/// Render any record
#[must_use]
pub fn render(record: &Record) -> String {
    match record {
        Record::Trace(trace) => render_trace(trace),
        Record::Snapshot(snapshot) => render_snapshot(snapshot),
    }
}

#[must_use]
pub fn render_trace(trace: &Trace) -> String {
    let mut out = String::new();
    let base = trace.base();
    let _ = writeln!(out, "Trace {} ({})", trace.trace_id, base.oid());
    let _ = writeln!(out, "  hub:     {}", base.hub_id());
    let _ = writeln!(out, "  created: {}", base.created_at().to_rfc3339());
    let state = if trace.is_completed() { "completed" } else { "in progress" };
    let _ = writeln!(out, "  elapsed: {} ({state})", trace.elapsed());

    out.push_str("  spans:\n");
    render_spans(&mut out, &trace.span);

    if !trace.user.is_empty() {
        out.push_str("  user:\n");
        for (key, value) in &trace.user {
            let _ = writeln!(out, "    {key} = {value}");
        }
    }
    if let (Some(old), Some(new)) = (&trace.old_snapshot, &trace.new_snapshot) {
        out.push_str("  snapshot delta:\n");
        render_delta(&mut out, old, new);
    }
    out
}

fn render_spans(out: &mut String, root: &Span) {
    for (depth, span) in root.walk() {
        let indent = "  ".repeat(depth + 2);
        let _ = writeln!(out, "{indent}{} {} [{}]", span.trace_id, span.elapsed(), span.oid);
    }
}

fn render_delta(out: &mut String, old: &Snapshot, new: &Snapshot) {
    if let (Some(a), Some(b)) = (old.process(), new.process()) {
        let ticks = b.clock_ticks.max(1) as f64;
        let user = b.user_time().saturating_sub(a.user_time()) as f64 / ticks;
        let system = b.stime.saturating_sub(a.stime) as f64 / ticks;
        let _ = writeln!(out, "    cpu:    user {user:.2}s system {system:.2}s");
    }
    if let (Some(a), Some(b)) = (old.memory(), new.memory()) {
        let _ = writeln!(out, "    memory: rss {} uss {}", signed_bytes(a.rss, b.rss), signed_bytes(a.uss(), b.uss()));
    }
    if let (Some(a), Some(b)) = (old.io(), new.io()) {
        let _ = writeln!(
            out,
            "    io:     {} ops, read {}, written {}",
            b.io_operations().saturating_sub(a.io_operations()),
            signed_bytes(a.read_bytes, b.read_bytes),
            signed_bytes(a.write_bytes, b.write_bytes)
        );
    }
}

#[must_use]
pub fn render_snapshot(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let base = snapshot.base();
    let _ = writeln!(out, "Snapshot {}", base.oid());
    let _ = writeln!(out, "  hub:     {}", base.hub_id());
    let _ = writeln!(out, "  created: {}", base.created_at().to_rfc3339());
    for probe in snapshot.probes() {
        render_probe(&mut out, probe);
    }
    out
}

fn render_probe(out: &mut String, probe: &Probe) {
    match probe {
        Probe::Process(p) => {
            let ticks = p.clock_ticks.max(1) as f64;
            let _ = writeln!(
                out,
                "  process: user {:.2}s system {:.2}s threads {} nice {}",
                p.user_time() as f64 / ticks,
                p.stime as f64 / ticks,
                p.num_threads,
                p.nice
            );
        }
        Probe::Memory(m) => {
            let _ = writeln!(
                out,
                "  memory:  rss {} pss {} uss {} swap {}",
                bytes(m.rss),
                bytes(m.pss),
                bytes(m.uss()),
                bytes(m.swap)
            );
        }
        Probe::Io(io) => {
            let _ = writeln!(
                out,
                "  io:      {} ops, read {}, written {}",
                io.io_operations(),
                bytes(io.read_bytes),
                bytes(io.write_bytes)
            );
        }
        Probe::Sockets(s) => {
            let _ = writeln!(out, "  sockets: {} tcp, {} udp", s.tcp.len(), s.udp.len());
            for tcp in &s.tcp {
                let _ = writeln!(out, "    tcp {} -> {} {:?}", tcp.local_address, tcp.remote_address, tcp.state);
            }
            for udp in &s.udp {
                let _ = writeln!(out, "    udp {} -> {}", udp.local_address, udp.remote_address);
            }
        }
        Probe::Files(f) => {
            let _ = writeln!(out, "  files:   {} descriptors", f.fd_count);
            for file in &f.files {
                let _ = writeln!(out, "    {:>4} {} (flags {:#o})", file.fd, file.path, file.flags);
            }
        }
    }
}

/// Statistics line printed after a recording session
#[must_use]
pub fn render_stats(stats: &HubStats, elapsed: Duration) -> String {
    format!("stats: {stats} elapsed={elapsed}")
}

fn bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n}B")
    } else {
        format!("{value:.1}{}", UNITS[unit])
    }
}

fn signed_bytes(before: u64, after: u64) -> String {
    if after >= before {
        format!("+{}", bytes(after - before))
    } else {
        format!("-{}", bytes(before - after))
    }
}

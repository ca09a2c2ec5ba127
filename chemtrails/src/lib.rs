//! # chemtrails - Process Snapshots and Nested Traces, Persisted Off the Hot Path
//!
//! chemtrails captures point-in-time process diagnostics ("snapshots") and
//! timed, nested execution regions ("traces") and writes them to local
//! archive files without blocking the instrumented program.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                  Instrumented Application                     │
//! │        hub.trace(..) / chemtrails_trace!() / take_snapshot()  │
//! └───────────────┬───────────────────────────────┬───────────────┘
//!                 │ push / pop                    │ capture
//!                 ▼                               ▼
//! ┌───────────────────────────┐   ┌───────────────────────────────┐
//! │  SpanTracker              │   │  Inspector (/proc/self)       │
//! │  context id -> span stack │   │  process, memory, io, ...     │
//! └───────────────────────────┘   └───────────────────────────────┘
//!                 │ finished Trace / Snapshot
//!                 ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Hub: non-blocking permit check, drop + warn when saturated   │
//! └───────────────┬───────────────────────────────────────────────┘
//!                 │ task channel
//!                 ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Worker threads -> archive codec -> one file per object       │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`domain`]: identifier newtypes (`ObjectId`, `HubId`, `TraceId`) and
//!   error enums
//! - [`spans`]: span tree and the per-context span stack registry
//! - [`trails`]: the persistable objects (`Trace`, `Snapshot`) and the
//!   `Record` union over them
//! - [`archive`]: versioned container format with `sniff`, `load` and
//!   `load_any`
//! - [`inspector`]: `/proc`-backed snapshot probes
//! - [`hub`]: admission, worker pool, storage, scheduler and the process-wide
//!   default hub
//! - [`display`]: text rendering used by the `chemtrails` binary
//! - [`cli`]: command-line argument definitions
//!
//! ## Async code
//!
//! Span nesting follows the logical context, not the OS thread. Wrap each
//! task that opens traces in [`spans::scope`] so nested regions stay attached
//! to the right parent when the runtime moves the task between threads.

// Expose modules for testing
pub mod archive;
pub mod cli;
pub mod display;
pub mod domain;
pub mod hub;
pub mod inspector;
pub mod spans;
pub mod trails;

pub use hub::{Hub, HubConfig, TraceScope};
pub use trails::{Record, Snapshot, Trace};

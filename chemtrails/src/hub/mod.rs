//! Capture-dispatch-persist pipeline
//!
//! [`Hub`] admits finished objects with a non-blocking permit check and
//! hands them to a pool of worker threads that write them through
//! [`Storage`]. Objects that cannot be admitted are dropped and counted,
//! never raised into the caller.

pub mod config;
pub mod global;
mod instance;
mod permits;
mod pool;
pub mod scheduler;
mod scope;
pub mod stats;
pub mod storage;

pub use config::HubConfig;
pub use global::GlobalHub;
pub use instance::{Hub, HubBuilder};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use scope::TraceScope;
pub use stats::{DropReason, HubStats};
pub use storage::{destination_name, FileStorage, NullStorage, Storage};

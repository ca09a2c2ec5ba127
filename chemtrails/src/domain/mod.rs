//! Domain model for chemtrails
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern (an oid is never a trace id)
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{monotonic_ns, ContextId, Duration, HubId, ObjectId, Timestamp, TraceId};

pub use errors::{
    ArchiveError, HubError, InspectError, PersistError, StackDisciplineError, TraceError,
};

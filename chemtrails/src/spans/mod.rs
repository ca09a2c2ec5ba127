//! Nested span timing
//!
//! A [`Span`] is one node of a trace's timing tree. The [`SpanTracker`] keeps,
//! per logical execution context, the stack of spans that are currently in
//! progress, and links every finished span into the span that encloses it.
//!
//! Context identity comes from [`context::current`]: inside a future wrapped
//! with [`scope`] it follows the task across worker threads, otherwise it is
//! the calling thread.

pub mod context;
pub mod span;
pub mod tracker;

pub use context::{current as current_context, scope, sync_scope};
pub use span::Span;
pub use tracker::SpanTracker;

//! Per-context stacks of in-progress spans

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use super::{context, Span};
use crate::domain::{ContextId, ObjectId, StackDisciplineError, Timestamp};

/// An open span as seen by the tracker: its identity plus the finished
/// children collected while it was on top of the stack.
#[derive(Debug)]
struct Frame {
    oid: ObjectId,
    children: Vec<Span>,
}

/// Registry of span stacks, one per logical context
///
/// Contexts never share a stack. A context's entry disappears when its last
/// span is popped, so finished tasks leave nothing behind.
pub struct SpanTracker {
    stacks: Mutex<HashMap<ContextId, Vec<Frame>>>,
    identity: fn() -> ContextId,
}

impl SpanTracker {
    /// Create a tracker keyed by [`context::current`]
    #[must_use]
    pub fn new() -> Self {
        Self::with_identity(context::current)
    }

    /// Create a tracker with a host-supplied context identity accessor
    #[must_use]
    pub fn with_identity(identity: fn() -> ContextId) -> Self {
        Self { stacks: Mutex::new(HashMap::new()), identity }
    }

    /// Process-wide default tracker
    pub fn global() -> Arc<SpanTracker> {
        static GLOBAL: OnceLock<Arc<SpanTracker>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(SpanTracker::new())))
    }

    /// Number of open spans in the caller's context
    pub fn depth(&self) -> usize {
        let ctx = (self.identity)();
        self.lock().get(&ctx).map_or(0, Vec::len)
    }

    /// Number of contexts that currently have open spans
    pub fn active_contexts(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn push(&self, span: &mut Span) {
        let ctx = (self.identity)();
        self.lock()
            .entry(ctx)
            .or_default()
            .push(Frame { oid: span.oid.clone(), children: Vec::new() });
        span.start = Timestamp::now();
    }

    pub(crate) fn pop(&self, span: &mut Span) -> Result<(), StackDisciplineError> {
        span.finish = Timestamp::now();

        let ctx = (self.identity)();
        let mut stacks = self.lock();
        let Some(stack) = stacks.get_mut(&ctx) else {
            return Err(StackDisciplineError::EmptyStack { expected: span.oid.clone() });
        };

        let Some(frame) = stack.pop() else {
            stacks.remove(&ctx);
            return Err(StackDisciplineError::EmptyStack { expected: span.oid.clone() });
        };

        if frame.oid != span.oid {
            // The top frame is discarded so later spans in this context start clean
            if stack.is_empty() {
                stacks.remove(&ctx);
            }
            return Err(StackDisciplineError::Mismatch {
                expected: span.oid.clone(),
                found: frame.oid,
            });
        }

        span.children.extend(frame.children);

        match stack.last_mut() {
            Some(parent) => parent.children.push(span.clone()),
            None => {
                stacks.remove(&ctx);
            }
        }

        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ContextId, Vec<Frame>>> {
        // Frames are only mutated through complete push/pop steps
        self.stacks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SpanTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpanTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpanTracker").field("active_contexts", &self.active_contexts()).finish()
    }
}

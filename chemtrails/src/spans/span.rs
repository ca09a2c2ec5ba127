//! A single node of a trace's timing tree

use serde::{Deserialize, Serialize};

use super::SpanTracker;
use crate::domain::{Duration, ObjectId, StackDisciplineError, Timestamp, TraceId};

/// One timed region with its nested children
///
/// `finish` stays unset (zero) while the span is in progress. Children are
/// ordered by the time they were pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub oid: ObjectId,
    pub trace_id: TraceId,
    pub children: Vec<Span>,
    pub start: Timestamp,
    pub finish: Timestamp,
}

impl Span {
    /// Create a span that has not been started yet
    #[must_use]
    pub fn new(oid: ObjectId, trace_id: TraceId) -> Self {
        Self {
            oid,
            trace_id,
            children: Vec::new(),
            start: Timestamp::default(),
            finish: Timestamp::default(),
        }
    }

    /// Time spent in this span so far (or in total, once finished)
    ///
    /// Zero if the span was never started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        if self.start.is_unset() {
            return Duration(0);
        }
        let finish = if self.finish.is_unset() { Timestamp::now() } else { self.finish };
        Duration(finish.0.saturating_sub(self.start.0))
    }

    /// Returns true until [`Span::pop`] has run
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.finish.is_unset()
    }

    /// Enter this span in the caller's logical context
    pub fn push(&mut self, tracker: &SpanTracker) {
        tracker.push(self);
    }

    /// Leave this span; it must be the innermost open span of the context
    ///
    /// # Errors
    /// Returns [`StackDisciplineError`] if the context has no open span or the
    /// innermost open span is a different one.
    pub fn pop(&mut self, tracker: &SpanTracker) -> Result<(), StackDisciplineError> {
        tracker.pop(self)
    }

    /// Depth-first walk over this span and all of its descendants
    pub fn walk(&self) -> impl Iterator<Item = (usize, &Span)> {
        let mut pending = vec![(0usize, self)];
        std::iter::from_fn(move || {
            let (depth, span) = pending.pop()?;
            pending.extend(span.children.iter().rev().map(|child| (depth + 1, child)));
            Some((depth, span))
        })
    }
}

//! Scoped traced region

use log::error;

use super::instance::Hub;
use crate::domain::{TraceError, TraceId};
use crate::trails::{Trace, UserData};

/// Guard for an open traced region
///
/// Closing happens in [`TraceScope::finish`], or on drop (including during a
/// panic unwinding through the region), in which case failures are logged
/// instead of returned. An inert scope, handed out while the hub is not
/// working, records nothing.
#[must_use = "the region is closed as soon as the scope is dropped"]
pub struct TraceScope {
    active: Option<(Hub, Trace)>,
    scratch: UserData,
}

impl TraceScope {
    pub(crate) fn active(hub: Hub, trace: Trace) -> Self {
        Self { active: Some((hub, trace)), scratch: UserData::new() }
    }

    pub(crate) fn inert() -> Self {
        Self { active: None, scratch: UserData::new() }
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// `None` for an inert scope
    #[must_use]
    pub fn trace_id(&self) -> Option<&TraceId> {
        self.active.as_ref().map(|(_, trace)| &trace.trace_id)
    }

    /// Data persisted with the trace
    pub fn user(&mut self) -> &mut UserData {
        match &mut self.active {
            Some((_, trace)) => &mut trace.user,
            None => &mut self.scratch,
        }
    }

    /// Close the region and submit the trace
    ///
    /// # Errors
    /// Span discipline violation or closing snapshot failure. The trace is
    /// submitted regardless.
    pub fn finish(mut self) -> Result<(), TraceError> {
        match self.active.take() {
            Some((hub, trace)) => hub.complete(trace),
            None => Ok(()),
        }
    }
}

impl Drop for TraceScope {
    fn drop(&mut self) {
        if let Some((hub, trace)) = self.active.take() {
            let trace_id = trace.trace_id.clone();
            if let Err(e) = hub.complete(trace) {
                error!("Hub {} failed to close trace {trace_id}: {e}", hub.id());
            }
        }
    }
}

impl std::fmt::Debug for TraceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceScope").field("trace_id", &self.trace_id()).finish()
    }
}

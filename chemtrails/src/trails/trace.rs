//! A timed, hierarchical record of one logical operation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Archived, Base, ClassMetadata, Record, Snapshot};
use crate::domain::{Duration, HubId, InspectError, TraceError, TraceId};
use crate::inspector::Inspector;
use crate::spans::{Span, SpanTracker};

/// Arbitrary caller-attached data, persisted with the trace
pub type UserData = BTreeMap<String, serde_json::Value>;

/// One traced region: root span, optional bracketing snapshots and user data
///
/// The root span shares the trace's oid. Snapshots are only present when
/// `with_snapshot` was requested; `old_snapshot` is taken on enter,
/// `new_snapshot` on exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    base: Base,
    pub trace_id: TraceId,
    pub with_snapshot: bool,
    pub old_snapshot: Option<Snapshot>,
    pub new_snapshot: Option<Snapshot>,
    pub span: Span,
    pub user: UserData,
}

impl Trace {
    #[must_use]
    pub fn new(hub_id: HubId, trace_id: TraceId, with_snapshot: bool) -> Self {
        let base = Base::new(hub_id);
        let span = Span::new(base.oid().clone(), trace_id.clone());
        Self {
            base,
            trace_id,
            with_snapshot,
            old_snapshot: None,
            new_snapshot: None,
            span,
            user: UserData::new(),
        }
    }

    /// True once the root span has been popped
    #[must_use]
    pub fn is_completed(&self) -> bool {
        !self.span.finish.is_unset()
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.span.elapsed()
    }

    /// Capture the opening snapshot (if requested) and push the root span
    ///
    /// # Errors
    /// Inspector failure; the span is not pushed in that case.
    pub fn enter(&mut self, tracker: &SpanTracker, inspector: &dyn Inspector) -> Result<(), InspectError> {
        if self.with_snapshot {
            self.old_snapshot = Some(Snapshot::capture(self.base.hub_id(), inspector)?);
        }
        self.span.push(tracker);
        Ok(())
    }

    /// Pop the root span and capture the closing snapshot (if requested)
    ///
    /// The closing snapshot is skipped when the pop fails, so a trace with
    /// corrupted timing never pretends to be bracketed.
    ///
    /// # Errors
    /// Stack discipline violation on pop, or inspector failure.
    pub fn exit(&mut self, tracker: &SpanTracker, inspector: &dyn Inspector) -> Result<(), TraceError> {
        self.span.pop(tracker)?;
        if self.with_snapshot {
            self.new_snapshot = Some(Snapshot::capture(self.base.hub_id(), inspector)?);
        }
        Ok(())
    }
}

impl Archived for Trace {
    const CLASS_NAME: &'static str = concat!(module_path!(), "::Trace");

    fn base(&self) -> &Base {
        &self.base
    }

    fn class_metadata(&self) -> ClassMetadata {
        #[allow(clippy::cast_precision_loss)]
        let elapsed = self.elapsed().as_micros_ceil() as f64 / 1_000_000.0;
        let mut meta = ClassMetadata::new();
        meta.insert("trace_id".to_string(), serde_json::json!(self.trace_id));
        meta.insert("elapsed".to_string(), serde_json::json!(elapsed));
        meta
    }

    fn into_record(self) -> Record {
        Record::Trace(self)
    }

    fn from_record(record: Record) -> Result<Self, Record> {
        match record {
            Record::Trace(trace) => Ok(trace),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StackDisciplineError, Timestamp};
    use crate::inspector::{Probe, ProcessProbe};

    fn inspector() -> impl Inspector {
        || -> Result<Vec<Probe>, InspectError> { Ok(vec![Probe::Process(ProcessProbe::default())]) }
    }

    #[test]
    fn test_enter_exit_brackets_with_snapshots() {
        let tracker = SpanTracker::new();
        let mut trace = Trace::new(HubId::generate(), TraceId::new("job"), true);
        assert!(!trace.is_completed());

        trace.enter(&tracker, &inspector()).unwrap();
        assert_eq!(tracker.depth(), 1);
        assert!(trace.old_snapshot.is_some());
        assert!(trace.new_snapshot.is_none());

        trace.exit(&tracker, &inspector()).unwrap();
        assert!(trace.is_completed());
        assert_eq!(tracker.depth(), 0);
        let old = trace.old_snapshot.as_ref().unwrap().base().created_at();
        let new = trace.new_snapshot.as_ref().unwrap().base().created_at();
        assert!(old <= new);
    }

    #[test]
    fn test_without_snapshot_never_calls_inspector() {
        let tracker = SpanTracker::new();
        let failing = || -> Result<Vec<Probe>, InspectError> {
            Err(InspectError::Parse { path: "stat".into(), detail: "unreachable".to_string() })
        };
        let mut trace = Trace::new(HubId::generate(), TraceId::new("job"), false);
        trace.enter(&tracker, &failing).unwrap();
        trace.exit(&tracker, &failing).unwrap();
        assert!(trace.old_snapshot.is_none() && trace.new_snapshot.is_none());
    }

    #[test]
    fn test_failed_pop_skips_closing_snapshot() {
        let tracker = SpanTracker::new();
        let mut trace = Trace::new(HubId::generate(), TraceId::new("job"), true);
        let err = trace.exit(&tracker, &inspector()).unwrap_err();
        assert!(matches!(err, TraceError::Stack(StackDisciplineError::EmptyStack { .. })));
        assert!(trace.new_snapshot.is_none());
    }

    #[test]
    fn test_root_span_shares_oid() {
        let trace = Trace::new(HubId::generate(), TraceId::new("job"), false);
        assert_eq!(&trace.span.oid, trace.base().oid());
        assert_eq!(trace.span.trace_id, trace.trace_id);
    }

    #[test]
    fn test_class_metadata_rounds_elapsed_up_to_micros() {
        let mut trace = Trace::new(HubId::generate(), TraceId::new("job"), false);
        trace.span.start = Timestamp(1_000);
        trace.span.finish = Timestamp(1_001);
        let meta = trace.class_metadata();
        assert_eq!(meta["trace_id"], serde_json::json!("job"));
        assert_eq!(meta["elapsed"], serde_json::json!(0.000_001));
    }
}

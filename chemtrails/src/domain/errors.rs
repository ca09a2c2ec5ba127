//! Structured error types for chemtrails
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Errors on the hot path of a traced region surface to the caller; errors
//! inside worker tasks ([`PersistError`]) are only ever logged.

use super::types::{ObjectId, TraceId};
use std::path::PathBuf;
use thiserror::Error;

/// Span push/pop ordering violated in instrumented code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackDisciplineError {
    #[error("Span stack is unexpectedly empty while popping {expected}")]
    EmptyStack { expected: ObjectId },

    #[error("Expected span {expected} on top of the stack, got {found}")]
    Mismatch { expected: ObjectId, found: ObjectId },
}

/// Failures of the system inspector collaborator
#[derive(Error, Debug)]
pub enum InspectError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },
}

/// Errors raised into the caller of a traced region
#[derive(Error, Debug)]
pub enum TraceError {
    #[error(transparent)]
    Stack(#[from] StackDisciplineError),

    #[error("Snapshot capture failed: {0}")]
    Inspect(#[from] InspectError),
}

/// Archive decode/encode failures
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Unsupported archive version {0}")]
    UnsupportedVersion(u16),

    #[error("Unexpected class name {found}, expected {expected}")]
    ClassMismatch { expected: String, found: String },

    #[error("Expected {expected} object, found {found}")]
    WrongObject { expected: String, found: String },

    #[error("Bad file: {0}")]
    BadFile(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Hub construction failures
#[derive(Error, Debug)]
pub enum HubError {
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("{path} is not writable: {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure inside a persistence task
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Cannot write {oid}: {source}")]
    Io {
        oid: ObjectId,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot encode {oid} (trace {trace_id:?}): {source}")]
    Archive {
        oid: ObjectId,
        trace_id: Option<TraceId>,
        #[source]
        source: ArchiveError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_mismatch_display() {
        let err = StackDisciplineError::Mismatch {
            expected: ObjectId::generate(),
            found: ObjectId::generate(),
        };
        assert!(err.to_string().starts_with("Expected span"));
    }

    #[test]
    fn test_trace_error_wraps_stack_error() {
        let expected = ObjectId::generate();
        let err: TraceError = StackDisciplineError::EmptyStack { expected: expected.clone() }.into();
        assert!(matches!(err, TraceError::Stack(StackDisciplineError::EmptyStack { .. })));
        assert!(err.to_string().contains(expected.as_str()));
    }

    #[test]
    fn test_archive_error_display() {
        assert_eq!(ArchiveError::UnsupportedVersion(7).to_string(), "Unsupported archive version 7");
        let err = ArchiveError::ClassMismatch {
            expected: "chemtrails::trails::trace::Trace".to_string(),
            found: "chemtrails::trails::snapshot::Snapshot".to_string(),
        };
        assert!(err.to_string().contains("Snapshot"));
    }
}

//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like passing a trace id where an
//! object id is expected, and make function signatures more expressive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};

/// Read the monotonic clock in nanoseconds.
///
/// Uses `CLOCK_MONOTONIC` directly so values are comparable across threads
/// and can be stored in archives (unlike `std::time::Instant`).
#[must_use]
pub fn monotonic_ns() -> u64 {
    let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    // SAFETY: `ts` is a valid, writable timespec and CLOCK_MONOTONIC is always available on Linux
    #[allow(unsafe_code)]
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    if rc != 0 {
        return 0;
    }
    #[allow(clippy::cast_sign_loss)]
    let ns = (ts.tv_sec as u64) * 1_000_000_000 + ts.tv_nsec as u64;
    ns
}

/// Object ID
///
/// Locally unique and time-ordered: 8 bytes of monotonic clock followed by
/// 8 random bytes, hex encoded (32 characters). Used in archive file names
/// and to correlate spans with the trace that owns them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Generate a fresh id from the monotonic clock and the thread RNG
    #[must_use]
    pub fn generate() -> Self {
        let random: u64 = rand::random();
        Self(format!("{:016x}{random:016x}", monotonic_ns()))
    }

    /// Empty id, used by spans that are not attached to a trace yet
    #[must_use]
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Get the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Monotonic clock reading embedded in the id, if the id is well formed
    #[must_use]
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.0.get(..16).and_then(|hi| u64::from_str_radix(hi, 16).ok()).map(Timestamp)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hub ID
///
/// Identifies one hub instance. Stable for the lifetime of the hub, so every
/// file written by that hub shares the same prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HubId(pub uuid::Uuid);

impl HubId {
    /// Generate a random (v4) hub id
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for HubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trace ID
///
/// Groups related traces semantically. Not unique: every trace opened at the
/// same call site (or with the same explicit id) shares it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(String);

impl TraceId {
    /// Create a trace id from an explicit name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive a trace id from a source location (`file:line`)
    #[must_use]
    pub fn from_location(location: &Location<'_>) -> Self {
        Self(format!("{}:{}", location.file(), location.line()))
    }

    /// Get the trace id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Version of the id that is safe to embed in a file name
    ///
    /// Everything outside `[A-Za-z0-9._-]` becomes `_`.
    #[must_use]
    pub fn filesystem_safe(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
            .collect()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TraceId {
    fn from(s: &str) -> Self {
        TraceId::new(s)
    }
}

impl From<String> for TraceId {
    fn from(s: String) -> Self {
        TraceId::new(s)
    }
}

/// Logical execution context ID
///
/// Either a task scope entered with [`crate::spans::scope`] or a plain
/// thread. Span stacks are keyed by this, never by the physical thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

impl ContextId {
    /// Allocate a context id that has never been handed out before
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CTX:{}", self.0)
    }
}

/// Timestamp in nanoseconds
///
/// Represents a point on the monotonic clock. Zero means "not recorded".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Read the monotonic clock
    #[must_use]
    pub fn now() -> Self {
        Self(monotonic_ns())
    }

    /// Returns true if this timestamp was never recorded
    #[must_use]
    pub fn is_unset(self) -> bool {
        self.0 == 0
    }

    /// Convert to seconds (f64)
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_seconds())
    }
}

/// Duration in nanoseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Duration(pub u64);

impl Duration {
    /// Convert to milliseconds (f64)
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_millis(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Convert to seconds (f64)
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Convert to microseconds, rounding up like the archive metadata does
    #[must_use]
    pub fn as_micros_ceil(self) -> u64 {
        self.0.div_ceil(1_000)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.as_millis();
        if ms >= 1000.0 {
            write!(f, "{:.2}s", self.as_seconds())
        } else {
            write!(f, "{ms:.2}ms")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_advances() {
        let a = monotonic_ns();
        let b = monotonic_ns();
        assert!(a > 0);
        assert!(b >= a);
    }

    #[test]
    fn test_object_id_shape() {
        let id = ObjectId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(id.timestamp().is_some_and(|ts| !ts.is_unset()));
    }

    #[test]
    fn test_object_ids_are_time_ordered_and_unique() {
        let first = ObjectId::generate();
        let second = ObjectId::generate();
        assert_ne!(first, second);
        assert!(first.timestamp() <= second.timestamp());
    }

    #[test]
    fn test_trace_id_from_location() {
        let location = Location::caller();
        let id = TraceId::from_location(location);
        assert!(id.as_str().ends_with(&format!(":{}", location.line())));
        assert!(id.as_str().contains("types.rs"));
    }

    #[test]
    fn test_trace_id_filesystem_safe() {
        let id = TraceId::new("src/handler.rs:42 / GET");
        assert_eq!(id.filesystem_safe(), "src_handler.rs_42___GET");
    }

    #[test]
    fn test_context_ids_are_distinct() {
        assert_ne!(ContextId::next(), ContextId::next());
    }

    #[test]
    fn test_duration_display() {
        assert_eq!(Duration(5_000_000).to_string(), "5.00ms");
        assert_eq!(Duration(1_500_000_000).to_string(), "1.50s");
    }

    #[test]
    fn test_duration_micros_round_up() {
        assert_eq!(Duration(1).as_micros_ceil(), 1);
        assert_eq!(Duration(2_000).as_micros_ceil(), 2);
        assert_eq!(Duration(2_001).as_micros_ceil(), 3);
    }
}

//! Logical execution context identity
//!
//! Tokio may resume a task on any worker thread, so a span stack keyed by the
//! physical thread would attribute children to whatever span happened to be
//! open on that thread. Tasks that run traced code should be wrapped in
//! [`scope`], which pins a [`ContextId`] to the task itself.

use std::future::Future;

use crate::domain::ContextId;

tokio::task_local! {
    static TASK_CONTEXT: ContextId;
}

thread_local! {
    static THREAD_CONTEXT: ContextId = ContextId::next();
}

/// Identity of the logical context the caller is running in
///
/// Task scope first, calling thread otherwise.
#[must_use]
pub fn current() -> ContextId {
    TASK_CONTEXT
        .try_with(|id| *id)
        .unwrap_or_else(|_| THREAD_CONTEXT.with(|id| *id))
}

/// Run `future` in a fresh logical context
///
/// Spans opened inside the future nest only with each other, no matter which
/// runtime worker polls it.
pub async fn scope<F: Future>(future: F) -> F::Output {
    TASK_CONTEXT.scope(ContextId::next(), future).await
}

/// Run `f` in a fresh logical context on the current thread
pub fn sync_scope<R>(f: impl FnOnce() -> R) -> R {
    TASK_CONTEXT.sync_scope(ContextId::next(), f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_context_is_stable() {
        assert_eq!(current(), current());
    }

    #[test]
    fn test_threads_get_distinct_contexts() {
        let here = current();
        let there = std::thread::spawn(current).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn test_sync_scope_overrides_thread_context() {
        let outside = current();
        let inside = sync_scope(current);
        assert_ne!(outside, inside);
        assert_eq!(current(), outside);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scope_follows_task_across_awaits() {
        let (before, after) = scope(async {
            let before = current();
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            (before, current())
        })
        .await;
        assert_eq!(before, after);
    }
}

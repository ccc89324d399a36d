//! Execution-context-local correlation ids.
//!
//! Synchronous code gets one slot per thread. Futures wrapped in
//! [`scope_async`] get their own slot carried by the tokio task-local, which
//! takes precedence over the thread slot while the future is polled.
//!
//! Prefer [`scoped`] over bare [`set`]/[`clear`] pairs: the returned guard
//! restores the enclosing id on every exit path.

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use uuid::Uuid;

thread_local! {
    static THREAD_SLOT: RefCell<Option<String>> = const { RefCell::new(None) };
}

tokio::task_local! {
    static TASK_SLOT: RefCell<Option<String>>;
}

fn with_slot<R>(f: impl Fn(&RefCell<Option<String>>) -> R) -> R {
    TASK_SLOT
        .try_with(|slot| f(slot))
        .unwrap_or_else(|_| THREAD_SLOT.with(|slot| f(slot)))
}

/// Returns the correlation id of the current context.
#[must_use]
pub fn current() -> Option<String> {
    with_slot(|slot| slot.borrow().clone())
}

/// Sets the correlation id of the current context.
pub fn set(id: impl Into<String>) {
    let id = id.into();
    with_slot(|slot| *slot.borrow_mut() = Some(id.clone()));
}

/// Clears the correlation id of the current context.
pub fn clear() {
    with_slot(|slot| *slot.borrow_mut() = None);
}

/// Generates a fresh random id (UUID v4, hyphenated).
#[must_use]
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Restores the enclosing correlation id when dropped.
///
/// The guard is bound to the context it was created in and cannot be sent
/// to another thread.
#[derive(Debug)]
#[must_use = "the correlation id is reset as soon as the guard is dropped"]
pub struct CorrelationGuard {
    id: String,
    previous: Option<String>,
    _not_send: PhantomData<*const ()>,
}

impl CorrelationGuard {
    /// Returns the id in force inside this scope.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for CorrelationGuard {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(previous) => set(previous),
            None => clear(),
        }
    }
}

/// Enters a correlation scope.
///
/// With `None` a fresh id is generated. Dropping the guard restores the
/// previous id, or clears the slot if there was none.
///
/// # Example
///
/// ```
/// use jsonlog_shared::correlation;
///
/// {
///     let outer = correlation::scoped(Some("A".to_string()));
///     assert_eq!(outer.id(), "A");
///     {
///         let _inner = correlation::scoped(Some("B".to_string()));
///         assert_eq!(correlation::current().as_deref(), Some("B"));
///     }
///     assert_eq!(correlation::current().as_deref(), Some("A"));
/// }
/// assert_eq!(correlation::current(), None);
/// ```
pub fn scoped(id: Option<String>) -> CorrelationGuard {
    let id = id.unwrap_or_else(generate_id);
    let previous = current();
    set(id.clone());
    CorrelationGuard {
        id,
        previous,
        _not_send: PhantomData,
    }
}

/// Runs a future with its own correlation slot initialised to `id`.
///
/// With `None` a fresh id is generated. The slot lives exactly as long as
/// the future, so concurrent tasks never observe each other's ids.
pub async fn scope_async<F>(id: Option<String>, fut: F) -> F::Output
where
    F: Future,
{
    let id = id.unwrap_or_else(generate_id);
    TASK_SLOT.scope(RefCell::new(Some(id)), fut).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear() {
        clear();
        assert_eq!(current(), None);
        set("abc");
        assert_eq!(current().as_deref(), Some("abc"));
        clear();
        assert_eq!(current(), None);
    }

    #[test]
    fn test_nested_scopes_restore_parent() {
        clear();
        {
            let _a = scoped(Some("A".to_string()));
            {
                let _b = scoped(Some("B".to_string()));
                assert_eq!(current().as_deref(), Some("B"));
            }
            assert_eq!(current().as_deref(), Some("A"));
        }
        assert_eq!(current(), None);
    }

    #[test]
    fn test_scope_restores_on_panic() {
        clear();
        let _outer = scoped(Some("outer".to_string()));
        let result = std::panic::catch_unwind(|| {
            let _inner = scoped(Some("inner".to_string()));
            panic!("unwind");
        });
        assert!(result.is_err());
        assert_eq!(current().as_deref(), Some("outer"));
    }

    #[test]
    fn test_generated_ids_are_unique_uuids() {
        let guard = scoped(None);
        assert!(Uuid::parse_str(guard.id()).is_ok());
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn test_threads_do_not_share_slot() {
        clear();
        let _guard = scoped(Some("main".to_string()));
        let other = std::thread::spawn(current).join().unwrap();
        assert_eq!(other, None);
    }

    #[tokio::test]
    async fn test_scope_async_isolates_tasks() {
        let a = tokio::spawn(scope_async(Some("task-a".to_string()), async {
            tokio::task::yield_now().await;
            current()
        }));
        let b = tokio::spawn(scope_async(Some("task-b".to_string()), async {
            tokio::task::yield_now().await;
            current()
        }));

        assert_eq!(a.await.unwrap().as_deref(), Some("task-a"));
        assert_eq!(b.await.unwrap().as_deref(), Some("task-b"));
    }

    #[tokio::test]
    async fn test_guard_inside_task_scope() {
        let seen = scope_async(Some("req".to_string()), async {
            {
                let _inner = scoped(Some("sub".to_string()));
                assert_eq!(current().as_deref(), Some("sub"));
            }
            current()
        })
        .await;
        assert_eq!(seen.as_deref(), Some("req"));
    }

    #[test]
    fn test_scope_async_leaves_thread_slot_alone() {
        clear();
        let _guard = scoped(Some("thread".to_string()));
        let seen = tokio_test::block_on(scope_async(None, async { current() }));

        assert!(seen.is_some_and(|id| id != "thread"));
        assert_eq!(current().as_deref(), Some("thread"));
    }
}

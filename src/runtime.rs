//! Shared tokio runtime for synchronous callers.
//!
//! The runners in this crate are async and spawn their workers with
//! `tokio::task::JoinSet`, so they must run inside a tokio runtime. Code that
//! is not async reaches them through [`try_run_blocking`], which picks the
//! right way to block:
//!
//! - **Outside any runtime**: blocks on a lazily-created, process-wide
//!   multi-thread runtime ([`global`]), through the thread's cached
//!   [`handle`].
//! - **Inside a multi-thread runtime**: uses `block_in_place` on the current
//!   runtime, keeping the caller's runtime context (spans, metrics).
//! - **Inside a current-thread runtime**: returns
//!   [`BlockingError::CurrentThreadRuntime`], since blocking there would stall
//!   the only thread that can drive the workers.

use std::cell::RefCell;
use std::future::Future;
use std::sync::LazyLock;

use thiserror::Error;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};

// =============================================================================
// Global Runtime
// =============================================================================

/// Process-wide runtime, one worker thread per CPU, created on first use.
static GLOBAL_RUNTIME: LazyLock<Runtime> = LazyLock::new(|| {
    Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("fanpool-worker")
        .enable_all()
        .build()
        .expect("Failed to create global tokio runtime")
});

/// Returns the process-wide runtime, creating it on first call.
#[inline]
#[must_use]
pub fn global() -> &'static Runtime {
    &GLOBAL_RUNTIME
}

// =============================================================================
// Handle Caching
// =============================================================================

thread_local! {
    /// Per-thread clone of the global runtime's handle.
    static CACHED_HANDLE: RefCell<Option<Handle>> = const { RefCell::new(None) };
}

/// Returns a handle to the current runtime, or to the global one.
///
/// Inside a tokio runtime this is `Handle::current()`. Outside, it is the
/// global runtime's handle, cached per thread after the first call.
///
/// ```rust
/// use fanpool::runtime::handle;
///
/// let result = handle().block_on(async { 6 * 7 });
/// assert_eq!(result, 42);
/// ```
#[must_use]
pub fn handle() -> Handle {
    if let Ok(current) = Handle::try_current() {
        return current;
    }
    CACHED_HANDLE.with(|cached| {
        cached
            .borrow_mut()
            .get_or_insert_with(|| global().handle().clone())
            .clone()
    })
}

// =============================================================================
// Blocking Execution
// =============================================================================

/// Why a future could not be run to completion synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BlockingError {
    /// Called from inside a current-thread runtime, where `block_in_place`
    /// is unsupported.
    #[error(
        "cannot execute blocking operation in current-thread runtime: \
         block_in_place is only supported in multi-thread runtimes"
    )]
    CurrentThreadRuntime,

    /// Called from inside a runtime of a flavor this crate does not know.
    #[error(
        "cannot execute blocking operation: \
         the runtime flavor is not supported for blocking execution"
    )]
    UnsupportedRuntimeFlavor,
}

/// Runs `future` to completion on the current thread.
///
/// # Errors
///
/// Returns [`BlockingError::CurrentThreadRuntime`] when called from inside a
/// current-thread runtime, and [`BlockingError::UnsupportedRuntimeFlavor`]
/// for runtime flavors that cannot block in place.
///
/// # Examples
///
/// ```rust
/// use fanpool::runtime::try_run_blocking;
///
/// let answer = try_run_blocking(async { 40 + 2 });
/// assert_eq!(answer, Ok(42));
/// ```
pub fn try_run_blocking<F, T>(future: F) -> Result<T, BlockingError>
where
    F: Future<Output = T>,
{
    let Ok(current) = Handle::try_current() else {
        return Ok(handle().block_on(future));
    };
    match current.runtime_flavor() {
        RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| current.block_on(future)))
        }
        RuntimeFlavor::CurrentThread => Err(BlockingError::CurrentThreadRuntime),
        _ => Err(BlockingError::UnsupportedRuntimeFlavor),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::ptr;

    #[rstest]
    fn global_returns_same_instance() {
        assert!(ptr::eq(global(), global()));
    }

    #[rstest]
    fn handle_outside_a_runtime_drives_the_global_runtime() {
        let first = handle();
        let second = handle();
        assert_eq!(first.runtime_flavor(), RuntimeFlavor::MultiThread);
        assert_eq!(first.block_on(async { 1 }), 1);
        assert_eq!(second.block_on(async { 2 }), 2);
    }

    #[rstest]
    #[tokio::test(flavor = "current_thread")]
    async fn handle_inside_a_runtime_is_the_current_one() {
        let obtained = handle();
        assert_eq!(obtained.runtime_flavor(), RuntimeFlavor::CurrentThread);
        assert_eq!(obtained.spawn(async { 7 }).await.unwrap(), 7);
    }

    #[rstest]
    fn outside_a_runtime_uses_the_global_runtime() {
        let result = try_run_blocking(async {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            Handle::current().runtime_flavor()
        });
        assert_eq!(result, Ok(RuntimeFlavor::MultiThread));
    }

    #[rstest]
    #[tokio::test(flavor = "current_thread")]
    async fn current_thread_runtime_is_rejected() {
        let result = try_run_blocking(async { 1 });
        assert_eq!(result, Err(BlockingError::CurrentThreadRuntime));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn multi_thread_runtime_blocks_in_place() {
        let result = tokio::task::spawn_blocking(|| try_run_blocking(async { 7 }))
            .await
            .unwrap();
        assert_eq!(result, Ok(7));
    }

    #[rstest]
    fn blocking_error_display() {
        assert!(
            BlockingError::CurrentThreadRuntime
                .to_string()
                .contains("current-thread runtime")
        );
        assert!(
            BlockingError::UnsupportedRuntimeFlavor
                .to_string()
                .contains("not supported")
        );
    }
}

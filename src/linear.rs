//! Sequential, fail-fast item runners.
//!
//! These run one item at a time in batch order and stop at the first error:
//! the failing item is recorded under its index and no later item is ever
//! started. The returned result therefore covers a prefix of the batch; use
//! [`BatchResult::is_complete`] to check whether the whole batch ran.
//!
//! Since nothing runs concurrently, the request-accepting variants hand every
//! item a handle to the caller's own context instead of a fork.

use std::future::Future;

use crate::context::ExecutionContext;
use crate::result::{BatchResult, DataResult};

/// Runs `work` over the items in order, stopping at the first error.
///
/// # Examples
///
/// ```rust
/// use fanpool::linear::run_linear;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let items = vec!["a", "b", "c"];
/// let result = run_linear(items.clone(), |item| async move {
///     if item == "b" { Err("b is broken") } else { Ok(()) }
/// })
/// .await;
///
/// assert_eq!(result.success, 1);
/// assert_eq!(result.error(1), Some(&"b is broken"));
/// assert!(!result.is_complete(items.len()));
/// # }
/// ```
pub async fn run_linear<I, E, F, Fut>(
    items: impl IntoIterator<Item = I>,
    mut work: F,
) -> BatchResult<E>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let mut result = BatchResult::new();
    for (index, item) in items.into_iter().enumerate() {
        match work(item).await {
            Ok(()) => result.record_success(),
            Err(error) => {
                tracing::debug!(index, "linear run stopped at failing item");
                result.record_failure(index, error);
                break;
            }
        }
    }
    result
}

/// Runs `work` over the items in order, keeping outputs, stopping at the
/// first error.
pub async fn run_data_linear<I, O, E, F, Fut>(
    items: impl IntoIterator<Item = I>,
    mut work: F,
) -> DataResult<O, E>
where
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<O, E>>,
{
    let mut result = DataResult::new();
    for (index, item) in items.into_iter().enumerate() {
        let outcome = work(item).await;
        let failed = outcome.is_err();
        result.record(index, outcome);
        if failed {
            tracing::debug!(index, "linear run stopped at failing item");
            break;
        }
    }
    result
}

/// Runs `work` over the items in order against the caller's context,
/// stopping at the first error.
pub async fn run_request_linear<R, I, E, F, Fut>(
    request: &R,
    items: impl IntoIterator<Item = I>,
    mut work: F,
) -> BatchResult<E>
where
    R: ExecutionContext,
    F: FnMut(R, I) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    run_linear(items, |item| work(request.clone(), item)).await
}

/// Runs `work` over the items in order against the caller's context, keeping
/// outputs, stopping at the first error.
pub async fn run_request_data_linear<R, I, O, E, F, Fut>(
    request: &R,
    items: impl IntoIterator<Item = I>,
    mut work: F,
) -> DataResult<O, E>
where
    R: ExecutionContext,
    F: FnMut(R, I) -> Fut,
    Fut: Future<Output = Result<O, E>>,
{
    run_data_linear(items, |item| work(request.clone(), item)).await
}

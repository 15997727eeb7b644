//! Worker pools that log through a request.
//!
//! [`run_with_context`] and [`run_data_with_context`] behave like
//! [`run_pool`](crate::pool::run_pool) and
//! [`run_data_pool`](crate::pool::run_data_pool), and additionally hand every
//! item its own fork of a request. When an item finishes, the aggregator
//! merges that item's fork into the request before recording the outcome, so
//! the request's log receives every item's lines without two items ever
//! writing to it at once.
//!
//! # Examples
//!
//! ```rust
//! use fanpool::context::Request;
//! use fanpool::request::run_with_context;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut request = Request::new("extend sessions");
//! let result = run_with_context(
//!     &mut request,
//!     vec!["a1", "b2", "c3"],
//!     |rq: Request, token: &'static str| async move {
//!         rq.add_log(format!("extended {token}"));
//!         Ok::<(), String>(())
//!     },
//!     4,
//! )
//! .await;
//!
//! assert_eq!(result.success, 3);
//! assert_eq!(request.len(), 4);
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::config::PoolConfig;
use crate::context::ExecutionContext;
use crate::pool::fan_out_in;
use crate::result::{BatchResult, DataResult};

/// Runs `work` over every item with bounded concurrency, each item on its own
/// fork of `request`.
///
/// # Panics
///
/// Resumes the first panic raised by `work`, after every other item has run.
/// The panicking item's fork is not merged.
pub async fn run_with_context<R, I, E, F, Fut>(
    request: &mut R,
    items: impl IntoIterator<Item = I>,
    work: F,
    config: impl Into<PoolConfig>,
) -> BatchResult<E>
where
    R: ExecutionContext,
    I: Send + 'static,
    E: Send + 'static,
    F: Fn(R, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    run_data_with_context(request, items, work, config)
        .await
        .into_result()
}

/// Runs `work` over every item with bounded concurrency, each item on its own
/// fork of `request`, keeping outputs.
///
/// # Panics
///
/// Resumes the first panic raised by `work`, after every other item has run.
/// The panicking item's fork is not merged.
pub async fn run_data_with_context<R, I, O, E, F, Fut>(
    request: &mut R,
    items: impl IntoIterator<Item = I>,
    work: F,
    config: impl Into<PoolConfig>,
) -> DataResult<O, E>
where
    R: ExecutionContext,
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
    F: Fn(R, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
{
    let parent = request.clone();
    let work = Arc::new(work);
    let forked = move |item: I| {
        let work = Arc::clone(&work);
        let child = parent.fork();
        async move {
            let outcome = work(child.clone(), item).await;
            (child, outcome)
        }
    };

    let mut result = DataResult::new();
    fan_out_in(
        items.into_iter().collect(),
        config.into(),
        forked,
        |index, (child, outcome): (R, Result<O, E>)| {
            request.merge(&child);
            result.record(index, outcome);
        },
    )
    .await;
    tracing::debug!(
        success = result.success,
        failed = result.failed(),
        "request pool batch finished"
    );
    result
}

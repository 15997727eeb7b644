//! Synchronous entry points.
//!
//! Each function here runs its async counterpart to completion through
//! [`try_run_blocking`], so it can be called from plain threads, or from
//! `spawn_blocking` sections of a multi-thread runtime.
//!
//! ```rust
//! use fanpool::blocking;
//!
//! let result = blocking::run_data_pool(
//!     vec![1, 2, 3],
//!     |n: u64| async move { Ok::<u64, String>(n * n) },
//!     2,
//! )
//! .unwrap();
//! assert_eq!(result.into_ordered_output(), vec![1, 4, 9]);
//! ```

use std::future::Future;
use std::time::Duration;

use crate::config::PoolConfig;
use crate::error::GroupError;
use crate::group::{self, ActionContext};
use crate::pool;
use crate::result::{BatchResult, DataResult};
use crate::runtime::{BlockingError, try_run_blocking};

/// Blocking [`pool::run_pool`].
///
/// # Errors
///
/// Returns [`BlockingError`] if the current thread cannot block.
pub fn run_pool<I, E, F, Fut>(
    items: impl IntoIterator<Item = I>,
    work: F,
    config: impl Into<PoolConfig>,
) -> Result<BatchResult<E>, BlockingError>
where
    I: Send + 'static,
    E: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    try_run_blocking(pool::run_pool(items, work, config))
}

/// Blocking [`pool::run_data_pool`].
///
/// # Errors
///
/// Returns [`BlockingError`] if the current thread cannot block.
pub fn run_data_pool<I, O, E, F, Fut>(
    items: impl IntoIterator<Item = I>,
    work: F,
    config: impl Into<PoolConfig>,
) -> Result<DataResult<O, E>, BlockingError>
where
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
{
    try_run_blocking(pool::run_data_pool(items, work, config))
}

/// Blocking [`group::run_actions`].
///
/// # Errors
///
/// The outer error is a [`BlockingError`] if the current thread cannot block;
/// the inner one is the group's outcome.
pub fn run_actions<E, A>(
    actions: impl IntoIterator<Item = A>,
) -> Result<Result<(), GroupError<E>>, BlockingError>
where
    E: Send + 'static,
    A: Future<Output = Result<(), E>> + Send + 'static,
{
    try_run_blocking(group::run_actions(actions))
}

/// Blocking [`group::run_actions_with_timeout`].
///
/// # Errors
///
/// The outer error is a [`BlockingError`] if the current thread cannot block;
/// the inner one is the group's outcome.
pub fn run_actions_with_timeout<E, F, Fut>(
    timeout: Duration,
    actions: impl IntoIterator<Item = F>,
) -> Result<Result<(), GroupError<E>>, BlockingError>
where
    E: Send + 'static,
    F: FnOnce(ActionContext) -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    try_run_blocking(group::run_actions_with_timeout(timeout, actions))
}

//! Action groups: run independent actions linearly or concurrently.
//!
//! Unlike the worker pool, a group produces no per-item data. It reports one
//! error for the whole group:
//!
//! - **Linear** runners (`*_linear`) await the actions one at a time in order
//!   and return the first error immediately. Later actions are never polled.
//! - **Concurrent** runners launch every action as its own task, wait for all
//!   of them, and return the first error in completion order.
//!
//! # Cancellation
//!
//! [`run_context_actions`] and [`run_actions_with_timeout`] give every action
//! a shared [`ActionContext`]. The first error, or the expiry of the group's
//! deadline, cancels that context. Cancellation is cooperative: an action
//! that watches its context can stop early, an action that ignores it runs to
//! completion. Either way the group returns only after every launched action
//! has returned.
//!
//! # Requests
//!
//! [`run_requests`] runs each action against its own fork of a request and
//! merges each fork back into the request as soon as its action completes.
//! Merges happen on the task awaiting the group, one at a time.
//!
//! # Examples
//!
//! ```rust
//! use fanpool::error::GroupError;
//! use fanpool::group::{context_action, run_actions_with_timeout, ContextAction};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let actions: Vec<ContextAction<&str>> = vec![
//!     context_action(|_| async { Ok(()) }),
//!     context_action(|context| async move {
//!         context.cancelled().await;
//!         Err("gave up")
//!     }),
//! ];
//!
//! let error = run_actions_with_timeout(Duration::from_millis(20), actions)
//!     .await
//!     .unwrap_err();
//! assert!(matches!(error, GroupError::DeadlineExceeded { .. }));
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::GroupConfig;
use crate::context::ExecutionContext;
use crate::error::GroupError;

// =============================================================================
// Action Types
// =============================================================================

/// A boxed action, for collections of differently-typed futures.
pub type Action<E> = BoxFuture<'static, Result<(), E>>;

/// A boxed action that receives the group's [`ActionContext`].
pub type ContextAction<E> = Box<dyn FnOnce(ActionContext) -> Action<E> + Send>;

/// A boxed action that receives a request handle.
pub type RequestAction<R, E> = Box<dyn FnOnce(R) -> Action<E> + Send>;

/// Boxes a future as an [`Action`].
pub fn action<E, Fut>(future: Fut) -> Action<E>
where
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    Box::pin(future)
}

/// Boxes a closure as a [`ContextAction`].
pub fn context_action<E, F, Fut>(function: F) -> ContextAction<E>
where
    F: FnOnce(ActionContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    Box::new(move |context| Box::pin(function(context)))
}

/// Boxes a closure as a [`RequestAction`].
pub fn request_action<R, E, F, Fut>(function: F) -> RequestAction<R, E>
where
    F: FnOnce(R) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    Box::new(move |request| Box::pin(function(request)))
}

// =============================================================================
// ActionContext
// =============================================================================

/// The cancellation signal and deadline shared by one action group.
///
/// Cloning is cheap; all clones observe the same cancellation.
#[derive(Debug, Clone)]
pub struct ActionContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ActionContext {
    /// Creates a context that is only cancelled explicitly.
    #[must_use]
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    const fn with_deadline(token: CancellationToken, deadline: Option<Instant>) -> Self {
        Self { token, deadline }
    }

    /// Returns `true` once the group has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the group has been cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Returns the group's deadline, if it has one.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left until the deadline, if the group has one.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Runs `future` until it completes or the group is cancelled.
    ///
    /// Returns `None` if cancellation came first; `future` is dropped.
    pub async fn run_until_cancelled<F>(&self, future: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = self.token.cancelled() => None,
            output = future => Some(output),
        }
    }

    /// Cancels the group.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Default for ActionContext {
    fn default() -> Self {
        Self::background()
    }
}

// =============================================================================
// Linear Runners
// =============================================================================

/// Awaits the actions in order, returning the first error.
///
/// # Errors
///
/// Returns the error of the first failing action; later actions never run.
pub async fn run_actions_linear<E, A>(actions: impl IntoIterator<Item = A>) -> Result<(), E>
where
    A: Future<Output = Result<(), E>>,
{
    for action in actions {
        action.await?;
    }
    Ok(())
}

/// Awaits the context actions in order with one background context.
///
/// # Errors
///
/// Returns the error of the first failing action; later actions never run.
pub async fn run_context_actions_linear<E, F, Fut>(
    actions: impl IntoIterator<Item = F>,
) -> Result<(), E>
where
    F: FnOnce(ActionContext) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let context = ActionContext::background();
    for action in actions {
        action(context.clone()).await?;
    }
    Ok(())
}

/// Awaits the request actions in order, each with a handle to `request`.
///
/// # Errors
///
/// Returns the error of the first failing action; later actions never run.
pub async fn run_requests_linear<R, E, F, Fut>(
    request: &R,
    actions: impl IntoIterator<Item = F>,
) -> Result<(), E>
where
    R: ExecutionContext,
    F: FnOnce(R) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    for action in actions {
        action(request.clone()).await?;
    }
    Ok(())
}

// =============================================================================
// Concurrent Runners
// =============================================================================

/// Runs every action concurrently and returns the first error.
///
/// Waits for all actions even after one has failed. The actions get no
/// context, so a failure cannot interrupt them; use [`run_context_actions`]
/// for that.
///
/// # Errors
///
/// Returns [`GroupError::Failed`] with the first error in completion order.
///
/// # Panics
///
/// Resumes the first panic raised by an action, after all actions returned.
pub async fn run_actions<E, A>(actions: impl IntoIterator<Item = A>) -> Result<(), GroupError<E>>
where
    E: Send + 'static,
    A: Future<Output = Result<(), E>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for action in actions {
        tasks.spawn(action);
    }
    join_group(&mut tasks, None, None, |outcome| outcome).await
}

/// Runs every action concurrently with a shared, cancellable context.
///
/// The first error or the deadline in `config` cancels the context.
///
/// # Errors
///
/// Returns [`GroupError::Failed`] with the first error in completion order,
/// or [`GroupError::DeadlineExceeded`] if the deadline expired first.
///
/// # Panics
///
/// Resumes the first panic raised by an action, after all actions returned.
pub async fn run_context_actions<E, F, Fut>(
    config: impl Into<GroupConfig>,
    actions: impl IntoIterator<Item = F>,
) -> Result<(), GroupError<E>>
where
    E: Send + 'static,
    F: FnOnce(ActionContext) -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    let deadline = config
        .into()
        .timeout()
        .map(GroupDeadline::starting_now);
    let token = CancellationToken::new();
    let context =
        ActionContext::with_deadline(token.clone(), deadline.map(|deadline| deadline.at));

    let mut tasks = JoinSet::new();
    for action in actions {
        tasks.spawn(action(context.clone()));
    }
    join_group(&mut tasks, deadline, Some(&token), |outcome| outcome).await
}

/// Runs every action concurrently under a deadline.
///
/// A zero `timeout` means no deadline.
///
/// # Errors
///
/// Returns [`GroupError::DeadlineExceeded`] if the deadline expired before any
/// action failed, otherwise [`GroupError::Failed`] with the first error.
///
/// # Panics
///
/// Resumes the first panic raised by an action, after all actions returned.
pub async fn run_actions_with_timeout<E, F, Fut>(
    timeout: Duration,
    actions: impl IntoIterator<Item = F>,
) -> Result<(), GroupError<E>>
where
    E: Send + 'static,
    F: FnOnce(ActionContext) -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    run_context_actions(timeout, actions).await
}

/// Runs every action concurrently, each against its own fork of `request`.
///
/// Each fork is merged back into `request` as soon as its action completes.
/// Like [`run_actions`], a failure does not interrupt the other actions.
///
/// # Errors
///
/// Returns [`GroupError::Failed`] with the first error in completion order.
///
/// # Panics
///
/// Resumes the first panic raised by an action, after all actions returned.
pub async fn run_requests<R, E, F, Fut>(
    request: &mut R,
    actions: impl IntoIterator<Item = F>,
) -> Result<(), GroupError<E>>
where
    R: ExecutionContext,
    E: Send + 'static,
    F: FnOnce(R) -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for action in actions {
        let child = request.fork();
        let unit = action(child.clone());
        tasks.spawn(async move { (child, unit.await) });
    }
    join_group(&mut tasks, None, None, |(child, outcome)| {
        request.merge(&child);
        outcome
    })
    .await
}

// =============================================================================
// Group Join
// =============================================================================

/// The single instant at which a group expires, shared by its actions and
/// its join loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GroupDeadline {
    at: Instant,
    timeout: Duration,
}

impl GroupDeadline {
    fn starting_now(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }

    fn has_passed(self) -> bool {
        Instant::now() >= self.at
    }
}

/// Waits for every task, settling each output on the calling task.
///
/// `settle` turns a task's output into its success or error. The first error,
/// the first panic or the deadline cancels `token`. An error settled once the
/// deadline has passed is reported as the deadline.
pub(crate) async fn join_group<U, E, S>(
    tasks: &mut JoinSet<U>,
    deadline: Option<GroupDeadline>,
    token: Option<&CancellationToken>,
    mut settle: S,
) -> Result<(), GroupError<E>>
where
    U: Send + 'static,
    S: FnMut(U) -> Result<(), E>,
{
    let cancel = || {
        if let Some(token) = token {
            token.cancel();
        }
    };
    let expiry = async {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline.at).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(expiry);

    let mut expired = false;
    let mut first_error = None;
    let mut first_panic = None;

    loop {
        tokio::select! {
            biased;
            () = &mut expiry, if !expired => {
                expired = true;
                if let (None, Some(deadline)) = (&first_error, deadline) {
                    tracing::debug!(timeout = ?deadline.timeout, "action group deadline exceeded");
                    first_error = Some(GroupError::DeadlineExceeded {
                        timeout: deadline.timeout,
                    });
                }
                cancel();
            }
            joined = tasks.join_next() => {
                let Some(joined) = joined else {
                    break;
                };
                match joined {
                    Ok(output) => {
                        if let Err(error) = settle(output) {
                            if first_error.is_none() {
                                first_error = Some(match deadline {
                                    Some(deadline) if deadline.has_passed() => {
                                        tracing::debug!(
                                            timeout = ?deadline.timeout,
                                            "action group deadline exceeded"
                                        );
                                        GroupError::DeadlineExceeded {
                                            timeout: deadline.timeout,
                                        }
                                    }
                                    _ => {
                                        tracing::debug!("action group failed, cancelling siblings");
                                        GroupError::Failed(error)
                                    }
                                });
                            }
                            cancel();
                        }
                    }
                    Err(join_error) => {
                        cancel();
                        if join_error.is_panic() {
                            first_panic.get_or_insert(join_error.into_panic());
                        }
                    }
                }
            }
        }
    }

    if let Some(payload) = first_panic {
        std::panic::resume_unwind(payload);
    }
    first_error.map_or(Ok(()), Err)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Request;
    use rstest::rstest;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[rstest]
    #[tokio::test]
    async fn linear_never_polls_actions_after_a_failure() {
        let polled = Arc::new(AtomicUsize::new(0));
        let make = |fail: bool| {
            let polled = Arc::clone(&polled);
            action(async move {
                polled.fetch_add(1, Ordering::SeqCst);
                if fail { Err("failed") } else { Ok(()) }
            })
        };

        let result = run_actions_linear(vec![make(false), make(true), make(false)]).await;
        assert_eq!(result, Err("failed"));
        assert_eq!(polled.load(Ordering::SeqCst), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn concurrent_group_waits_for_every_action() {
        let finished = Arc::new(AtomicUsize::new(0));
        let actions: Vec<Action<&str>> = (0..5u64)
            .map(|n| {
                let finished = Arc::clone(&finished);
                action(async move {
                    tokio::time::sleep(Duration::from_millis(n * 3)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    if n == 0 { Err("first") } else { Ok(()) }
                })
            })
            .collect();

        let error = run_actions(actions).await.unwrap_err();
        assert_eq!(error, GroupError::Failed("first"));
        assert_eq!(finished.load(Ordering::SeqCst), 5);
    }

    #[rstest]
    #[tokio::test]
    async fn empty_group_succeeds() {
        let result = run_actions(Vec::<Action<()>>::new()).await;
        assert_eq!(result, Ok(()));
        let result = run_actions_with_timeout(Duration::from_secs(1), Vec::<ContextAction<()>>::new()).await;
        assert_eq!(result, Ok(()));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn first_error_cancels_cooperating_actions() {
        let actions: Vec<ContextAction<&str>> = vec![
            context_action(|_| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err("broken")
            }),
            context_action(|context| async move {
                match context
                    .run_until_cancelled(tokio::time::sleep(Duration::from_secs(60)))
                    .await
                {
                    Some(()) => Ok(()),
                    None => Err("cancelled"),
                }
            }),
        ];

        let start = Instant::now();
        let error = run_context_actions(GroupConfig::new(), actions).await.unwrap_err();
        assert_eq!(error, GroupError::Failed("broken"));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_cooperating_actions() {
        let actions = vec![context_action(|context: ActionContext| async move {
            tokio::select! {
                () = context.cancelled() => Err("cancelled"),
                () = tokio::time::sleep(Duration::from_secs(10)) => Ok(()),
            }
        })];

        let start = Instant::now();
        let error = run_actions_with_timeout(Duration::from_secs(1), actions)
            .await
            .unwrap_err();
        assert_eq!(
            error,
            GroupError::DeadlineExceeded {
                timeout: Duration::from_secs(1)
            }
        );
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_secs(2));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn actions_failing_at_their_own_deadline_report_the_deadline() {
        let actions: Vec<ContextAction<&str>> = (0..50)
            .map(|_| {
                context_action(|context: ActionContext| async move {
                    if let Some(deadline) = context.deadline() {
                        tokio::time::sleep_until(deadline).await;
                    }
                    Err("gave up at deadline")
                })
            })
            .collect();

        let error = run_actions_with_timeout(Duration::from_millis(30), actions)
            .await
            .unwrap_err();
        assert_eq!(
            error,
            GroupError::DeadlineExceeded {
                timeout: Duration::from_millis(30)
            }
        );
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn join_loop_expires_at_the_deadline_actions_see() {
        let token = CancellationToken::new();
        let deadline = GroupDeadline::starting_now(Duration::from_secs(2));
        let context = ActionContext::with_deadline(token.clone(), Some(deadline.at));
        assert_eq!(context.deadline(), Some(deadline.at));

        let mut tasks = JoinSet::new();
        tasks.spawn(async move { context.cancelled().await });
        let outcome =
            join_group(&mut tasks, Some(deadline), Some(&token), |()| Ok::<(), ()>(())).await;

        assert!(outcome.unwrap_err().is_deadline_exceeded());
        assert!(token.is_cancelled());
    }

    #[rstest]
    #[tokio::test]
    async fn join_without_a_token_still_reports_the_first_error() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async { Err::<(), _>("broken") });
        tasks.spawn(async { Ok(()) });
        let outcome = join_group(&mut tasks, None, None, |outcome| outcome).await;
        assert_eq!(outcome, Err(GroupError::Failed("broken")));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn deadline_does_not_stop_actions_that_ignore_it() {
        let actions = vec![context_action(|_: ActionContext| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok::<(), ()>(())
        })];

        let start = Instant::now();
        let error = run_actions_with_timeout(Duration::from_secs(1), actions)
            .await
            .unwrap_err();
        assert!(error.is_deadline_exceeded());
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn zero_timeout_means_no_deadline() {
        let actions = vec![context_action(|context: ActionContext| async move {
            assert!(context.deadline().is_none());
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), ()>(())
        })];
        assert_eq!(run_actions_with_timeout(Duration::ZERO, actions).await, Ok(()));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn context_reports_remaining_time() {
        let actions = vec![context_action(|context: ActionContext| async move {
            let before = context.remaining().unwrap();
            assert!(before <= Duration::from_secs(4) && before > Duration::from_secs(3));
            tokio::time::sleep(Duration::from_secs(1)).await;
            let after = context.remaining().unwrap();
            assert!(after <= Duration::from_secs(3));
            Ok::<(), ()>(())
        })];
        assert_eq!(run_actions_with_timeout(Duration::from_secs(4), actions).await, Ok(()));
    }

    #[rstest]
    #[tokio::test]
    async fn linear_context_actions_share_one_context() {
        let actions: Vec<ContextAction<()>> = vec![
            context_action(|context| async move {
                assert!(!context.is_cancelled());
                Ok(())
            }),
            context_action(|context| async move {
                assert!(context.deadline().is_none());
                Ok(())
            }),
        ];
        assert_eq!(run_context_actions_linear(actions).await, Ok(()));
    }

    #[rstest]
    #[tokio::test]
    async fn requests_merge_every_fork_into_the_parent() {
        let mut request = Request::new("requests");
        let actions: Vec<RequestAction<Request, String>> = (0..4)
            .map(|n| {
                request_action(move |rq: Request| async move {
                    rq.add_log(format!("unit {n} start"));
                    tokio::task::yield_now().await;
                    rq.add_log(format!("unit {n} end"));
                    if n == 2 { Err(format!("unit {n} failed")) } else { Ok(()) }
                })
            })
            .collect();

        let error = run_requests(&mut request, actions).await.unwrap_err();
        assert_eq!(error, GroupError::Failed("unit 2 failed".to_string()));

        let logs = request.logs();
        assert_eq!(logs.len(), 9);
        for n in 0..4 {
            let start = logs.iter().position(|line| line.ends_with(&format!("unit {n} start")));
            let end = logs.iter().position(|line| line.ends_with(&format!("unit {n} end")));
            assert_eq!(end.zip(start).map(|(end, start)| end - start), Some(1));
        }
    }

    #[rstest]
    #[tokio::test]
    async fn linear_requests_stop_at_first_error() {
        let request = Request::new("linear requests");
        let actions: Vec<RequestAction<Request, &str>> = vec![
            request_action(|rq: Request| async move {
                rq.add_log("ran");
                Ok(())
            }),
            request_action(|_| async { Err("stop") }),
            request_action(|rq: Request| async move {
                rq.add_log("must not run");
                Ok(())
            }),
        ];

        assert_eq!(run_requests_linear(&request, actions).await, Err("stop"));
        assert_eq!(request.len(), 2);
    }
}

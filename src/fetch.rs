//! Aggregation of lists fetched from several sources.
//!
//! A fetcher loads a list of items on behalf of a request. The runners here
//! call every fetcher and concatenate the lists, in fetcher order.
//!
//! - [`fetch_lists_linear`] calls the fetchers one at a time with the caller's
//!   request and stops at the first error.
//! - [`fetch_lists`] calls every fetcher concurrently, each on its own fork of
//!   the request, merges each fork back as its fetcher completes, and reports
//!   the first error in completion order once every fetcher has returned.
//!
//! # Examples
//!
//! ```rust
//! use fanpool::context::Request;
//! use fanpool::fetch::{fetch_lists, list_fetcher, ListFetcher};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut request = Request::new("load inbox");
//! let fetchers: Vec<ListFetcher<Request, &str, String>> = vec![
//!     list_fetcher(|_| async { Ok(vec!["mail-1", "mail-2"]) }),
//!     list_fetcher(|_| async { Ok(vec!["chat-1"]) }),
//! ];
//!
//! let items = fetch_lists(&mut request, fetchers).await.unwrap();
//! assert_eq!(items, vec!["mail-1", "mail-2", "chat-1"]);
//! # }
//! ```

use std::future::Future;

use futures::future::BoxFuture;
use tokio::task::JoinSet;

use crate::context::ExecutionContext;
use crate::error::GroupError;
use crate::group::join_group;

/// A boxed list fetcher, for collections of differently-typed closures.
pub type ListFetcher<R, T, E> = Box<dyn FnOnce(R) -> BoxFuture<'static, Result<Vec<T>, E>> + Send>;

/// Boxes a closure as a [`ListFetcher`].
pub fn list_fetcher<R, T, E, F, Fut>(function: F) -> ListFetcher<R, T, E>
where
    F: FnOnce(R) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<T>, E>> + Send + 'static,
{
    Box::new(move |request| Box::pin(function(request)))
}

/// Calls the fetchers in order with `request` and concatenates their lists.
///
/// # Errors
///
/// Returns the error of the first failing fetcher; later fetchers never run.
pub async fn fetch_lists_linear<R, T, E, F, Fut>(
    request: &R,
    fetchers: impl IntoIterator<Item = F>,
) -> Result<Vec<T>, E>
where
    R: ExecutionContext,
    F: FnOnce(R) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let mut all = Vec::new();
    for fetcher in fetchers {
        all.extend(fetcher(request.clone()).await?);
    }
    Ok(all)
}

/// Calls every fetcher concurrently, each on its own fork of `request`, and
/// concatenates their lists in fetcher order.
///
/// # Errors
///
/// Returns [`GroupError::Failed`] with the first error in completion order.
/// The lists of fetchers that succeeded are discarded in that case.
///
/// # Panics
///
/// Resumes the first panic raised by a fetcher, after all fetchers returned.
pub async fn fetch_lists<R, T, E, F, Fut>(
    request: &mut R,
    fetchers: impl IntoIterator<Item = F>,
) -> Result<Vec<T>, GroupError<E>>
where
    R: ExecutionContext,
    T: Send + 'static,
    E: Send + 'static,
    F: FnOnce(R) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    let mut slots: Vec<Option<Vec<T>>> = Vec::new();
    for (position, fetcher) in fetchers.into_iter().enumerate() {
        let child = request.fork();
        let unit = fetcher(child.clone());
        tasks.spawn(async move { (position, child, unit.await) });
        slots.push(None);
    }

    join_group(&mut tasks, None, None, |(position, child, outcome)| {
        request.merge(&child);
        slots[position] = Some(outcome?);
        Ok(())
    })
    .await?;

    Ok(slots.into_iter().flatten().flatten().collect())
}

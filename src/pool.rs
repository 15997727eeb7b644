//! Bounded worker pool with index-correlated fan-out/fan-in.
//!
//! [`run_pool`] and [`run_data_pool`] run one work function over every item of
//! a batch with at most `workers` invocations in flight, and report each
//! item's outcome under its position in the batch.
//!
//! # Pipeline
//!
//! ```text
//!             input (cap 1)            output (cap = workers)
//! producer ──────────────────► worker 0 ─┐
//!   (index, item)          ├─► worker 1 ─┼──────────────────► aggregator
//!                          └─► worker n ─┘   (index, outcome)
//! ```
//!
//! - One producer task enumerates the batch in order and closes the input
//!   channel when done.
//! - Each worker pulls from the shared input, runs the work function and
//!   pushes the outcome. Workers exit once the input is closed and drained.
//! - Each worker owns a sender of the output channel, so the channel closes
//!   exactly when the last worker exits. The aggregator reads until then.
//! - The output channel holds one slot per worker, so a finishing worker can
//!   always hand off its outcome even while the aggregator is busy.
//!
//! With [`Distribution::Striped`] the producer is replaced by a fixed
//! partition: worker `w` of `n` runs indices `w, w + n, ...`.
//!
//! # Guarantees
//!
//! - Every item runs exactly once and yields exactly one outcome.
//! - A failing item never stops its siblings.
//! - Completion order is unspecified; the index is the only correlation.
//! - An empty batch returns immediately without spawning anything.
//!
//! # Panics
//!
//! A panicking work function does not lose sibling outcomes: the panic is
//! caught at the item, the rest of the batch still runs, and the first panic
//! is then resumed on the calling task.
//!
//! # Examples
//!
//! ```rust
//! use fanpool::pool::run_data_pool;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let result = run_data_pool(
//!     vec![1, 2, 3, 4, 5],
//!     |x: i32| async move {
//!         if x == 3 { Err(format!("bad item {x}")) } else { Ok(x * 10) }
//!     },
//!     2,
//! )
//! .await;
//!
//! assert_eq!(result.success, 4);
//! assert_eq!(result.error(2).map(String::as_str), Some("bad item 3"));
//! assert_eq!(result.into_ordered_output(), vec![10, 20, 40, 50]);
//! # }
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::config::{Distribution, PoolConfig};
use crate::result::{BatchResult, DataResult};

// =============================================================================
// Channel Messages
// =============================================================================

/// An item tagged with its position in the batch.
#[derive(Debug)]
pub(crate) struct Indexed<T> {
    pub(crate) index: usize,
    pub(crate) item: T,
}

/// The outcome of one item, or the payload of the panic it raised.
pub(crate) struct Outcome<U> {
    pub(crate) index: usize,
    pub(crate) value: Result<U, Box<dyn Any + Send>>,
}

// =============================================================================
// Public API
// =============================================================================

/// Runs `work` over every item with bounded concurrency.
///
/// Returns the number of successful items and the error of every failed
/// item, keyed by index. Never stops early.
///
/// # Arguments
///
/// * `items` - The batch.
/// * `work` - Called once per item.
/// * `config` - Worker count (a bare `usize`) or a full [`PoolConfig`].
///
/// # Panics
///
/// Resumes the first panic raised by `work`, after every other item has run.
///
/// # Examples
///
/// ```rust
/// use fanpool::pool::run_pool;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let result = run_pool(0..10, |n: u32| async move {
///     if n % 4 == 0 { Err(n) } else { Ok(()) }
/// }, 3).await;
///
/// assert_eq!(result.success, 7);
/// assert_eq!(result.failed_indices(), vec![0, 4, 8]);
/// # }
/// ```
pub async fn run_pool<I, E, F, Fut>(
    items: impl IntoIterator<Item = I>,
    work: F,
    config: impl Into<PoolConfig>,
) -> BatchResult<E>
where
    I: Send + 'static,
    E: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    run_data_pool(items, work, config).await.into_result()
}

/// Runs `work` over every item with bounded concurrency, keeping outputs.
///
/// Like [`run_pool`], and additionally records the value of every successful
/// item under its index.
///
/// # Panics
///
/// Resumes the first panic raised by `work`, after every other item has run.
pub async fn run_data_pool<I, O, E, F, Fut>(
    items: impl IntoIterator<Item = I>,
    work: F,
    config: impl Into<PoolConfig>,
) -> DataResult<O, E>
where
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
{
    let mut result = DataResult::new();
    fan_out_in(items.into_iter().collect(), config.into(), work, |index, outcome| {
        if outcome.is_err() {
            tracing::trace!(index, "pool item failed");
        }
        result.record(index, outcome);
    })
    .await;
    tracing::debug!(
        success = result.success,
        failed = result.failed(),
        "pool batch finished"
    );
    result
}

// =============================================================================
// Fan-out / Fan-in
// =============================================================================

/// Runs `work` over `items` and feeds every outcome to `sink` on the calling
/// task.
///
/// `sink` is called exactly once per item, never concurrently.
pub(crate) async fn fan_out_in<I, U, W, Fut, S>(
    items: Vec<I>,
    config: PoolConfig,
    work: W,
    mut sink: S,
) where
    I: Send + 'static,
    U: Send + 'static,
    W: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = U> + Send + 'static,
    S: FnMut(usize, U),
{
    let batch_len = items.len();
    if batch_len == 0 {
        return;
    }

    let workers = config.effective_workers(batch_len);
    tracing::debug!(
        items = batch_len,
        workers,
        distribution = ?config.distribution(),
        "pool batch started"
    );

    let work = Arc::new(work);
    let (output_sender, mut output_receiver) = mpsc::channel::<Outcome<U>>(workers);
    let mut tasks = JoinSet::new();

    match config.distribution() {
        Distribution::SharedQueue => {
            spawn_shared_queue(&mut tasks, items, workers, &work, &output_sender);
        }
        Distribution::Striped => {
            spawn_striped(&mut tasks, items, workers, &work, &output_sender);
        }
    }
    // Only workers hold senders now; the channel closes when the last exits.
    drop(output_sender);

    let mut first_panic = None;
    while let Some(outcome) = output_receiver.recv().await {
        match outcome.value {
            Ok(value) => sink(outcome.index, value),
            Err(payload) => {
                tracing::warn!(index = outcome.index, "pool work function panicked");
                first_panic.get_or_insert(payload);
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(error) = joined {
            if error.is_panic() {
                first_panic.get_or_insert(error.into_panic());
            }
        }
    }

    if let Some(payload) = first_panic {
        std::panic::resume_unwind(payload);
    }
}

fn spawn_shared_queue<I, U, W, Fut>(
    tasks: &mut JoinSet<()>,
    items: Vec<I>,
    workers: usize,
    work: &Arc<W>,
    output_sender: &mpsc::Sender<Outcome<U>>,
) where
    I: Send + 'static,
    U: Send + 'static,
    W: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = U> + Send + 'static,
{
    let (input_sender, input_receiver) = mpsc::channel::<Indexed<I>>(1);
    let input_receiver = Arc::new(Mutex::new(input_receiver));

    for worker in 0..workers {
        let input_receiver = Arc::clone(&input_receiver);
        let output_sender = output_sender.clone();
        let work = Arc::clone(work);
        tasks.spawn(
            async move {
                loop {
                    let next = input_receiver.lock().await.recv().await;
                    let Some(Indexed { index, item }) = next else {
                        break;
                    };
                    let value = run_item(work.as_ref(), item).await;
                    if output_sender.send(Outcome { index, value }).await.is_err() {
                        break;
                    }
                }
            }
            .instrument(tracing::debug_span!("pool_worker", worker)),
        );
    }

    tasks.spawn(async move {
        for (index, item) in items.into_iter().enumerate() {
            // Fails only if every worker is gone.
            if input_sender.send(Indexed { index, item }).await.is_err() {
                break;
            }
        }
    });
}

fn spawn_striped<I, U, W, Fut>(
    tasks: &mut JoinSet<()>,
    items: Vec<I>,
    workers: usize,
    work: &Arc<W>,
    output_sender: &mpsc::Sender<Outcome<U>>,
) where
    I: Send + 'static,
    U: Send + 'static,
    W: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = U> + Send + 'static,
{
    let stripe_len = items.len().div_ceil(workers);
    let mut stripes: Vec<Vec<Indexed<I>>> = (0..workers)
        .map(|_| Vec::with_capacity(stripe_len))
        .collect();
    for (index, item) in items.into_iter().enumerate() {
        stripes[index % workers].push(Indexed { index, item });
    }

    for (worker, stripe) in stripes.into_iter().enumerate() {
        let output_sender = output_sender.clone();
        let work = Arc::clone(work);
        tasks.spawn(
            async move {
                for Indexed { index, item } in stripe {
                    let value = run_item(work.as_ref(), item).await;
                    if output_sender.send(Outcome { index, value }).await.is_err() {
                        break;
                    }
                }
            }
            .instrument(tracing::debug_span!("pool_worker", worker)),
        );
    }
}

/// Runs one item, catching a panic raised while creating or polling its future.
async fn run_item<I, U, W, Fut>(work: &W, item: I) -> Result<U, Box<dyn Any + Send>>
where
    W: Fn(I) -> Fut,
    Fut: Future<Output = U>,
{
    AssertUnwindSafe(async move { work(item).await })
        .catch_unwind()
        .await
}

// =============================================================================
// Unit Tests
// =============================================================================

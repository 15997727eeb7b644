//! # fanpool
//!
//! Bounded-concurrency batch execution on tokio.
//!
//! ## Overview
//!
//! - **Worker pool** ([`pool`]): run one work function over a batch with at
//!   most `n` invocations in flight; every item's outcome is reported under
//!   its index, and failures never stop the rest of the batch.
//! - **Linear runners** ([`linear`]): the same contract, one item at a time,
//!   stopping at the first failure.
//! - **Action groups** ([`group`]): run independent actions linearly or
//!   concurrently, with cooperative cancellation and deadlines.
//! - **Request-scoped logging** ([`context`], [`request`]): every concurrent
//!   unit logs into its own fork of a request, merged back when it finishes.
//! - **List aggregation** ([`fetch`]): concatenate lists loaded from several
//!   sources.
//! - **Blocking bridge** ([`runtime`], [`blocking`]): call the runners from
//!   synchronous code.
//!
//! ## Example
//!
//! ```rust
//! use fanpool::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let result = run_data_pool(
//!     vec![1, 2, 3, 4, 5],
//!     |x: i32| async move { if x == 3 { Err("three") } else { Ok(x * 10) } },
//!     2,
//! )
//! .await;
//!
//! assert_eq!(result.success, 4);
//! assert_eq!(result.error(2), Some(&"three"));
//! assert_eq!(result.output(4), Some(&50));
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: `Serialize`/`Deserialize` for the configuration types

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports the runners, result types, configuration and the request type.
pub mod prelude {
    pub use crate::config::{Distribution, EngineConfig, GroupConfig, PoolConfig};
    pub use crate::context::{ExecutionContext, Request};
    pub use crate::error::GroupError;
    pub use crate::fetch::{ListFetcher, fetch_lists, fetch_lists_linear, list_fetcher};
    pub use crate::group::{
        Action, ActionContext, ContextAction, RequestAction, action, context_action,
        request_action, run_actions, run_actions_linear, run_actions_with_timeout,
        run_context_actions, run_context_actions_linear, run_requests, run_requests_linear,
    };
    pub use crate::linear::{
        run_data_linear, run_linear, run_request_data_linear, run_request_linear,
    };
    pub use crate::pool::{run_data_pool, run_pool};
    pub use crate::request::{run_data_with_context, run_with_context};
    pub use crate::result::{BatchResult, DataResult};
}

pub mod blocking;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod group;
pub mod linear;
pub mod pool;
pub mod request;
pub mod result;
pub mod runtime;

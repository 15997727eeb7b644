//! Request-scoped log isolation.
//!
//! A request carries an append-only log. When several units of work run
//! concurrently on behalf of one request, letting all of them append to the
//! request's log would interleave their lines and race on the buffer. Instead
//! each unit gets a *fork*: a child handle with its own, empty log. When the
//! unit finishes, the runner *merges* the child back into the parent.
//!
//! # Discipline
//!
//! - Fork once per concurrent unit, before the unit starts.
//! - The unit logs only into its fork.
//! - Merge each fork exactly once, after its unit finished.
//! - Merges into one parent are never concurrent. Every runner in this crate
//!   performs merges from the single task that awaits the batch, so callers
//!   only have to uphold this when merging by hand.
//!
//! The parent ends up with every unit's lines. Lines of one unit stay
//! contiguous and in order; units appear in completion order.
//!
//! # Examples
//!
//! ```rust
//! use fanpool::context::{ExecutionContext, Request};
//!
//! let mut parent = Request::new("extend sessions");
//! let child = parent.fork();
//! child.add_log("extended session 42");
//! assert_eq!(parent.len(), 1);
//!
//! parent.merge(&child);
//! assert_eq!(parent.len(), 2);
//! assert!(child.is_empty());
//! assert!(parent.logs()[1].ends_with("extended session 42"));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

const DIVIDER_WIDTH: usize = 30;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// ExecutionContext
// =============================================================================

/// A request-like handle whose log can be forked and merged.
///
/// # Contract
///
/// - `clone` returns another handle to the **same** log.
/// - `fork` returns a handle to a **new, independent** log.
/// - `merge` moves every entry of `child` to the end of `self`'s log and
///   leaves `child` empty.
pub trait ExecutionContext: Clone + Send + Sync + 'static {
    /// Creates a child context with its own, empty log.
    #[must_use]
    fn fork(&self) -> Self;

    /// Appends the child's entries to this context's log.
    fn merge(&mut self, child: &Self);
}

// =============================================================================
// Request
// =============================================================================

/// A named request with a timestamped, append-only log.
///
/// Every entry is also emitted as a `tracing` debug event carrying the request
/// name, so the log is visible to subscribers as it is written.
#[derive(Clone)]
pub struct Request {
    name: Arc<str>,
    logs: Arc<Mutex<Vec<String>>>,
}

impl Request {
    /// Creates a request whose log starts with a timestamped `name` entry.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name: Arc<str> = Arc::from(name.into());
        let request = Self {
            name: Arc::clone(&name),
            logs: Arc::new(Mutex::new(Vec::new())),
        };
        request.add_log(&*name);
        request
    }

    /// Returns the request name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a timestamped entry.
    pub fn add_log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::debug!(request = %self.name, "{message}");
        let entry = format!(
            "{} {message}",
            chrono::Local::now().format(TIMESTAMP_FORMAT)
        );
        self.logs.lock().push(entry);
    }

    /// Appends an `Error: ...` entry.
    pub fn add_error_log(&self, error: &dyn std::error::Error) {
        self.add_log(format!("Error: {error}"));
    }

    /// Appends a `Time: ...` entry with the time elapsed since `start`.
    pub fn add_duration_log(&self, start: Instant) {
        self.add_log(format!("Time: {:?}", start.elapsed()));
    }

    /// Returns a snapshot of the log.
    #[must_use]
    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.logs.lock().len()
    }

    /// Returns `true` if the log has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.logs.lock().is_empty()
    }

    /// Renders the log between two divider lines.
    #[must_use]
    pub fn output(&self) -> String {
        let divider = "-".repeat(DIVIDER_WIDTH);
        format!("{divider}\n{}\n{divider}", self.logs.lock().join("\n"))
    }
}

impl ExecutionContext for Request {
    fn fork(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            logs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn merge(&mut self, child: &Self) {
        if Arc::ptr_eq(&self.logs, &child.logs) {
            return;
        }
        let entries = std::mem::take(&mut *child.logs.lock());
        self.logs.lock().extend(entries);
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Request")
            .field("name", &self.name)
            .field("entries", &self.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(Request: Send, Sync, ExecutionContext);

// =============================================================================
// Unit Tests
// =============================================================================

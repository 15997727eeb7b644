//! Aggregated outcomes of a batch run.
//!
//! Every runner in this crate reports its per-item outcomes through one of
//! two plain value types:
//!
//! - [`BatchResult`]: how many items succeeded, and the error of every item
//!   that failed, keyed by the item's position in the input batch.
//! - [`DataResult`]: the same, plus the value produced by every item that
//!   succeeded.
//!
//! # Invariants
//!
//! For a batch of `N` items run through a pool, once the run returns:
//!
//! - `success + errors.len() == N`
//! - every index in `0..N` is either counted in `success` or a key of
//!   `errors`, never both
//! - for [`DataResult`], `output` holds exactly the indices that are not in
//!   `errors`
//!
//! Linear (fail-fast) runners stop at the first failure, so for them
//! `processed()` may be smaller than `N`. Use [`BatchResult::is_complete`] to
//! tell the two apart.
//!
//! # Examples
//!
//! ```rust
//! use fanpool::result::DataResult;
//!
//! let result: DataResult<i32, String> = DataResult::new();
//! assert_eq!(result.success, 0);
//! assert!(result.errors.is_empty());
//! assert!(result.output.is_empty());
//! assert!(result.is_complete(0));
//! ```

use std::collections::HashMap;

// =============================================================================
// BatchResult
// =============================================================================

/// Success count and per-index errors of a batch.
///
/// # Type Parameters
///
/// - `E`: The error type returned by the work function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult<E> {
    /// Number of items whose work function returned `Ok`.
    pub success: usize,
    /// Error of every failed item, keyed by its index in the input batch.
    pub errors: HashMap<usize, E>,
}

impl<E> BatchResult<E> {
    /// Creates an empty result: zero successes and no errors.
    #[must_use]
    pub fn new() -> Self {
        Self {
            success: 0,
            errors: HashMap::new(),
        }
    }

    /// Returns the number of failed items.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of items that produced an outcome.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.success + self.errors.len()
    }

    /// Returns `true` if every one of `batch_len` items produced an outcome.
    ///
    /// Always `true` for pool runs; `false` for a linear run that stopped
    /// early.
    #[must_use]
    pub fn is_complete(&self, batch_len: usize) -> bool {
        self.processed() == batch_len
    }

    /// Returns `true` if no item failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the error recorded for `index`, if that item failed.
    #[must_use]
    pub fn error(&self, index: usize) -> Option<&E> {
        self.errors.get(&index)
    }

    /// Returns the failed indices in ascending order.
    #[must_use]
    pub fn failed_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.errors.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    pub(crate) fn record_success(&mut self) {
        self.success += 1;
    }

    pub(crate) fn record_failure(&mut self, index: usize, error: E) {
        self.errors.insert(index, error);
    }
}

impl<E> Default for BatchResult<E> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// DataResult
// =============================================================================

/// Success count, per-index errors and per-index outputs of a batch.
///
/// # Type Parameters
///
/// - `O`: The value produced by a successful work function.
/// - `E`: The error type returned by the work function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataResult<O, E> {
    /// Number of items whose work function returned `Ok`.
    pub success: usize,
    /// Error of every failed item, keyed by its index in the input batch.
    pub errors: HashMap<usize, E>,
    /// Output of every successful item, keyed by its index in the input batch.
    pub output: HashMap<usize, O>,
}

impl<O, E> DataResult<O, E> {
    /// Creates an empty result: zero successes, no errors and no outputs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            success: 0,
            errors: HashMap::new(),
            output: HashMap::new(),
        }
    }

    /// Returns the number of failed items.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of items that produced an outcome.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.success + self.errors.len()
    }

    /// Returns `true` if every one of `batch_len` items produced an outcome.
    #[must_use]
    pub fn is_complete(&self, batch_len: usize) -> bool {
        self.processed() == batch_len
    }

    /// Returns `true` if no item failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the error recorded for `index`, if that item failed.
    #[must_use]
    pub fn error(&self, index: usize) -> Option<&E> {
        self.errors.get(&index)
    }

    /// Returns the output recorded for `index`, if that item succeeded.
    #[must_use]
    pub fn output(&self, index: usize) -> Option<&O> {
        self.output.get(&index)
    }

    /// Returns the outputs ordered by their input index.
    ///
    /// Failed indices are skipped, so positions in the returned vector do not
    /// line up with input positions when any item failed.
    #[must_use]
    pub fn into_ordered_output(self) -> Vec<O> {
        let mut entries: Vec<(usize, O)> = self.output.into_iter().collect();
        entries.sort_unstable_by_key(|(index, _)| *index);
        entries.into_iter().map(|(_, value)| value).collect()
    }

    /// Drops the outputs, keeping the success count and errors.
    #[must_use]
    pub fn into_result(self) -> BatchResult<E> {
        BatchResult {
            success: self.success,
            errors: self.errors,
        }
    }

    pub(crate) fn record(&mut self, index: usize, outcome: Result<O, E>) {
        match outcome {
            Ok(value) => {
                self.success += 1;
                self.output.insert(index, value);
            }
            Err(error) => {
                self.errors.insert(index, error);
            }
        }
    }
}

impl<O, E> Default for DataResult<O, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O, E> From<DataResult<O, E>> for BatchResult<E> {
    fn from(result: DataResult<O, E>) -> Self {
        result.into_result()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

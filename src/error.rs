//! Error types for the runners and configuration.
//!
//! Pool runners never fail as a whole: every per-item error lands in a
//! [`BatchResult`](crate::result::BatchResult). The types here cover the
//! cases where a single error represents a whole group of actions
//! ([`GroupError`]) and invalid configuration values ([`ConfigError`]).

use std::time::Duration;

use thiserror::Error;

/// The single error a concurrent action group reports.
///
/// A group reports the first failure in completion order. A deadline expiry
/// counts as a failure like any other: once it is observed, later action
/// errors (typically the cancellation errors of cooperating actions) are not
/// reported.
///
/// # Examples
///
/// ```rust
/// use fanpool::error::GroupError;
/// use std::time::Duration;
///
/// let error: GroupError<String> = GroupError::DeadlineExceeded {
///     timeout: Duration::from_secs(1),
/// };
/// assert_eq!(error.to_string(), "action group deadline exceeded after 1s");
/// assert!(error.is_deadline_exceeded());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError<E> {
    /// An action returned an error.
    #[error("action failed: {0}")]
    Failed(E),

    /// The group's deadline expired before every action finished.
    #[error("action group deadline exceeded after {timeout:?}")]
    DeadlineExceeded {
        /// The timeout the group was started with.
        timeout: Duration,
    },
}

impl<E> GroupError<E> {
    /// Returns `true` if the group was stopped by its deadline.
    #[must_use]
    pub const fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }

    /// Returns the action error, if an action failed first.
    #[must_use]
    pub const fn as_failed(&self) -> Option<&E> {
        match self {
            Self::Failed(error) => Some(error),
            Self::DeadlineExceeded { .. } => None,
        }
    }

    /// Consumes the error and returns the action error, if any.
    #[must_use]
    pub fn into_failed(self) -> Option<E> {
        match self {
            Self::Failed(error) => Some(error),
            Self::DeadlineExceeded { .. } => None,
        }
    }
}

/// Errors raised while loading engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A configuration variable holds a value that cannot be used.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// The name of the configuration variable.
        key: String,
        /// Why the value was rejected.
        message: String,
    },
}

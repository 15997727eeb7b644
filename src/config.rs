//! Configuration for worker pools and action groups.
//!
//! Runners accept their configuration through `impl Into<...>` parameters so
//! the common cases stay short:
//!
//! ```rust
//! use fanpool::config::{Distribution, GroupConfig, PoolConfig};
//! use std::time::Duration;
//!
//! // A bare worker count is a pool configuration.
//! let pool: PoolConfig = 4.into();
//! assert_eq!(pool.workers(), 4);
//! assert_eq!(pool.distribution(), Distribution::SharedQueue);
//!
//! // A bare duration is a group deadline.
//! let group: GroupConfig = Duration::from_secs(2).into();
//! assert_eq!(group.timeout(), Some(Duration::from_secs(2)));
//! ```
//!
//! [`EngineConfig::from_env`] loads both from environment variables.

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable holding the default worker count.
pub const WORKERS_VAR: &str = "FANPOOL_WORKERS";
/// Environment variable holding the default distribution (`shared` or `striped`).
pub const DISTRIBUTION_VAR: &str = "FANPOOL_DISTRIBUTION";
/// Environment variable holding the default group timeout in seconds.
pub const TIMEOUT_VAR: &str = "FANPOOL_TIMEOUT_SECONDS";

// =============================================================================
// Distribution
// =============================================================================

/// How a pool hands items to its workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Distribution {
    /// Workers pull the next item from one shared queue.
    ///
    /// Balances uneven per-item cost: a worker stuck on a slow item does not
    /// hold back the items behind it.
    #[default]
    SharedQueue,

    /// Worker `w` of `n` processes indices `w, w + n, w + 2n, ...`.
    ///
    /// Partitioning is fixed up front, so a slow item delays every later item
    /// of the same stripe.
    Striped,
}

impl Distribution {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "shared" | "shared_queue" | "queue" => Some(Self::SharedQueue),
            "striped" | "stripe" => Some(Self::Striped),
            _ => None,
        }
    }
}

// =============================================================================
// PoolConfig
// =============================================================================

/// Worker count and distribution of a bounded worker pool.
///
/// The worker count is stored as given; the lower bound of one worker is
/// applied when a batch runs (see [`PoolConfig::effective_workers`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    workers: usize,
    distribution: Distribution,
}

impl PoolConfig {
    /// Creates a shared-queue configuration with `workers` workers.
    #[must_use]
    pub const fn new(workers: usize) -> Self {
        Self {
            workers,
            distribution: Distribution::SharedQueue,
        }
    }

    /// Returns a copy with the worker count replaced.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Returns a copy with the distribution replaced.
    #[must_use]
    pub const fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    /// Returns the configured worker count.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Returns the configured distribution.
    #[must_use]
    pub const fn distribution(&self) -> Distribution {
        self.distribution
    }

    /// Returns the number of workers actually spawned for a batch.
    ///
    /// At least one, and never more than there are items.
    ///
    /// ```rust
    /// use fanpool::config::PoolConfig;
    ///
    /// assert_eq!(PoolConfig::new(0).effective_workers(10), 1);
    /// assert_eq!(PoolConfig::new(8).effective_workers(3), 3);
    /// assert_eq!(PoolConfig::new(4).effective_workers(100), 4);
    /// ```
    #[must_use]
    pub fn effective_workers(&self, batch_len: usize) -> usize {
        self.workers.max(1).min(batch_len.max(1))
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl From<usize> for PoolConfig {
    fn from(workers: usize) -> Self {
        Self::new(workers)
    }
}

// =============================================================================
// GroupConfig
// =============================================================================

/// Deadline of a concurrent action group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GroupConfig {
    timeout: Option<Duration>,
}

impl GroupConfig {
    /// Creates a configuration without a deadline.
    #[must_use]
    pub const fn new() -> Self {
        Self { timeout: None }
    }

    /// Returns a copy with the given timeout. A zero duration means no deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() { None } else { Some(timeout) };
        self
    }

    /// Creates a configuration from a timeout in seconds.
    ///
    /// Zero, negative and non-finite values mean no deadline.
    ///
    /// ```rust
    /// use fanpool::config::GroupConfig;
    /// use std::time::Duration;
    ///
    /// assert_eq!(GroupConfig::from_secs_f64(1.5).timeout(), Some(Duration::from_millis(1500)));
    /// assert_eq!(GroupConfig::from_secs_f64(0.0).timeout(), None);
    /// assert_eq!(GroupConfig::from_secs_f64(-3.0).timeout(), None);
    /// ```
    #[must_use]
    pub fn from_secs_f64(seconds: f64) -> Self {
        match Duration::try_from_secs_f64(seconds) {
            Ok(timeout) => Self::new().with_timeout(timeout),
            Err(_) => Self::new(),
        }
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl From<Duration> for GroupConfig {
    fn from(timeout: Duration) -> Self {
        Self::new().with_timeout(timeout)
    }
}

impl From<Option<Duration>> for GroupConfig {
    fn from(timeout: Option<Duration>) -> Self {
        timeout.map_or_else(Self::new, Self::from)
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Default pool and group configuration for an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Default worker pool configuration.
    pub pool: PoolConfig,
    /// Default action group configuration.
    pub group: GroupConfig,
}

impl EngineConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `FANPOOL_WORKERS`: worker count (optional, default: number of CPUs)
    /// - `FANPOOL_DISTRIBUTION`: `shared` or `striped` (optional, default: `shared`)
    /// - `FANPOOL_TIMEOUT_SECONDS`: group deadline in seconds (optional, default: none)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but cannot be
    /// parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is present but
    /// cannot be parsed.
    ///
    /// ```rust
    /// use fanpool::config::{Distribution, EngineConfig};
    /// use std::time::Duration;
    ///
    /// let config = EngineConfig::from_lookup(|key| match key {
    ///     "FANPOOL_WORKERS" => Some("6".to_string()),
    ///     "FANPOOL_DISTRIBUTION" => Some("striped".to_string()),
    ///     "FANPOOL_TIMEOUT_SECONDS" => Some("2.5".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(config.pool.workers(), 6);
    /// assert_eq!(config.pool.distribution(), Distribution::Striped);
    /// assert_eq!(config.group.timeout(), Some(Duration::from_millis(2500)));
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut pool = PoolConfig::default();
        if let Some(value) = lookup(WORKERS_VAR) {
            let workers = value
                .trim()
                .parse::<usize>()
                .map_err(|error| invalid(WORKERS_VAR, &error.to_string()))?;
            pool = pool.with_workers(workers);
        }
        if let Some(value) = lookup(DISTRIBUTION_VAR) {
            let distribution = Distribution::parse(&value)
                .ok_or_else(|| invalid(DISTRIBUTION_VAR, "expected `shared` or `striped`"))?;
            pool = pool.with_distribution(distribution);
        }

        let mut group = GroupConfig::new();
        if let Some(value) = lookup(TIMEOUT_VAR) {
            let seconds = value
                .trim()
                .parse::<f64>()
                .map_err(|error| invalid(TIMEOUT_VAR, &error.to_string()))?;
            group = GroupConfig::from_secs_f64(seconds);
        }

        Ok(Self { pool, group })
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

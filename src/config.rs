use crate::retry::{Backoff, RetryPolicy};

use std::sync;

/// Settings shared by every request sent through a [`Db`](crate::db::Db).
///
/// ```rust
/// use dynamodb_fluent::{config::Config, retry::NoRetry};
///
/// let config = Config::default()
///     .with_retry_policy(NoRetry)
///     .with_consistent_reads(true);
/// assert!(config.consistent_reads());
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    retry_policy: sync::Arc<dyn RetryPolicy>,
    consistent_reads: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry_policy: sync::Arc::new(Backoff::default()),
            consistent_reads: false,
        }
    }
}

impl Config {
    /// Replaces the retry policy, [`Backoff`] by default.
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = sync::Arc::new(policy);
        self
    }

    /// Makes reads strongly consistent unless a request says otherwise.
    pub fn with_consistent_reads(mut self, consistent: bool) -> Self {
        self.consistent_reads = consistent;
        self
    }

    /// The retry policy.
    pub fn retry_policy(&self) -> &dyn RetryPolicy {
        self.retry_policy.as_ref()
    }

    /// Whether reads default to strong consistency.
    pub fn consistent_reads(&self) -> bool {
        self.consistent_reads
    }
}

//! Resolution policies.

use std::fmt;
use std::time::Duration;

use clap::ValueEnum;

/// What to do when some expected endpoints never show up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PartialPolicy {
    /// Register only when every expected endpoint is found
    #[default]
    RequireAll,
    /// Register whatever was found once retries are exhausted
    AllowPartial,
}

/// How a "No metrics reporter configured" log line counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum NoReporterPolicy {
    /// Drop that process from the expected endpoint count
    #[default]
    Exclude,
    /// The application cannot be resolved this cycle
    Block,
}

impl fmt::Display for PartialPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequireAll => f.write_str("require-all"),
            Self::AllowPartial => f.write_str("allow-partial"),
        }
    }
}

impl fmt::Display for NoReporterPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exclude => f.write_str("exclude"),
            Self::Block => f.write_str("block"),
        }
    }
}

/// Fixed-delay retry with an optional ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts; `None` retries forever
    pub max_attempts: Option<u32>,
    /// Delay between attempts
    pub interval: Duration,
}

impl RetryPolicy {
    /// `0` attempts means unlimited.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: (max_attempts > 0).then_some(max_attempts),
            interval,
        }
    }

    /// True once `attempts` attempts have been made and no more are allowed.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

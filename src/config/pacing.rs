//! Pacing policy for bulk operations.
//!
//! Telegram is strict about messaging throughput; the policy spaces out
//! attempts, pauses between batches, takes longer breaks on large target
//! lists, and backs off after runs of consecutive failures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Delay, batch, and break parameters governing a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingPolicy {
    /// Minimum pause after each attempt, success or failure.
    #[serde(default = "default_message_delay")]
    pub message_delay_secs: u64,

    /// Number of attempts per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause after every completed batch.
    #[serde(default = "default_batch_pause")]
    pub batch_pause_secs: u64,

    /// Target-list size above which long breaks apply; also the interval,
    /// in attempts, between long breaks.
    #[serde(default = "default_long_break_threshold")]
    pub long_break_threshold: usize,

    /// Duration of a long break.
    #[serde(default = "default_long_break")]
    pub long_break_secs: u64,

    /// Back-to-back failures that trigger a failure break.
    #[serde(default = "default_failure_limit")]
    pub consecutive_failure_limit: usize,

    /// Duration of a failure break.
    #[serde(default = "default_failure_break")]
    pub failure_break_secs: u64,

    /// Emit a progress notification every this many successes.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

fn default_message_delay() -> u64 {
    3
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_pause() -> u64 {
    60
}

fn default_long_break_threshold() -> usize {
    30
}

fn default_long_break() -> u64 {
    300
}

fn default_failure_limit() -> usize {
    5
}

fn default_failure_break() -> u64 {
    120
}

fn default_progress_every() -> usize {
    5
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            message_delay_secs: default_message_delay(),
            batch_size: default_batch_size(),
            batch_pause_secs: default_batch_pause(),
            long_break_threshold: default_long_break_threshold(),
            long_break_secs: default_long_break(),
            consecutive_failure_limit: default_failure_limit(),
            failure_break_secs: default_failure_break(),
            progress_every: default_progress_every(),
        }
    }
}

impl PacingPolicy {
    /// Checks the policy for values that would break the runner's counters.
    ///
    /// # Errors
    ///
    /// Returns an error for zero-valued intervals and limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidPacing("batch_size must be positive"));
        }
        if self.long_break_threshold == 0 {
            return Err(ConfigError::InvalidPacing(
                "long_break_threshold must be positive",
            ));
        }
        if self.consecutive_failure_limit == 0 {
            return Err(ConfigError::InvalidPacing(
                "consecutive_failure_limit must be positive",
            ));
        }
        if self.progress_every == 0 {
            return Err(ConfigError::InvalidPacing("progress_every must be positive"));
        }
        Ok(())
    }

    pub fn message_delay(&self) -> Duration {
        Duration::from_secs(self.message_delay_secs)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_secs(self.batch_pause_secs)
    }

    pub fn long_break(&self) -> Duration {
        Duration::from_secs(self.long_break_secs)
    }

    pub fn failure_break(&self) -> Duration {
        Duration::from_secs(self.failure_break_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_expected_throughput() {
        let pacing = PacingPolicy::default();
        assert_eq!(pacing.message_delay_secs, 3);
        assert_eq!(pacing.batch_size, 5);
        assert_eq!(pacing.batch_pause_secs, 60);
        assert_eq!(pacing.long_break_threshold, 30);
        assert_eq!(pacing.long_break_secs, 300);
        assert_eq!(pacing.consecutive_failure_limit, 5);
        assert_eq!(pacing.failure_break_secs, 120);
        assert!(pacing.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let pacing = PacingPolicy {
            batch_size: 0,
            ..PacingPolicy::default()
        };
        assert!(pacing.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_failure_limit() {
        let pacing = PacingPolicy {
            consecutive_failure_limit: 0,
            ..PacingPolicy::default()
        };
        assert!(pacing.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_progress_cadence() {
        let pacing = PacingPolicy {
            progress_every: 0,
            ..PacingPolicy::default()
        };
        assert!(pacing.validate().is_err());
    }
}

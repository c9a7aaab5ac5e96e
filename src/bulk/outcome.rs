//! Per-target outcomes and the run summary.

use std::fmt;

/// How a single target fared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// First attempt succeeded.
    Success,

    /// Rate limited, then the single retry succeeded.
    RateLimitedThenSuccess,

    /// Rate limited, then the single retry failed.
    RateLimitedThenFailed,

    /// Failed with no retry available.
    PermanentlyFailed,

    /// The action declined this target (e.g. it turned out to be a bot).
    SkippedExcluded,
}

impl OutcomeKind {
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success | Self::RateLimitedThenSuccess)
    }

    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::RateLimitedThenFailed | Self::PermanentlyFailed)
    }
}

/// Result of processing one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub user_id: i64,
    pub kind: OutcomeKind,

    /// Human-readable cause for failures and skips.
    pub cause: Option<String>,
}

impl OperationOutcome {
    #[must_use]
    pub fn new(user_id: i64, kind: OutcomeKind) -> Self {
        Self {
            user_id,
            kind,
            cause: None,
        }
    }

    #[must_use]
    pub fn with_cause(user_id: i64, kind: OutcomeKind, cause: impl Into<String>) -> Self {
        Self {
            user_id,
            kind,
            cause: Some(cause.into()),
        }
    }
}

/// Aggregated result of a bulk run.
#[derive(Debug, Clone, Default)]
pub struct BulkSummary {
    /// One outcome per non-excluded target, in processing order.
    pub outcomes: Vec<OperationOutcome>,

    /// How many targets were removed by exclusion filtering.
    pub filtered: usize,

    /// Whether the run stopped early on a caller-issued cancellation.
    pub cancelled: bool,
}

impl BulkSummary {
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.kind.is_success())
            .count()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.kind.is_failure())
            .count()
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.kind == OutcomeKind::SkippedExcluded)
            .count()
    }
}

impl fmt::Display for BulkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} skipped out of {} targets ({} filtered out)",
            self.success_count(),
            self.failure_count(),
            self.skipped_count(),
            self.outcomes.len(),
            self.filtered,
        )?;
        if self.cancelled {
            write!(f, " [cancelled]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert!(OutcomeKind::Success.is_success());
        assert!(OutcomeKind::RateLimitedThenSuccess.is_success());
        assert!(OutcomeKind::RateLimitedThenFailed.is_failure());
        assert!(OutcomeKind::PermanentlyFailed.is_failure());
        assert!(!OutcomeKind::SkippedExcluded.is_success());
        assert!(!OutcomeKind::SkippedExcluded.is_failure());
    }

    #[test]
    fn test_summary_counts_and_display() {
        let summary = BulkSummary {
            outcomes: vec![
                OperationOutcome::new(1, OutcomeKind::Success),
                OperationOutcome::new(2, OutcomeKind::RateLimitedThenSuccess),
                OperationOutcome::with_cause(3, OutcomeKind::PermanentlyFailed, "privacy"),
                OperationOutcome::with_cause(4, OutcomeKind::SkippedExcluded, "bot"),
            ],
            filtered: 2,
            cancelled: false,
        };

        assert_eq!(summary.success_count(), 2);
        assert_eq!(summary.failure_count(), 1);
        assert_eq!(summary.skipped_count(), 1);
        assert_eq!(
            summary.to_string(),
            "2 succeeded, 1 failed, 1 skipped out of 4 targets (2 filtered out)"
        );
    }
}

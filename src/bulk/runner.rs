//! The throttled bulk runner.
//!
//! Per-target state machine: `PENDING -> ATTEMPT -> {SUCCESS, RATE_LIMITED,
//! FAILED}`; a rate-limited attempt waits exactly the mandated duration and
//! retries the same target once. Targets are processed strictly sequentially
//! because Telegram tightens rate limits under concurrent access.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use super::outcome::{BulkSummary, OperationOutcome, OutcomeKind};
use crate::config::{ConfigError, PacingPolicy};
use crate::directory::RemoteError;

/// Ordered, deduplicated list of target user IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetList {
    ids: Vec<i64>,
}

impl TargetList {
    /// Builds a list, deduplicating while preserving order.
    #[must_use]
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        let mut seen = HashSet::new();
        Self {
            ids: ids.into_iter().filter(|id| seen.insert(*id)).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Removes the operator's own ID and every excluded ID, returning how
    /// many entries were dropped.
    pub fn apply_exclusions(&mut self, self_id: i64, excluded: &HashSet<i64>) -> usize {
        let before = self.ids.len();
        self.ids
            .retain(|id| *id != self_id && !excluded.contains(id));
        before - self.ids.len()
    }
}

/// What an action did with a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    /// The remote operation was performed.
    Done,

    /// The action declined this target (reason is reported in the outcome).
    Skipped(String),
}

/// A single remote operation applied once per target.
pub trait BulkAction {
    /// Short name for logging and progress lines.
    fn describe(&self) -> &str;

    /// Applies the operation to one target.
    fn apply(&self, user_id: i64) -> impl Future<Output = Result<ActionStatus, RemoteError>>;
}

/// Why the runner is pausing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// Telegram mandated a wait before the retry.
    FloodWait,
    /// Scheduled pause after a completed batch.
    Batch,
    /// Larger periodic pause for big target lists.
    LongBreak,
    /// Back-off after a run of consecutive failures.
    FailureBreak,
}

/// Progress notifications, delivered best-effort to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Exclusion filtering removed this many targets before the run.
    Filtered { removed: usize },

    /// Periodic success counter.
    Sent { success: usize, total: usize },

    /// The runner is entering a pause.
    Pause {
        reason: PauseReason,
        seconds: u64,
        processed: usize,
        total: usize,
    },
}

/// Cooperative cancellation flag, checked between targets.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; the runner stops before its next target.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Sequential bulk operator with pacing and bounded rate-limit retry.
pub struct BulkRunner {
    pacing: PacingPolicy,
    exclusions: HashSet<i64>,
    progress: Option<mpsc::UnboundedSender<Progress>>,
    cancel: CancelFlag,
}

impl BulkRunner {
    /// Creates a runner with a validated pacing policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the pacing policy is invalid; an invalid policy
    /// fails the whole operation before any target is attempted.
    pub fn new(pacing: PacingPolicy, exclusions: HashSet<i64>) -> Result<Self, ConfigError> {
        pacing.validate()?;
        Ok(Self {
            pacing,
            exclusions,
            progress: None,
            cancel: CancelFlag::new(),
        })
    }

    /// Attaches a progress channel.
    #[must_use]
    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<Progress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Returns a handle the caller can use to cancel the run.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Runs the action over every target once (plus at most one rate-limit
    /// retry per target) and returns the aggregated outcomes.
    ///
    /// `self_id` is the operating account's own ID; it and the configured
    /// exclusions are removed from the list before processing begins.
    pub async fn run<A: BulkAction>(
        &self,
        mut targets: TargetList,
        self_id: i64,
        action: &A,
    ) -> BulkSummary {
        let filtered = targets.apply_exclusions(self_id, &self.exclusions);
        if filtered > 0 {
            info!("Filtered {} excluded targets before {}", filtered, action.describe());
        }
        self.emit(Progress::Filtered { removed: filtered });

        let total = targets.len();
        let long_breaks_apply = total > self.pacing.long_break_threshold;
        let mut outcomes = Vec::with_capacity(total);
        let mut success = 0usize;
        let mut consecutive_failures = 0usize;

        for (index, user_id) in targets.ids.iter().copied().enumerate() {
            if self.cancel.is_cancelled() {
                info!(
                    "Bulk {} cancelled after {} of {} targets",
                    action.describe(),
                    index,
                    total
                );
                break;
            }

            let attempts = index + 1;
            let outcome = self.attempt(action, user_id, attempts, total).await;

            match outcome.kind {
                OutcomeKind::Success | OutcomeKind::RateLimitedThenSuccess => {
                    success += 1;
                    consecutive_failures = 0;
                    if success % self.pacing.progress_every == 0 {
                        self.emit(Progress::Sent { success, total });
                    }
                }
                OutcomeKind::PermanentlyFailed => consecutive_failures += 1,
                // Rate-limit-driven retries are excluded from the
                // consecutive-failure count.
                OutcomeKind::RateLimitedThenFailed | OutcomeKind::SkippedExcluded => {}
            }
            outcomes.push(outcome);

            if consecutive_failures >= self.pacing.consecutive_failure_limit {
                warn!(
                    "{} consecutive failures, backing off {}s",
                    consecutive_failures, self.pacing.failure_break_secs
                );
                self.pause(PauseReason::FailureBreak, self.pacing.failure_break(), attempts, total)
                    .await;
                consecutive_failures = 0;
            }

            if attempts < total {
                sleep(self.pacing.message_delay()).await;

                if attempts % self.pacing.batch_size == 0 {
                    self.pause(PauseReason::Batch, self.pacing.batch_pause(), attempts, total)
                        .await;
                }
                if long_breaks_apply && attempts % self.pacing.long_break_threshold == 0 {
                    self.pause(PauseReason::LongBreak, self.pacing.long_break(), attempts, total)
                        .await;
                }
            }
        }

        let summary = BulkSummary {
            outcomes,
            filtered,
            cancelled: self.cancel.is_cancelled(),
        };
        info!("Bulk {} finished: {}", action.describe(), summary);
        summary
    }

    /// One pass of the per-target state machine.
    async fn attempt<A: BulkAction>(
        &self,
        action: &A,
        user_id: i64,
        processed: usize,
        total: usize,
    ) -> OperationOutcome {
        match action.apply(user_id).await {
            Ok(ActionStatus::Done) => OperationOutcome::new(user_id, OutcomeKind::Success),
            Ok(ActionStatus::Skipped(reason)) => {
                debug!("Skipping {}: {}", user_id, reason);
                OperationOutcome::with_cause(user_id, OutcomeKind::SkippedExcluded, reason)
            }
            Err(RemoteError::RateLimited(wait_secs)) => {
                warn!(
                    "Rate limit hit on {}, waiting {}s before single retry",
                    user_id, wait_secs
                );
                self.pause(
                    PauseReason::FloodWait,
                    Duration::from_secs(u64::from(wait_secs)),
                    processed,
                    total,
                )
                .await;

                match action.apply(user_id).await {
                    Ok(ActionStatus::Done) => {
                        OperationOutcome::new(user_id, OutcomeKind::RateLimitedThenSuccess)
                    }
                    Ok(ActionStatus::Skipped(reason)) => {
                        OperationOutcome::with_cause(user_id, OutcomeKind::SkippedExcluded, reason)
                    }
                    Err(err) => {
                        debug!("Retry for {} failed: {}", user_id, err);
                        OperationOutcome::with_cause(
                            user_id,
                            OutcomeKind::RateLimitedThenFailed,
                            err.to_string(),
                        )
                    }
                }
            }
            Err(err) => {
                debug!("{} failed for {}: {}", action.describe(), user_id, err);
                OperationOutcome::with_cause(user_id, OutcomeKind::PermanentlyFailed, err.to_string())
            }
        }
    }

    async fn pause(&self, reason: PauseReason, duration: Duration, processed: usize, total: usize) {
        self.emit(Progress::Pause {
            reason,
            seconds: duration.as_secs(),
            processed,
            total,
        });
        sleep(duration).await;
    }

    fn emit(&self, progress: Progress) {
        if let Some(tx) = &self.progress {
            // Observability only; a closed receiver must not stop the run.
            let _ = tx.send(progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted action: pops one result per call, records every attempt.
    struct FakeAction {
        script: Mutex<VecDeque<Result<ActionStatus, RemoteError>>>,
        attempts: Mutex<Vec<i64>>,
        cancel_after: Option<(usize, CancelFlag)>,
    }

    impl FakeAction {
        fn always_ok() -> Self {
            Self::scripted(Vec::new())
        }

        fn scripted(script: Vec<Result<ActionStatus, RemoteError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                attempts: Mutex::new(Vec::new()),
                cancel_after: None,
            }
        }

        fn cancelling_after(count: usize, flag: CancelFlag) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                attempts: Mutex::new(Vec::new()),
                cancel_after: Some((count, flag)),
            }
        }

        fn attempts(&self) -> Vec<i64> {
            self.attempts.lock().unwrap().clone()
        }
    }

    impl BulkAction for FakeAction {
        fn describe(&self) -> &str {
            "fake"
        }

        async fn apply(&self, user_id: i64) -> Result<ActionStatus, RemoteError> {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(user_id);
            if let Some((count, flag)) = &self.cancel_after
                && attempts.len() >= *count
            {
                flag.cancel();
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(ActionStatus::Done))
        }
    }

    fn fast_pacing() -> PacingPolicy {
        PacingPolicy {
            message_delay_secs: 1,
            batch_size: 5,
            batch_pause_secs: 60,
            long_break_threshold: 30,
            long_break_secs: 300,
            consecutive_failure_limit: 5,
            failure_break_secs: 120,
            progress_every: 5,
        }
    }

    fn pauses_of(events: &[Progress], wanted: PauseReason) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, Progress::Pause { reason, .. } if *reason == wanted))
            .count()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Progress>) -> Vec<Progress> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_invalid_pacing_fails_fast() {
        let pacing = PacingPolicy {
            batch_size: 0,
            ..fast_pacing()
        };
        assert!(BulkRunner::new(pacing, HashSet::new()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_excluded_targets_never_attempted() {
        let exclusions: HashSet<i64> = [30].into_iter().collect();
        let runner = BulkRunner::new(fast_pacing(), exclusions).unwrap();
        let action = FakeAction::always_ok();

        let targets = TargetList::new([10, 1, 20, 30, 40]);
        let summary = runner.run(targets, 1, &action).await;

        assert_eq!(action.attempts(), vec![10, 20, 40]);
        assert_eq!(summary.filtered, 2);
        assert_eq!(summary.outcomes.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_outcome_per_remaining_target() {
        let runner = BulkRunner::new(fast_pacing(), HashSet::new()).unwrap();
        let action = FakeAction::scripted(vec![
            Ok(ActionStatus::Done),
            Err(RemoteError::Other("boom".to_owned())),
            Ok(ActionStatus::Skipped("bot".to_owned())),
        ]);

        let summary = runner.run(TargetList::new([1, 2, 3]), 99, &action).await;

        assert_eq!(summary.outcomes.len(), 3);
        assert_eq!(summary.outcomes[0].kind, OutcomeKind::Success);
        assert_eq!(summary.outcomes[1].kind, OutcomeKind::PermanentlyFailed);
        assert_eq!(summary.outcomes[2].kind, OutcomeKind::SkippedExcluded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_then_retries_once() {
        let runner = BulkRunner::new(fast_pacing(), HashSet::new()).unwrap();
        let action = FakeAction::scripted(vec![
            Err(RemoteError::RateLimited(5)),
            Ok(ActionStatus::Done),
        ]);

        let start = tokio::time::Instant::now();
        let summary = runner.run(TargetList::new([7]), 99, &action).await;

        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(summary.outcomes[0].kind, OutcomeKind::RateLimitedThenSuccess);
        assert_eq!(action.attempts(), vec![7, 7]);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retry_failure_is_terminal() {
        let runner = BulkRunner::new(fast_pacing(), HashSet::new()).unwrap();
        let action = FakeAction::scripted(vec![
            Err(RemoteError::RateLimited(3)),
            Err(RemoteError::PrivacyRestricted),
        ]);

        let summary = runner.run(TargetList::new([7]), 99, &action).await;

        assert_eq!(summary.outcomes[0].kind, OutcomeKind::RateLimitedThenFailed);
        // No third attempt after the single post-wait retry.
        assert_eq!(action.attempts(), vec![7, 7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_pauses_every_batch_size_attempts() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = BulkRunner::new(fast_pacing(), HashSet::new())
            .unwrap()
            .with_progress(tx);
        let action = FakeAction::always_ok();

        let targets = TargetList::new(1..=12);
        let summary = runner.run(targets, 99, &action).await;

        assert_eq!(summary.success_count(), 12);
        // Batches complete after targets 5 and 10; 12 is the last target.
        assert_eq!(pauses_of(&drain(&mut rx), PauseReason::Batch), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_break_only_above_threshold() {
        let pacing = PacingPolicy {
            long_break_threshold: 4,
            ..fast_pacing()
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = BulkRunner::new(pacing.clone(), HashSet::new())
            .unwrap()
            .with_progress(tx);
        let summary = runner
            .run(TargetList::new(1..=9), 99, &FakeAction::always_ok())
            .await;
        assert_eq!(summary.success_count(), 9);
        // 9 targets > threshold 4: long breaks after attempts 4 and 8.
        assert_eq!(pauses_of(&drain(&mut rx), PauseReason::LongBreak), 2);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = BulkRunner::new(pacing, HashSet::new())
            .unwrap()
            .with_progress(tx);
        runner
            .run(TargetList::new(1..=4), 99, &FakeAction::always_ok())
            .await;
        // At or below the threshold no long break applies.
        assert_eq!(pauses_of(&drain(&mut rx), PauseReason::LongBreak), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_failures_trigger_single_break() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = BulkRunner::new(fast_pacing(), HashSet::new())
            .unwrap()
            .with_progress(tx);
        let action = FakeAction::scripted(
            (0..5)
                .map(|_| Err(RemoteError::Other("down".to_owned())))
                .chain([Ok(ActionStatus::Done)])
                .collect(),
        );

        let summary = runner.run(TargetList::new(1..=6), 99, &action).await;

        assert_eq!(summary.failure_count(), 5);
        assert_eq!(summary.success_count(), 1);
        assert_eq!(pauses_of(&drain(&mut rx), PauseReason::FailureBreak), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_returns_partial_outcomes() {
        let runner = BulkRunner::new(fast_pacing(), HashSet::new()).unwrap();
        let action = FakeAction::cancelling_after(3, runner.cancel_flag());

        let summary = runner.run(TargetList::new(1..=10), 99, &action).await;

        assert_eq!(summary.outcomes.len(), 3);
        assert!(summary.cancelled);
        assert_eq!(action.attempts(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_reports_success_counts() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = BulkRunner::new(fast_pacing(), HashSet::new())
            .unwrap()
            .with_progress(tx);

        runner
            .run(TargetList::new(1..=10), 99, &FakeAction::always_ok())
            .await;

        let events = drain(&mut rx);
        let sent: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Progress::Sent { success, .. } => Some(*success),
                _ => None,
            })
            .collect();
        assert_eq!(sent, vec![5, 10]);
    }

    #[test]
    fn test_target_list_dedup_preserves_order() {
        let targets = TargetList::new([5, 3, 5, 1, 3]);
        assert_eq!(targets.len(), 3);
        assert_eq!(targets, TargetList::new([5, 3, 1]));
    }
}

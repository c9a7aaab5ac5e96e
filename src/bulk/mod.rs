//! Throttled bulk operations.
//!
//! Applies one remote action per target, strictly sequentially, under a
//! configurable pacing policy. Rate-limit signals suspend the run for the
//! mandated wait and retry the same target exactly once; all other per-target
//! failures are terminal for that target only and never abort the run.

mod actions;
mod outcome;
mod runner;

pub use actions::{InviteAction, InviteLinkAction, SendMessageAction};
pub use outcome::{BulkSummary, OperationOutcome, OutcomeKind};
pub use runner::{
    ActionStatus, BulkAction, BulkRunner, CancelFlag, PauseReason, Progress, TargetList,
};

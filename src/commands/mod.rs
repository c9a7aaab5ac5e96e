//! Command handling module.
//!
//! Parses free-form command text (`/collect_ids`, `/send_pm`, ...) and
//! executes the resulting operations against the resolver, bulk runner, and
//! persisted store.

mod handler;
mod types;

pub use handler::CommandHandler;
pub use types::{BotCommand, CommandResult};

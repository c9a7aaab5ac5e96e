//! Configuration module for the outreach bot.
//!
//! Handles Telegram API credentials, bot settings, and the pacing policy
//! that throttles bulk operations.

mod pacing;
mod settings;

pub use pacing::PacingPolicy;
pub use settings::{BotSettings, ConfigError, TelegramConfig};

/// Default page size for participant listings.
pub const PARTICIPANT_PAGE_SIZE: i32 = 200;

/// Hard cap on how many recent messages a chat collection may scan.
pub const MAX_HISTORY_SCAN: usize = 500;

//! Telegram client wrapper module.
//!
//! Provides authentication and the production [`crate::directory::Directory`]
//! implementation backed by grammers.

mod client;

pub use client::{PwdToken as PasswordToken, TelegramBot, TelegramError, Token as LoginToken};

//! Outreach User Bot Library
//!
//! A Telegram userbot for collecting group members and performing
//! rate-limited bulk operations against the collected targets.
//!
//! This crate provides the core functionality for:
//! - Resolving free-form chat references (IDs, usernames, invite links)
//! - Collecting participant IDs from groups and channels
//! - Sending direct messages and invites in throttled, retryable bulk runs
//! - Handling user commands and persisting collected state

pub mod bulk;
pub mod commands;
pub mod config;
pub mod directory;
pub mod resolver;
pub mod store;
pub mod telegram;

//! Persisted user data.
//!
//! A small JSON record holding the collected target IDs and the last
//! send/collection context. The record has an explicit load/save lifecycle
//! and is injected by path into whichever component needs it.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// The persisted record.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserData {
    /// User IDs collected from the most recent collection command.
    #[serde(default)]
    pub collected_ids: Vec<i64>,

    /// Reference of the group targeted by the last bulk operation.
    #[serde(default)]
    pub target_group_id: Option<String>,

    /// Text of the last message sent (or queued) in bulk.
    #[serde(default)]
    pub message_to_send: String,

    /// Canonical ID of the last group a collection resolved.
    #[serde(default)]
    pub last_group_id: Option<String>,

    /// Title of the last group a collection resolved.
    #[serde(default)]
    pub last_group_title: Option<String>,
}

impl UserData {
    /// Loads the record from a JSON file, returning defaults if the file is
    /// absent or malformed.
    #[must_use]
    pub fn load(path: impl AsRef<Path>) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(
                    "Malformed user data at {}: {err}, starting fresh",
                    path.as_ref().display()
                );
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Saves the record to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Replaces the collected IDs, deduplicating while preserving order.
    pub fn set_collected(&mut self, ids: Vec<i64>) {
        let mut seen = std::collections::HashSet::new();
        self.collected_ids = ids.into_iter().filter(|id| seen.insert(*id)).collect();
    }
}

//! Chat reference parsing.
//!
//! A reference is whatever the user typed to name a chat: a bare numeric ID,
//! a signed ID, a "-100"-prefixed supergroup ID, a username (with or without
//! `@`), or a `t.me/...` link. Parsing normalizes it once; the resolver then
//! decides which lookups to attempt.

use std::fmt;

/// A parsed, immutable chat reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReference {
    /// Numeric ID in any convention (bare, signed, or "-100"-prefixed).
    Id(i64),

    /// Public username, lowercased, without the leading `@`.
    Username(String),

    /// Slug of a private invite link (`t.me/+hash` or `t.me/joinchat/hash`).
    InviteSlug(String),
}

impl ChatReference {
    /// Parses a free-form reference string.
    ///
    /// Returns `None` for empty input.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }

        // t.me links carry either a public username or a private invite slug.
        if let Some(rest) = trimmed
            .split_once("t.me/")
            .map(|(_, rest)| rest.trim_end_matches('/'))
        {
            if rest.is_empty() {
                return None;
            }
            if let Some(hash) = rest.strip_prefix('+') {
                return Some(Self::InviteSlug(hash.to_owned()));
            }
            if let Some(hash) = rest.strip_prefix("joinchat/") {
                return Some(Self::InviteSlug(hash.to_owned()));
            }
            return Some(Self::Username(rest.to_lowercase()));
        }

        if let Some(name) = trimmed.strip_prefix('@') {
            if name.is_empty() {
                return None;
            }
            return Some(Self::Username(name.to_lowercase()));
        }

        if let Ok(id) = trimmed.parse::<i64>() {
            return Some(Self::Id(id));
        }

        Some(Self::Username(trimmed.to_lowercase()))
    }

    /// Numeric representations worth attempting for this reference, in order.
    ///
    /// A bare numeric ID is ambiguous between a basic-group ID and a
    /// supergroup ID lacking its prefix, so both forms are produced.
    #[must_use]
    pub fn id_candidates(&self) -> Vec<i64> {
        let Self::Id(id) = self else {
            return Vec::new();
        };

        let mut candidates = vec![*id];
        if let Some(prefixed) = with_supergroup_prefix(*id) {
            candidates.push(prefixed);
        }
        if let Some(stripped) = without_supergroup_prefix(*id) {
            candidates.push(stripped);
        }
        candidates.dedup();
        candidates
    }
}

impl fmt::Display for ChatReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Username(name) => write!(f, "@{name}"),
            Self::InviteSlug(hash) => write!(f, "t.me/+{hash}"),
        }
    }
}

/// Applies the "-100" supergroup prefix to an unprefixed ID.
///
/// The prefix is a string-level convention: `123456` becomes `-100123456`.
/// Returns `None` when the ID already carries the prefix or the result
/// overflows.
#[must_use]
pub fn with_supergroup_prefix(id: i64) -> Option<i64> {
    if has_supergroup_prefix(id) {
        return None;
    }
    format!("-100{}", id.unsigned_abs()).parse().ok()
}

/// Removes the "-100" supergroup prefix, yielding the bare positive ID.
///
/// Returns `None` when the ID is not prefixed.
#[must_use]
pub fn without_supergroup_prefix(id: i64) -> Option<i64> {
    let text = id.to_string();
    let rest = text.strip_prefix("-100")?;
    if rest.is_empty() {
        return None;
    }
    rest.parse().ok()
}

/// Whether an ID carries the "-100" supergroup prefix.
#[must_use]
pub fn has_supergroup_prefix(id: i64) -> bool {
    without_supergroup_prefix(id).is_some()
}

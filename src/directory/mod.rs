//! Remote directory seam.
//!
//! Everything the bot needs from Telegram's directory is behind the
//! [`Directory`] trait so the resolver and bulk runner can be exercised
//! against in-memory fakes. The production implementation lives in
//! `crate::telegram`.

use thiserror::Error;

/// Errors reported by the remote directory service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Telegram demands a mandatory wait before further requests.
    #[error("rate limited, must wait {0} seconds")]
    RateLimited(u32),

    /// The target's privacy settings forbid this operation.
    #[error("privacy settings forbid this operation")]
    PrivacyRestricted,

    /// The requested entity does not exist or is not visible.
    #[error("entity not found")]
    NotFound,

    /// Any other remote failure.
    #[error("{0}")]
    Other(String),
}

/// What kind of entity a resolved chat or user is.
///
/// Supergroups are channels with the megagroup flag; basic groups use a
/// different ID convention and different membership calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A user account (possibly a bot).
    User { bot: bool },
    /// A small, non-upgraded group.
    BasicGroup,
    /// A channel or supergroup.
    Channel { megagroup: bool },
}

/// A chat or user as known to the remote directory.
///
/// Fetched on demand and cached for the session by the resolver; never
/// persisted to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntity {
    /// Canonical signed ID: positive for users, negative for basic groups,
    /// "-100"-prefixed for channels and supergroups.
    pub id: i64,

    /// Access hash required by some remote calls, when known.
    pub access_hash: Option<i64>,

    /// Display title (or full name for users).
    pub title: String,

    /// Public username, without the leading `@`.
    pub username: Option<String>,

    /// Capability classification.
    pub kind: EntityKind,
}

impl ResolvedEntity {
    #[must_use]
    pub fn is_channel(&self) -> bool {
        matches!(self.kind, EntityKind::Channel { .. })
    }

    #[must_use]
    pub fn is_basic_group(&self) -> bool {
        matches!(self.kind, EntityKind::BasicGroup)
    }

    #[must_use]
    pub fn is_bot(&self) -> bool {
        matches!(self.kind, EntityKind::User { bot: true })
    }
}

/// A member of a chat, as returned by participant listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: i64,
    pub is_bot: bool,
    pub username: Option<String>,
}

/// The remote lookup and messaging service.
///
/// All methods perform remote reads or writes and may fail with a
/// [`RemoteError`]; rate-limit errors carry the mandated wait.
pub trait Directory {
    /// ID of the account performing the operations.
    fn self_id(&self) -> impl Future<Output = Result<i64, RemoteError>>;

    /// Looks up an entity by its canonical signed ID.
    fn entity_by_id(&self, id: i64) -> impl Future<Output = Result<ResolvedEntity, RemoteError>>;

    /// Looks up an entity by public username (no leading `@`).
    fn entity_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<ResolvedEntity, RemoteError>>;

    /// Returns the caller's chat list.
    fn dialogs(&self) -> impl Future<Output = Result<Vec<ResolvedEntity>, RemoteError>>;

    /// Returns the full member list of a chat, paginating internally.
    fn participants(
        &self,
        chat: &ResolvedEntity,
    ) -> impl Future<Output = Result<Vec<Participant>, RemoteError>>;

    /// Returns unique sender IDs from the chat's recent message history.
    fn recent_senders(
        &self,
        chat: &ResolvedEntity,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<i64>, RemoteError>>;

    /// Sends a direct message to a user.
    fn send_direct(
        &self,
        user_id: i64,
        text: &str,
    ) -> impl Future<Output = Result<(), RemoteError>>;

    /// Invites a user to a channel or supergroup.
    fn invite_to_channel(
        &self,
        chat: &ResolvedEntity,
        user_id: i64,
    ) -> impl Future<Output = Result<(), RemoteError>>;

    /// Adds a user to a basic group.
    fn add_to_basic_group(
        &self,
        chat: &ResolvedEntity,
        user_id: i64,
    ) -> impl Future<Output = Result<(), RemoteError>>;

    /// Creates an invite link for a chat.
    fn create_invite_link(
        &self,
        chat: &ResolvedEntity,
    ) -> impl Future<Output = Result<String, RemoteError>>;

    /// Joins a public chat by username.
    fn join(&self, username: &str) -> impl Future<Output = Result<(), RemoteError>>;
}

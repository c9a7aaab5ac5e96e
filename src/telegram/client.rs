//! Telegram client wrapper for member collection and bulk outreach.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use grammers_client::client::{LoginToken, PasswordToken};
use grammers_client::{sender, Client, InvocationError, SenderPool, SignInError};
use grammers_session::storages::SqliteSession;
use grammers_tl_types as tl;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{TelegramConfig, MAX_HISTORY_SCAN, PARTICIPANT_PAGE_SIZE};
use crate::directory::{Directory, EntityKind, Participant, RemoteError, ResolvedEntity};
use crate::resolver::{with_supergroup_prefix, without_supergroup_prefix};

/// Re-export types for external use.
pub use grammers_client::client::{LoginToken as Token, PasswordToken as PwdToken};

/// How many dialogs a single chat-list fetch covers.
const DIALOG_PAGE_SIZE: i32 = 100;

/// Page size for message history fetches (server-side cap).
const HISTORY_PAGE_SIZE: usize = 100;

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Not authorized. Please sign in first.")]
    NotAuthorized,

    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Password required for 2FA")]
    PasswordRequired(PasswordToken),

    #[error("Invalid password")]
    InvalidPassword(PasswordToken),

    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("API invocation error: {0}")]
    Invocation(String),
}

impl From<InvocationError> for TelegramError {
    fn from(err: InvocationError) -> Self {
        let err_str = err.to_string();

        // Check for flood wait errors
        if (err_str.contains("FLOOD_WAIT") || err_str.contains("flood"))
            && let Some(seconds) = extract_flood_wait_seconds(&err_str) {
                return Self::FloodWait(seconds);
            }

        Self::Invocation(err_str)
    }
}

/// Extracts flood wait seconds from an error message.
fn extract_flood_wait_seconds(err_msg: &str) -> Option<u32> {
    let patterns = ["FLOOD_WAIT_", "flood wait "];

    for pattern in patterns {
        if let Some(idx) = err_msg.to_lowercase().find(&pattern.to_lowercase()) {
            let start = idx + pattern.len();
            let num_str: String = err_msg[start..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(seconds) = num_str.parse() {
                return Some(seconds);
            }
        }
    }
    None
}

/// Maps a remote failure message onto the directory error vocabulary.
///
/// The resolver and bulk runner dispatch on these categories: flood waits
/// carry their mandated wait, privacy refusals are terminal for the target,
/// and missing entities let the resolver try its next strategy.
fn classify_remote(message: &str) -> RemoteError {
    if let Some(seconds) = extract_flood_wait_seconds(message) {
        return RemoteError::RateLimited(seconds);
    }

    let upper = message.to_uppercase();
    if upper.contains("USER_PRIVACY_RESTRICTED")
        || upper.contains("USER_NOT_MUTUAL_CONTACT")
        || upper.contains("USER_CHANNELS_TOO_MUCH")
    {
        return RemoteError::PrivacyRestricted;
    }

    const MISSING: [&str; 7] = [
        "USERNAME_NOT_OCCUPIED",
        "USERNAME_INVALID",
        "PEER_ID_INVALID",
        "CHANNEL_INVALID",
        "CHANNEL_PRIVATE",
        "CHAT_ID_INVALID",
        "USER_ID_INVALID",
    ];
    if MISSING.iter().any(|marker| upper.contains(marker)) {
        return RemoteError::NotFound;
    }

    RemoteError::Other(message.to_owned())
}

fn remote_error(err: &InvocationError) -> RemoteError {
    classify_remote(&err.to_string())
}

/// High-level Telegram client wrapper.
///
/// Implements [`Directory`] over raw API invocations, keeping the access
/// hashes of every user and channel it has seen so later writes can address
/// them without another lookup.
pub struct TelegramBot {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// Own user ID, fetched once.
    self_id: RwLock<Option<i64>>,

    /// Access hashes of users seen this session.
    user_hashes: RwLock<HashMap<i64, i64>>,

    /// Access hashes of channels seen this session, keyed by bare channel ID.
    channel_hashes: RwLock<HashMap<i64, i64>>,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl TelegramBot {
    /// Connects to Telegram with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if connection fails.
    pub async fn connect(config: &TelegramConfig) -> Result<Self, TelegramError> {
        info!("Connecting to Telegram...");

        let session = Arc::new(
            SqliteSession::open(&config.session_path)
                .await
                .map_err(|e| TelegramError::Session(e.to_string()))?,
        );

        let SenderPool {
            runner,
            updates: _updates,
            handle,
        } = SenderPool::new(Arc::clone(&session), config.api_id);

        let client = Client::new(handle.clone());

        // Spawn the sender pool runner
        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        let is_authorized = client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))?;

        info!("Connected to Telegram. Authorized: {}", is_authorized);

        Ok(Self {
            client,
            handle: handle.thin,
            self_id: RwLock::new(None),
            user_hashes: RwLock::new(HashMap::new()),
            channel_hashes: RwLock::new(HashMap::new()),
            _pool_task: pool_task,
        })
    }

    /// Checks if the client is authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))
    }

    /// Requests a login code to be sent to the phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn request_login_code(
        &self,
        phone: &str,
        api_hash: &str,
    ) -> Result<LoginToken, TelegramError> {
        info!("Requesting login code for phone: {}...", mask_phone(phone));

        self.client
            .request_login_code(phone, api_hash)
            .await
            .map_err(|e| TelegramError::SignInFailed(e.to_string()))
    }

    /// Signs in with the login code.
    ///
    /// # Errors
    ///
    /// Returns an error if sign in fails.
    pub async fn sign_in(&self, token: &LoginToken, code: &str) -> Result<(), TelegramError> {
        info!("Signing in with login code...");

        match self.client.sign_in(token, code).await {
            Ok(_user) => {
                info!("Successfully signed in!");
                Ok(())
            }
            Err(SignInError::PasswordRequired(password_token)) => {
                debug!(
                    "2FA password required, hint: {:?}",
                    password_token.hint()
                );
                Err(TelegramError::PasswordRequired(password_token))
            }
            Err(SignInError::InvalidCode) => {
                Err(TelegramError::SignInFailed("Invalid code".to_owned()))
            }
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Checks the 2FA password.
    ///
    /// # Errors
    ///
    /// Returns an error if the password is invalid.
    pub async fn check_password(
        &self,
        password_token: PasswordToken,
        password: &str,
    ) -> Result<(), TelegramError> {
        info!("Checking 2FA password...");

        match self.client.check_password(password_token, password).await {
            Ok(_user) => {
                info!("Successfully authenticated with 2FA!");
                Ok(())
            }
            Err(SignInError::InvalidPassword(token)) => Err(TelegramError::InvalidPassword(token)),
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        info!("Disconnecting from Telegram...");
        self.handle.quit();
    }

    async fn remember_user(&self, user: &tl::types::User) {
        if let Some(hash) = user.access_hash {
            self.user_hashes.write().await.insert(user.id, hash);
        }
    }

    async fn remember_chat(&self, chat: &tl::enums::Chat) {
        if let tl::enums::Chat::Channel(channel) = chat
            && let Some(hash) = channel.access_hash
        {
            self.channel_hashes.write().await.insert(channel.id, hash);
        }
    }

    async fn input_user(&self, user_id: i64) -> tl::enums::InputUser {
        let access_hash = self
            .user_hashes
            .read()
            .await
            .get(&user_id)
            .copied()
            .unwrap_or(0);
        tl::enums::InputUser::User(tl::types::InputUser {
            user_id,
            access_hash,
        })
    }

    async fn input_channel(
        &self,
        chat: &ResolvedEntity,
    ) -> Result<tl::enums::InputChannel, RemoteError> {
        let channel_id = without_supergroup_prefix(chat.id)
            .ok_or_else(|| RemoteError::Other(format!("{} is not a channel ID", chat.id)))?;
        let access_hash = match chat.access_hash {
            Some(hash) => hash,
            None => self
                .channel_hashes
                .read()
                .await
                .get(&channel_id)
                .copied()
                .unwrap_or(0),
        };
        Ok(tl::enums::InputChannel::Channel(tl::types::InputChannel {
            channel_id,
            access_hash,
        }))
    }

    async fn input_peer(&self, chat: &ResolvedEntity) -> Result<tl::enums::InputPeer, RemoteError> {
        match chat.kind {
            EntityKind::User { .. } => {
                let access_hash = match chat.access_hash {
                    Some(hash) => hash,
                    None => self
                        .user_hashes
                        .read()
                        .await
                        .get(&chat.id)
                        .copied()
                        .unwrap_or(0),
                };
                Ok(tl::enums::InputPeer::User(tl::types::InputPeerUser {
                    user_id: chat.id,
                    access_hash,
                }))
            }
            EntityKind::BasicGroup => Ok(tl::enums::InputPeer::Chat(tl::types::InputPeerChat {
                chat_id: -chat.id,
            })),
            EntityKind::Channel { .. } => match self.input_channel(chat).await? {
                tl::enums::InputChannel::Channel(channel) => {
                    Ok(tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
                        channel_id: channel.channel_id,
                        access_hash: channel.access_hash,
                    }))
                }
                _ => Err(RemoteError::NotFound),
            },
        }
    }

    async fn channel_participants(
        &self,
        chat: &ResolvedEntity,
    ) -> Result<Vec<Participant>, RemoteError> {
        let channel = self.input_channel(chat).await?;
        let mut members = Vec::new();
        let mut offset = 0i32;

        loop {
            let request = tl::functions::channels::GetParticipants {
                channel: channel.clone(),
                filter: tl::types::ChannelParticipantsSearch { q: String::new() }.into(),
                offset,
                limit: PARTICIPANT_PAGE_SIZE,
                hash: 0,
            };

            let page = match self.client.invoke(&request).await.map_err(|e| remote_error(&e))? {
                tl::enums::channels::ChannelParticipants::Participants(page) => page,
                tl::enums::channels::ChannelParticipants::NotModified => break,
            };

            let fetched = i32::try_from(page.participants.len()).unwrap_or(i32::MAX);
            for user in &page.users {
                if let tl::enums::User::User(user) = user {
                    self.remember_user(user).await;
                    members.push(Participant {
                        user_id: user.id,
                        is_bot: user.bot,
                        username: user.username.clone(),
                    });
                }
            }

            offset += fetched;
            if fetched < PARTICIPANT_PAGE_SIZE || offset >= page.count {
                break;
            }
        }

        debug!("Fetched {} participants from {}", members.len(), chat.title);
        Ok(members)
    }

    async fn basic_group_participants(
        &self,
        chat: &ResolvedEntity,
    ) -> Result<Vec<Participant>, RemoteError> {
        let request = tl::functions::messages::GetFullChat { chat_id: -chat.id };
        let tl::enums::messages::ChatFull::Full(full) =
            self.client.invoke(&request).await.map_err(|e| remote_error(&e))?;

        let mut members = Vec::new();
        for user in &full.users {
            if let tl::enums::User::User(user) = user {
                self.remember_user(user).await;
                members.push(Participant {
                    user_id: user.id,
                    is_bot: user.bot,
                    username: user.username.clone(),
                });
            }
        }
        Ok(members)
    }
}

impl Directory for TelegramBot {
    async fn self_id(&self) -> Result<i64, RemoteError> {
        if let Some(id) = *self.self_id.read().await {
            return Ok(id);
        }

        let request = tl::functions::users::GetUsers {
            id: vec![tl::enums::InputUser::UserSelf],
        };
        let users = self.client.invoke(&request).await.map_err(|e| remote_error(&e))?;

        match users.first() {
            Some(tl::enums::User::User(user)) => {
                self.remember_user(user).await;
                *self.self_id.write().await = Some(user.id);
                Ok(user.id)
            }
            _ => Err(RemoteError::Other("could not fetch own account".to_owned())),
        }
    }

    async fn entity_by_id(&self, id: i64) -> Result<ResolvedEntity, RemoteError> {
        if let Some(channel_id) = without_supergroup_prefix(id) {
            let access_hash = self
                .channel_hashes
                .read()
                .await
                .get(&channel_id)
                .copied()
                .unwrap_or(0);
            let request = tl::functions::channels::GetChannels {
                id: vec![tl::enums::InputChannel::Channel(tl::types::InputChannel {
                    channel_id,
                    access_hash,
                })],
            };
            let chats = match self.client.invoke(&request).await.map_err(|e| remote_error(&e))? {
                tl::enums::messages::Chats::Chats(chats) => chats.chats,
                tl::enums::messages::Chats::Slice(chats) => chats.chats,
            };
            for chat in &chats {
                self.remember_chat(chat).await;
            }
            chats.first().and_then(map_chat).ok_or(RemoteError::NotFound)
        } else if id < 0 {
            let request = tl::functions::messages::GetChats { id: vec![-id] };
            let chats = match self.client.invoke(&request).await.map_err(|e| remote_error(&e))? {
                tl::enums::messages::Chats::Chats(chats) => chats.chats,
                tl::enums::messages::Chats::Slice(chats) => chats.chats,
            };
            chats.first().and_then(map_chat).ok_or(RemoteError::NotFound)
        } else {
            let request = tl::functions::users::GetUsers {
                id: vec![self.input_user(id).await],
            };
            let users = self.client.invoke(&request).await.map_err(|e| remote_error(&e))?;
            match users.first() {
                Some(tl::enums::User::User(user)) => {
                    self.remember_user(user).await;
                    Ok(map_user(user))
                }
                _ => Err(RemoteError::NotFound),
            }
        }
    }

    async fn entity_by_username(&self, username: &str) -> Result<ResolvedEntity, RemoteError> {
        let request = tl::functions::contacts::ResolveUsername {
            username: username.to_owned(),
            referer: None,
        };
        let tl::enums::contacts::ResolvedPeer::Peer(resolved) =
            self.client.invoke(&request).await.map_err(|e| remote_error(&e))?;

        for user in &resolved.users {
            if let tl::enums::User::User(user) = user {
                self.remember_user(user).await;
            }
        }
        for chat in &resolved.chats {
            self.remember_chat(chat).await;
        }

        match resolved.peer {
            tl::enums::Peer::User(peer) => resolved
                .users
                .iter()
                .find_map(|user| match user {
                    tl::enums::User::User(user) if user.id == peer.user_id => {
                        Some(map_user(user))
                    }
                    _ => None,
                })
                .ok_or(RemoteError::NotFound),
            tl::enums::Peer::Chat(peer) => resolved
                .chats
                .iter()
                .find_map(|chat| match chat {
                    tl::enums::Chat::Chat(group) if group.id == peer.chat_id => map_chat(chat),
                    _ => None,
                })
                .ok_or(RemoteError::NotFound),
            tl::enums::Peer::Channel(peer) => resolved
                .chats
                .iter()
                .find_map(|chat| match chat {
                    tl::enums::Chat::Channel(channel) if channel.id == peer.channel_id => {
                        map_chat(chat)
                    }
                    _ => None,
                })
                .ok_or(RemoteError::NotFound),
        }
    }

    async fn dialogs(&self) -> Result<Vec<ResolvedEntity>, RemoteError> {
        let request = tl::functions::messages::GetDialogs {
            exclude_pinned: false,
            folder_id: None,
            offset_date: 0,
            offset_id: 0,
            offset_peer: tl::enums::InputPeer::Empty,
            limit: DIALOG_PAGE_SIZE,
            hash: 0,
        };

        let (chats, users) = match self.client.invoke(&request).await.map_err(|e| remote_error(&e))? {
            tl::enums::messages::Dialogs::Dialogs(dialogs) => (dialogs.chats, dialogs.users),
            tl::enums::messages::Dialogs::Slice(dialogs) => (dialogs.chats, dialogs.users),
            tl::enums::messages::Dialogs::NotModified(_) => (Vec::new(), Vec::new()),
        };

        let mut entities = Vec::new();
        for chat in &chats {
            self.remember_chat(chat).await;
            if let Some(entity) = map_chat(chat) {
                entities.push(entity);
            }
        }
        for user in &users {
            if let tl::enums::User::User(user) = user {
                self.remember_user(user).await;
                entities.push(map_user(user));
            }
        }

        debug!("Fetched {} dialog entities", entities.len());
        Ok(entities)
    }

    async fn participants(&self, chat: &ResolvedEntity) -> Result<Vec<Participant>, RemoteError> {
        if chat.is_channel() {
            self.channel_participants(chat).await
        } else if chat.is_basic_group() {
            self.basic_group_participants(chat).await
        } else {
            Err(RemoteError::Other(format!(
                "{} is not a group or channel",
                chat.title
            )))
        }
    }

    async fn recent_senders(
        &self,
        chat: &ResolvedEntity,
        limit: usize,
    ) -> Result<Vec<i64>, RemoteError> {
        let peer = self.input_peer(chat).await?;
        let mut remaining = limit.min(MAX_HISTORY_SCAN);
        let mut offset_id = 0i32;
        let mut seen = std::collections::HashSet::new();
        let mut senders = Vec::new();

        while remaining > 0 {
            let page_limit = remaining.min(HISTORY_PAGE_SIZE);
            let request = tl::functions::messages::GetHistory {
                peer: peer.clone(),
                offset_id,
                offset_date: 0,
                add_offset: 0,
                limit: i32::try_from(page_limit).unwrap_or(0),
                max_id: 0,
                min_id: 0,
                hash: 0,
            };

            let messages = match self.client.invoke(&request).await.map_err(|e| remote_error(&e))? {
                tl::enums::messages::Messages::Messages(m) => m.messages,
                tl::enums::messages::Messages::Slice(m) => m.messages,
                tl::enums::messages::Messages::ChannelMessages(m) => m.messages,
                tl::enums::messages::Messages::NotModified(_) => Vec::new(),
            };
            if messages.is_empty() {
                break;
            }

            let fetched = messages.len();
            for message in &messages {
                if let tl::enums::Message::Message(message) = message {
                    // Own messages are not outreach targets.
                    if message.out {
                        continue;
                    }
                    if let Some(tl::enums::Peer::User(from)) = &message.from_id
                        && seen.insert(from.user_id)
                    {
                        senders.push(from.user_id);
                    }
                }
            }

            offset_id = messages.last().map_or(0, message_id);
            remaining = remaining.saturating_sub(fetched);
            if fetched < page_limit {
                break;
            }
        }

        debug!(
            "Found {} unique senders in {} recent messages of {}",
            senders.len(),
            limit,
            chat.title
        );
        Ok(senders)
    }

    async fn send_direct(&self, user_id: i64, text: &str) -> Result<(), RemoteError> {
        let known = self.user_hashes.read().await.get(&user_id).copied();
        if known.is_none() {
            // Populate the access hash before the write.
            self.entity_by_id(user_id).await?;
        }

        let peer = match self.input_user(user_id).await {
            tl::enums::InputUser::User(user) => {
                tl::enums::InputPeer::User(tl::types::InputPeerUser {
                    user_id: user.user_id,
                    access_hash: user.access_hash,
                })
            }
            _ => return Err(RemoteError::NotFound),
        };

        let request = tl::functions::messages::SendMessage {
            no_webpage: false,
            silent: false,
            background: false,
            clear_draft: false,
            noforwards: false,
            update_stickersets_order: false,
            invert_media: false,
            allow_paid_floodskip: false,
            peer,
            reply_to: None,
            message: text.to_owned(),
            random_id: random_id(),
            reply_markup: None,
            entities: None,
            schedule_date: None,
            send_as: None,
            quick_reply_shortcut: None,
            effect: None,
            allow_paid_stars: None,
        };

        self.client
            .invoke(&request)
            .await
            .map(|_| ())
            .map_err(|e| remote_error(&e))
    }

    async fn invite_to_channel(
        &self,
        chat: &ResolvedEntity,
        user_id: i64,
    ) -> Result<(), RemoteError> {
        let request = tl::functions::channels::InviteToChannel {
            channel: self.input_channel(chat).await?,
            users: vec![self.input_user(user_id).await],
        };
        self.client
            .invoke(&request)
            .await
            .map(|_| ())
            .map_err(|e| remote_error(&e))
    }

    async fn add_to_basic_group(
        &self,
        chat: &ResolvedEntity,
        user_id: i64,
    ) -> Result<(), RemoteError> {
        let request = tl::functions::messages::AddChatUser {
            chat_id: -chat.id,
            user_id: self.input_user(user_id).await,
            fwd_limit: 100,
        };
        self.client
            .invoke(&request)
            .await
            .map(|_| ())
            .map_err(|e| remote_error(&e))
    }

    async fn create_invite_link(&self, chat: &ResolvedEntity) -> Result<String, RemoteError> {
        let request = tl::functions::messages::ExportChatInvite {
            legacy_revoke_permanent: false,
            request_needed: false,
            peer: self.input_peer(chat).await?,
            expire_date: None,
            usage_limit: None,
            title: None,
            subscription_pricing: None,
        };

        match self.client.invoke(&request).await.map_err(|e| remote_error(&e))? {
            tl::enums::ExportedChatInvite::ChatInviteExported(invite) => Ok(invite.link),
            tl::enums::ExportedChatInvite::ChatInvitePublicJoinRequests => Err(
                RemoteError::Other("chat only issues join-request invites".to_owned()),
            ),
        }
    }

    async fn join(&self, username: &str) -> Result<(), RemoteError> {
        let entity = self.entity_by_username(username).await?;
        let request = tl::functions::channels::JoinChannel {
            channel: self.input_channel(&entity).await?,
        };
        self.client
            .invoke(&request)
            .await
            .map(|_| ())
            .map_err(|e| remote_error(&e))
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot").finish_non_exhaustive()
    }
}

/// Maps an API user to the canonical directory representation.
fn map_user(user: &tl::types::User) -> ResolvedEntity {
    ResolvedEntity {
        id: user.id,
        access_hash: user.access_hash,
        title: full_name(user),
        username: user.username.clone(),
        kind: EntityKind::User { bot: user.bot },
    }
}

/// Maps an API chat to the canonical directory representation.
///
/// Basic groups get a negated ID, channels and supergroups the "-100" prefix;
/// empty and forbidden chats are dropped.
fn map_chat(chat: &tl::enums::Chat) -> Option<ResolvedEntity> {
    match chat {
        tl::enums::Chat::Chat(group) => Some(ResolvedEntity {
            id: -group.id,
            access_hash: None,
            title: group.title.clone(),
            username: None,
            kind: EntityKind::BasicGroup,
        }),
        tl::enums::Chat::Channel(channel) => Some(ResolvedEntity {
            id: with_supergroup_prefix(channel.id).unwrap_or(channel.id),
            access_hash: channel.access_hash,
            title: channel.title.clone(),
            username: channel.username.clone(),
            kind: EntityKind::Channel {
                megagroup: channel.megagroup,
            },
        }),
        _ => None,
    }
}

fn full_name(user: &tl::types::User) -> String {
    match (&user.first_name, &user.last_name) {
        (Some(first), Some(last)) => format!("{first} {last}"),
        (Some(first), None) => first.clone(),
        (None, Some(last)) => last.clone(),
        (None, None) => user
            .username
            .clone()
            .unwrap_or_else(|| user.id.to_string()),
    }
}

fn message_id(message: &tl::enums::Message) -> i32 {
    match message {
        tl::enums::Message::Empty(m) => m.id,
        tl::enums::Message::Message(m) => m.id,
        tl::enums::Message::Service(m) => m.id,
    }
}

/// Client-generated random ID for message sends.
fn random_id() -> i64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    i64::try_from(now.as_nanos() & 0x7fff_ffff_ffff_ffff).unwrap_or_default()
}

/// Masks a phone number for logging (shows last 4 digits).
fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() > 4 {
        format!("***{}", &digits[digits.len() - 4..])
    } else {
        "****".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+1234567890"), "***7890");
        assert_eq!(mask_phone("123"), "****");
        assert_eq!(mask_phone("+7 (999) 123-45-67"), "***4567");
    }

    #[test]
    fn test_extract_flood_wait() {
        assert_eq!(extract_flood_wait_seconds("FLOOD_WAIT_120"), Some(120));
        assert_eq!(extract_flood_wait_seconds("flood wait 60 seconds"), Some(60));
        assert_eq!(extract_flood_wait_seconds("some other error"), None);
    }

    #[test]
    fn test_classify_flood_wait() {
        assert_eq!(
            classify_remote("rpc error: FLOOD_WAIT_42"),
            RemoteError::RateLimited(42)
        );
    }

    #[test]
    fn test_classify_privacy() {
        assert_eq!(
            classify_remote("rpc error: USER_PRIVACY_RESTRICTED"),
            RemoteError::PrivacyRestricted
        );
        assert_eq!(
            classify_remote("rpc error: USER_NOT_MUTUAL_CONTACT"),
            RemoteError::PrivacyRestricted
        );
    }

    #[test]
    fn test_classify_missing() {
        assert_eq!(
            classify_remote("rpc error: USERNAME_NOT_OCCUPIED"),
            RemoteError::NotFound
        );
        assert_eq!(
            classify_remote("rpc error: PEER_ID_INVALID"),
            RemoteError::NotFound
        );
    }

    #[test]
    fn test_classify_other() {
        assert!(matches!(
            classify_remote("something unexpected"),
            RemoteError::Other(_)
        ));
    }
}

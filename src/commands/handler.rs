//! Command handler implementation.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::types::{BotCommand, CommandResult};
use crate::bulk::{
    BulkAction, BulkRunner, BulkSummary, InviteAction, InviteLinkAction, PauseReason, Progress,
    SendMessageAction, TargetList,
};
use crate::config::{BotSettings, PacingPolicy};
use crate::directory::{Directory, EntityKind, ResolvedEntity};
use crate::resolver::{ChatReference, ResolveError, Resolver};
use crate::store::UserData;

const HELP_TEXT: &str = "\
Available commands:
/collect_ids <group> - Collect member IDs from a group
/chat_collect <group> [limit] - Collect IDs of recently active users
/join <username> - Join a public group
/join_collect <username> - Join a group and collect IDs in one step
/send_pm <message> - Send a PM to all collected IDs
/chat_send <group> <message> - Message users active in a chat
/send_group <group> <message> - Message all members of a group
/move <source> <target> - Move members between groups
/add <group> - Add collected IDs to a group
/invite_link <group> - Send a group invite link to collected IDs
/my_groups - List your groups and channels
/id <name> - Look up a group's canonical ID
/help - Show this help message

Group references accept numeric IDs (with or without the -100 prefix),
usernames (with or without @), and t.me links.";

/// Executes parsed commands against the resolver, store, and bulk runner.
pub struct CommandHandler<D> {
    resolver: Resolver<D>,
    store_path: PathBuf,
    settings: BotSettings,
    pacing: PacingPolicy,
}

impl<D: Directory> CommandHandler<D> {
    /// Creates a new command handler.
    pub fn new(directory: D, settings: BotSettings, pacing: PacingPolicy) -> Self {
        Self {
            resolver: Resolver::new(directory),
            store_path: settings.store_path.clone(),
            settings,
            pacing,
        }
    }

    /// Returns the underlying directory.
    pub fn directory(&self) -> &D {
        self.resolver.directory()
    }

    /// Tries to parse and execute a command from a message.
    ///
    /// Returns `None` if the message is not a command.
    pub async fn try_handle(&self, message_text: &str) -> Option<CommandResult> {
        let command = BotCommand::parse(message_text)?;

        debug!("Handling command: {}", command);
        let result = self.execute(command).await;
        info!("Command result: success={}", result.success);

        Some(result)
    }

    /// Executes a parsed command.
    async fn execute(&self, command: BotCommand) -> CommandResult {
        match command {
            BotCommand::CollectIds(reference) => self.handle_collect_ids(&reference).await,
            BotCommand::ChatCollect { reference, limit } => {
                self.handle_chat_collect(&reference, limit).await
            }
            BotCommand::Join(name) => self.handle_join(&name).await,
            BotCommand::JoinCollect(name) => self.handle_join_collect(&name).await,
            BotCommand::SendPm(message) => self.handle_send_pm(&message).await,
            BotCommand::ChatSend { reference, message } => {
                self.handle_chat_send(&reference, &message).await
            }
            BotCommand::SendGroup { reference, message } => {
                self.handle_send_group(&reference, &message).await
            }
            BotCommand::Move { source, target } => self.handle_move(&source, &target).await,
            BotCommand::Add(reference) => self.handle_add(&reference).await,
            BotCommand::InviteLink(reference) => self.handle_invite_link(&reference).await,
            BotCommand::MyGroups => self.handle_my_groups().await,
            BotCommand::Id(name) => self.handle_id(&name).await,
            BotCommand::Help => CommandResult::success(HELP_TEXT),
        }
    }

    /// Resolves a raw reference string or produces a user-facing error.
    async fn resolve_ref(&self, raw: &str) -> Result<ResolvedEntity, CommandResult> {
        let reference = ChatReference::parse(raw)
            .ok_or_else(|| CommandResult::error(format!("Not a valid chat reference: {raw}")))?;

        self.resolver.resolve(&reference).await.map_err(|err| {
            let hint = match &err {
                ResolveError::NotFound { .. } => "\nTry /my_groups to list available groups.",
                ResolveError::Remote(_) => "",
            };
            CommandResult::error(format!("Could not find {reference}: {err}{hint}"))
        })
    }

    async fn handle_collect_ids(&self, raw: &str) -> CommandResult {
        let chat = match self.resolve_ref(raw).await {
            Ok(chat) => chat,
            Err(result) => return result,
        };

        let participants = match self.resolver.directory().participants(&chat).await {
            Ok(participants) => participants,
            Err(err) => {
                return CommandResult::error(format!(
                    "Error collecting participants from {}: {err}",
                    chat.title
                ));
            }
        };

        let ids: Vec<i64> = participants
            .iter()
            .filter(|p| !p.is_bot)
            .map(|p| p.user_id)
            .collect();
        let bot_count = participants.len() - ids.len();

        let mut data = UserData::load(&self.store_path);
        data.set_collected(ids);
        data.last_group_id = Some(chat.id.to_string());
        data.last_group_title = Some(chat.title.clone());
        let count = data.collected_ids.len();
        if let Err(err) = data.save(&self.store_path) {
            warn!("Failed to save user data: {}", err);
        }

        CommandResult::success(format!(
            "Collected {count} user IDs from {} ({bot_count} bots skipped).",
            chat.title
        ))
    }

    async fn handle_chat_collect(&self, raw: &str, limit: usize) -> CommandResult {
        let chat = match self.resolve_ref(raw).await {
            Ok(chat) => chat,
            Err(result) => return result,
        };

        let senders = match self.resolver.directory().recent_senders(&chat, limit).await {
            Ok(senders) => senders,
            Err(err) => {
                return CommandResult::error(format!(
                    "Error collecting chat users from {}: {err}",
                    chat.title
                ));
            }
        };

        let mut data = UserData::load(&self.store_path);
        data.set_collected(senders);
        data.last_group_id = Some(chat.id.to_string());
        data.last_group_title = Some(chat.title.clone());
        let count = data.collected_ids.len();
        if let Err(err) = data.save(&self.store_path) {
            warn!("Failed to save user data: {}", err);
        }

        CommandResult::success(format!(
            "Collected {count} unique user IDs from recent messages in {}.\n\
             You can now use /send_pm or /add with these IDs.",
            chat.title
        ))
    }

    async fn handle_join(&self, raw: &str) -> CommandResult {
        let name = match join_target(raw) {
            Ok(name) => name,
            Err(result) => return result,
        };

        match self.resolver.directory().join(&name).await {
            Ok(()) => CommandResult::success(format!("Successfully joined {name}.")),
            Err(err) => CommandResult::error(format!(
                "Error joining {name}: {err}\nCheck that the group is public and the username is correct."
            )),
        }
    }

    async fn handle_join_collect(&self, raw: &str) -> CommandResult {
        let joined = self.handle_join(raw).await;
        if !joined.success {
            return joined;
        }
        self.handle_collect_ids(raw).await
    }

    async fn handle_send_pm(&self, message: &str) -> CommandResult {
        let mut data = UserData::load(&self.store_path);
        if data.collected_ids.is_empty() {
            return CommandResult::error("No IDs collected. Please use /collect_ids first.");
        }
        data.message_to_send = message.to_owned();
        if let Err(err) = data.save(&self.store_path) {
            warn!("Failed to save user data: {}", err);
        }

        let targets = TargetList::new(data.collected_ids.iter().copied());
        let action = SendMessageAction::new(self.resolver.directory(), message);
        self.run_bulk(targets, &action).await
    }

    async fn handle_chat_send(&self, raw: &str, message: &str) -> CommandResult {
        let chat = match self.resolve_ref(raw).await {
            Ok(chat) => chat,
            Err(result) => return result,
        };

        let senders = match self.resolver.directory().recent_senders(&chat, 100).await {
            Ok(senders) => senders,
            Err(err) => return CommandResult::error(format!("Error collecting chat users: {err}")),
        };
        if senders.is_empty() {
            return CommandResult::error("No valid user IDs found in recent messages.");
        }

        let action = SendMessageAction::new(self.resolver.directory(), message);
        self.run_bulk(TargetList::new(senders), &action).await
    }

    async fn handle_send_group(&self, raw: &str, message: &str) -> CommandResult {
        let chat = match self.resolve_ref(raw).await {
            Ok(chat) => chat,
            Err(result) => return result,
        };

        let participants = match self.resolver.directory().participants(&chat).await {
            Ok(participants) => participants,
            Err(err) => return CommandResult::error(format!("Error getting participants: {err}")),
        };
        if participants.is_empty() {
            return CommandResult::error("No participants found in the group.");
        }

        let targets = TargetList::new(
            participants
                .iter()
                .filter(|p| !p.is_bot)
                .map(|p| p.user_id),
        );
        let action = SendMessageAction::new(self.resolver.directory(), message);
        self.run_bulk(targets, &action).await
    }

    async fn handle_move(&self, source_raw: &str, target_raw: &str) -> CommandResult {
        let source = match self.resolve_ref(source_raw).await {
            Ok(chat) => chat,
            Err(result) => return result,
        };
        let target = match self.resolve_ref(target_raw).await {
            Ok(chat) => chat,
            Err(result) => return result,
        };
        if matches!(target.kind, EntityKind::User { .. }) {
            return CommandResult::error(format!("{} is not a group or channel.", target.title));
        }

        let participants = match self.resolver.directory().participants(&source).await {
            Ok(participants) => participants,
            Err(err) => {
                return CommandResult::error(format!(
                    "Error getting participants from {}: {err}",
                    source.title
                ));
            }
        };
        if participants.is_empty() {
            return CommandResult::error("No participants found in the source group.");
        }

        info!(
            "Moving members from {} to {} ({})",
            source.title,
            target.title,
            if target.is_basic_group() {
                "basic group"
            } else {
                "supergroup/channel"
            }
        );

        let targets = TargetList::new(
            participants
                .iter()
                .filter(|p| !p.is_bot)
                .map(|p| p.user_id),
        );
        let action = InviteAction::new(self.resolver.directory(), target);
        self.run_bulk(targets, &action).await
    }

    async fn handle_add(&self, raw: &str) -> CommandResult {
        let data = UserData::load(&self.store_path);
        if data.collected_ids.is_empty() {
            return CommandResult::error("No IDs collected. Please use /collect_ids first.");
        }

        let target = match self.resolve_ref(raw).await {
            Ok(chat) => chat,
            Err(result) => return result,
        };
        if matches!(target.kind, EntityKind::User { .. }) {
            return CommandResult::error(format!("{} is not a group or channel.", target.title));
        }

        let mut data = data;
        data.target_group_id = Some(target.id.to_string());
        if let Err(err) = data.save(&self.store_path) {
            warn!("Failed to save user data: {}", err);
        }

        let targets = TargetList::new(data.collected_ids.iter().copied());
        let action = InviteAction::new(self.resolver.directory(), target);
        self.run_bulk(targets, &action).await
    }

    async fn handle_invite_link(&self, raw: &str) -> CommandResult {
        let data = UserData::load(&self.store_path);
        if data.collected_ids.is_empty() {
            return CommandResult::error("No IDs collected. Please use /collect_ids first.");
        }

        let target = match self.resolve_ref(raw).await {
            Ok(chat) => chat,
            Err(result) => return result,
        };

        let link = match self.resolver.directory().create_invite_link(&target).await {
            Ok(link) => link,
            Err(err) => {
                return CommandResult::error(format!(
                    "Error creating invite link for {}: {err}",
                    target.title
                ));
            }
        };

        let targets = TargetList::new(data.collected_ids.iter().copied());
        let action = InviteLinkAction::new(self.resolver.directory(), &link);
        self.run_bulk(targets, &action).await
    }

    async fn handle_my_groups(&self) -> CommandResult {
        let dialogs = match self.resolver.directory().dialogs().await {
            Ok(dialogs) => dialogs,
            Err(err) => return CommandResult::error(format!("Error fetching dialogs: {err}")),
        };

        let mut lines = Vec::new();
        for entity in dialogs {
            let kind = match entity.kind {
                EntityKind::User { .. } => continue,
                EntityKind::BasicGroup => "Group",
                EntityKind::Channel { megagroup: true } => "Supergroup",
                EntityKind::Channel { megagroup: false } => "Channel",
            };
            let username = entity
                .username
                .as_deref()
                .map_or_else(|| "no username".to_owned(), |u| format!("@{u}"));
            lines.push(format!(
                "{kind}: {} | ID: {} | {username}",
                entity.title, entity.id
            ));
            // First 20 only, to keep the output readable.
            if lines.len() >= 20 {
                lines.push("(showing first 20 groups only)".to_owned());
                break;
            }
        }

        if lines.is_empty() {
            CommandResult::error("You don't appear to be a member of any groups or channels.")
        } else {
            CommandResult::success(lines.join("\n"))
        }
    }

    async fn handle_id(&self, raw: &str) -> CommandResult {
        match self.resolve_ref(raw).await {
            Ok(entity) => CommandResult::success(format!(
                "Found {}: ID {}",
                entity.title, entity.id
            )),
            Err(result) => result,
        }
    }

    /// Runs a bulk action with the configured pacing, forwarding progress to
    /// the log.
    async fn run_bulk<A: BulkAction>(&self, targets: TargetList, action: &A) -> CommandResult {
        let self_id = match self.resolver.directory().self_id().await {
            Ok(id) => id,
            Err(err) => return CommandResult::error(format!("Could not determine own ID: {err}")),
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = match BulkRunner::new(self.pacing.clone(), self.settings.excluded_ids.clone())
        {
            Ok(runner) => runner.with_progress(tx),
            Err(err) => return CommandResult::error(format!("Invalid pacing policy: {err}")),
        };

        let reporter = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                report_progress(&event);
            }
        });

        let total = targets.len();
        info!("Starting bulk {} over {} targets", action.describe(), total);
        let summary = runner.run(targets, self_id, action).await;
        drop(runner);
        let _ = reporter.await;

        CommandResult::success(render_summary(action.describe(), &summary))
    }
}

fn join_target(raw: &str) -> Result<String, CommandResult> {
    match ChatReference::parse(raw) {
        Some(ChatReference::Username(name)) => Ok(name),
        Some(ChatReference::InviteSlug(_)) => Err(CommandResult::error(
            "Private invite links cannot be joined by username. Use the public @username.",
        )),
        Some(ChatReference::Id(_)) | None => Err(CommandResult::error(format!(
            "Not a joinable username: {raw}"
        ))),
    }
}

fn report_progress(event: &Progress) {
    match event {
        Progress::Filtered { removed } if *removed > 0 => {
            info!("Filtered out {} excluded targets", removed);
        }
        Progress::Filtered { .. } => {}
        Progress::Sent { success, total } => {
            info!("Progress: {}/{} sent", success, total);
        }
        Progress::Pause {
            reason,
            seconds,
            processed,
            total,
        } => {
            let label = match reason {
                PauseReason::FloodWait => "rate limit hit, forced wait",
                PauseReason::Batch => "batch pause",
                PauseReason::LongBreak => "long break",
                PauseReason::FailureBreak => "failure back-off",
            };
            info!("{} for {}s ({}/{} processed)", label, seconds, processed, total);
        }
    }
}

fn render_summary(action: &str, summary: &BulkSummary) -> String {
    let mut text = format!("Bulk {action} complete: {summary}");
    let attempted = summary.outcomes.len();
    if attempted > 0 && summary.success_count() * 2 < attempted {
        text.push_str(
            "\nTip: Telegram limits how many operations an account can perform \
             in a short time. Wait a few hours or use smaller target lists.",
        );
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{EntityKind, Participant, RemoteError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeDirectory {
        me: i64,
        entities: HashMap<i64, ResolvedEntity>,
        members: Vec<Participant>,
        sent: Mutex<Vec<(i64, String)>>,
    }

    impl FakeDirectory {
        fn new(me: i64) -> Self {
            Self {
                me,
                entities: HashMap::new(),
                members: Vec::new(),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn with_group(mut self, id: i64, title: &str) -> Self {
            self.entities.insert(
                id,
                ResolvedEntity {
                    id,
                    access_hash: Some(7),
                    title: title.to_owned(),
                    username: None,
                    kind: EntityKind::Channel { megagroup: true },
                },
            );
            self
        }

        fn with_member(mut self, user_id: i64, is_bot: bool) -> Self {
            self.members.push(Participant {
                user_id,
                is_bot,
                username: None,
            });
            self.entities.insert(
                user_id,
                ResolvedEntity {
                    id: user_id,
                    access_hash: Some(1),
                    title: format!("user {user_id}"),
                    username: None,
                    kind: EntityKind::User { bot: is_bot },
                },
            );
            self
        }
    }

    impl Directory for FakeDirectory {
        async fn self_id(&self) -> Result<i64, RemoteError> {
            Ok(self.me)
        }

        async fn entity_by_id(&self, id: i64) -> Result<ResolvedEntity, RemoteError> {
            self.entities.get(&id).cloned().ok_or(RemoteError::NotFound)
        }

        async fn entity_by_username(&self, _username: &str) -> Result<ResolvedEntity, RemoteError> {
            Err(RemoteError::NotFound)
        }

        async fn dialogs(&self) -> Result<Vec<ResolvedEntity>, RemoteError> {
            Ok(self.entities.values().cloned().collect())
        }

        async fn participants(
            &self,
            _chat: &ResolvedEntity,
        ) -> Result<Vec<Participant>, RemoteError> {
            Ok(self.members.clone())
        }

        async fn recent_senders(
            &self,
            _chat: &ResolvedEntity,
            _limit: usize,
        ) -> Result<Vec<i64>, RemoteError> {
            Ok(self.members.iter().map(|p| p.user_id).collect())
        }

        async fn send_direct(&self, user_id: i64, text: &str) -> Result<(), RemoteError> {
            self.sent.lock().unwrap().push((user_id, text.to_owned()));
            Ok(())
        }

        async fn invite_to_channel(
            &self,
            _chat: &ResolvedEntity,
            _user_id: i64,
        ) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn add_to_basic_group(
            &self,
            _chat: &ResolvedEntity,
            _user_id: i64,
        ) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn create_invite_link(&self, _chat: &ResolvedEntity) -> Result<String, RemoteError> {
            Ok("https://t.me/+fake".to_owned())
        }

        async fn join(&self, _username: &str) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    fn settings_with_store(name: &str) -> BotSettings {
        BotSettings {
            store_path: std::env::temp_dir()
                .join(format!("outreach_handler_{}_{}.json", name, std::process::id())),
            ..BotSettings::default()
        }
    }

    fn quick_pacing() -> PacingPolicy {
        PacingPolicy {
            message_delay_secs: 0,
            batch_pause_secs: 0,
            ..PacingPolicy::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_then_send_pm_skips_self_and_bots() {
        let settings = settings_with_store("collect_send");
        let store_path = settings.store_path.clone();
        let directory = FakeDirectory::new(1)
            .with_group(-100_50, "Test Group")
            .with_member(1, false) // self
            .with_member(2, false)
            .with_member(3, true) // bot, dropped at collection
            .with_member(4, false);
        let handler = CommandHandler::new(directory, settings, quick_pacing());

        let collected = handler.try_handle("/collect_ids 50").await.unwrap();
        assert!(collected.success, "{}", collected.message);
        assert!(collected.message.contains("Collected 3"));

        let sent = handler.try_handle("/send_pm hello").await.unwrap();
        assert!(sent.success, "{}", sent.message);
        assert!(sent.message.contains("2 succeeded"));

        let data = UserData::load(&store_path);
        assert_eq!(data.message_to_send, "hello");
        std::fs::remove_file(&store_path).ok();
    }

    #[tokio::test]
    async fn test_send_pm_without_collection_fails() {
        let settings = settings_with_store("no_collection");
        let handler = CommandHandler::new(FakeDirectory::new(1), settings, quick_pacing());

        let result = handler.try_handle("/send_pm hello").await.unwrap();
        assert!(!result.success);
        assert!(result.message.contains("/collect_ids"));
    }

    #[tokio::test]
    async fn test_unknown_group_reports_attempts() {
        let settings = settings_with_store("unknown");
        let handler = CommandHandler::new(FakeDirectory::new(1), settings, quick_pacing());

        let result = handler.try_handle("/collect_ids 424242").await.unwrap();
        assert!(!result.success);
        assert!(result.message.contains("424242"));
        assert!(result.message.contains("/my_groups"));
    }

    #[tokio::test]
    async fn test_non_command_is_ignored() {
        let settings = settings_with_store("ignored");
        let handler = CommandHandler::new(FakeDirectory::new(1), settings, quick_pacing());
        assert!(handler.try_handle("just chatting").await.is_none());
    }
}

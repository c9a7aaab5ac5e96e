//! Concrete bulk actions.
//!
//! Each action re-resolves the target user through the directory before the
//! remote write, skipping accounts whose bot flag is set; the collected ID
//! list may be stale or include bots the collection step could not classify.

use tracing::debug;

use super::runner::{ActionStatus, BulkAction};
use crate::directory::{Directory, RemoteError, ResolvedEntity};

/// Sends the same direct message to every target.
pub struct SendMessageAction<'a, D> {
    directory: &'a D,
    message: String,
}

impl<'a, D: Directory> SendMessageAction<'a, D> {
    pub fn new(directory: &'a D, message: impl Into<String>) -> Self {
        Self {
            directory,
            message: message.into(),
        }
    }

    async fn check_target(&self, user_id: i64) -> Result<Option<ActionStatus>, RemoteError> {
        let entity = self.directory.entity_by_id(user_id).await?;
        if entity.is_bot() {
            debug!("Target {} is a bot, skipping", user_id);
            return Ok(Some(ActionStatus::Skipped("bot account".to_owned())));
        }
        Ok(None)
    }
}

impl<D: Directory> BulkAction for SendMessageAction<'_, D> {
    fn describe(&self) -> &str {
        "direct message"
    }

    async fn apply(&self, user_id: i64) -> Result<ActionStatus, RemoteError> {
        if let Some(skipped) = self.check_target(user_id).await? {
            return Ok(skipped);
        }
        self.directory.send_direct(user_id, &self.message).await?;
        Ok(ActionStatus::Done)
    }
}

/// Adds every target to a destination chat.
///
/// The remote call variant is fixed once from the destination's capability
/// flags: basic groups take the add-chat-user call, channels and supergroups
/// take the invite call.
pub struct InviteAction<'a, D> {
    directory: &'a D,
    destination: ResolvedEntity,
    basic_group: bool,
}

impl<'a, D: Directory> InviteAction<'a, D> {
    pub fn new(directory: &'a D, destination: ResolvedEntity) -> Self {
        let basic_group = destination.is_basic_group();
        Self {
            directory,
            destination,
            basic_group,
        }
    }
}

impl<D: Directory> BulkAction for InviteAction<'_, D> {
    fn describe(&self) -> &str {
        if self.basic_group {
            "basic-group add"
        } else {
            "channel invite"
        }
    }

    async fn apply(&self, user_id: i64) -> Result<ActionStatus, RemoteError> {
        let entity = self.directory.entity_by_id(user_id).await?;
        if entity.is_bot() {
            return Ok(ActionStatus::Skipped("bot account".to_owned()));
        }

        if self.basic_group {
            self.directory
                .add_to_basic_group(&self.destination, user_id)
                .await?;
        } else {
            self.directory
                .invite_to_channel(&self.destination, user_id)
                .await?;
        }
        Ok(ActionStatus::Done)
    }
}

/// Sends an invite link by direct message instead of adding members outright.
///
/// Useful when the operating account cannot add members directly.
pub struct InviteLinkAction<'a, D> {
    inner: SendMessageAction<'a, D>,
}

impl<'a, D: Directory> InviteLinkAction<'a, D> {
    pub fn new(directory: &'a D, invite_link: &str) -> Self {
        Self {
            inner: SendMessageAction::new(
                directory,
                format!("You are invited to join a new group: {invite_link}"),
            ),
        }
    }
}

impl<D: Directory> BulkAction for InviteLinkAction<'_, D> {
    fn describe(&self) -> &str {
        "invite link"
    }

    async fn apply(&self, user_id: i64) -> Result<ActionStatus, RemoteError> {
        self.inner.apply(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{EntityKind, Participant};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDirectory {
        users: HashMap<i64, ResolvedEntity>,
        sent: Mutex<Vec<(i64, String)>>,
        invited: Mutex<Vec<i64>>,
        added: Mutex<Vec<i64>>,
    }

    impl RecordingDirectory {
        fn with_user(mut self, id: i64, bot: bool) -> Self {
            self.users.insert(
                id,
                ResolvedEntity {
                    id,
                    access_hash: Some(1),
                    title: format!("user {id}"),
                    username: None,
                    kind: EntityKind::User { bot },
                },
            );
            self
        }
    }

    impl Directory for RecordingDirectory {
        async fn self_id(&self) -> Result<i64, RemoteError> {
            Ok(0)
        }

        async fn entity_by_id(&self, id: i64) -> Result<ResolvedEntity, RemoteError> {
            self.users.get(&id).cloned().ok_or(RemoteError::NotFound)
        }

        async fn entity_by_username(&self, _username: &str) -> Result<ResolvedEntity, RemoteError> {
            Err(RemoteError::NotFound)
        }

        async fn dialogs(&self) -> Result<Vec<ResolvedEntity>, RemoteError> {
            Ok(Vec::new())
        }

        async fn participants(
            &self,
            _chat: &ResolvedEntity,
        ) -> Result<Vec<Participant>, RemoteError> {
            Ok(Vec::new())
        }

        async fn recent_senders(
            &self,
            _chat: &ResolvedEntity,
            _limit: usize,
        ) -> Result<Vec<i64>, RemoteError> {
            Ok(Vec::new())
        }

        async fn send_direct(&self, user_id: i64, text: &str) -> Result<(), RemoteError> {
            self.sent.lock().unwrap().push((user_id, text.to_owned()));
            Ok(())
        }

        async fn invite_to_channel(
            &self,
            _chat: &ResolvedEntity,
            user_id: i64,
        ) -> Result<(), RemoteError> {
            self.invited.lock().unwrap().push(user_id);
            Ok(())
        }

        async fn add_to_basic_group(
            &self,
            _chat: &ResolvedEntity,
            user_id: i64,
        ) -> Result<(), RemoteError> {
            self.added.lock().unwrap().push(user_id);
            Ok(())
        }

        async fn create_invite_link(&self, _chat: &ResolvedEntity) -> Result<String, RemoteError> {
            Ok("https://t.me/+abc".to_owned())
        }

        async fn join(&self, _username: &str) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    fn channel(id: i64) -> ResolvedEntity {
        ResolvedEntity {
            id,
            access_hash: Some(9),
            title: "dest".to_owned(),
            username: None,
            kind: EntityKind::Channel { megagroup: true },
        }
    }

    fn basic_group(id: i64) -> ResolvedEntity {
        ResolvedEntity {
            id,
            access_hash: None,
            title: "dest".to_owned(),
            username: None,
            kind: EntityKind::BasicGroup,
        }
    }

    #[tokio::test]
    async fn test_send_skips_bots() {
        let directory = RecordingDirectory::default()
            .with_user(1, false)
            .with_user(2, true);
        let action = SendMessageAction::new(&directory, "hi");

        assert_eq!(action.apply(1).await.unwrap(), ActionStatus::Done);
        assert!(matches!(
            action.apply(2).await.unwrap(),
            ActionStatus::Skipped(_)
        ));
        assert_eq!(
            directory.sent.lock().unwrap().clone(),
            vec![(1, "hi".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_send_unknown_target_is_error() {
        let directory = RecordingDirectory::default();
        let action = SendMessageAction::new(&directory, "hi");
        assert_eq!(action.apply(5).await.unwrap_err(), RemoteError::NotFound);
    }

    #[tokio::test]
    async fn test_invite_variant_fixed_by_destination_kind() {
        let directory = RecordingDirectory::default().with_user(1, false);

        let to_channel = InviteAction::new(&directory, channel(-100_5));
        to_channel.apply(1).await.unwrap();
        assert_eq!(directory.invited.lock().unwrap().clone(), vec![1]);
        assert!(directory.added.lock().unwrap().is_empty());

        let to_basic = InviteAction::new(&directory, basic_group(-6));
        to_basic.apply(1).await.unwrap();
        assert_eq!(directory.added.lock().unwrap().clone(), vec![1]);
    }

    #[tokio::test]
    async fn test_invite_link_message_contains_link() {
        let directory = RecordingDirectory::default().with_user(1, false);
        let action = InviteLinkAction::new(&directory, "https://t.me/+abc");
        action.apply(1).await.unwrap();

        let sent = directory.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("https://t.me/+abc"));
    }
}

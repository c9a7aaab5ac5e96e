//! Command types and definitions.

use std::fmt;

/// Upper bound on how many recent messages a chat collection may scan.
const CHAT_COLLECT_CAP: usize = 500;

/// Default message scan depth for chat collection.
const CHAT_COLLECT_DEFAULT: usize = 100;

/// Available bot commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// Collect member IDs from a group.
    CollectIds(String),

    /// Collect IDs of users who recently sent messages in a chat.
    ChatCollect {
        reference: String,
        limit: usize,
    },

    /// Join a public group by username.
    Join(String),

    /// Join a public group and collect its member IDs in one step.
    JoinCollect(String),

    /// Send a direct message to every collected ID.
    SendPm(String),

    /// Send a message to users active in a chat.
    ChatSend {
        reference: String,
        message: String,
    },

    /// Send a message to every member of a group.
    SendGroup {
        reference: String,
        message: String,
    },

    /// Move members from one group to another.
    Move {
        source: String,
        target: String,
    },

    /// Add the collected IDs to a group.
    Add(String),

    /// Send an invite link for a group to every collected ID.
    InviteLink(String),

    /// List the caller's groups and channels.
    MyGroups,

    /// Look up a group's canonical ID by name or username.
    Id(String),

    /// Show help text.
    Help,
}

impl BotCommand {
    /// Parses a command from a message text.
    ///
    /// A bare `t.me/...` line is treated as join-and-collect on its slug.
    /// Returns `None` if the text is not a valid command.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();

        if !text.starts_with('/') {
            // Special feature: pasting a t.me link joins and collects.
            if text.contains("t.me/") {
                return Some(Self::JoinCollect(text.to_owned()));
            }
            return None;
        }

        let (cmd, args) = match text[1..].split_once(char::is_whitespace) {
            Some((cmd, args)) => (cmd.to_lowercase(), args.trim()),
            None => (text[1..].to_lowercase(), ""),
        };

        match cmd.as_str() {
            "collect_ids" | "collect" => non_empty(args).map(Self::CollectIds),
            "chat_collect" => Self::parse_chat_collect(args),
            "join" => non_empty(args).map(Self::Join),
            "join_collect" => non_empty(args).map(Self::JoinCollect),
            "send_pm" => non_empty(args).map(Self::SendPm),
            "chat_send" => Self::parse_ref_and_message(args)
                .map(|(reference, message)| Self::ChatSend { reference, message }),
            "send_group" => Self::parse_ref_and_message(args)
                .map(|(reference, message)| Self::SendGroup { reference, message }),
            "move" => {
                let (source, target) = args.split_once(char::is_whitespace)?;
                let target = target.trim();
                if source.is_empty() || target.is_empty() {
                    return None;
                }
                Some(Self::Move {
                    source: source.to_owned(),
                    target: target.to_owned(),
                })
            }
            "add" | "add_to_group" => non_empty(args).map(Self::Add),
            "invite_link" => non_empty(args).map(Self::InviteLink),
            "my_groups" | "groups" => Some(Self::MyGroups),
            "id" => non_empty(args).map(Self::Id),
            "help" | "?" => Some(Self::Help),
            _ => None,
        }
    }

    /// Parses `<reference> [limit]`, capping the limit.
    fn parse_chat_collect(args: &str) -> Option<Self> {
        let mut parts = args.split_whitespace();
        let reference = parts.next()?.to_owned();
        let limit = parts
            .next()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(CHAT_COLLECT_DEFAULT)
            .min(CHAT_COLLECT_CAP);
        Some(Self::ChatCollect { reference, limit })
    }

    /// Parses `<reference> <message...>`.
    fn parse_ref_and_message(args: &str) -> Option<(String, String)> {
        let (reference, message) = args.split_once(char::is_whitespace)?;
        let message = message.trim();
        if reference.is_empty() || message.is_empty() {
            return None;
        }
        Some((reference.to_owned(), message.to_owned()))
    }
}

fn non_empty(args: &str) -> Option<String> {
    if args.is_empty() {
        None
    } else {
        Some(args.to_owned())
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CollectIds(_) => "collect_ids",
            Self::ChatCollect { .. } => "chat_collect",
            Self::Join(_) => "join",
            Self::JoinCollect(_) => "join_collect",
            Self::SendPm(_) => "send_pm",
            Self::ChatSend { .. } => "chat_send",
            Self::SendGroup { .. } => "send_group",
            Self::Move { .. } => "move",
            Self::Add(_) => "add",
            Self::InviteLink(_) => "invite_link",
            Self::MyGroups => "my_groups",
            Self::Id(_) => "id",
            Self::Help => "help",
        };
        f.write_str(name)
    }
}

/// Result of executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Message to show the user.
    pub message: String,
}

impl CommandResult {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collect_ids() {
        assert_eq!(
            BotCommand::parse("/collect_ids -1001234"),
            Some(BotCommand::CollectIds("-1001234".to_owned()))
        );
        assert_eq!(BotCommand::parse("/collect_ids"), None);
    }

    #[test]
    fn test_parse_chat_collect_with_limit() {
        assert_eq!(
            BotCommand::parse("/chat_collect @group 250"),
            Some(BotCommand::ChatCollect {
                reference: "@group".to_owned(),
                limit: 250,
            })
        );
    }

    #[test]
    fn test_parse_chat_collect_caps_limit() {
        assert_eq!(
            BotCommand::parse("/chat_collect @group 9000"),
            Some(BotCommand::ChatCollect {
                reference: "@group".to_owned(),
                limit: 500,
            })
        );
    }

    #[test]
    fn test_parse_chat_collect_default_limit() {
        assert_eq!(
            BotCommand::parse("/chat_collect mygroup"),
            Some(BotCommand::ChatCollect {
                reference: "mygroup".to_owned(),
                limit: 100,
            })
        );
    }

    #[test]
    fn test_parse_send_group_keeps_message_whole() {
        assert_eq!(
            BotCommand::parse("/send_group -100123 hello there friends"),
            Some(BotCommand::SendGroup {
                reference: "-100123".to_owned(),
                message: "hello there friends".to_owned(),
            })
        );
    }

    #[test]
    fn test_parse_move() {
        assert_eq!(
            BotCommand::parse("/move -100111 -100222"),
            Some(BotCommand::Move {
                source: "-100111".to_owned(),
                target: "-100222".to_owned(),
            })
        );
        assert_eq!(BotCommand::parse("/move -100111"), None);
    }

    #[test]
    fn test_parse_bare_tme_link_joins_and_collects() {
        assert_eq!(
            BotCommand::parse("https://t.me/rustlang"),
            Some(BotCommand::JoinCollect("https://t.me/rustlang".to_owned()))
        );
    }

    #[test]
    fn test_parse_plain_text_is_not_a_command() {
        assert_eq!(BotCommand::parse("hello world"), None);
        assert_eq!(BotCommand::parse("/unknown_cmd"), None);
    }
}

use super::{Applied, RoomSession};
use crate::error::{CommandError, CommandResult};
use crate::types::*;
use chrono::Utc;

pub const MAX_CHAT_CHARS: usize = 500;

impl RoomSession {
    pub(super) fn send_chat(&mut self, issuer: &str, text: &str) -> CommandResult<Applied> {
        self.require_not_paused()?;
        let text = text.trim();
        if text.is_empty() {
            return Err(CommandError::InvalidChatMessage("message is empty"));
        }
        if text.chars().count() > MAX_CHAT_CHARS {
            return Err(CommandError::InvalidChatMessage("message is too long"));
        }

        self.push_message(MessageKind::Chat, Some(issuer), text.to_string());
        Ok(Applied::Changed)
    }

    pub(crate) fn push_system(&mut self, text: String) {
        self.push_message(MessageKind::System, None, text);
    }

    pub(crate) fn push_clue(&mut self, author: &str, text: String) {
        self.push_message(MessageKind::Clue, Some(author), text);
    }

    /// Append to the log, dropping the oldest entries beyond the history cap
    fn push_message(&mut self, kind: MessageKind, author: Option<&str>, text: String) {
        let author_name = match author {
            Some(id) => self.player_name(id),
            None => "System".to_string(),
        };
        self.messages.push_back(ChatMessage {
            id: crate::ids::generate_ulid(),
            author_id: author.map(str::to_string),
            author_name,
            text,
            timestamp: Utc::now(),
            kind,
        });
        while self.messages.len() > self.message_history {
            self.messages.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Command, JoinRequest};
    use super::*;

    fn chat(text: &str) -> Command {
        Command::SendChatMessage {
            text: text.to_string(),
        }
    }

    #[test]
    fn test_chat_is_attributed() {
        let mut session = RoomSession::new("TEST", 50);
        let id = session.join_player(&JoinRequest::named("Alice")).unwrap();

        session.execute(&id, chat("  hello there ")).unwrap();

        let last = session.messages().last().unwrap();
        assert_eq!(last.kind, MessageKind::Chat);
        assert_eq!(last.text, "hello there");
        assert_eq!(last.author_name, "Alice");
        assert_eq!(last.author_id.as_deref(), Some(id.as_str()));
    }

    #[test]
    fn test_chat_validation() {
        let mut session = RoomSession::new("TEST", 50);
        let id = session.join_player(&JoinRequest::named("Alice")).unwrap();
        let before = session.messages().count();

        assert_eq!(
            session.execute(&id, chat("   ")),
            Err(CommandError::InvalidChatMessage("message is empty"))
        );
        assert_eq!(
            session.execute(&id, chat(&"a".repeat(501))),
            Err(CommandError::InvalidChatMessage("message is too long"))
        );
        assert!(session.execute(&id, chat(&"a".repeat(500))).is_ok());
        assert_eq!(session.messages().count(), before + 1);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut session = RoomSession::new("TEST", 5);
        let id = session.join_player(&JoinRequest::named("Alice")).unwrap();

        for i in 0..20 {
            session.execute(&id, chat(&format!("message {i}"))).unwrap();
        }

        let texts: Vec<_> = session.messages().map(|m| m.text.as_str()).collect();
        assert_eq!(texts.len(), 5);
        assert_eq!(texts.first(), Some(&"message 15"));
        assert_eq!(texts.last(), Some(&"message 19"));
    }
}

//! Transport-independent view of one inbound Telegram update.

use teloxide::types::{CallbackQuery, Message, User};
use teloxide::utils::command::BotCommands;

use super::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl Sender {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.trim().is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

impl From<&User> for Sender {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.0 as i64,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Command(Command),
    /// Slash text that is not one of our commands; never a step answer
    UnknownCommand(String),
    Text(String),
    Contact {
        phone: String,
        /// Telegram user the shared contact belongs to, if any
        user_id: Option<i64>,
    },
    Callback {
        callback_id: String,
        data: String,
        /// Message carrying the pressed button
        message_id: Option<i32>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub chat_id: i64,
    pub sender: Option<Sender>,
    pub inbound: Inbound,
}

impl Envelope {
    /// Metric label for the update kind
    pub fn kind(&self) -> &'static str {
        match self.inbound {
            Inbound::Command(_) | Inbound::UnknownCommand(_) => "command",
            Inbound::Text(_) => "text",
            Inbound::Contact { .. } => "contact",
            Inbound::Callback { .. } => "callback",
        }
    }

    pub fn callback_id(&self) -> Option<&str> {
        match &self.inbound {
            Inbound::Callback { callback_id, .. } => Some(callback_id),
            _ => None,
        }
    }

    pub fn callback_message_id(&self) -> Option<i32> {
        match &self.inbound {
            Inbound::Callback { message_id, .. } => *message_id,
            _ => None,
        }
    }

    /// `None` for messages the bot has nothing to say about (stickers, photos...)
    pub fn from_message(msg: &Message, bot_username: &str) -> Option<Self> {
        let inbound = if let Some(contact) = msg.contact() {
            Inbound::Contact {
                phone: contact.phone_number.clone(),
                user_id: contact.user_id.map(|id| id.0 as i64),
            }
        } else {
            let text = msg.text()?.trim();
            if text.starts_with('/') {
                match Command::parse(text, bot_username) {
                    Ok(command) => Inbound::Command(command),
                    Err(_) => Inbound::UnknownCommand(text.to_string()),
                }
            } else {
                Inbound::Text(text.to_string())
            }
        };

        Some(Self {
            chat_id: msg.chat.id.0,
            sender: msg.from.as_ref().map(Sender::from),
            inbound,
        })
    }

    pub fn from_callback(q: &CallbackQuery) -> Self {
        // Private chats share the user's id
        let chat_id = q
            .message
            .as_ref()
            .map(|m| m.chat().id.0)
            .unwrap_or(q.from.id.0 as i64);

        Self {
            chat_id,
            sender: Some(Sender::from(&q.from)),
            inbound: Inbound::Callback {
                callback_id: q.id.to_string(),
                data: q.data.clone().unwrap_or_default(),
                message_id: q.message.as_ref().map(|m| m.id().0),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_joins_last_name() {
        let mut sender = Sender {
            user_id: 1,
            first_name: "Aziz".to_string(),
            last_name: Some("Karimov".to_string()),
            username: None,
        };
        assert_eq!(sender.full_name(), "Aziz Karimov");
        sender.last_name = Some("  ".to_string());
        assert_eq!(sender.full_name(), "Aziz");
    }

    #[test]
    fn test_envelope_kind_labels() {
        let envelope = Envelope {
            chat_id: 1,
            sender: None,
            inbound: Inbound::Callback {
                callback_id: "1".to_string(),
                data: "cancel".to_string(),
                message_id: Some(10),
            },
        };
        assert_eq!(envelope.kind(), "callback");
        assert_eq!(envelope.callback_id(), Some("1"));
        assert_eq!(envelope.callback_message_id(), Some(10));
    }
}

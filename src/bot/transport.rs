//! Delivery of router output over the Telegram Bot API.
//!
//! Actions run in order. A failed call is logged and counted, never retried,
//! and never undoes state the router already committed.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ButtonRequest, CallbackQueryId, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton,
    KeyboardMarkup, MessageId, ReplyMarkup,
};
use teloxide::utils::command::BotCommands;
use tracing::debug;

use super::ui_builder::{Keyboard, Markup, Screen};
use super::Command;
use crate::errors::{error_logging, AppError, AppResult};
use crate::observability::{self, WebhookRegistrar};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Send {
        chat_id: i64,
        text: String,
        markup: Option<Markup>,
    },
    Edit {
        chat_id: i64,
        message_id: i32,
        text: String,
        keyboard: Option<Keyboard>,
    },
    AnswerCallback {
        callback_id: String,
        text: Option<String>,
        alert: bool,
    },
}

impl Outbound {
    pub fn send(chat_id: i64, screen: Screen) -> Self {
        Outbound::Send {
            chat_id,
            text: screen.text,
            markup: screen.markup,
        }
    }

    /// Bot API method name, used as metric label
    pub fn method(&self) -> &'static str {
        match self {
            Outbound::Send { .. } => "sendMessage",
            Outbound::Edit { .. } => "editMessageText",
            Outbound::AnswerCallback { .. } => "answerCallbackQuery",
        }
    }

    /// Text shown to the user, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Outbound::Send { text, .. } | Outbound::Edit { text, .. } => Some(text),
            Outbound::AnswerCallback { text, .. } => text.as_deref(),
        }
    }

    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Outbound::Send { chat_id, .. } | Outbound::Edit { chat_id, .. } => Some(*chat_id),
            Outbound::AnswerCallback { .. } => None,
        }
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Outbound::Send {
                markup: Some(Markup::Inline(keyboard)),
                ..
            } => Some(keyboard),
            Outbound::Edit { keyboard, .. } => keyboard.as_ref(),
            _ => None,
        }
    }
}

pub fn inline_markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.data.encode()))
            .collect::<Vec<_>>()
    }))
}

fn reply_markup(markup: &Markup) -> ReplyMarkup {
    match markup {
        Markup::Inline(keyboard) => ReplyMarkup::InlineKeyboard(inline_markup(keyboard)),
        Markup::RequestContact { label } => ReplyMarkup::Keyboard(
            KeyboardMarkup::new(vec![vec![
                KeyboardButton::new(label.clone()).request(ButtonRequest::Contact)
            ]])
            .resize_keyboard()
            .one_time_keyboard(),
        ),
        Markup::RemoveKeyboard => ReplyMarkup::kb_remove(),
    }
}

#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub async fn execute(&self, actions: Vec<Outbound>) {
        for action in actions {
            if let Err(e) = self.execute_one(&action).await {
                observability::record_transport_failure(action.method());
                error_logging::log_network_error(&e, action.method(), action.chat_id());
            }
        }
    }

    async fn execute_one(&self, action: &Outbound) -> Result<(), teloxide::RequestError> {
        match action {
            Outbound::Send {
                chat_id,
                text,
                markup,
            } => {
                let request = self.bot.send_message(ChatId(*chat_id), text.clone());
                match markup {
                    Some(markup) => request.reply_markup(reply_markup(markup)).await?,
                    None => request.await?,
                };
            }
            Outbound::Edit {
                chat_id,
                message_id,
                text,
                keyboard,
            } => {
                let request =
                    self.bot
                        .edit_message_text(ChatId(*chat_id), MessageId(*message_id), text.clone());
                match keyboard {
                    Some(keyboard) => request.reply_markup(inline_markup(keyboard)).await?,
                    None => request.await?,
                };
            }
            Outbound::AnswerCallback {
                callback_id,
                text,
                alert,
            } => {
                let mut request = self
                    .bot
                    .answer_callback_query(CallbackQueryId(callback_id.clone()));
                if let Some(text) = text {
                    request = request.text(text.clone()).show_alert(*alert);
                }
                request.await?;
            }
        }
        debug!(method = action.method(), "Telegram call succeeded");
        Ok(())
    }
}

/// Registers the webhook URL and publishes the command list
pub struct TelegramWebhookRegistrar {
    bot: Bot,
    url: reqwest::Url,
}

impl TelegramWebhookRegistrar {
    pub fn new(bot: Bot, url: &str) -> AppResult<Self> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| AppError::Config(format!("Invalid webhook URL {}: {}", url, e)))?;
        Ok(Self { bot, url })
    }
}

#[async_trait]
impl WebhookRegistrar for TelegramWebhookRegistrar {
    async fn register(&self) -> AppResult<String> {
        self.bot.set_webhook(self.url.clone()).await?;
        self.bot.set_my_commands(Command::bot_commands()).await?;
        Ok(self.url.to_string())
    }
}

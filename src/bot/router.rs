//! Flow router: one inbound update in, a list of outbound actions out.
//!
//! For each update the router takes the chat's lock, loads its conversation,
//! runs the matching handler and commits the state the handler asked for.
//! A handler error leaves the stored state untouched and produces a generic
//! failure message instead. Once a handler has written to the repository its
//! messages are delivered even if the state commit fails.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use tracing::{debug, Instrument};

use super::callbacks::callback_handler;
use super::transport::Outbound;
use super::ui_builder::{self, Screen};
use super::update::{Envelope, Inbound};
use super::{command_handlers, message_handler};
use crate::config::ConversationConfig;
use crate::conversation_store::ConversationStore;
use crate::db::Trip;
use crate::dialogue::Conversation;
use crate::errors::{error_logging, AppError, AppResult};
use crate::observability;
use crate::repository::TaxiRepository;

#[derive(Debug, Clone, PartialEq)]
pub enum NextState {
    Keep,
    Set(Conversation),
    Clear,
}

/// What a handler decided: the state to commit and what to send
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: NextState,
    /// Answer text for the pressed button, if any
    pub notice: Option<String>,
    pub alert: bool,
    pub outbound: Vec<Outbound>,
    /// A repository write already happened; its messages go out even if the
    /// state commit fails
    pub durable: bool,
}

impl Transition {
    fn new(next: NextState) -> Self {
        Self {
            next,
            notice: None,
            alert: false,
            outbound: Vec::new(),
            durable: false,
        }
    }

    pub fn keep() -> Self {
        Self::new(NextState::Keep)
    }

    pub fn set(conversation: Conversation) -> Self {
        Self::new(NextState::Set(conversation))
    }

    pub fn clear() -> Self {
        Self::new(NextState::Clear)
    }

    pub fn push(mut self, action: Outbound) -> Self {
        self.outbound.push(action);
        self
    }

    pub fn with_notice(mut self, text: impl Into<String>) -> Self {
        self.notice = Some(text.into());
        self
    }

    pub fn with_alert(mut self, text: impl Into<String>) -> Self {
        self.notice = Some(text.into());
        self.alert = true;
        self
    }

    pub fn after_write(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Stale or mismatched button: answer it and change nothing
    pub fn stale() -> Self {
        Self::keep().with_alert(ui_builder::STALE_BUTTON)
    }
}

/// Everything a handler can see for one update
pub struct Context<'a> {
    pub repo: &'a dyn TaxiRepository,
    pub config: &'a ConversationConfig,
    pub envelope: &'a Envelope,
    pub today: NaiveDate,
}

impl Context<'_> {
    pub fn chat_id(&self) -> i64 {
        self.envelope.chat_id
    }

    pub fn sender_id(&self) -> Option<i64> {
        self.envelope.sender.as_ref().map(|s| s.user_id)
    }

    /// Show a screen in place of the pressed button's message when possible,
    /// otherwise as a new message
    pub fn reply(&self, screen: Screen) -> Outbound {
        let inline_only = matches!(screen.markup, None | Some(ui_builder::Markup::Inline(_)));
        match self.envelope.callback_message_id() {
            Some(message_id) if inline_only => Outbound::Edit {
                chat_id: self.chat_id(),
                message_id,
                keyboard: screen.keyboard().cloned(),
                text: screen.text,
            },
            _ => Outbound::send(self.chat_id(), screen),
        }
    }

    pub fn send(&self, screen: Screen) -> Outbound {
        Outbound::send(self.chat_id(), screen)
    }

    /// Driver chat for a notice about a write that already happened. A failed
    /// lookup only costs the notice.
    pub async fn notification_chat(&self, trip: &Trip) -> Option<i64> {
        match self.repo.notification_chat_for(trip).await {
            Ok(chat_id) => chat_id,
            Err(e) => {
                let trip_id: &dyn std::fmt::Display = &trip.id;
                error_logging::log_database_error(
                    &e,
                    "notification_chat_for",
                    Some(self.chat_id()),
                    Some(&[("trip_id", trip_id)][..]),
                );
                None
            }
        }
    }
}

pub struct FlowRouter {
    repo: Arc<dyn TaxiRepository>,
    store: Arc<dyn ConversationStore>,
    config: ConversationConfig,
    chat_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl FlowRouter {
    pub fn new(
        repo: Arc<dyn TaxiRepository>,
        store: Arc<dyn ConversationStore>,
        config: ConversationConfig,
    ) -> Self {
        Self {
            repo,
            store,
            config,
            chat_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Today in the configured local calendar
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.config.timezone()).date_naive()
    }

    fn chat_lock(&self, chat_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        self.chat_locks
            .lock()
            .entry(chat_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Chats with an update in flight
    pub fn active_chat_locks(&self) -> usize {
        self.chat_locks.lock().len()
    }

    fn release_chat_lock(&self, chat_id: i64) {
        let mut locks = self.chat_locks.lock();
        // Only the map holds it: nobody is waiting on this chat
        if locks.get(&chat_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&chat_id);
        }
    }

    /// Process one update. Updates for the same chat run one at a time.
    pub async fn handle(&self, envelope: Envelope) -> Vec<Outbound> {
        let chat_id = envelope.chat_id;
        let kind = envelope.kind();
        let started = Instant::now();

        let lock = self.chat_lock(chat_id);
        let outbound = {
            let _guard = lock.lock().await;
            self.process(&envelope)
                .instrument(observability::telegram_span(kind, chat_id))
                .await
        };
        drop(lock);
        self.release_chat_lock(chat_id);

        observability::record_update(kind, started.elapsed());
        outbound
    }

    async fn process(&self, envelope: &Envelope) -> Vec<Outbound> {
        let chat_id = envelope.chat_id;

        let result = match self.run_handler(envelope).await {
            Ok(transition) => self.commit(chat_id, transition).await,
            Err(e) => Err(e),
        };

        let transition = match result {
            Ok(transition) => transition,
            Err(e) => {
                log_handler_error(&e, envelope);
                Transition::keep().push(Outbound::Send {
                    chat_id,
                    text: ui_builder::GENERIC_FAILURE.to_string(),
                    markup: None,
                })
            }
        };

        let mut outbound = Vec::with_capacity(transition.outbound.len() + 1);
        if let Some(callback_id) = envelope.callback_id() {
            outbound.push(Outbound::AnswerCallback {
                callback_id: callback_id.to_string(),
                text: transition.notice,
                alert: transition.alert,
            });
        }
        outbound.extend(transition.outbound);
        outbound
    }

    async fn run_handler(&self, envelope: &Envelope) -> AppResult<Transition> {
        let state = self.store.get(envelope.chat_id).await?;
        let ctx = Context {
            repo: self.repo.as_ref(),
            config: &self.config,
            envelope,
            today: self.today(),
        };

        debug!(
            chat_id = %envelope.chat_id,
            flow = ?state.as_ref().map(|s| s.flow_name()),
            kind = envelope.kind(),
            "Routing update"
        );

        match &envelope.inbound {
            Inbound::Command(command) => command_handlers::handle_command(&ctx, state, command).await,
            Inbound::UnknownCommand(text) => Ok(command_handlers::unknown_command(&ctx, text)),
            Inbound::Text(text) => message_handler::handle_text(&ctx, state, text).await,
            Inbound::Contact { phone, user_id } => {
                message_handler::handle_contact(&ctx, state, phone, *user_id).await
            }
            Inbound::Callback { data, .. } => callback_handler::handle_callback(&ctx, state, data).await,
        }
    }

    async fn commit(&self, chat_id: i64, transition: Transition) -> AppResult<Transition> {
        let stored = match &transition.next {
            NextState::Keep => Ok(()),
            NextState::Set(conversation) => self.store.set(chat_id, conversation.clone()).await,
            NextState::Clear => self.store.clear(chat_id).await,
        };
        match stored {
            Ok(()) => Ok(transition),
            Err(e) if transition.durable => {
                error_logging::log_database_error(&e, "commit_conversation", Some(chat_id), None);
                Ok(transition)
            }
            Err(e) => Err(e),
        }
    }
}

fn log_handler_error(error: &AppError, envelope: &Envelope) {
    let chat_id = Some(envelope.chat_id);
    match error {
        AppError::Database(_) => {
            error_logging::log_database_error(error, envelope.kind(), chat_id, None)
        }
        AppError::Network(_) => error_logging::log_network_error(error, envelope.kind(), chat_id),
        _ => error_logging::log_internal_error(error, "flow_router", envelope.kind(), chat_id),
    }
}

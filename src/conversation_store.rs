//! Conversation state store keyed by chat id.
//!
//! Records older than the configured TTL count as abandoned: reading one
//! deletes it and reports no state, so the chat starts over.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use sqlx::postgres::PgPool;
use tracing::{debug, warn};

use crate::db;
use crate::dialogue::Conversation;
use crate::errors::{AppError, AppResult};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, chat_id: i64) -> AppResult<Option<Conversation>>;

    async fn set(&self, chat_id: i64, conversation: Conversation) -> AppResult<()>;

    async fn clear(&self, chat_id: i64) -> AppResult<()>;
}

fn record_expired(chat_id: i64, flow: &str) {
    debug!(chat_id = %chat_id, flow = %flow, "Conversation state expired");
    crate::observability::record_conversation_expired(flow);
}

#[derive(Debug, Clone)]
struct StoredConversation {
    conversation: Conversation,
    updated_at: DateTime<Utc>,
}

/// Process-local store; state is lost on restart
#[derive(Debug)]
pub struct MemoryConversationStore {
    ttl: Duration,
    entries: Mutex<HashMap<i64, StoredConversation>>,
}

impl MemoryConversationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get_at(&self, chat_id: i64, now: DateTime<Utc>) -> Option<Conversation> {
        let mut entries = self.entries.lock();
        let stored = entries.get(&chat_id)?;
        if now - stored.updated_at > self.ttl {
            let flow = stored.conversation.flow_name();
            record_expired(chat_id, flow);
            entries.remove(&chat_id);
            return None;
        }
        Some(stored.conversation.clone())
    }

    pub(crate) fn set_at(&self, chat_id: i64, conversation: Conversation, now: DateTime<Utc>) {
        self.entries.lock().insert(
            chat_id,
            StoredConversation {
                conversation,
                updated_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn get(&self, chat_id: i64) -> AppResult<Option<Conversation>> {
        Ok(self.get_at(chat_id, Utc::now()))
    }

    async fn set(&self, chat_id: i64, conversation: Conversation) -> AppResult<()> {
        self.set_at(chat_id, conversation, Utc::now());
        Ok(())
    }

    async fn clear(&self, chat_id: i64) -> AppResult<()> {
        self.entries.lock().remove(&chat_id);
        Ok(())
    }
}

/// Durable store shared by every worker using the same database
#[derive(Clone)]
pub struct PgConversationStore {
    pool: Arc<PgPool>,
    ttl: Duration,
}

impl PgConversationStore {
    pub fn new(pool: Arc<PgPool>, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    /// Delete every abandoned record; meant for a periodic background task
    pub async fn purge_expired(&self) -> AppResult<u64> {
        let cutoff = Utc::now() - self.ttl;
        db::purge_conversation_states_before(&self.pool, cutoff)
            .await
            .map_err(|e| AppError::Database(format!("{:#}", e)))
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn get(&self, chat_id: i64) -> AppResult<Option<Conversation>> {
        let row = db::get_conversation_state(&self.pool, chat_id)
            .await
            .map_err(|e| AppError::Database(format!("{:#}", e)))?;
        let Some(row) = row else {
            return Ok(None);
        };

        if Utc::now() - row.updated_at > self.ttl {
            record_expired(chat_id, &row.flow);
            self.clear(chat_id).await?;
            return Ok(None);
        }

        match serde_json::from_str::<Conversation>(&row.payload) {
            Ok(conversation) => Ok(Some(conversation)),
            Err(e) => {
                // Payloads written by an older build may no longer parse.
                warn!(chat_id = %chat_id, flow = %row.flow, error = %e, "Discarding unreadable conversation state");
                self.clear(chat_id).await?;
                Ok(None)
            }
        }
    }

    async fn set(&self, chat_id: i64, conversation: Conversation) -> AppResult<()> {
        let payload = serde_json::to_string(&conversation)?;
        db::upsert_conversation_state(&self.pool, chat_id, conversation.flow_name(), &payload)
            .await
            .map_err(|e| AppError::Database(format!("{:#}", e)))
    }

    async fn clear(&self, chat_id: i64) -> AppResult<()> {
        db::delete_conversation_state(&self.pool, chat_id)
            .await
            .map_err(|e| AppError::Database(format!("{:#}", e)))
    }
}

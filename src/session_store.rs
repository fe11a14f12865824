//! # Session Store Module
//!
//! In-memory dialogue storage keyed by chat, with expiry of abandoned flows.
//! Implements teloxide's dialogue [`Storage`] so handlers keep using the
//! regular `Dialogue` API.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use teloxide::dispatching::dialogue::Storage;
use teloxide::types::ChatId;
use tokio::sync::Mutex;
use tracing::debug;

use crate::dialogue::ConversationState;

#[derive(Debug, Clone)]
struct SessionEntry {
    state: ConversationState,
    touched_at: DateTime<Utc>,
}

/// Per-chat conversation state with a time-to-live
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<ChatId, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: std::time::Duration) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(36_500)),
        })
    }

    fn is_expired(&self, entry: &SessionEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.touched_at) > self.ttl
    }

    /// Drop every session untouched for longer than the TTL; returns how many
    pub async fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_expired(entry, now));
        before - sessions.len()
    }

    /// Number of chats with an active flow
    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

impl Storage<ConversationState> for SessionStore {
    type Error = Infallible;

    fn remove_dialogue(self: Arc<Self>, chat_id: ChatId) -> BoxFuture<'static, Result<(), Self::Error>> {
        Box::pin(async move {
            // Leaving a flow that already expired is fine
            self.sessions.lock().await.remove(&chat_id);
            Ok(())
        })
    }

    fn update_dialogue(
        self: Arc<Self>,
        chat_id: ChatId,
        dialogue: ConversationState,
    ) -> BoxFuture<'static, Result<(), Self::Error>> {
        Box::pin(async move {
            let entry = SessionEntry {
                state: dialogue,
                touched_at: Utc::now(),
            };
            self.sessions.lock().await.insert(chat_id, entry);
            Ok(())
        })
    }

    fn get_dialogue(
        self: Arc<Self>,
        chat_id: ChatId,
    ) -> BoxFuture<'static, Result<Option<ConversationState>, Self::Error>> {
        Box::pin(async move {
            let now = Utc::now();
            let mut sessions = self.sessions.lock().await;
            let expired = match sessions.get(&chat_id) {
                None => return Ok(None),
                Some(entry) => self.is_expired(entry, now),
            };
            if expired {
                debug!(user_id = %chat_id, "Conversation state expired");
                sessions.remove(&chat_id);
                return Ok(None);
            }
            Ok(sessions.get(&chat_id).map(|entry| entry.state.clone()))
        })
    }
}

//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Parses commands and routes text by conversation state
//! - `dialogue_manager`: Section navigation and the document filler steps
//! - `ui_builder`: Reply keyboards and their button labels
//! - `messenger`: Outbound messages, implemented for the Telegram client

pub mod dialogue_manager;
pub mod message_handler;
pub mod messenger;
pub mod ui_builder;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::types::{ChatId, Update, UpdateKind};
use tracing::debug;

use crate::answer::Answerer;
use crate::dialogue::ConversationDialogue;
use crate::dispatch::UpdateHandler;
use crate::documents::DocumentRenderer;
use crate::menu::MenuLibrary;
use crate::session_store::SessionStore;

pub use message_handler::{handle_text, message_handler, parse_command, Command};
pub use messenger::Messenger;
pub use ui_builder::ReplyKeyboard;

/// Everything the conversation engine needs to answer a user
pub struct BotServices {
    pub messenger: Arc<dyn Messenger>,
    pub sessions: Arc<SessionStore>,
    pub menu: MenuLibrary,
    pub documents: DocumentRenderer,
    pub answerer: Answerer,
}

impl BotServices {
    /// Dialogue handle for one chat
    pub fn dialogue(&self, chat_id: ChatId) -> ConversationDialogue {
        ConversationDialogue::new(Arc::clone(&self.sessions), chat_id)
    }
}

/// Handle one update from the webhook
pub async fn process_update(services: &BotServices, update: Update) -> Result<()> {
    match update.kind {
        UpdateKind::Message(msg) => message_handler(services, msg).await,
        _ => {
            debug!(update_id = update.id.0, "Ignoring non-message update");
            Ok(())
        }
    }
}

#[async_trait]
impl UpdateHandler for BotServices {
    async fn handle(&self, update: Update) -> Result<()> {
        process_update(self, update).await
    }
}

//! Outbound side of the conversation engine.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::InputFile;

use super::ui_builder::ReplyKeyboard;

/// Delivers replies to a chat
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a text message, optionally replacing the reply keyboard
    async fn send_text(&self, chat_id: ChatId, text: &str, keyboard: Option<&ReplyKeyboard>) -> Result<()>;

    /// Upload a file from disk as a document
    async fn send_file(&self, chat_id: ChatId, path: &Path) -> Result<()>;
}

#[async_trait]
impl Messenger for Bot {
    async fn send_text(&self, chat_id: ChatId, text: &str, keyboard: Option<&ReplyKeyboard>) -> Result<()> {
        let request = self.send_message(chat_id, text.to_string());
        match keyboard {
            Some(keyboard) => request.reply_markup(keyboard.to_markup()).await?,
            None => request.await?,
        };
        Ok(())
    }

    async fn send_file(&self, chat_id: ChatId, path: &Path) -> Result<()> {
        self.send_document(chat_id, InputFile::file(path.to_path_buf()))
            .await?;
        Ok(())
    }
}

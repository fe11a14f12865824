//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{debug, info};

use crate::dialogue::ConversationState;
use crate::localization::t;

use super::dialogue_manager::{
    handle_field_input, handle_section_input, handle_template_choice, show_root, show_section_list,
};
use super::BotServices;

/// Commands honored in every state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Main,
    Chat,
    Cancel,
    Unknown,
}

/// Parse a leading `/command`, ignoring a `@botname` suffix and anything after
/// the first whitespace. Returns `None` for text that is not a command.
pub fn parse_command(text: &str) -> Option<Command> {
    let token = text.split_whitespace().next()?;
    let name = token.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or_default();

    let command = match name.to_lowercase().as_str() {
        "start" => Command::Start,
        "main" => Command::Main,
        "chat" => Command::Chat,
        "cancel" => Command::Cancel,
        _ => Command::Unknown,
    };
    Some(command)
}

pub async fn message_handler(services: &BotServices, msg: Message) -> Result<()> {
    let chat_id = msg.chat.id;

    match msg.text() {
        Some(text) => handle_text(services, chat_id, text).await,
        None => {
            debug!(user_id = %chat_id, "Received non-text message");
            services.messenger.send_text(chat_id, &t("text-only"), None).await
        }
    }
}

/// Route one text message through the conversation state machine
pub async fn handle_text(services: &BotServices, chat_id: ChatId, text: &str) -> Result<()> {
    let dialogue = services.dialogue(chat_id);

    let command = parse_command(text);
    if let Some(command) = command.filter(|command| *command != Command::Unknown) {
        info!(user_id = %chat_id, command = ?command, "Received command");
        return match command {
            Command::Start | Command::Unknown => show_root(services, &dialogue, "start-prompt").await,
            Command::Main => show_section_list(services, &dialogue).await,
            Command::Chat => {
                dialogue.exit().await?;
                services.messenger.send_text(chat_id, &t("chat-prompt"), None).await
            }
            Command::Cancel => show_root(services, &dialogue, "cancel-done").await,
        };
    }

    let state = dialogue.get().await?.unwrap_or_default();
    debug!(user_id = %chat_id, state = ?state, "Handling text message");

    // Unknown commands are plain field values inside the filler
    if command == Some(Command::Unknown) && state.field_prompt_key().is_none() {
        info!(user_id = %chat_id, command = ?Command::Unknown, "Received command");
        return show_root(services, &dialogue, "start-prompt").await;
    }

    match state {
        ConversationState::Idle => handle_question(services, chat_id, text).await,
        ConversationState::SectionList | ConversationState::SectionContent { .. } => {
            handle_section_input(services, &dialogue, state, text).await
        }
        ConversationState::TemplateChoice => handle_template_choice(services, &dialogue, text).await,
        state => handle_field_input(services, &dialogue, state, text).await,
    }
}

/// Free-form question at the root level
async fn handle_question(services: &BotServices, chat_id: ChatId, question: &str) -> Result<()> {
    let outcome = services.answerer.answer(question).await;
    debug!(user_id = %chat_id, outcome = ?outcome, "Question answered");
    services
        .messenger
        .send_text(chat_id, &outcome.reply_text(), None)
        .await
}

//! Dialogue Manager module for handling dialogue state transitions

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::dialogue::{validate_field, ConversationDialogue, ConversationState, FillerStep};
use crate::documents::{DocumentFields, APPLICATION_TEMPLATE_FILE};
use crate::localization::{t, t_args};
use crate::menu::MenuSection;

use super::ui_builder::{
    root_keyboard, section_content_keyboard, section_list_keyboard, template_keyboard,
    ANOTHER_QUESTION, BACK,
};
use super::BotServices;

/// Reset to the root and offer the two modes
pub async fn show_root(services: &BotServices, dialogue: &ConversationDialogue, key: &str) -> Result<()> {
    dialogue.exit().await?;
    services
        .messenger
        .send_text(dialogue.chat_id(), &t(key), Some(&root_keyboard()))
        .await
}

/// Put the section list on screen
pub async fn show_section_list(services: &BotServices, dialogue: &ConversationDialogue) -> Result<()> {
    dialogue.update(ConversationState::SectionList).await?;
    services
        .messenger
        .send_text(dialogue.chat_id(), &t("section-prompt"), Some(&section_list_keyboard()))
        .await
}

/// Input while the section list or a section answer is on screen
pub async fn handle_section_input(
    services: &BotServices,
    dialogue: &ConversationDialogue,
    state: ConversationState,
    text: &str,
) -> Result<()> {
    let text = text.trim();

    match (state, text) {
        (ConversationState::SectionList, BACK) => show_root(services, dialogue, "start-prompt").await,
        (ConversationState::SectionContent { .. }, BACK) => show_section_list(services, dialogue).await,
        (ConversationState::SectionContent { section }, ANOTHER_QUESTION) => {
            show_section(services, dialogue, section).await
        }
        (_, label) => match MenuSection::from_label(label) {
            Some(section) => show_section(services, dialogue, section).await,
            None => {
                debug!(user_id = %dialogue.chat_id(), input = %label, "Input is not a section label");
                services
                    .messenger
                    .send_text(dialogue.chat_id(), &t("section-unknown"), Some(&section_list_keyboard()))
                    .await
            }
        },
    }
}

/// Show one random answer from `section`, or its template choice
pub async fn show_section(
    services: &BotServices,
    dialogue: &ConversationDialogue,
    section: MenuSection,
) -> Result<()> {
    let chat_id = dialogue.chat_id();
    info!(user_id = %chat_id, section = section.label(), "Section selected");

    if section.opens_documents() {
        dialogue.update(ConversationState::TemplateChoice).await?;
        return services
            .messenger
            .send_text(chat_id, &t("document-action-prompt"), Some(&template_keyboard()))
            .await;
    }

    match services.menu.random_answer(section) {
        Ok(Some(answer)) => {
            dialogue.update(ConversationState::SectionContent { section }).await?;
            services
                .messenger
                .send_text(chat_id, &answer, Some(&section_content_keyboard()))
                .await
        }
        Ok(None) => {
            debug!(user_id = %chat_id, section = section.label(), "Section has no answers");
            dialogue.update(ConversationState::SectionList).await?;
            services
                .messenger
                .send_text(chat_id, &t("section-empty"), Some(&section_list_keyboard()))
                .await
        }
        Err(e) => {
            error!(user_id = %chat_id, section = section.label(), error = %e, "Failed to read section answers");
            dialogue.update(ConversationState::SectionList).await?;
            services
                .messenger
                .send_text(chat_id, &t("section-error"), Some(&section_list_keyboard()))
                .await
        }
    }
}

/// Input while the template choice is on screen
pub async fn handle_template_choice(
    services: &BotServices,
    dialogue: &ConversationDialogue,
    text: &str,
) -> Result<()> {
    if text.trim() == BACK {
        return show_section_list(services, dialogue).await;
    }

    debug!(user_id = %dialogue.chat_id(), template = APPLICATION_TEMPLATE_FILE, "Starting document filler");
    dialogue.update(ConversationState::AwaitingFio).await?;
    services
        .messenger
        .send_text(dialogue.chat_id(), &t("document-ask-fio"), None)
        .await
}

/// Record one field of the document filler and ask for the next one
pub async fn handle_field_input(
    services: &BotServices,
    dialogue: &ConversationDialogue,
    state: ConversationState,
    text: &str,
) -> Result<()> {
    let chat_id = dialogue.chat_id();

    let value = match validate_field(text) {
        Ok(value) => value,
        Err(reason) => {
            debug!(user_id = %chat_id, reason, "Rejected document field");
            let prompt = state.field_prompt_key().map(t).unwrap_or_default();
            return services
                .messenger
                .send_text(chat_id, &t_args("document-field-empty", &[("prompt", &prompt)]), None)
                .await;
        }
    };

    match state.accept_field(value) {
        Some(FillerStep::Next(next)) => {
            let prompt = next.field_prompt_key().map(t).unwrap_or_default();
            dialogue.update(next).await?;
            services.messenger.send_text(chat_id, &prompt, None).await
        }
        Some(FillerStep::Complete(fields)) => finish_document(services, dialogue, fields).await,
        None => {
            warn!(user_id = %chat_id, "Field input outside the document filler");
            show_root(services, dialogue, "start-prompt").await
        }
    }
}

/// Render the filled template, deliver it and return to the root
async fn finish_document(
    services: &BotServices,
    dialogue: &ConversationDialogue,
    fields: DocumentFields,
) -> Result<()> {
    let chat_id = dialogue.chat_id();
    dialogue.exit().await?;

    let delivered = match services.documents.render(APPLICATION_TEMPLATE_FILE, &fields) {
        Ok(document) => {
            let file_name = document.file_name();
            let result = services.messenger.send_file(chat_id, document.path()).await;
            if let Err(e) = document.remove() {
                warn!(user_id = %chat_id, file = %file_name, error = %e, "Failed to remove rendered document");
            }
            match result {
                Ok(()) => {
                    info!(user_id = %chat_id, file = %file_name, "Document delivered");
                    true
                }
                Err(e) => {
                    error!(user_id = %chat_id, file = %file_name, error = %e, "Failed to deliver document");
                    false
                }
            }
        }
        Err(e) => {
            error!(user_id = %chat_id, error = %e, "Failed to render document");
            false
        }
    };

    let key = if delivered { "document-done" } else { "document-error" };
    services
        .messenger
        .send_text(chat_id, &t(key), Some(&root_keyboard()))
        .await
}

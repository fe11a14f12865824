//! Conversation state for the menu navigator and the document filler.

use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::Dialogue;

use crate::documents::DocumentFields;
use crate::menu::MenuSection;
use crate::session_store::SessionStore;

/// Where a user currently is in the conversation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationState {
    /// Root level: free-form questions go to the answer generator
    #[default]
    Idle,
    /// The section list is on screen
    SectionList,
    /// An answer from `section` was shown; "another question" re-rolls it
    SectionContent { section: MenuSection },
    /// The documents section offers its templates
    TemplateChoice,
    AwaitingFio,
    AwaitingAge {
        fio: String,
    },
    AwaitingPhone {
        fio: String,
        age: String,
    },
    AwaitingEmail {
        fio: String,
        age: String,
        phone: String,
    },
}

/// Result of feeding one value to the document filler
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FillerStep {
    /// Move to the next stage and ask for its field
    Next(ConversationState),
    /// All four fields are known
    Complete(DocumentFields),
}

impl ConversationState {
    /// Whether the state belongs to the document filler
    pub fn in_document_flow(&self) -> bool {
        matches!(
            self,
            ConversationState::TemplateChoice
                | ConversationState::AwaitingFio
                | ConversationState::AwaitingAge { .. }
                | ConversationState::AwaitingPhone { .. }
                | ConversationState::AwaitingEmail { .. }
        )
    }

    /// Record `value` for the field this stage is waiting for.
    ///
    /// Returns `None` for stages that do not collect a field.
    pub fn accept_field(self, value: String) -> Option<FillerStep> {
        let step = match self {
            ConversationState::AwaitingFio => {
                FillerStep::Next(ConversationState::AwaitingAge { fio: value })
            }
            ConversationState::AwaitingAge { fio } => {
                FillerStep::Next(ConversationState::AwaitingPhone { fio, age: value })
            }
            ConversationState::AwaitingPhone { fio, age } => {
                FillerStep::Next(ConversationState::AwaitingEmail {
                    fio,
                    age,
                    phone: value,
                })
            }
            ConversationState::AwaitingEmail { fio, age, phone } => {
                FillerStep::Complete(DocumentFields {
                    fio,
                    age,
                    phone,
                    email: value,
                })
            }
            _ => return None,
        };
        Some(step)
    }

    /// Localization key of the prompt for the field this stage collects
    pub fn field_prompt_key(&self) -> Option<&'static str> {
        match self {
            ConversationState::AwaitingFio => Some("document-ask-fio"),
            ConversationState::AwaitingAge { .. } => Some("document-ask-age"),
            ConversationState::AwaitingPhone { .. } => Some("document-ask-phone"),
            ConversationState::AwaitingEmail { .. } => Some("document-ask-email"),
            _ => None,
        }
    }
}

/// Type alias for our conversation dialogue
pub type ConversationDialogue = Dialogue<ConversationState, SessionStore>;

/// Validates a document field value
pub fn validate_field(value: &str) -> Result<String, &'static str> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    Ok(trimmed.to_string())
}

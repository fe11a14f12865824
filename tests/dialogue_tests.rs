use anyhow::Result;

use housing_helpdesk::dialogue::{validate_field, ConversationState, FillerStep};
use housing_helpdesk::documents::DocumentFields;
use housing_helpdesk::menu::MenuSection;

/// Walk the document filler from the first field to completion
#[tokio::test]
async fn test_filler_collects_fields_in_order() -> Result<()> {
    let mut state = ConversationState::AwaitingFio;
    let inputs = ["Сидорова Анна", "29", "+7 911 000-11-22", "anna@example.org"];
    let mut completed = None;

    for input in inputs {
        assert!(state.in_document_flow());
        match state.clone().accept_field(validate_field(input).unwrap()) {
            Some(FillerStep::Next(next)) => state = next,
            Some(FillerStep::Complete(fields)) => completed = Some(fields),
            None => panic!("stage {state:?} should collect a field"),
        }
    }

    assert_eq!(
        completed,
        Some(DocumentFields {
            fio: "Сидорова Анна".to_string(),
            age: "29".to_string(),
            phone: "+7 911 000-11-22".to_string(),
            email: "anna@example.org".to_string(),
        })
    );
    Ok(())
}

/// Each stage asks for its own field
#[tokio::test]
async fn test_prompt_keys_follow_stages() -> Result<()> {
    let stages = [
        (ConversationState::AwaitingFio, "document-ask-fio"),
        (
            ConversationState::AwaitingAge {
                fio: "a".to_string(),
            },
            "document-ask-age",
        ),
        (
            ConversationState::AwaitingPhone {
                fio: "a".to_string(),
                age: "1".to_string(),
            },
            "document-ask-phone",
        ),
        (
            ConversationState::AwaitingEmail {
                fio: "a".to_string(),
                age: "1".to_string(),
                phone: "2".to_string(),
            },
            "document-ask-email",
        ),
    ];

    for (state, key) in stages {
        assert_eq!(state.field_prompt_key(), Some(key));
    }
    assert_eq!(ConversationState::SectionList.field_prompt_key(), None);
    Ok(())
}

/// Menu states are not part of the document flow
#[tokio::test]
async fn test_menu_states_are_outside_document_flow() -> Result<()> {
    assert!(!ConversationState::Idle.in_document_flow());
    assert!(!ConversationState::SectionList.in_document_flow());
    assert!(!ConversationState::SectionContent {
        section: MenuSection::ResourceSupply
    }
    .in_document_flow());
    assert!(ConversationState::TemplateChoice.in_document_flow());
    assert_eq!(ConversationState::default(), ConversationState::Idle);
    Ok(())
}

/// States survive serialization with the section they carry
#[tokio::test]
async fn test_state_serialization() -> Result<()> {
    let state = ConversationState::SectionContent {
        section: MenuSection::WasteManagement,
    };

    let json = serde_json::to_string(&state)?;
    let restored: ConversationState = serde_json::from_str(&json)?;

    assert_eq!(restored, state);
    Ok(())
}

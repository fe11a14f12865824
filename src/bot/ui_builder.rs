//! UI Builder module for creating reply keyboards

use teloxide::types::{KeyboardButton, KeyboardMarkup};

use crate::documents::APPLICATION_TEMPLATE_LABEL;
use crate::menu::MenuSection;

pub const BACK: &str = "Назад";
pub const ANOTHER_QUESTION: &str = "Еще вопрос";
pub const OPEN_MENU: &str = "/main - Открыть меню";
pub const FREE_CHAT: &str = "/chat - Свободный вопрос";

/// A reply keyboard, one button per row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyKeyboard {
    rows: Vec<Vec<String>>,
}

impl ReplyKeyboard {
    /// Build a single-column keyboard from labels
    pub fn column<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: labels.into_iter().map(|label| vec![label.into()]).collect(),
        }
    }

    /// All labels in display order
    pub fn labels(&self) -> Vec<&str> {
        self.rows.iter().flatten().map(String::as_str).collect()
    }

    /// Telegram representation, resized to fit the labels
    pub fn to_markup(&self) -> KeyboardMarkup {
        KeyboardMarkup::new(
            self.rows
                .iter()
                .map(|row| row.iter().map(|label| KeyboardButton::new(label.clone()))),
        )
        .resize_keyboard()
    }
}

/// Mode choice shown at the root
pub fn root_keyboard() -> ReplyKeyboard {
    ReplyKeyboard::column([OPEN_MENU, FREE_CHAT])
}

/// Every section followed by the back action
pub fn section_list_keyboard() -> ReplyKeyboard {
    ReplyKeyboard::column(
        MenuSection::ALL
            .into_iter()
            .map(MenuSection::label)
            .chain([BACK]),
    )
}

/// Actions offered under a shown section answer
pub fn section_content_keyboard() -> ReplyKeyboard {
    ReplyKeyboard::column([ANOTHER_QUESTION, BACK])
}

/// Templates offered by the documents section
pub fn template_keyboard() -> ReplyKeyboard {
    ReplyKeyboard::column([APPLICATION_TEMPLATE_LABEL, BACK])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_keyboard_offers_modes_only() {
        assert_eq!(root_keyboard().labels(), vec![OPEN_MENU, FREE_CHAT]);
    }

    #[test]
    fn test_section_list_ends_with_back() {
        let keyboard = section_list_keyboard();
        let labels = keyboard.labels();
        assert_eq!(labels.len(), MenuSection::ALL.len() + 1);
        assert_eq!(labels.first(), Some(&"Качество коммунальных услуг"));
        assert_eq!(labels.last(), Some(&BACK));
    }
}

use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::sync::LazyLock;
use tracing::error;
use unic_langid::LanguageIdentifier;

/// Default locale of the bot
pub const DEFAULT_LOCALE: &str = "ru";

const RU_MESSAGES: &str = include_str!("../locales/ru/main.ftl");

/// Localization manager for the helpdesk bot
pub struct LocalizationManager {
    bundle: FluentBundle<FluentResource>,
}

impl LocalizationManager {
    /// Create a manager backed by the embedded Russian resource
    pub fn new() -> anyhow::Result<Self> {
        Self::from_source(DEFAULT_LOCALE, RU_MESSAGES)
    }

    /// Create a manager from an arbitrary Fluent source
    pub fn from_source(locale: &str, source: &str) -> anyhow::Result<Self> {
        let locale: LanguageIdentifier = locale.parse()?;
        let mut bundle = FluentBundle::new_concurrent(vec![locale]);
        // Telegram renders the bidi isolation marks literally
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string()).map_err(|(_, errors)| {
            anyhow::anyhow!("Failed to parse Fluent resource: {:?}", errors)
        })?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow::anyhow!("Failed to add Fluent resource: {:?}", errors))?;

        Ok(Self { bundle })
    }

    /// Get a localized message
    pub fn get_message(&self, key: &str, args: Option<&FluentArgs>) -> String {
        let msg = match self.bundle.get_message(key) {
            Some(msg) => msg,
            None => return format!("Missing translation: {}", key),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {}", key),
        };

        let mut errors = vec![];
        let value = self.bundle.format_pattern(pattern, args, &mut errors);
        if !errors.is_empty() {
            error!(key, errors = ?errors, "Errors while formatting localized message");
        }
        value.into_owned()
    }

    /// Get a localized message with simple string arguments
    pub fn get_message_with_args(&self, key: &str, args: &[(&str, &str)]) -> String {
        let mut fluent_args = FluentArgs::new();
        for (name, value) in args {
            fluent_args.set(*name, FluentValue::from(*value));
        }
        self.get_message(key, Some(&fluent_args))
    }
}

static LOCALIZATION_MANAGER: LazyLock<Option<LocalizationManager>> =
    LazyLock::new(|| match LocalizationManager::new() {
        Ok(manager) => Some(manager),
        Err(e) => {
            error!(error = %e, "Embedded localization resource is invalid");
            None
        }
    });

/// Convenience function to get a localized message
pub fn t(key: &str) -> String {
    match LOCALIZATION_MANAGER.as_ref() {
        Some(manager) => manager.get_message(key, None),
        None => format!("Missing translation: {}", key),
    }
}

/// Convenience function to get a localized message with arguments
pub fn t_args(key: &str, args: &[(&str, &str)]) -> String {
    match LOCALIZATION_MANAGER.as_ref() {
        Some(manager) => manager.get_message_with_args(key, args),
        None => format!("Missing translation: {}", key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_resource_parses() {
        assert!(LocalizationManager::new().is_ok());
    }

    #[test]
    fn test_args_are_not_isolated() {
        let message = t_args("document-field-empty", &[("prompt", "Введите ваш email:")]);
        assert_eq!(
            message,
            "Значение не может быть пустым. Введите ваш email:"
        );
    }
}

//! # Configuration Module
//!
//! This module defines configuration structures for the helpdesk bot,
//! including retrieval settings, completion service limits, dispatch sizing
//! and the environment-sourced process settings.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

// Constants for retrieval configuration
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 2;
pub const DEFAULT_EMBEDDING_BATCH: usize = 32;

// Constants for the completion service
pub const DEFAULT_API_URL: &str = "https://api.mistral.ai/v1";
pub const DEFAULT_CHAT_MODEL: &str = "mistral-tiny";
pub const DEFAULT_EMBED_MODEL: &str = "mistral-embed";
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 30;

// Constants for process wiring
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_DISPATCH_WORKERS: usize = 8;
pub const DEFAULT_DISPATCH_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

/// Errors raised while reading process configuration. All of them are fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Retrieval configuration for the knowledge base
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks
    pub chunk_overlap: usize,
    /// Number of chunks handed to the completion service
    pub top_k: usize,
    /// Number of chunks sent per embedding request
    pub embedding_batch: usize,
    /// Drop hits scoring below this cosine similarity
    pub min_similarity: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            embedding_batch: DEFAULT_EMBEDDING_BATCH,
            min_similarity: None,
        }
    }
}

/// Circuit breaker settings for the completion service
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens
    pub threshold: u32,
    /// Seconds the breaker stays open
    pub reset_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            reset_secs: 60, // 1 minute
        }
    }
}

/// Hosted language model endpoints
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embed_model: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            timeout_secs: DEFAULT_COMPLETION_TIMEOUT_SECS,
        }
    }
}

/// Sizing of the update worker pool
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Updates processed concurrently
    pub workers: usize,
    /// Updates buffered before the webhook starts rejecting
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_DISPATCH_WORKERS,
            queue_capacity: DEFAULT_DISPATCH_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging output settings
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// Never fails: an unknown format falls back to text so that logging is
    /// available to report the real configuration errors.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        let file = non_empty(lookup("LOG_FILE")).map(PathBuf::from);
        Self { format, file }
    }
}

/// Filesystem layout of the bot's content
#[derive(Debug, Clone, PartialEq)]
pub struct ContentPaths {
    pub knowledge_base: PathBuf,
    pub menu_sections: PathBuf,
    pub templates: PathBuf,
    pub document_output: PathBuf,
}

impl Default for ContentPaths {
    fn default() -> Self {
        Self {
            knowledge_base: PathBuf::from("knowledge_base"),
            menu_sections: PathBuf::from("menu_sections"),
            templates: PathBuf::from("templates"),
            document_output: PathBuf::from("."),
        }
    }
}

/// Complete process configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bot_token: String,
    pub webhook_base_url: String,
    pub bind_addr: SocketAddr,
    pub provider: ProviderConfig,
    pub retrieval: RetrievalConfig,
    pub breaker: BreakerConfig,
    pub dispatch: DispatchConfig,
    pub paths: ContentPaths,
    pub session_ttl_secs: u64,
    pub log: LogConfig,
}

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token =
            non_empty(lookup("TELEGRAM_BOT_TOKEN")).ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let webhook_base_url =
            non_empty(lookup("WEBHOOK_URL")).ok_or(ConfigError::Missing("WEBHOOK_URL"))?;

        let provider_defaults = ProviderConfig::default();
        let provider = ProviderConfig {
            api_url: non_empty(lookup("MISTRAL_API_URL")).unwrap_or(provider_defaults.api_url),
            api_key: non_empty(lookup("MISTRAL_API_KEY")),
            chat_model: non_empty(lookup("MISTRAL_CHAT_MODEL"))
                .unwrap_or(provider_defaults.chat_model),
            embed_model: non_empty(lookup("MISTRAL_EMBED_MODEL"))
                .unwrap_or(provider_defaults.embed_model),
            timeout_secs: parse_or(
                &lookup,
                "COMPLETION_TIMEOUT_SECS",
                DEFAULT_COMPLETION_TIMEOUT_SECS,
            )?,
        };

        let path_defaults = ContentPaths::default();
        let paths = ContentPaths {
            knowledge_base: path_or(&lookup, "KNOWLEDGE_BASE_DIR", path_defaults.knowledge_base),
            menu_sections: path_or(&lookup, "MENU_SECTIONS_DIR", path_defaults.menu_sections),
            templates: path_or(&lookup, "TEMPLATES_DIR", path_defaults.templates),
            document_output: path_or(&lookup, "DOCUMENT_OUTPUT_DIR", path_defaults.document_output),
        };

        let dispatch = DispatchConfig {
            workers: parse_or(&lookup, "DISPATCH_WORKERS", DEFAULT_DISPATCH_WORKERS)?,
            queue_capacity: parse_or(
                &lookup,
                "DISPATCH_QUEUE_CAPACITY",
                DEFAULT_DISPATCH_QUEUE_CAPACITY,
            )?,
        };
        if dispatch.workers == 0 {
            return Err(invalid("DISPATCH_WORKERS", "0", "must be at least 1"));
        }
        if dispatch.queue_capacity == 0 {
            return Err(invalid("DISPATCH_QUEUE_CAPACITY", "0", "must be at least 1"));
        }

        Ok(Self {
            bot_token,
            webhook_base_url,
            bind_addr: parse_or(
                &lookup,
                "BIND_ADDR",
                SocketAddr::from_str(DEFAULT_BIND_ADDR).map_err(|e| {
                    invalid("BIND_ADDR", DEFAULT_BIND_ADDR, &e.to_string())
                })?,
            )?,
            provider,
            retrieval: RetrievalConfig::default(),
            breaker: BreakerConfig::default(),
            dispatch,
            paths,
            session_ttl_secs: parse_or(&lookup, "SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            log: LogConfig::from_lookup(&lookup),
        })
    }

    /// Path of the single webhook route, scoped by the bot token
    pub fn webhook_path(&self) -> String {
        format!("/{}", self.bot_token)
    }

    /// Full URL registered with Telegram
    pub fn webhook_url(&self) -> String {
        format!(
            "{}{}",
            self.webhook_base_url.trim_end_matches('/'),
            self.webhook_path()
        )
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn path_or<F>(lookup: &F, key: &str, default: PathBuf) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup(key)).map(PathBuf::from).unwrap_or(default)
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup(key)) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| invalid(key, &raw, &e.to_string())),
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

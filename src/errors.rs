//! # Error Types Module
//!
//! Structured errors for the collaborators the bot talks to. Handler code
//! wraps them in `anyhow` and converts them to user-facing replies at the
//! call site.

use thiserror::Error;

/// Errors from the hosted language model endpoints
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("API key is missing")]
    MissingApiKey,
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("Request to {endpoint} failed: {source}")]
    Request {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
    #[error("Failed to deserialize {endpoint} response: {source}")]
    Deserialization {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned no usable content")]
    EmptyResponse { endpoint: &'static str },
}

/// Errors while building the knowledge index
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Failed to read knowledge base at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to walk knowledge base: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Invalid splitter configuration: {0}")]
    Splitter(String),
    #[error("Embedding failed: {0}")]
    Embedding(#[from] ProviderError),
    #[error("Embedding service returned {got} vectors for {expected} inputs")]
    EmbeddingCount { expected: usize, got: usize },
}

/// Errors while reading pre-written section answers
#[derive(Debug, Error)]
pub enum MenuError {
    #[error("Failed to read section directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors while rendering a document template
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Template {path} is not available: {source}")]
    TemplateUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Template {template} uses unknown placeholder '{name}'")]
    UnknownPlaceholder { template: String, name: String },
    #[error("Failed to write rendered document into {dir}: {source}")]
    Output {
        dir: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors when handing an update to the worker pool
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Update queue is full")]
    QueueFull,
    #[error("Update queue is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_formatting() {
        let error = ProviderError::Api {
            endpoint: "chat/completions",
            status: 401,
            body: "Unauthorized".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "chat/completions returned HTTP 401: Unauthorized"
        );

        let error = DocumentError::UnknownPlaceholder {
            template: "заявление.txt".to_string(),
            name: "address".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Template заявление.txt uses unknown placeholder 'address'"
        );
    }
}

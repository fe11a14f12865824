//! # Language Model Providers
//!
//! Traits for the two hosted model collaborators (chat completion and text
//! embedding) and a Mistral implementation that speaks the OpenAI-compatible
//! HTTP API.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::errors::ProviderError;

const CHAT_ENDPOINT: &str = "chat/completions";
const EMBEDDINGS_ENDPOINT: &str = "embeddings";

/// A hosted chat completion service.
#[async_trait]
pub trait CompletionProvider: Send + Sync + Debug {
    /// Requests a completion for a system instruction and a single user turn.
    async fn complete(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, ProviderError>;
}

/// A text embedding service.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    /// Embeds every input, returning one vector per input in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

// --- OpenAI-compatible request and response structures ---

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize, Debug)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Client for the Mistral platform API.
#[derive(Clone, Debug)]
pub struct MistralClient {
    client: ReqwestClient,
    api_url: String,
    api_key: Option<String>,
    chat_model: String,
    embed_model: String,
}

impl MistralClient {
    /// Creates a client whose every request is bounded by `timeout_secs`.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ProviderError::ClientBuild)?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            chat_model: config.chat_model.clone(),
            embed_model: config.embed_model.clone(),
        })
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_url, endpoint)
    }

    async fn post<B, R>(&self, endpoint: &'static str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + Debug + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)?;
        debug!(endpoint, "--> Sending request to Mistral API");

        let response = self
            .client
            .post(self.endpoint_url(endpoint))
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|source| ProviderError::Request { endpoint, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|source| ProviderError::Deserialization { endpoint, source })
    }
}

#[async_trait]
impl CompletionProvider for MistralClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        let response: ChatResponse = self.post(CHAT_ENDPOINT, &request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse {
                endpoint: CHAT_ENDPOINT,
            })
    }
}

#[async_trait]
impl EmbeddingProvider for MistralClient {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.embed_model,
            input: inputs,
        };
        let mut response: EmbeddingResponse = self.post(EMBEDDINGS_ENDPOINT, &request).await?;

        if response.data.len() != inputs.len() {
            return Err(ProviderError::EmptyResponse {
                endpoint: EMBEDDINGS_ENDPOINT,
            });
        }
        // The API reports an index per vector; honour it when present.
        response
            .data
            .sort_by_key(|item| item.index.unwrap_or(usize::MAX));
        Ok(response.data.into_iter().map(|item| item.embedding).collect())
    }
}

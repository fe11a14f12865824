//! # Answer Module
//!
//! Retrieval-augmented answers for free-form questions: the question is
//! embedded, the nearest knowledge chunks are looked up, and the hosted model
//! is asked to answer from that context only.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::RetrievalConfig;
use crate::errors::ProviderError;
use crate::knowledge_base::KnowledgeIndex;
use crate::localization::t;
use crate::providers::{CompletionProvider, EmbeddingProvider};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the question based only on the provided context. If you cannot answer the question based on the context, say so.";

// Phrases the model uses when the context does not cover the question
lazy_static! {
    static ref REFUSAL_PATTERN: Regex =
        Regex::new(r"(?i)cannot|don't have").expect("Refusal pattern should be valid");
}

/// Build the user turn sent alongside the system prompt
pub fn build_user_prompt(context: &str, question: &str) -> String {
    format!(
        "Context: {context}\n\nQuestion: {question}\n\nAnswer based only on the provided context."
    )
}

/// Whether a completion is one of the model's refusal phrasings
pub fn is_refusal(reply: &str) -> bool {
    REFUSAL_PATTERN.is_match(reply)
}

/// A retrieved chunk, detached from the index
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: String,
    pub score: f32,
}

/// Top-K lookup over the shared knowledge index
#[derive(Debug, Clone)]
pub struct Retriever {
    index: Arc<KnowledgeIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    min_similarity: Option<f32>,
}

impl Retriever {
    pub fn new(
        index: Arc<KnowledgeIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            top_k: config.top_k,
            min_similarity: config.min_similarity,
        }
    }

    /// Return at most `top_k` chunks; no match is an empty vector, not an error
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, ProviderError> {
        if self.index.is_empty() || self.top_k == 0 {
            return Ok(Vec::new());
        }

        let mut vectors = self.embedder.embed(&[question.to_string()]).await?;
        let Some(query) = vectors.pop() else {
            return Err(ProviderError::EmptyResponse {
                endpoint: "embeddings",
            });
        };

        let hits = self
            .index
            .nearest(&query, self.top_k)
            .into_iter()
            .filter(|hit| self.min_similarity.is_none_or(|min| hit.score >= min))
            .map(|hit| RetrievedChunk {
                text: hit.chunk.text.clone(),
                source: hit.chunk.source.display().to_string(),
                score: hit.score,
            })
            .collect();
        Ok(hits)
    }
}

/// What happened to a free-form question
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    /// Retrieval found nothing; the model was not called
    NoContext,
    /// The model answered from the context
    Answer(String),
    /// The model said it could not answer
    Refusal,
    /// A collaborator failed
    Failed,
}

impl AnswerOutcome {
    /// Text shown to the user
    pub fn reply_text(&self) -> String {
        match self {
            AnswerOutcome::NoContext => t("answer-not-found"),
            AnswerOutcome::Answer(text) => text.clone(),
            AnswerOutcome::Refusal => t("answer-refusal"),
            AnswerOutcome::Failed => t("answer-error"),
        }
    }
}

/// Retrieval plus completion, with refusal normalisation
#[derive(Debug)]
pub struct Answerer {
    retriever: Retriever,
    completion: Arc<dyn CompletionProvider>,
    breaker: CircuitBreaker,
}

impl Answerer {
    pub fn new(
        retriever: Retriever,
        completion: Arc<dyn CompletionProvider>,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            retriever,
            completion,
            breaker,
        }
    }

    /// Answer a question. Never fails: collaborator errors are logged and
    /// reported as [`AnswerOutcome::Failed`].
    pub async fn answer(&self, question: &str) -> AnswerOutcome {
        let chunks = match self.retriever.retrieve(question).await {
            Ok(chunks) => chunks,
            Err(e) => {
                error!(error = %e, "Knowledge retrieval failed");
                return AnswerOutcome::Failed;
            }
        };

        if chunks.is_empty() {
            info!("No knowledge chunks matched the question");
            return AnswerOutcome::NoContext;
        }
        debug!(
            hits = chunks.len(),
            best_score = chunks[0].score,
            best_source = %chunks[0].source,
            "Retrieved context for question"
        );

        if self.breaker.is_open() {
            warn!("Completion circuit breaker is open, skipping request");
            return AnswerOutcome::Failed;
        }

        let context = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let user_prompt = build_user_prompt(&context, question);

        match self.completion.complete(SYSTEM_PROMPT, &user_prompt).await {
            Ok(reply) => {
                self.breaker.record_success();
                if is_refusal(&reply) {
                    info!("Model declined to answer from context");
                    AnswerOutcome::Refusal
                } else {
                    AnswerOutcome::Answer(reply)
                }
            }
            Err(e) => {
                self.breaker.record_failure();
                error!(error = %e, "Error while getting response from completion service");
                AnswerOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refusal_detection_is_case_insensitive() {
        assert!(is_refusal("I CANNOT answer that."));
        assert!(is_refusal("Sorry, I Don't Have that information."));
        assert!(!is_refusal("Плата за отопление начисляется ежемесячно."));
    }

    #[test]
    fn test_user_prompt_layout() {
        assert_eq!(
            build_user_prompt("ctx", "q?"),
            "Context: ctx\n\nQuestion: q?\n\nAnswer based only on the provided context."
        );
    }
}

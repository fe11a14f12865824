//! Shared fakes and fixtures for the integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;
use teloxide::types::{ChatId, Update};

use housing_helpdesk::answer::{Answerer, Retriever};
use housing_helpdesk::bot::{BotServices, Messenger, ReplyKeyboard};
use housing_helpdesk::circuit_breaker::CircuitBreaker;
use housing_helpdesk::config::{BreakerConfig, RetrievalConfig};
use housing_helpdesk::documents::{DocumentRenderer, APPLICATION_TEMPLATE_FILE};
use housing_helpdesk::errors::ProviderError;
use housing_helpdesk::knowledge_base::{Chunk, KnowledgeIndex};
use housing_helpdesk::menu::{MenuLibrary, MenuSection};
use housing_helpdesk::providers::{CompletionProvider, EmbeddingProvider};
use housing_helpdesk::session_store::SessionStore;

pub const TEMPLATE: &str = "Заявитель: {{ fio }}, {{ age }} лет\nТелефон: {{ phone }}\nE-mail: {{ email }}\n";

/// One outbound message seen by [`RecordingMessenger`]
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat_id: ChatId,
        text: String,
        keyboard: Option<Vec<String>>,
    },
    File {
        chat_id: ChatId,
        path: PathBuf,
        content: String,
    },
}

impl Sent {
    pub fn text(&self) -> Option<&str> {
        match self {
            Sent::Text { text, .. } => Some(text),
            Sent::File { .. } => None,
        }
    }

    pub fn keyboard(&self) -> Option<Vec<String>> {
        match self {
            Sent::Text { keyboard, .. } => keyboard.clone(),
            Sent::File { .. } => None,
        }
    }
}

/// Messenger that records everything instead of talking to Telegram
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    fail_files: bool,
}

impl RecordingMessenger {
    pub fn failing_files() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_files: true,
        }
    }

    /// Drain everything recorded so far
    pub fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str, keyboard: Option<&ReplyKeyboard>) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Text {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.map(|k| k.labels().into_iter().map(str::to_string).collect()),
        });
        Ok(())
    }

    async fn send_file(&self, chat_id: ChatId, path: &Path) -> Result<()> {
        if self.fail_files {
            anyhow::bail!("upload rejected");
        }
        let content = std::fs::read_to_string(path)?;
        self.sent.lock().unwrap().push(Sent::File {
            chat_id,
            path: path.to_path_buf(),
            content,
        });
        Ok(())
    }
}

/// Embeds text as keyword counts, one dimension per keyword
#[derive(Debug)]
pub struct KeywordEmbedder {
    keywords: Vec<&'static str>,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&'static str]) -> Self {
        Self {
            keywords: keywords.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .map(|keyword| lower.matches(keyword).count() as f32)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(inputs.iter().map(|text| self.vector(text)).collect())
    }
}

/// Completion provider replying with a fixed script
#[derive(Debug)]
pub struct ScriptedCompletion {
    reply: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        self.reply.clone().ok_or(ProviderError::EmptyResponse {
            endpoint: "chat/completions",
        })
    }
}

/// Index the given texts with the keyword embedder
pub fn keyword_index(embedder: &KeywordEmbedder, texts: &[&str]) -> KnowledgeIndex {
    let chunks: Vec<Chunk> = texts
        .iter()
        .enumerate()
        .map(|(ordinal, text)| Chunk {
            source: PathBuf::from("kb.txt"),
            ordinal,
            text: text.to_string(),
        })
        .collect();
    let embeddings = texts.iter().map(|text| embedder.vector(text)).collect();
    KnowledgeIndex::from_embedded(chunks, embeddings).unwrap()
}

/// Retrieval settings that drop unrelated chunks
pub fn strict_retrieval() -> RetrievalConfig {
    RetrievalConfig {
        min_similarity: Some(0.5),
        ..RetrievalConfig::default()
    }
}

pub fn answerer(
    index: KnowledgeIndex,
    embedder: Arc<KeywordEmbedder>,
    completion: Arc<ScriptedCompletion>,
) -> Answerer {
    let retriever = Retriever::new(Arc::new(index), embedder, &strict_retrieval());
    Answerer::new(retriever, completion, CircuitBreaker::new(BreakerConfig::default()))
}

/// Temporary content directories plus the services wired to them
pub struct Fixture {
    pub dir: TempDir,
    pub messenger: Arc<RecordingMessenger>,
    pub completion: Arc<ScriptedCompletion>,
    pub embedder: Arc<KeywordEmbedder>,
    pub services: Arc<BotServices>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_messenger(RecordingMessenger::default())
    }

    pub fn with_messenger(messenger: RecordingMessenger) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let menu_root = dir.path().join("menu_sections");
        let templates = dir.path().join("templates");
        let output = dir.path().join("output");

        let quality = menu_root.join(MenuSection::UtilityServiceQuality.dir_name());
        std::fs::create_dir_all(&quality).unwrap();
        std::fs::write(quality.join("answer.txt"), "Ответ про качество услуг").unwrap();
        std::fs::create_dir_all(menu_root.join(MenuSection::PrivateHouseholds.dir_name())).unwrap();
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(templates.join(APPLICATION_TEMPLATE_FILE), TEMPLATE).unwrap();
        std::fs::create_dir_all(&output).unwrap();

        let messenger = Arc::new(messenger);
        let embedder = Arc::new(KeywordEmbedder::new(&["перерасчет", "вода"]));
        let completion = Arc::new(ScriptedCompletion::replying(
            "Перерасчет делается после проверки качества.",
        ));
        let index = keyword_index(
            &embedder,
            &["Перерасчет платы выполняется по акту проверки.", "Горячая вода подается круглосуточно."],
        );

        let services = Arc::new(BotServices {
            messenger: messenger.clone(),
            sessions: SessionStore::new(Duration::from_secs(60)),
            menu: MenuLibrary::new(menu_root),
            documents: DocumentRenderer::new(templates, output),
            answerer: answerer(index, embedder.clone(), completion.clone()),
        });

        Self {
            dir,
            messenger,
            completion,
            embedder,
            services,
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    pub fn output_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.output_dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

/// A private-chat text message update as Telegram would post it
pub fn text_update_json(update_id: u32, chat_id: i64, text: &str) -> serde_json::Value {
    serde_json::json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": 1_700_000_000,
            "chat": { "id": chat_id, "type": "private", "first_name": "Иван" },
            "from": { "id": chat_id, "is_bot": false, "first_name": "Иван" },
            "text": text
        }
    })
}

/// Decode an update from raw bytes, the way the webhook does
pub fn update_from_json(json: &serde_json::Value) -> Update {
    serde_json::from_slice(&serde_json::to_vec(json).unwrap()).unwrap()
}

pub fn text_update(update_id: u32, chat_id: i64, text: &str) -> Update {
    update_from_json(&text_update_json(update_id, chat_id, text))
}

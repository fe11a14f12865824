//! # Knowledge Base Module
//!
//! Loads the plain-text knowledge base at startup, splits it into chunks,
//! embeds every chunk and publishes an immutable in-memory index that answers
//! nearest-neighbour queries by cosine similarity.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::errors::{KnowledgeError, ProviderError};
use crate::providers::EmbeddingProvider;
use crate::text_splitter::TextSplitter;

/// A bounded slice of a knowledge base document
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// File the chunk was cut from
    pub source: PathBuf,
    /// Position of the chunk inside its source
    pub ordinal: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
struct IndexedChunk {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// A chunk returned by a similarity query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// Read-only semantic index over the knowledge base
#[derive(Debug, Default)]
pub struct KnowledgeIndex {
    entries: Vec<IndexedChunk>,
}

impl KnowledgeIndex {
    /// Build an index from already embedded chunks
    pub fn from_embedded(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self, KnowledgeError> {
        if chunks.len() != embeddings.len() {
            return Err(KnowledgeError::EmbeddingCount {
                expected: chunks.len(),
                got: embeddings.len(),
            });
        }
        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedChunk { chunk, embedding })
            .collect();
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return at most `k` chunks ordered by decreasing similarity.
    ///
    /// Ties keep index order. An empty index yields an empty result.
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<ScoredChunk<'_>> {
        let mut scored: Vec<ScoredChunk<'_>> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: &entry.chunk,
                score: cosine_similarity(query, &entry.embedding),
            })
            .collect();

        // sort_by is stable, so equal scores stay in index order
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

/// Cosine similarity; mismatched or zero-length vectors score 0.0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a * norm_b);
    if score.is_nan() {
        0.0
    } else {
        score
    }
}

/// Collect `*.txt` documents under `root` and cut them into chunks
pub fn load_chunks(root: &Path, splitter: &TextSplitter) -> Result<Vec<Chunk>, KnowledgeError> {
    if !root.exists() {
        warn!(path = %root.display(), "Knowledge base directory missing, creating it");
        std::fs::create_dir_all(root).map_err(|source| KnowledgeError::Io {
            path: root.display().to_string(),
            source,
        })?;
        return Ok(Vec::new());
    }

    let mut chunks = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let is_text = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if !entry.file_type().is_file() || !is_text {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| KnowledgeError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let pieces = splitter.split(&content);
        debug!(path = %path.display(), chunks = pieces.len(), "Loaded knowledge document");

        chunks.extend(pieces.into_iter().enumerate().map(|(ordinal, text)| Chunk {
            source: path.to_path_buf(),
            ordinal,
            text,
        }));
    }

    Ok(chunks)
}

/// Load, split and embed the whole knowledge base
pub async fn build_index(
    root: &Path,
    splitter: &TextSplitter,
    embedder: &dyn EmbeddingProvider,
    batch_size: usize,
) -> Result<KnowledgeIndex, KnowledgeError> {
    let chunks = load_chunks(root, splitter)?;
    if chunks.is_empty() {
        warn!(path = %root.display(), "Knowledge base is empty; free-form questions will find nothing");
        return Ok(KnowledgeIndex::default());
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let mut embeddings = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let vectors = match embedder.embed(batch).await {
            Ok(vectors) => vectors,
            Err(ProviderError::MissingApiKey) => {
                warn!(
                    path = %root.display(),
                    chunks = chunks.len(),
                    "Embedding service has no API key; starting with an empty knowledge index"
                );
                return Ok(KnowledgeIndex::default());
            }
            Err(e) => return Err(e.into()),
        };
        if vectors.len() != batch.len() {
            return Err(KnowledgeError::EmbeddingCount {
                expected: batch.len(),
                got: vectors.len(),
            });
        }
        embeddings.extend(vectors);
    }

    let index = KnowledgeIndex::from_embedded(chunks, embeddings)?;
    info!(chunks = index.len(), path = %root.display(), "Knowledge index built");
    Ok(index)
}

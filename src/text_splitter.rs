//! # Text Splitter Module
//!
//! Recursive character splitting of knowledge base documents into bounded,
//! overlapping chunks.
//!
//! The text is first split on the coarsest separator present (blank lines),
//! pieces that are still too long are split again on finer separators (line
//! breaks, spaces, single characters), and the small pieces are merged back
//! into chunks of at most `chunk_size` characters. Each new chunk starts with
//! up to `chunk_overlap` characters taken from the end of the previous one.

use std::collections::VecDeque;

use tracing::trace;

use crate::errors::KnowledgeError;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits text into chunks of bounded character length
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Create a splitter, rejecting configurations that cannot make progress
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, KnowledgeError> {
        if chunk_size == 0 {
            return Err(KnowledgeError::Splitter(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(KnowledgeError::Splitter(format!(
                "chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split a document into trimmed, non-empty chunks
    pub fn split(&self, text: &str) -> Vec<String> {
        let chunks = self.split_with(text, &SEPARATORS);
        trace!(chunks = chunks.len(), "Document split into chunks");
        chunks
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // Pick the first separator that occurs in the text; "" always does.
        let (position, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
            .map(|(i, sep)| (i, *sep))
            .unwrap_or((separators.len().saturating_sub(1), ""));
        let finer = &separators[(position + 1).min(separators.len())..];

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.trim().to_string());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }

        chunks.retain(|c| !c.is_empty());
        chunks
    }

    /// Greedily joins small pieces into chunks, carrying overlap forward
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { separator_len };

            if total + len + joiner > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window, separator);

                // Drop pieces from the front until the remainder fits the
                // overlap allowance and leaves room for the incoming piece.
                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if window.is_empty() { 0 } else { separator_len }
                            > self.chunk_size)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(front);
                    if !window.is_empty() {
                        total -= separator_len;
                    }
                }
            }

            if !window.is_empty() {
                total += separator_len;
            }
            window.push_back(piece);
            total += len;
        }

        push_joined(&mut chunks, &window, separator);
        chunks
    }
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window
        .iter()
        .copied()
        .collect::<Vec<&str>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        assert!(TextSplitter::new(100, 100).is_err());
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(100, 20).is_ok());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let splitter = TextSplitter::new(1000, 200).unwrap();
        let chunks = splitter.split("  Тариф на отопление утверждается ежегодно.  ");
        assert_eq!(chunks, vec!["Тариф на отопление утверждается ежегодно."]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let splitter = TextSplitter::new(1000, 200).unwrap();
        assert!(splitter.split("   \n\n  ").is_empty());
    }

    #[test]
    fn test_unbroken_token_is_cut_with_overlap() {
        let splitter = TextSplitter::new(10, 3).unwrap();
        let chunks = splitter.split("abcdefghijklmnopqrstuvwxy");
        assert_eq!(chunks, vec!["abcdefghij", "hijklmnopq", "opqrstuvwx", "vwxy"]);
    }

    #[test]
    fn test_long_token_chunks_are_bounded_and_overlap() {
        let alphabet: Vec<char> = "абвгдеёжзийклмнопрстуфхцчшщъыьэюя".chars().collect();
        let text: String = (0..2500).map(|i| alphabet[i % alphabet.len()]).collect();
        let chars: Vec<char> = text.chars().collect();
        let slice = |from: usize, to: usize| chars[from..to].iter().collect::<String>();

        let splitter = TextSplitter::new(1000, 200).unwrap();
        let chunks = splitter.split(&text);

        assert_eq!(chunks, vec![slice(0, 1000), slice(800, 1800), slice(1600, 2500)]);
    }

    #[test]
    fn test_paragraphs_are_packed_whole() {
        let paragraphs: Vec<String> = (0..10)
            .map(|i| format!("Абзац {i}. {}", "тариф ".repeat(50).trim_end()))
            .collect();
        let text = paragraphs.join("\n\n");

        let splitter = TextSplitter::new(1000, 200).unwrap();
        let chunks = splitter.split(&text);

        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|chunk| char_len(chunk) <= 1000));
        assert_eq!(chunks[0], paragraphs[..3].join("\n\n"));
        for paragraph in &paragraphs {
            let holders = chunks.iter().filter(|chunk| chunk.contains(paragraph.as_str())).count();
            assert_eq!(holders, 1, "{paragraph} should land in exactly one chunk");
        }
    }

    #[test]
    fn test_oversized_paragraph_falls_back_to_words() {
        let words = (0..500).map(|i| format!("w{i:04}")).collect::<Vec<_>>().join(" ");
        let text = format!("Вступление.\n\n{words}");

        let splitter = TextSplitter::new(1000, 200).unwrap();
        let chunks = splitter.split(&text);

        assert_eq!(chunks[0], "Вступление.");
        assert!(chunks.len() > 2);
        assert!(chunks.iter().all(|chunk| char_len(chunk) <= 1000));
        for pair in chunks[1..].windows(2) {
            let (previous, next) = (&pair[0], &pair[1]);
            let first_word = next.split(' ').next().unwrap();
            let start = previous.find(first_word).expect("next chunk should repeat the tail");
            let overlap = &previous[start..];
            assert!(!overlap.is_empty() && overlap.len() <= 200);
            assert!(next.starts_with(overlap));
        }
        assert!(chunks.last().unwrap().ends_with("w0499"));
    }
}

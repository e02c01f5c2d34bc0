//! Recursive boundary-aware text splitter.
//!
//! Tries paragraph breaks first, then line breaks, then spaces, and finally
//! splits between characters. Adjacent pieces are merged back up to
//! `chunk_size` characters, carrying up to `chunk_overlap` characters of the
//! previous chunk into the next one. Lengths are counted in `char`s.
//!
//! Output is fully determined by the input text and the configuration.

use ragdesk_core::config::IndexConfig;

const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// A bounded span of document text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub department: String,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            // overlap must leave room for new content
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // First separator that occurs in the text; "" always matches.
        let (idx, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
            .map(|(i, sep)| (i, *sep))
            .unwrap_or((separators.len().saturating_sub(1), ""));
        let remaining = separators.get(idx + 1..).unwrap_or(&[]);

        let splits: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut good: Vec<String> = Vec::new();
        for split in splits {
            if char_len(&split) < self.chunk_size {
                good.push(split);
                continue;
            }
            if !good.is_empty() {
                chunks.extend(self.merge(&good, separator));
                good.clear();
            }
            if remaining.is_empty() {
                chunks.push(split);
            } else {
                chunks.extend(self.split_recursive(&split, remaining));
            }
        }
        if !good.is_empty() {
            chunks.extend(self.merge(&good, separator));
        }
        chunks
    }

    /// Greedily join pieces up to `chunk_size`, keeping a tail of at most
    /// `chunk_overlap` characters as the start of the next chunk.
    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { sep_len };
            if total + len + joiner > self.chunk_size && !current.is_empty() {
                push_joined(&mut docs, &current, separator);
                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some(front) = current.pop_front() else { break };
                    total -= char_len(front) + if current.is_empty() { 0 } else { sep_len };
                }
            }
            let joiner = if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece);
            total += len + joiner;
        }
        push_joined(&mut docs, &current, separator);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, parts: &std::collections::VecDeque<&str>, separator: &str) {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Splits documents and applies the minimum-length noise filter.
#[derive(Debug, Clone)]
pub struct Chunker {
    splitter: RecursiveSplitter,
    min_len: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize, min_len: usize) -> Self {
        Self {
            splitter: RecursiveSplitter::new(chunk_size, chunk_overlap),
            min_len,
        }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap, config.min_chunk_len)
    }

    /// Chunk one document. Every chunk is trimmed and longer than `min_len`.
    pub fn chunk_document(&self, text: &str, department: &str, source: &str) -> Vec<Chunk> {
        self.splitter
            .split_text(text)
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| char_len(c) > self.min_len)
            .map(|text| Chunk {
                text,
                department: department.to_string(),
                source: source.to_string(),
            })
            .collect()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::from_config(&IndexConfig::default())
    }
}


use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::documents::Page;

/// Break points tried in order of preference, from paragraph down to word
const SEPARATORS: [&str; 7] = ["\n\n", ". ", "? ", "! ", "\n", "; ", " "];

/// How far back the start of a chunk may move to land on a word boundary
const MAX_WORD_BACKTRACK: usize = 24;

/// Represents a chunk of corpus text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk text
    pub text: String,
    /// Page the chunk was cut from
    pub page: usize,
    /// Position of this chunk in the whole corpus
    pub index: usize,
}

/// Configuration for text splitting. Sizes are in characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Minimum number of characters shared by consecutive chunks of a page
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 150,
        }
    }
}

/// Split every page into chunks. Chunks never span pages.
#[inline]
pub fn chunk_pages(pages: &[Page], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for page in pages {
        for text in split_text(&page.text, config) {
            chunks.push(Chunk {
                text,
                page: page.number,
                index: chunks.len(),
            });
        }
    }

    debug!(
        "Chunked {} pages into {} chunks (avg {} chars)",
        pages.len(),
        chunks.len(),
        chunks.iter().map(|c| c.text.chars().count()).sum::<usize>() / chunks.len().max(1)
    );

    chunks
}

/// Split a contiguous piece of text into overlapping chunks.
///
/// Every chunk is at most `chunk_size` characters. Each chunk after the first
/// starts at least `chunk_overlap` characters before the end of its
/// predecessor. Cuts land on the latest paragraph, sentence, line or word
/// break in the allowed window and fall back to a hard cut.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.trim().chars().collect();
    let mut pieces = Vec::new();

    if chars.is_empty() || config.chunk_size == 0 {
        return pieces;
    }

    let mut start = 0;
    loop {
        if chars.len() - start <= config.chunk_size {
            pieces.push(chars[start..].iter().collect());
            break;
        }

        let end = find_break(&chars, start, config);
        pieces.push(chars[start..end].iter().collect());
        start = next_start(&chars, start, end, config.chunk_overlap);
    }

    pieces
}

/// Pick the end of the chunk starting at `start`. The caller guarantees more
/// than `chunk_size` characters remain.
fn find_break(chars: &[char], start: usize, config: &ChunkingConfig) -> usize {
    let max_end = start + config.chunk_size;
    let min_end = start + (config.chunk_overlap + 1).max(config.chunk_size / 2).min(config.chunk_size);

    for separator in SEPARATORS {
        let pattern: Vec<char> = separator.chars().collect();
        let found = (min_end..=max_end).rev().find(|&end| {
            end >= start + pattern.len() && chars[end - pattern.len()..end] == pattern[..]
        });
        if let Some(end) = found {
            return end;
        }
    }

    max_end
}

/// Start of the chunk that follows `[start, end)`, keeping at least `overlap`
/// characters of shared context and preferring to begin on a word.
fn next_start(chars: &[char], start: usize, end: usize, overlap: usize) -> usize {
    let candidate = end.saturating_sub(overlap).max(start + 1);
    if overlap == 0 {
        return candidate;
    }

    let floor = (start + 1).max(candidate.saturating_sub(MAX_WORD_BACKTRACK));
    (floor..=candidate)
        .rev()
        .find(|&i| chars[i - 1].is_whitespace() && !chars[i].is_whitespace())
        .unwrap_or(candidate)
}

/// Estimate token count using a simple heuristic
/// This is a rough approximation - actual tokenization would be more accurate
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}

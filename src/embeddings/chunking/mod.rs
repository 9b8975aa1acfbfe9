
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

/// A fixed-size slice of a document's normalized text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk text, verbatim from the normalized document
    pub text: String,
    /// Zero-based position within the document's chunk sequence
    pub ordinal: usize,
}

impl Chunk {
    /// Length in characters (not bytes)
    #[inline]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Where a window is allowed to end
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryMode {
    /// Cut every `chunk_size` characters regardless of content
    #[default]
    Fixed,
    /// Prefer to end a window after a sentence terminator or a space
    Sentence,
}

/// Configuration for content chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    pub boundary: BoundaryMode,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            boundary: BoundaryMode::Fixed,
        }
    }
}

/// Collapse every run of whitespace into a single space and trim both ends
#[inline]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().join(" ")
}

/// Split already-normalized text into ordered, non-overlapping windows of at
/// most `chunk_size` characters. Concatenating the chunk texts yields `text`.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let size = config.chunk_size.max(1);

    let windows = match config.boundary {
        BoundaryMode::Fixed => fixed_windows(chars.len(), size),
        BoundaryMode::Sentence => sentence_windows(&chars, size),
    };

    let chunks: Vec<Chunk> = windows
        .into_iter()
        .enumerate()
        .map(|(ordinal, (start, end))| Chunk {
            text: chars[start..end].iter().collect(),
            ordinal,
        })
        .collect();

    debug!(
        "Chunked {} characters into {} chunks (max {} characters)",
        chars.len(),
        chunks.len(),
        size
    );

    chunks
}

/// Normalize raw extracted text, then chunk it
#[inline]
pub fn chunk_document(raw_text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    chunk_text(&normalize_whitespace(raw_text), config)
}

/// SHA-256 over the ordered chunk texts, hex encoded.
///
/// Equal fingerprints mean the same chunks at the same ordinals, so a
/// committed prefix from an earlier attempt is still valid.
#[inline]
pub fn chunks_fingerprint<S: AsRef<str>>(chunks: &[S]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        let text = chunk.as_ref();
        hasher.update((text.len() as u64).to_be_bytes());
        hasher.update(text.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn fixed_windows(len: usize, size: usize) -> Vec<(usize, usize)> {
    (0..len)
        .step_by(size)
        .map(|start| (start, (start + size).min(len)))
        .collect()
}

fn sentence_windows(chars: &[char], size: usize) -> Vec<(usize, usize)> {
    let len = chars.len();
    let mut windows = Vec::with_capacity(len.div_ceil(size));
    let mut start = 0;

    while start < len {
        let hard_end = (start + size).min(len);
        let end = if hard_end == len {
            hard_end
        } else {
            soft_end(chars, start + size / 2, hard_end).unwrap_or(hard_end)
        };
        windows.push((start, end));
        start = end;
    }

    windows
}

/// Latest cut in `(floor, hard_end]` that keeps a trailing space in the
/// current window, preferring one that follows a sentence terminator.
fn soft_end(chars: &[char], floor: usize, hard_end: usize) -> Option<usize> {
    let candidates = (floor + 1..=hard_end).rev().filter(|&end| chars[end - 1] == ' ');

    let mut fallback = None;
    for end in candidates {
        if end >= 2 && matches!(chars[end - 2], '.' | '!' | '?') {
            return Some(end);
        }
        fallback.get_or_insert(end);
    }

    fallback
}

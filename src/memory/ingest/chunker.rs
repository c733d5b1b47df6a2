//! Paragraph-granular text chunking with overlap.

use regex::Regex;

use crate::memory::core::errors::{MemoryError, MemoryResult};

/// Separator placed between joined paragraphs and before an overlap prefix.
const PARAGRAPH_JOINER: &str = "\n\n";

/// Splits text into chunks of whole paragraphs.
///
/// Paragraphs are greedily packed until the next one would push the chunk
/// past `chunk_size` characters. A paragraph that alone exceeds the size is
/// kept whole as an oversized chunk. Every chunk after the first is prefixed
/// with the last `chunk_overlap` characters of the previous chunk as it was
/// before its own prefix was added.
#[derive(Clone, Debug)]
pub struct Chunker {
    paragraph_break: Regex,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// Create a chunker. Sizes are counted in characters.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if `chunk_size` is zero or `chunk_overlap` is
    /// not smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> MemoryResult<Self> {
        if chunk_size == 0 {
            return Err(MemoryError::InvalidConfig(
                "chunk size must be > 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(MemoryError::InvalidConfig(format!(
                "chunk overlap {chunk_overlap} must be < chunk size {chunk_size}"
            )));
        }

        Ok(Self {
            paragraph_break: Regex::new(r"\n\s*\n")?,
            chunk_size,
            chunk_overlap,
        })
    }

    /// Maximum chunk length before overlap, in characters.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap length, in characters.
    #[must_use]
    pub const fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into chunks. Empty or whitespace-only input yields none.
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let base = self.pack_paragraphs(text);
        if self.chunk_overlap == 0 || base.len() < 2 {
            return base;
        }

        let mut chunks = Vec::with_capacity(base.len());
        chunks.push(base[0].clone());
        for pair in base.windows(2) {
            let tail = char_tail(&pair[0], self.chunk_overlap);
            chunks.push(format!("{tail}{PARAGRAPH_JOINER}{}", pair[1]));
        }
        chunks
    }

    fn pack_paragraphs(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        let paragraphs = self
            .paragraph_break
            .split(text)
            .map(|paragraph| paragraph.trim_end().trim_start_matches(['\r', '\n']))
            .filter(|paragraph| !paragraph.trim().is_empty());

        for paragraph in paragraphs {
            let paragraph_len = paragraph.chars().count();

            if current.is_empty() {
                current.push_str(paragraph);
                current_len = paragraph_len;
                continue;
            }

            if current_len + PARAGRAPH_JOINER.len() + paragraph_len > self.chunk_size {
                chunks.push(std::mem::take(&mut current));
                current.push_str(paragraph);
                current_len = paragraph_len;
            } else {
                current.push_str(PARAGRAPH_JOINER);
                current.push_str(paragraph);
                current_len += PARAGRAPH_JOINER.len() + paragraph_len;
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

/// Last `count` characters of `text`, never splitting a code point.
fn char_tail(text: &str, count: usize) -> &str {
    let skip = text.chars().count().saturating_sub(count);
    text.char_indices()
        .nth(skip)
        .map_or("", |(offset, _)| &text[offset..])
}

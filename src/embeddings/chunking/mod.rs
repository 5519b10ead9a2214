#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::database::{Chunk, Document};
use crate::{RagError, Result};

/// Window sizes for splitting text, measured in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    pub max_size: usize,
    /// Characters shared by consecutive chunks
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(RagError::InvalidChunkConfig(
                "max_size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.max_size {
            return Err(RagError::InvalidChunkConfig(format!(
                "overlap ({}) must be smaller than max_size ({})",
                self.overlap, self.max_size
            )));
        }
        Ok(())
    }
}

/// A window of the source text and its character offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextWindow {
    pub start: usize,
    pub text: String,
}

/// Summary of a chunked document, in characters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChunkStats {
    pub count: usize,
    pub min_len: usize,
    pub max_len: usize,
    pub avg_len: usize,
    pub total_chars: usize,
}

impl ChunkStats {
    #[inline]
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        let lengths: Vec<usize> = chunks.iter().map(|c| c.text.chars().count()).collect();
        let total_chars: usize = lengths.iter().sum();

        Self {
            count: lengths.len(),
            min_len: lengths.iter().copied().min().unwrap_or(0),
            max_len: lengths.iter().copied().max().unwrap_or(0),
            avg_len: total_chars / lengths.len().max(1),
            total_chars,
        }
    }
}

/// Split `text` into overlapping windows of at most `max_size` characters
///
/// Consecutive windows share exactly `overlap` characters. A window prefers to end
/// just after a paragraph break, then a line break, then a sentence end, then any
/// whitespace, as long as that point lies in the last tenth of the window.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextWindow>> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut windows = Vec::new();
    let mut start = 0;

    while start < total {
        if total - start <= config.max_size {
            windows.push(window(&chars, start, total));
            break;
        }

        let hard_end = start + config.max_size;
        let lookback = (config.max_size / 10).max(1);
        // The end must leave the next window starting past this one
        let lower = (start + config.overlap + 1).max(hard_end - lookback);
        let end = find_break(&chars, lower, hard_end).unwrap_or(hard_end);

        windows.push(window(&chars, start, end));
        start = end - config.overlap;
    }

    Ok(windows)
}

/// Chunk a document into retrievable units carrying its metadata
#[inline]
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let windows = split_text(&document.text, config)?;

    let chunks = windows
        .into_iter()
        .enumerate()
        .map(|(index, window)| {
            let index = u32::try_from(index).map_err(|_| {
                RagError::InvalidChunkConfig("document produces too many chunks".to_string())
            })?;
            Ok(Chunk::from_document(document, index, window.start, window.text))
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "Chunked document {} into {} chunks",
        document.id,
        chunks.len()
    );
    Ok(chunks)
}

fn window(chars: &[char], start: usize, end: usize) -> TextWindow {
    TextWindow {
        start,
        text: chars[start..end].iter().collect(),
    }
}

/// Latest preferred end position in `lower..=upper`, by break strength
fn find_break(chars: &[char], lower: usize, upper: usize) -> Option<usize> {
    if lower > upper || lower < 2 {
        return None;
    }

    let candidates = || (lower..=upper).rev();

    let paragraph = |end: usize| chars[end - 2] == '\n' && chars[end - 1] == '\n';
    let line = |end: usize| chars[end - 1] == '\n';
    let sentence =
        |end: usize| matches!(chars[end - 2], '.' | '!' | '?') && chars[end - 1].is_whitespace();
    let space = |end: usize| chars[end - 1].is_whitespace();

    candidates()
        .find(|&end| paragraph(end))
        .or_else(|| candidates().find(|&end| line(end)))
        .or_else(|| candidates().find(|&end| sentence(end)))
        .or_else(|| candidates().find(|&end| space(end)))
}

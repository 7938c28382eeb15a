//! Fixed-size text chunking with global offsets

use crate::error::{RedactError, Result};
use tracing::debug;

/// A bounded slice of the source text and where it starts in that text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    /// Character offset of `content` in the full text
    pub global_offset: usize,
    /// Length of `content` in characters
    pub char_len: usize,
}

impl Chunk {
    /// Character offset one past the end of this chunk in the full text
    pub fn global_end(&self) -> usize {
        self.global_offset + self.char_len
    }
}

/// Split `text` into consecutive runs of at most `max_chunk_size` characters
///
/// Boundaries ignore words and sentences, so identical input always yields
/// identical chunks. Concatenating the chunks in order gives back `text`.
pub fn chunk_text(text: &str, max_chunk_size: i64) -> Result<Vec<Chunk>> {
    if max_chunk_size <= 0 {
        return Err(RedactError::configuration(format!(
            "chunk size must be a positive integer, got {max_chunk_size}"
        )));
    }
    let max_chars = usize::try_from(max_chunk_size).unwrap_or(usize::MAX);

    let mut chunks = Vec::new();
    let mut global_offset = 0;
    let mut chunk_start_byte = 0;
    let mut chars_in_chunk = 0;

    for (byte_pos, _) in text.char_indices() {
        if chars_in_chunk == max_chars {
            chunks.push(Chunk {
                content: text[chunk_start_byte..byte_pos].to_string(),
                global_offset,
                char_len: chars_in_chunk,
            });
            global_offset += chars_in_chunk;
            chunk_start_byte = byte_pos;
            chars_in_chunk = 0;
        }
        chars_in_chunk += 1;
    }

    if chars_in_chunk > 0 {
        chunks.push(Chunk {
            content: text[chunk_start_byte..].to_string(),
            global_offset,
            char_len: chars_in_chunk,
        });
    }

    debug!("Split {} bytes into {} chunks of <= {} chars", text.len(), chunks.len(), max_chars);
    Ok(chunks)
}

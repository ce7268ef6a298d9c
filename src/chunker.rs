//! Document chunking with proper Unicode support
//!
//! Splits raw document text into overlapping, size-bounded chunks at natural
//! break points. All size calculations are based on **character count**, not
//! byte count, so CJK and emoji content never gets split mid-codepoint.

use crate::types::DocumentChunk;

/// Chunks shorter than this after trimming carry too little meaning to embed
const MIN_CHUNK_CHARS: usize = 50;

/// Window of the break-point search around the nominal chunk boundary
const NEWLINE_TOLERANCE: usize = 50;
const SPACE_TOLERANCE: usize = 20;

pub struct Chunker {
    /// Nominal chunk width in characters
    chunk_size: usize,
    /// Characters shared between consecutive chunks
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Split `text` into overlapping chunks of approximately `chunk_size`
    /// characters. Texts shorter than 50 characters yield nothing.
    pub fn chunk_text(&self, text: &str) -> Vec<DocumentChunk> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();

        if total < MIN_CHUNK_CHARS {
            return chunks;
        }

        let mut start = 0;
        let mut index = 0;

        while start < total {
            let mut end = start + self.chunk_size;

            if end < total {
                // Prefer a newline near the boundary, then a space, to avoid
                // splitting mid-line or mid-word
                match find_from(&chars, '\n', end.saturating_sub(NEWLINE_TOLERANCE))
                    .filter(|&pos| pos < end + NEWLINE_TOLERANCE)
                {
                    Some(pos) => end = pos + 1,
                    None => {
                        if let Some(pos) = find_from(&chars, ' ', end.saturating_sub(SPACE_TOLERANCE))
                            .filter(|&pos| pos < end + SPACE_TOLERANCE)
                        {
                            end = pos + 1;
                        }
                    }
                }
            } else {
                end = total;
            }

            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();

            if trimmed.chars().count() >= MIN_CHUNK_CHARS {
                chunks.push(DocumentChunk {
                    text: trimmed.to_string(),
                    index,
                    start_offset: start,
                    end_offset: end,
                });
                index += 1;
            }

            if end == total {
                break;
            }

            let next = end.saturating_sub(self.overlap);
            if next >= total || next <= start {
                // The window reached the end of the text, or cannot advance
                // (overlap >= effective window width)
                break;
            }
            start = next;
        }

        chunks
    }
}

/// First occurrence of `needle` at or after character index `from`
fn find_from(chars: &[char], needle: char, from: usize) -> Option<usize> {
    if from >= chars.len() {
        return None;
    }
    chars[from..]
        .iter()
        .position(|&c| c == needle)
        .map(|pos| from + pos)
}

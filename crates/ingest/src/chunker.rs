use crate::chunk::Chunk;

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Window size in characters. Documents are largely CJK text, so byte
    /// windows would split multi-byte sequences.
    pub chunk_size: usize,
    /// Characters shared between consecutive windows. Must stay below
    /// `chunk_size`; the frame always advances by at least one character.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 3000,
            overlap: 200,
        }
    }
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Slide a fixed-size frame across the document, advancing by
    /// `chunk_size - overlap` each step. Windows that contain only
    /// whitespace are dropped; everything else is emitted trimmed, in
    /// source order.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let size = self.config.chunk_size.max(1);
        let advance = size.saturating_sub(self.config.overlap).max(1);

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + size).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();

            if !trimmed.is_empty() {
                chunks.push(Chunk::new(chunks.len(), trimmed.to_string(), (start, end)));
            }

            if end == chars.len() {
                break;
            }
            start += advance;
        }

        chunks
    }
}

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One extraction window of the source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    /// Position in production order. Downstream id allocation and
    /// first-seen-wins deduplication are defined by this order.
    pub index: usize,
    pub text: String,
    /// [start, end) character positions in the source document.
    pub span: (usize, usize),
}

impl Chunk {
    pub fn new(index: usize, text: String, span: (usize, usize)) -> Self {
        let chunk_id = Self::generate_chunk_id(index, &text, span);

        Self {
            chunk_id,
            index,
            text,
            span,
        }
    }

    fn generate_chunk_id(index: usize, text: &str, span: (usize, usize)) -> String {
        let mut hasher = Sha256::new();
        hasher.update(index.to_string().as_bytes());
        hasher.update(text.as_bytes());
        hasher.update(span.0.to_string().as_bytes());
        hasher.update(span.1.to_string().as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16])
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

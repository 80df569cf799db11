//! Thin wrapper around the cl100k-compatible BPE tokenizer.

use tiktoken_rs::CoreBPE;

use crate::error::{ChunkingError, Result};

/// Counts and slices text in BPE tokens, the same unit the original
/// chunker measured `chunk_size`/`chunk_overlap` in.
pub struct Tokenizer {
    bpe: CoreBPE,
}

impl Tokenizer {
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| ChunkingError::TokenizerInit(e.to_string()))?;
        Ok(Self { bpe })
    }

    /// Number of tokens `text` encodes to.
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Encode text to token ids.
    pub fn encode(&self, text: &str) -> Vec<usize> {
        self.bpe.encode_ordinary(text)
    }

    /// Decode token ids back to text.
    pub fn decode(&self, tokens: &[usize]) -> String {
        self.bpe
            .decode(tokens.to_vec())
            .unwrap_or_else(|_| String::new())
    }

    /// The last `overlap` tokens of `text`, decoded back to a string, used
    /// to seed the next chunk with a continuation tail.
    pub fn overlap_tail(&self, text: &str, overlap: usize) -> String {
        if text.is_empty() {
            return String::new();
        }
        let tokens = self.encode(text);
        let start = tokens.len().saturating_sub(overlap);
        self.decode(&tokens[start..])
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new().expect("cl100k_base tokenizer is bundled and always loads")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_matches_encode_len() {
        let tok = Tokenizer::new().unwrap();
        let text = "the quick brown fox jumps over the lazy dog";
        assert_eq!(tok.count(text), tok.encode(text).len());
    }

    #[test]
    fn decode_round_trips_encode() {
        let tok = Tokenizer::new().unwrap();
        let text = "hello, world! this is a test.";
        let tokens = tok.encode(text);
        assert_eq!(tok.decode(&tokens), text);
    }

    #[test]
    fn overlap_tail_is_bounded_by_overlap() {
        let tok = Tokenizer::new().unwrap();
        let text = "one two three four five six seven eight nine ten";
        let tail = tok.overlap_tail(text, 3);
        assert!(tok.count(&tail) <= 3);
    }

    #[test]
    fn overlap_tail_of_short_text_is_whole_text() {
        let tok = Tokenizer::new().unwrap();
        let text = "short";
        assert_eq!(tok.overlap_tail(text, 50), text);
    }
}

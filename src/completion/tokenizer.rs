//! Token counting used for usage accounting.

/// Maps text to a token count.
///
/// Implemented for any `Fn(&str) -> usize`, so a real BPE encoder can be
/// plugged in with a closure.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

impl<F> Tokenizer for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn count(&self, text: &str) -> usize {
        self(text)
    }
}

/// Rough estimate: one token per 4 bytes, rounded up.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharEstimateTokenizer;

impl Tokenizer for CharEstimateTokenizer {
    fn count(&self, text: &str) -> usize {
        text.len().div_ceil(4)
    }
}

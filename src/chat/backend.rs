//! Seams to the model runtime. Loading weights, device placement and the
//! tokenizer vocabulary all live behind these two traits.

use super::ChatError;

pub trait PromptTokenizer {
    /// Encode `text`, truncating to at most `max_len` tokens.
    fn encode(&self, text: &str, max_len: usize) -> Result<Vec<i64>, ChatError>;

    fn decode(&self, ids: &[i64], skip_special_tokens: bool) -> String;

    fn eos_token_id(&self) -> i64;
}

pub trait CausalLm {
    /// Logits over the vocabulary for the token following `input_ids`.
    fn next_token_logits(&self, input_ids: &[i64]) -> Result<Vec<f32>, ChatError>;

    /// Longest sequence the model can attend over, if it has a fixed one.
    fn context_window(&self) -> Option<usize> {
        None
    }
}

impl<T: PromptTokenizer + ?Sized> PromptTokenizer for &T {
    fn encode(&self, text: &str, max_len: usize) -> Result<Vec<i64>, ChatError> {
        (**self).encode(text, max_len)
    }

    fn decode(&self, ids: &[i64], skip_special_tokens: bool) -> String {
        (**self).decode(ids, skip_special_tokens)
    }

    fn eos_token_id(&self) -> i64 {
        (**self).eos_token_id()
    }
}

impl<M: CausalLm + ?Sized> CausalLm for &M {
    fn next_token_logits(&self, input_ids: &[i64]) -> Result<Vec<f32>, ChatError> {
        (**self).next_token_logits(input_ids)
    }

    fn context_window(&self) -> Option<usize> {
        (**self).context_window()
    }
}

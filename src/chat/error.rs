use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no conversation given")]
    EmptyBatch,

    #[error("tokenization failed: {0}")]
    Tokenization(String),

    #[error("backend failed: {0}")]
    Backend(String),

    #[error("backend returned empty logits")]
    EmptyLogits,

    #[error("cannot sample from logits: {0}")]
    Sampling(String),

    #[error("generation exceeded the {0:?} request timeout")]
    Timeout(Duration),
}

#[cfg(feature = "torch")]
impl From<rust_bert::RustBertError> for ChatError {
    fn from(e: rust_bert::RustBertError) -> Self {
        ChatError::Backend(e.to_string())
    }
}

#[cfg(feature = "torch")]
impl From<tch::TchError> for ChatError {
    fn from(e: tch::TchError) -> Self {
        ChatError::Backend(e.to_string())
    }
}

//! Chat-message front end for a causal language model.
//!
//! [`ChatCompletionAdapter`] flattens a conversation into a Llama-2 chat
//! prompt, runs one decoding pass through the backend and returns a
//! [`GenerationResult`] with the completion text and token usage.

pub mod backend;
mod error;
pub mod generation;
#[cfg(feature = "torch")]
pub mod gpt2;
pub mod turn;

use std::time::Duration;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub use backend::{CausalLm, PromptTokenizer};
pub use error::ChatError;
pub use generation::{FinishReason, GenerateParams, StopSequences, StoppingCriteria};
pub use turn::{build_prompt, ConversationTurn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub temperature: f32,
    /// Upper bound on newly generated tokens.
    pub max_tokens: usize,
    /// Prompts are truncated to this many tokens, or to the model's context
    /// window when that is smaller.
    pub max_prompt_tokens: usize,
    /// Wall-clock budget for one `generate` call.
    pub request_timeout: Option<Duration>,
    /// Fixed sampler seed; entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 256,
            max_prompt_tokens: 2048,
            request_timeout: None,
            seed: None,
        }
    }
}

/// Completion text plus token usage for one `generate` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    pub text: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub finish_reason: FinishReason,
}

impl GenerationResult {
    pub fn total_tokens(&self) -> usize {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Owns a tokenizer and model handle and a fixed [`ChatConfig`].
///
/// `generate` takes `&self` and keeps no state between calls. Overlapping
/// calls from several threads are only as safe as the backend handles
/// themselves; nothing here adds synchronisation.
pub struct ChatCompletionAdapter<T, M> {
    tokenizer: T,
    model: M,
    config: ChatConfig,
}

impl<T: PromptTokenizer, M: CausalLm> ChatCompletionAdapter<T, M> {
    pub fn new(tokenizer: T, model: M, config: ChatConfig) -> Self {
        Self {
            tokenizer,
            model,
            config,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Complete the first conversation in `conversations`.
    ///
    /// Any further conversations are ignored. When `stop` is given,
    /// decoding halts as soon as the decoded sequence contains one of the
    /// strings; the matched text is left in the returned completion.
    pub fn generate(
        &self,
        conversations: &[Vec<ConversationTurn>],
        stop: Option<&[String]>,
    ) -> Result<GenerationResult, ChatError> {
        let turns = conversations.first().ok_or(ChatError::EmptyBatch)?;
        let prompt = build_prompt(turns);

        let mut prompt_limit = self.config.max_prompt_tokens;
        if let Some(window) = self.model.context_window() {
            if window < prompt_limit {
                debug!("model context window is {window}, truncating the prompt to fit");
                prompt_limit = window;
            }
        }
        let input_ids = self.tokenizer.encode(&prompt, prompt_limit)?;
        let prompt_tokens = input_ids.len();

        let params = GenerateParams {
            max_new_tokens: self.config.max_tokens,
            do_sample: self.config.temperature > 0.0,
            temperature: self.config.temperature,
            eos_token_id: self.tokenizer.eos_token_id(),
            timeout: self.config.request_timeout,
        };
        let stop_sequences = StopSequences::new(stop.unwrap_or_default(), &self.tokenizer);
        let stopping: &dyn StoppingCriteria = &stop_sequences;

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let output = generation::generate_tokens(
            &self.model,
            &input_ids,
            &params,
            Some(stopping),
            &mut rng,
        )?;

        let new_tokens = output.new_tokens();
        let text = self.tokenizer.decode(new_tokens, true);
        info!(
            "generated {} token(s) from a {prompt_tokens}-token prompt ({:?})",
            new_tokens.len(),
            output.finish_reason
        );

        Ok(GenerationResult {
            text,
            prompt_tokens,
            completion_tokens: new_tokens.len(),
            finish_reason: output.finish_reason,
        })
    }
}

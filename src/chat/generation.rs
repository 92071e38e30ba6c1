//! Token-by-token decoding loop with greedy / temperature sampling and
//! stop conditions.

use std::time::{Duration, Instant};

use log::debug;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::Serialize;

use super::backend::{CausalLm, PromptTokenizer};
use super::ChatError;

/// Why decoding ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// `max_new_tokens` tokens were produced.
    Length,
    /// The model emitted its end-of-sequence token.
    Eos,
    /// A stopping criterion matched.
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateParams {
    pub max_new_tokens: usize,
    pub do_sample: bool,
    pub temperature: f32,
    pub eos_token_id: i64,
    pub timeout: Option<Duration>,
}

/// Checked after every generated token against the full sequence so far.
pub trait StoppingCriteria {
    fn should_stop(&self, input_ids: &[i64]) -> bool;
}

/// Halts once the decoded sequence contains any of the stop strings.
///
/// The whole sequence is decoded, prompt included, with special tokens
/// kept.
pub struct StopSequences<'a, T: ?Sized> {
    sequences: &'a [String],
    tokenizer: &'a T,
}

impl<'a, T: PromptTokenizer + ?Sized> StopSequences<'a, T> {
    pub fn new(sequences: &'a [String], tokenizer: &'a T) -> Self {
        Self {
            sequences,
            tokenizer,
        }
    }
}

impl<T: PromptTokenizer + ?Sized> StoppingCriteria for StopSequences<'_, T> {
    fn should_stop(&self, input_ids: &[i64]) -> bool {
        if self.sequences.is_empty() {
            return false;
        }
        let decoded = self.tokenizer.decode(input_ids, false);
        self.sequences.iter().any(|s| decoded.contains(s.as_str()))
    }
}

/// Output of [`generate_tokens`]: prompt followed by new tokens.
///
/// A model with a [`CausalLm::context_window`] is never fed more ids than
/// that; running out of room ends decoding with [`FinishReason::Length`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSequence {
    pub ids: Vec<i64>,
    pub prompt_len: usize,
    pub finish_reason: FinishReason,
}

impl GeneratedSequence {
    pub fn new_tokens(&self) -> &[i64] {
        &self.ids[self.prompt_len..]
    }
}

pub fn generate_tokens<M, R>(
    model: &M,
    prompt_ids: &[i64],
    params: &GenerateParams,
    stopping: Option<&dyn StoppingCriteria>,
    rng: &mut R,
) -> Result<GeneratedSequence, ChatError>
where
    M: CausalLm + ?Sized,
    R: Rng + ?Sized,
{
    let started = Instant::now();
    let window = model.context_window();
    let mut ids = prompt_ids.to_vec();
    let mut finish_reason = FinishReason::Length;

    for step in 0..params.max_new_tokens {
        if let Some(limit) = params.timeout {
            if started.elapsed() >= limit {
                return Err(ChatError::Timeout(limit));
            }
        }
        if window.is_some_and(|w| ids.len() > w) {
            debug!("context window full after {step} new token(s)");
            break;
        }

        let logits = model.next_token_logits(&ids)?;
        let token = if params.do_sample {
            sample_with_temperature(&logits, params.temperature, rng)?
        } else {
            argmax(&logits)?
        };
        ids.push(token);

        if token == params.eos_token_id {
            debug!("eos after {} new token(s)", step + 1);
            finish_reason = FinishReason::Eos;
            break;
        }
        if stopping.is_some_and(|s| s.should_stop(&ids)) {
            debug!("stop criterion matched after {} new token(s)", step + 1);
            finish_reason = FinishReason::Stop;
            break;
        }
    }

    Ok(GeneratedSequence {
        ids,
        prompt_len: prompt_ids.len(),
        finish_reason,
    })
}

pub fn argmax(logits: &[f32]) -> Result<i64, ChatError> {
    logits
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i as i64)
        .ok_or(ChatError::EmptyLogits)
}

/// Softmax over `logits / temperature`, then draw one token id.
pub fn sample_with_temperature<R: Rng + ?Sized>(
    logits: &[f32],
    temperature: f32,
    rng: &mut R,
) -> Result<i64, ChatError> {
    let scaled: Vec<f32> = logits.iter().map(|&l| l / temperature).collect();
    let max_logit = scaled.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if !max_logit.is_finite() {
        // nothing sensible to sample from (empty, all -inf or all NaN)
        return argmax(logits);
    }
    let weights: Vec<f32> = scaled.iter().map(|&l| (l - max_logit).exp()).collect();

    let dist = WeightedIndex::new(&weights).map_err(|e| ChatError::Sampling(e.to_string()))?;
    Ok(dist.sample(rng) as i64)
}

//! rust-bert GPT-2 family checkpoint as a chat backend.
//!
//! The checkpoint is either a local directory holding `config.json`,
//! `vocab.json`, `merges.txt` and converted `rust_model.ot` weights, or a
//! Hugging Face hub id whose repo carries the same files.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use log::{debug, info};
use rust_bert::gpt2::{GPT2LMHeadModel, Gpt2Config};
use rust_bert::pipelines::generation_utils::{Cache, LMModelOutput};
use rust_bert::resources::{RemoteResource, ResourceProvider};
use rust_bert::Config;
use rust_tokenizers::tokenizer::{Gpt2Tokenizer, Tokenizer, TruncationStrategy};
use rust_tokenizers::vocab::Vocab;
use tch::{nn, no_grad, Device, Kind, Tensor};

use super::backend::{CausalLm, PromptTokenizer};
use super::ChatError;

const EOS_TOKEN: &str = "<|endoftext|>";

// Key/value states of an already-processed prefix.
struct Past {
    ids: Vec<i64>,
    layers: Vec<Tensor>,
}

pub struct Gpt2Backend {
    model: GPT2LMHeadModel,
    tokenizer: Gpt2Tokenizer,
    eos_token_id: i64,
    n_positions: usize,
    device: Device,
    past: RefCell<Option<Past>>,
    // keeps the weights alive for `model`
    _vs: nn::VarStore,
}

/// Local path to `file` of `model`, downloading it first when `model` is a
/// hub id rather than an existing directory.
fn resolve(model: &str, file: &str) -> Result<PathBuf, ChatError> {
    let dir = Path::new(model);
    if dir.exists() {
        let path = dir.join(file);
        return if path.exists() {
            Ok(path)
        } else {
            Err(ChatError::Backend(format!("{} not found", path.display())))
        };
    }
    let url = format!("https://huggingface.co/{model}/resolve/main/{file}");
    let stem = file.split('.').next().unwrap_or(file);
    let cache_dir = format!("{model}/{stem}");
    let remote = RemoteResource::from_pretrained((cache_dir.as_str(), url.as_str()));
    Ok(remote.get_local_path()?)
}

impl Gpt2Backend {
    /// Load from a local directory or a hub id such as `gpt2-medium`.
    pub fn load(model: &str, cuda: bool) -> Result<Self, ChatError> {
        let device = if cuda && tch::Cuda::is_available() {
            Device::Cuda(0)
        } else {
            Device::Cpu
        };

        let config = Gpt2Config::from_file(resolve(model, "config.json")?);
        let tokenizer = Gpt2Tokenizer::from_file(
            resolve(model, "vocab.json")?,
            resolve(model, "merges.txt")?,
            false,
        )
        .map_err(|e| ChatError::Tokenization(e.to_string()))?;
        let eos_token_id = tokenizer.vocab().token_to_id(EOS_TOKEN);

        let mut vs = nn::VarStore::new(device);
        let gpt2 = GPT2LMHeadModel::new(vs.root(), &config);
        vs.load(resolve(model, "rust_model.ot")?)?;
        info!(
            "loaded {model} on {:?}, context window {}",
            device, config.n_positions
        );

        Ok(Self {
            model: gpt2,
            tokenizer,
            eos_token_id,
            n_positions: config.n_positions.max(0) as usize,
            device,
            past: RefCell::new(None),
            _vs: vs,
        })
    }
}

impl PromptTokenizer for Gpt2Backend {
    fn encode(&self, text: &str, max_len: usize) -> Result<Vec<i64>, ChatError> {
        let enc = self
            .tokenizer
            .encode(text, None, max_len, &TruncationStrategy::LongestFirst, 0);
        Ok(enc.token_ids)
    }

    fn decode(&self, ids: &[i64], skip_special_tokens: bool) -> String {
        self.tokenizer.decode(ids, skip_special_tokens, true)
    }

    fn eos_token_id(&self) -> i64 {
        self.eos_token_id
    }
}

impl CausalLm for Gpt2Backend {
    fn next_token_logits(&self, input_ids: &[i64]) -> Result<Vec<f32>, ChatError> {
        // position embeddings only go up to n_positions
        if input_ids.len() > self.n_positions {
            return Err(ChatError::Backend(format!(
                "{} tokens exceed the {}-token context window",
                input_ids.len(),
                self.n_positions
            )));
        }

        // Only the ids after a cached prefix go through the model.
        let reusable = self
            .past
            .borrow_mut()
            .take()
            .filter(|p| p.ids.len() < input_ids.len() && input_ids.starts_with(&p.ids));
        let (fresh, layer_past) = match reusable {
            Some(p) => (&input_ids[p.ids.len()..], Some(p.layers)),
            None => (input_ids, None),
        };
        debug!("feeding {} of {} id(s)", fresh.len(), input_ids.len());

        let input = Tensor::from_slice(fresh).to(self.device).unsqueeze(0);
        let output = no_grad(|| {
            self.model.forward_t(
                Some(&input), // input_ids
                layer_past,   // layer_past
                None,         // attention_mask
                None,         // token_type_ids
                None,         // position_ids
                None,         // input_embeds
                None,         // encoder_outputs
                None,         // encoder_attention_mask
                false,        // train
            )
        })?;
        let LMModelOutput { lm_logits, cache } = output;
        if let Cache::GPT2Cache(Some(layers)) = cache {
            *self.past.borrow_mut() = Some(Past {
                ids: input_ids.to_vec(),
                layers,
            });
        }

        // logits of the last position only
        let last = lm_logits
            .select(0, 0)
            .select(0, -1)
            .to_kind(Kind::Float)
            .to(Device::Cpu);
        Ok(Vec::<f32>::try_from(&last)?)
    }

    fn context_window(&self) -> Option<usize> {
        Some(self.n_positions)
    }
}

/*
cargo run --release --features torch --bin chat_complete -- \
    --model gpt2-medium \
    --conversation prompts/tictactoe_turn.json \
    --temperature 0 \
    --stop "</s>" --stop "Observation:"

conversation file: [[{"role": "system", "content": "..."}, {"role": "human", "content": "..."}]]

The prompt uses the Llama-2 chat template ([INST] / <<SYS>>); GPT-2 family
checkpoints were not trained on it, so expect plain continuation rather
than instruction following.
*/

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use gb_tools::chat::gpt2::Gpt2Backend;
use gb_tools::chat::{ChatCompletionAdapter, ChatConfig, ConversationTurn};
use gb_tools::logging;

#[derive(Parser, Debug)]
#[command(version, about = "Complete a chat conversation with a GPT-2 family causal language model")]
struct Cli {
    // HF repo ID or local directory with config.json, vocab.json, merges.txt
    // and rust_model.ot
    #[arg(long, env = "CHAT_MODEL")]
    model: String,

    // JSON array of conversations; only the first one is completed
    #[arg(long)]
    conversation: PathBuf,

    // 0 means greedy decoding
    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    #[arg(long, default_value_t = 256)]
    max_tokens: usize,

    #[arg(long, default_value_t = 2048)]
    max_prompt_tokens: usize,

    // Repeatable; generation halts once any of these shows up
    #[arg(long)]
    stop: Vec<String>,

    #[arg(long = "timeout-secs")]
    timeout_secs: Option<u64>,

    #[arg(long)]
    seed: Option<u64>,

    // Run on GPU if built with CUDA
    #[arg(long, default_value_t = false)]
    cuda: bool,

    // Write the result here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_dir.as_deref(), "chat_complete", cli.verbose)?;

    let raw = fs::read_to_string(&cli.conversation)
        .with_context(|| format!("reading {}", cli.conversation.display()))?;
    let conversations: Vec<Vec<ConversationTurn>> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", cli.conversation.display()))?;

    let backend = Gpt2Backend::load(&cli.model, cli.cuda)
        .with_context(|| format!("loading model {}", cli.model))?;

    let config = ChatConfig {
        temperature: cli.temperature,
        max_tokens: cli.max_tokens,
        max_prompt_tokens: cli.max_prompt_tokens,
        request_timeout: cli.timeout_secs.map(Duration::from_secs),
        seed: cli.seed,
    };
    let adapter = ChatCompletionAdapter::new(&backend, &backend, config);

    let stop = (!cli.stop.is_empty()).then_some(cli.stop.as_slice());
    let result = adapter.generate(&conversations, stop)?;

    let pretty = serde_json::to_string_pretty(&result)?;
    match &cli.out {
        Some(path) => {
            fs::write(path, pretty).with_context(|| format!("writing {}", path.display()))?;
            info!("result written to {}", path.display());
        }
        None => println!("{pretty}"),
    }
    Ok(())
}

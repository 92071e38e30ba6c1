/*
cargo run --bin jsonl_to_json -- \
    results/tictactoe/llama-2-7b_vs_cot.jsonl \
    results/tictactoe/llama-2-7b_vs_cot.json

cargo run --bin jsonl_to_json -- \
    results/kuhn_poker/matches.jsonl \
    results/kuhn_poker/matches.json \
    --log-dir logs
*/

use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::error;

use gb_tools::{logging, records};

/// Merge line-delimited JSON match records into one JSON document.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    // One JSON record per line
    #[arg(default_value = "input.jsonl")]
    input: PathBuf,

    // Created or overwritten
    #[arg(default_value = "output.json")]
    output: PathBuf,

    /// Write a log file into this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = logging::init(args.log_dir.as_deref(), "jsonl_to_json", args.verbose) {
        eprintln!("Cannot initialise logging: {e:#}");
        process::exit(1);
    }

    match records::aggregate(&args.input, &args.output) {
        Ok(_) => println!(
            "Successfully converted {} to {}",
            args.input.display(),
            args.output.display()
        ),
        Err(e) => {
            error!("{e}");
            eprintln!("Error converting file: {e}");
            process::exit(1);
        }
    }
}

//! # chatmem
//!
//! Batch enrichment of a chat archive: every assistant reply gets an LLM
//! summary and every conversation gets a list of extracted user memories.
//!
//! # CLI Usage
//!
//! ```bash
//! # Local model, 10 random conversations, written to data/debug/
//! chatmem --llm llama3.1:8b --sample 10
//!
//! # Reproducible production sample with OpenAI
//! OPENAI_API_KEY=sk-... chatmem --llm gpt-4o-mini --sample 50 --prod
//!
//! # Summaries only, for conversations about travel with at least 4 messages
//! chatmem --llm gpt-4o-mini --no-memories --keyword travel --min-messages 4
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use chatmem_config::ChatmemConfig;
use chatmem_core::output_path_for_today;
use chatmem_server::llm::setup_llm_client;
use chatmem_server::process::{run_processing, ProcessOptions};
use chatmem_server::telemetry;

/// Process chat conversations with LLM-based summarization and memory extraction.
#[derive(Parser, Debug)]
#[command(name = "chatmem")]
#[command(version)]
struct Cli {
    /// Model name to use (e.g. "llama3.1:8b", "gpt-4o-mini").
    #[arg(long)]
    llm: String,

    /// Input conversations.json file path (default: storage.default_input).
    #[arg(long)]
    input: Option<PathBuf>,

    /// Number of conversations to sample (default: process all).
    #[arg(long)]
    sample: Option<usize>,

    /// Save to <data_dir>/prod/ with a fixed sampling seed instead of <data_dir>/debug/.
    #[arg(long)]
    prod: bool,

    /// Enable verbose output (debug logging with turn previews).
    #[arg(long)]
    verbose: bool,

    /// Skip memory extraction (only generate summaries).
    #[arg(long)]
    no_memories: bool,

    /// Only process conversations whose title contains this text (case-insensitive).
    #[arg(long)]
    keyword: Option<String>,

    /// Only process conversations with at least this many visible messages.
    #[arg(long, default_value_t = 0)]
    min_messages: usize,

    /// Path to chatmem.toml config file.
    /// Can also be set via CHATMEM_CONFIG env var.
    #[arg(short, long, env = "CHATMEM_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ChatmemConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = telemetry::init_logging(telemetry::LoggingInit::from_config(
        &config.logging,
        cli.verbose,
    )) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: ChatmemConfig) -> anyhow::Result<ExitCode> {
    info!("Setting up client for model: {}...", cli.llm);
    let llm = setup_llm_client(&cli.llm, &config.llm)?;

    let data_dir = PathBuf::from(&config.storage.data_dir);
    let sample = cli.sample.filter(|n| *n > 0);
    let output = output_path_for_today(&llm.model, sample, cli.prod, &data_dir)?;
    info!("Output will be saved to: {}", output.display());

    let options = ProcessOptions {
        input: cli
            .input
            .unwrap_or_else(|| PathBuf::from(&config.storage.default_input)),
        output,
        model: llm.model.clone(),
        llm_mode: llm.mode.as_str().to_string(),
        sample,
        prod: cli.prod,
        prod_seed: config.sampling.prod_seed,
        extract_memories: !cli.no_memories,
        keyword: cli.keyword,
        min_messages: cli.min_messages,
    };

    Ok(run_processing(&options, &llm.client).await.exit_code())
}

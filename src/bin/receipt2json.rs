//! CLI binary for receipt2json.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ProcessingConfig` and prints the wire-format JSON response.

use anyhow::{Context, Result};
use clap::Parser;
use receipt2json::{
    process_batch, process_receipt, resolve_input, ProcessingConfig, StubExtractor,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic extraction (JSON to stdout)
  receipt2json receipt.jpg

  # HEIC straight off an iPhone
  receipt2json IMG_4821.HEIC

  # From a URL
  receipt2json https://example.com/uploads/receipt.png

  # Use a specific model
  receipt2json --provider anthropic --model claude-sonnet-4-20250514 receipt.jpg

  # Several receipts at once (responses in input order)
  receipt2json lunch.jpg taxi.jpg hotel.heic

  # Custom category list
  receipt2json --categories fuel,tolls,parking receipt.jpg

  # Offline demo mode — no API key, canned extraction
  receipt2json --mock receipt.jpg

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID

SETUP:
  1. Set API key:   export OPENAI_API_KEY=sk-...
  2. Extract:       receipt2json receipt.jpg

  The normalized image is written under --receipts-dir (default
  dist/receipts) and the response's imageUrl points at it under
  --public-prefix (default /receipts).
"#;

/// Extract structured expense data from receipt photos using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "receipt2json",
    version,
    about = "Extract structured expense data from receipt photos using Vision LLMs",
    long_about = "Turn photos of receipts (JPEG, PNG, HEIC — local files or URLs) into \
structured JSON expense records using Vision Language Models. Supports OpenAI, Anthropic, \
Google Gemini, and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// One or more receipt image paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// VLM model ID (e.g. gpt-4o, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// VLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "VLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Directory where normalized receipt images are written.
    #[arg(long, env = "RECEIPT2JSON_DIR", default_value = "dist/receipts")]
    receipts_dir: PathBuf,

    /// URL prefix under which the receipts directory is served.
    #[arg(long, env = "RECEIPT2JSON_PREFIX", default_value = "/receipts")]
    public_prefix: String,

    /// Maximum width or height of the normalized image (256+).
    #[arg(long, env = "RECEIPT2JSON_MAX_DIMENSION", default_value_t = 2560)]
    max_dimension: u32,

    /// JPEG quality for the stored image (1-100).
    #[arg(long, env = "RECEIPT2JSON_QUALITY", default_value_t = 70,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Comma-separated expense categories the extractor may choose from.
    #[arg(long, env = "RECEIPT2JSON_CATEGORIES", value_delimiter = ',')]
    categories: Option<Vec<String>>,

    /// Max tokens the model may generate per receipt.
    #[arg(long, env = "RECEIPT2JSON_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// LLM temperature (0.0-2.0).
    #[arg(long, env = "RECEIPT2JSON_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "RECEIPT2JSON_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Use a canned extractor instead of a real provider (no API key needed).
    #[arg(long)]
    mock: bool,

    /// Compact single-line JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RECEIPT2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long, env = "RECEIPT2JSON_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Logs go to stderr; stdout carries only the JSON response.
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    // ── Resolve inputs ───────────────────────────────────────────────────
    let mut payloads = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let bytes = resolve_input(input, &config)
            .await
            .with_context(|| format!("Failed to read input '{input}'"))?;
        payloads.push(bytes);
    }

    // ── Run the pipeline ─────────────────────────────────────────────────
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    if payloads.len() == 1 {
        let response = process_receipt(&payloads[0], &config).await;
        write_json(&mut handle, &response, cli.compact)?;
        if response.success {
            Ok(())
        } else {
            std::process::exit(1);
        }
    } else {
        let responses = process_batch(payloads, &config).await;
        let all_ok = responses.iter().all(|r| r.success);
        write_json(&mut handle, &responses, cli.compact)?;
        if all_ok {
            Ok(())
        } else {
            std::process::exit(1);
        }
    }
}

/// Map CLI args to `ProcessingConfig`.
fn build_config(cli: &Cli) -> Result<ProcessingConfig> {
    let mut builder = ProcessingConfig::builder()
        .max_dimension(cli.max_dimension)
        .jpeg_quality(cli.quality)
        .receipts_dir(&cli.receipts_dir)
        .public_prefix(&cli.public_prefix)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref categories) = cli.categories {
        builder = builder.categories(categories.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if cli.mock {
        builder = builder.extractor(Arc::new(StubExtractor::new()));
    }

    builder.build().context("Invalid configuration")
}

fn write_json<W: Write, T: serde::Serialize>(out: &mut W, value: &T, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("Failed to serialise response")?;

    out.write_all(json.as_bytes())
        .context("Failed to write to stdout")?;
    out.write_all(b"\n").ok();
    Ok(())
}

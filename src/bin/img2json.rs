//! CLI binary for img2json.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use img2json::{
    extract, extract_to_file, ExtractionConfig, PipelineProgressCallback, PipelineState,
    ProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders the idle/extracting/validating state
/// machine as a spinner with per-stage log lines.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading image…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_state_change(&self, state: PipelineState) {
        match state {
            PipelineState::Extracting => {
                self.bar.set_prefix("Extracting");
                self.bar.set_message("reading text from image…");
            }
            PipelineState::Validating => {
                self.bar.set_prefix("Validating");
                self.bar.set_message("formatting against schema…");
            }
            PipelineState::Idle => {
                self.bar.finish_and_clear();
            }
        }
    }

    fn on_stage_complete(&self, stage: Stage, chars: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            stage,
            dim(&format!("{chars} chars")),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 120 {
            format!("{}\u{2026}", &error[..119])
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), stage, red(&msg)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract fields from a photo (stdout)
  img2json receipt.jpg --schema receipt.schema.json

  # From a URL, pretty-printed, into a file
  img2json https://example.com/card.png --schema card.schema.json --pretty -o card.json

  # Inline schema, specific model
  img2json form.png --schema-inline '{"type":"object","properties":{"name":{"type":"string"}}}' \
      --model gpt-4.1 --provider openai

  # Full structured output (result + stats + any stage error)
  img2json scan.png --schema s.json --json > result.json

SUPPORTED PROVIDERS & MODELS:
  Provider     Model                        Vision
  ─────────    ───────────────────────────  ──────
  openai       gpt-4.1-nano (default)       ✓
  openai       gpt-4.1-mini / gpt-4.1       ✓
  anthropic    claude-sonnet-4-20250514     ✓
  gemini       gemini-2.0-flash             ✓
  ollama       llava, llama3.2-vision       ✓

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  IMG2JSON_LLM_PROVIDER   Override provider (openai, anthropic, gemini, ollama)
  IMG2JSON_MODEL          Override model ID

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Extract:         img2json photo.png --schema schema.json
"#;

/// Extract schema-shaped JSON from images using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "img2json",
    version,
    about = "Extract schema-shaped JSON from images using Vision LLMs",
    long_about = "Extract text from an image (local file or URL) and format it into a JSON \
object conforming to a user-supplied JSON Schema, using Vision Language Models. Supports \
OpenAI, Anthropic, Google Gemini, and any OpenAI-compatible endpoint (Ollama, vLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image file path or HTTP/HTTPS URL.
    input: String,

    /// Path to a file containing the JSON Schema.
    #[arg(long, env = "IMG2JSON_SCHEMA", required_unless_present = "schema_inline")]
    schema: Option<PathBuf>,

    /// JSON Schema passed inline on the command line.
    #[arg(long, conflicts_with = "schema")]
    schema_inline: Option<String>,

    /// Write the formatted JSON to this file instead of stdout.
    #[arg(short, long, env = "IMG2JSON_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, claude-sonnet-4-20250514).
    #[arg(long, env = "IMG2JSON_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "IMG2JSON_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "IMG2JSON_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per stage.
    #[arg(long, env = "IMG2JSON_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Pretty-print the formatted JSON when it parses.
    #[arg(long, env = "IMG2JSON_PRETTY")]
    pretty: bool,

    /// Output the full structured ExtractionOutput instead of bare JSON.
    #[arg(long, env = "IMG2JSON_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "IMG2JSON_NO_PROGRESS")]
    no_progress: bool,

    /// HTTP download timeout for URL inputs, in seconds.
    #[arg(long, env = "IMG2JSON_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMG2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMG2JSON_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; the
    // spinner provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Read schema ──────────────────────────────────────────────────────
    let schema = match (&cli.schema, &cli.schema_inline) {
        (Some(path), _) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read schema from {:?}", path))?,
        (None, Some(inline)) => inline.clone(),
        (None, None) => unreachable!("clap enforces one schema source"),
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let mut builder = ExtractionConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .pretty(cli.pretty)
        .download_timeout_secs(cli.download_timeout);

    if let Some(model) = &cli.model {
        builder = builder.model(model);
    }
    if let Some(provider) = &cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }

    let config = builder.build().context("Invalid configuration")?;

    // ── Run extraction ───────────────────────────────────────────────────
    let output = if let Some(ref output_path) = cli.output {
        let output = extract_to_file(&cli.input, &schema, output_path, &config)
            .await
            .context("Extraction failed")?;
        if output.is_success() && !cli.quiet {
            eprintln!(
                "{}  {}ms  →  {}",
                green("✔"),
                output.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        output
    } else {
        extract(&cli.input, &schema, &config)
            .await
            .context("Extraction failed")?
    };

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?
        );
        return Ok(());
    }

    if let Some(ref err) = output.error {
        eprintln!("{} {}", red("✗"), err);
        if let Some(ref text) = output.fallback_text {
            // Never show a blank result after a successful extraction: the
            // raw text goes to stdout, clearly labeled as unvalidated.
            eprintln!(
                "{}",
                cyan("⚠ Raw extracted text (did not pass validation) follows:")
            );
            println!("{text}");
        }
        std::process::exit(1);
    }

    if let Some(ref json) = output.formatted_json {
        if cli.output.is_none() {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(json.as_bytes())
                .context("Failed to write to stdout")?;
            if !json.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    if !cli.quiet {
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {}ms total",
            dim(&output.stats.total_input_tokens.to_string()),
            dim(&output.stats.total_output_tokens.to_string()),
            output.stats.total_duration_ms,
        );
    }

    Ok(())
}

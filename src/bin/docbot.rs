//! CLI binary for edgequake-docbot.
//!
//! A thin shim over the library crate: maps CLI flags to `BotConfig`, then
//! either runs the Telegram bot or converts a local file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use edgequake_docbot::{
    convert_file, format_text, render_html, run_polling, AiGateway, BotConfig, BotConfigBuilder,
    Dispatcher, DocumentRenderer, Messages, NoopProgress, PaperSize, PdfRenderer,
    PdfiumRasterizer, Pipeline, PipelineProgress, PromptSet, ProviderBackend, Stage, Stylesheet,
    TelegramClient,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress using indicatif ─────────────────────────────────────────────

/// Spinner with one log line per finished page.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading input…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[async_trait]
impl PipelineProgress for CliProgress {
    async fn on_stage(&self, stage: Stage) {
        let (prefix, msg) = match stage {
            Stage::ConvertingPdf => ("Rasterising", "rendering PDF pages".to_string()),
            Stage::ReadingPage { page, total } => ("Extracting", format!("page {page}/{total}")),
            Stage::Extracting => ("Extracting", "image".to_string()),
            Stage::Correcting => ("Correcting", "text and notation".to_string()),
            Stage::BuildingDocument => ("Rendering", "formatted PDF".to_string()),
        };
        self.bar.set_prefix(prefix);
        self.bar.set_message(msg);
    }

    async fn on_page_complete(&self, page: usize, total: usize, chars: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page,
            total,
            dim(&format!("{chars:>5} chars")),
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the Telegram bot
  TELEGRAM_BOT_TOKEN=123:abc GEMINI_API_KEY=... docbot run

  # Convert a local scan without Telegram
  docbot convert scan.pdf -o corrected.pdf

  # Preview the layout of a text file (no model calls)
  docbot format notes.txt -o notes.html --html

ENVIRONMENT VARIABLES:
  TELEGRAM_BOT_TOKEN      Bot token from @BotFather (required for `run`)
  GEMINI_API_KEY          Google Gemini API key (preferred provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory containing libpdfium
  RUST_LOG                Log filter, e.g. `edgequake_docbot=debug`

  Variables may also be placed in a `.env` file in the working directory.
"#;

/// Telegram bot that turns photos and PDFs into corrected, formatted PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "docbot",
    version,
    about = "Turn photos and PDFs into corrected, formatted PDF documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCBOT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCBOT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the bot (long polling).
    Run(RunArgs),
    /// Convert a local PDF or image into a formatted PDF.
    Convert(ConvertArgs),
    /// Format a text file into a PDF (or HTML preview) without model calls.
    Format(FormatArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Telegram bot token.
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    token: String,

    #[command(flatten)]
    model: ModelArgs,

    #[command(flatten)]
    raster: RasterArgs,

    #[command(flatten)]
    render: RenderArgs,

    /// JSON file overriding user-facing messages.
    #[arg(long, env = "DOCBOT_MESSAGES")]
    messages: Option<PathBuf>,

    /// Telegram file download timeout in seconds.
    #[arg(long, env = "DOCBOT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Long-poll timeout in seconds (max 50).
    #[arg(long, env = "DOCBOT_POLL_TIMEOUT", default_value_t = 30)]
    poll_timeout: u64,

    /// Maximum number of users with conversation memory.
    #[arg(long, env = "DOCBOT_SESSION_CAPACITY", default_value_t = 1000)]
    session_capacity: usize,

    /// Maximum remembered turns per user.
    #[arg(long, env = "DOCBOT_SESSION_HISTORY", default_value_t = 40)]
    session_history: usize,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local PDF or image file.
    input: PathBuf,

    /// Where to write the formatted PDF.
    #[arg(short, long, env = "DOCBOT_OUTPUT", default_value = "formatted_document.pdf")]
    output: PathBuf,

    #[command(flatten)]
    model: ModelArgs,

    #[command(flatten)]
    raster: RasterArgs,

    #[command(flatten)]
    render: RenderArgs,

    /// Disable the progress spinner.
    #[arg(long, env = "DOCBOT_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct FormatArgs {
    /// UTF-8 text file to format.
    input: PathBuf,

    /// Output file.
    #[arg(short, long)]
    output: PathBuf,

    /// Write an HTML preview instead of a PDF.
    #[arg(long)]
    html: bool,

    #[command(flatten)]
    render: RenderArgs,
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// LLM model ID (default: gemini-2.0-flash).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCBOT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "DOCBOT_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "DOCBOT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Directory of prompt templates (chat_system.txt, extraction.txt, correction.txt).
    #[arg(long, env = "DOCBOT_PROMPTS_DIR")]
    prompts_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RasterArgs {
    /// Rasterisation DPI for incoming PDFs (72–400).
    #[arg(long, env = "DOCBOT_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Longest edge of a rasterised page, in pixels.
    #[arg(long, env = "DOCBOT_MAX_PIXELS", default_value_t = 2500)]
    max_pixels: u32,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// JSON stylesheet for the output document.
    #[arg(long, env = "DOCBOT_STYLESHEET")]
    stylesheet: Option<PathBuf>,

    /// Directory holding the TrueType font family.
    #[arg(long, env = "DOCBOT_FONTS_DIR")]
    fonts_dir: Option<PathBuf>,

    /// Font family file prefix, e.g. LiberationSerif.
    #[arg(long, env = "DOCBOT_FONT_FAMILY")]
    font_family: Option<String>,

    /// Paper size.
    #[arg(long, env = "DOCBOT_PAPER", value_enum)]
    paper: Option<PaperArg>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PaperArg {
    Letter,
    A4,
    Legal,
}

impl From<PaperArg> for PaperSize {
    fn from(v: PaperArg) -> Self {
        match v {
            PaperArg::Letter => PaperSize::Letter,
            PaperArg::A4 => PaperSize::A4,
            PaperArg::Legal => PaperSize::Legal,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The convert spinner gives all the feedback that matters; keep library
    // logs quiet under it unless asked for.
    let spinner = matches!(&cli.command, Command::Convert(a) if !a.no_progress) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner {
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

    match cli.command {
        Command::Run(args) => run_bot(args).await,
        Command::Convert(args) => run_convert(args, cli.quiet).await,
        Command::Format(args) => run_format(args, cli.quiet),
    }
}

async fn run_bot(args: RunArgs) -> Result<()> {
    let messages = match args.messages {
        Some(ref path) => Messages::from_json_file(path).context("Failed to load messages")?,
        None => Messages::default(),
    };

    let config = base_builder(&args.model, &args.raster, &args.render)?
        .messages(messages)
        .download_timeout_secs(args.download_timeout)
        .poll_timeout_secs(args.poll_timeout)
        .session_capacity(args.session_capacity)
        .session_history_limit(args.session_history)
        .build()
        .context("Invalid configuration")?;
    tracing::debug!("{:?}", config);

    let client = TelegramClient::new(args.token, config.download_timeout_secs)
        .context("Failed to create Telegram client")?;
    let dispatcher = Dispatcher::from_config(&config, Arc::new(client.clone()))
        .context("Failed to initialise bot")?;

    run_polling(&client, Arc::new(dispatcher), config.poll_timeout_secs)
        .await
        .context("Bot stopped with an error")
}

async fn run_convert(args: ConvertArgs, quiet: bool) -> Result<()> {
    let config = base_builder(&args.model, &args.raster, &args.render)?
        .build()
        .context("Invalid configuration")?;

    let pipeline = build_pipeline(&config)?;

    let summary = if !quiet && !args.no_progress {
        let progress = CliProgress::new();
        let result = convert_file(&pipeline, &args.input, &args.output, &progress).await;
        progress.finish();
        result
    } else {
        convert_file(&pipeline, &args.input, &args.output, &NoopProgress).await
    }
    .context("Conversion failed")?;

    if !quiet {
        eprintln!(
            "{}  {:?}  {}ms  →  {}",
            green("✔"),
            summary.kind,
            summary.duration_ms,
            bold(&summary.output.display().to_string()),
        );
    }
    Ok(())
}

fn run_format(args: FormatArgs, quiet: bool) -> Result<()> {
    let stylesheet = load_stylesheet(&args.render)?;
    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {:?}", args.input))?;
    let blocks = format_text(&text);

    if args.html {
        std::fs::write(&args.output, render_html(&blocks, &stylesheet))
            .with_context(|| format!("Failed to write {:?}", args.output))?;
    } else {
        let renderer = PdfRenderer::new(stylesheet).context("Failed to load fonts")?;
        renderer
            .render(&blocks, &args.output)
            .context("Rendering failed")?;
    }

    if !quiet {
        eprintln!(
            "{}  {} blocks  →  {}",
            green("✔"),
            blocks.len(),
            bold(&args.output.display().to_string()),
        );
    }
    Ok(())
}

/// Map the shared flag groups onto a config builder.
fn base_builder(
    model: &ModelArgs,
    raster: &RasterArgs,
    render: &RenderArgs,
) -> Result<BotConfigBuilder> {
    let prompts = match model.prompts_dir {
        Some(ref dir) => PromptSet::load_dir(dir).context("Failed to load prompts")?,
        None => PromptSet::default(),
    };

    let mut builder = BotConfig::builder()
        .dpi(raster.dpi)
        .max_rendered_pixels(raster.max_pixels)
        .temperature(model.temperature)
        .max_tokens(model.max_tokens)
        .api_timeout_secs(model.api_timeout)
        .prompts(prompts)
        .stylesheet(load_stylesheet(render)?);

    if let Some(ref m) = model.model {
        builder = builder.model(m.clone());
    }
    if let Some(ref p) = model.provider {
        builder = builder.provider_name(p.clone());
    }
    if let Some(ref path) = raster.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path.clone());
    }
    Ok(builder)
}

fn load_stylesheet(render: &RenderArgs) -> Result<Stylesheet> {
    let mut stylesheet = match render.stylesheet {
        Some(ref path) => Stylesheet::from_json_file(path).context("Failed to load stylesheet")?,
        None => Stylesheet::default(),
    };
    if let Some(ref dir) = render.fonts_dir {
        stylesheet.fonts_dir = dir.clone();
    }
    if let Some(ref family) = render.font_family {
        stylesheet.font_family = family.clone();
    }
    if let Some(paper) = render.paper {
        stylesheet.paper = paper.into();
    }
    Ok(stylesheet)
}

fn build_pipeline(config: &BotConfig) -> Result<Pipeline> {
    let backend = ProviderBackend::from_config(config).context("Failed to set up LLM provider")?;
    let gateway = AiGateway::new(
        Arc::new(backend),
        Arc::new(config.prompts.clone()),
        config.messages.chat_apology.clone(),
    );
    let renderer = PdfRenderer::new(config.stylesheet.clone()).context("Failed to load fonts")?;
    Ok(Pipeline::new(
        gateway,
        Arc::new(PdfiumRasterizer::from_config(config)),
        Arc::new(renderer),
    ))
}

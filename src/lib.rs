//! # edgequake-docbot
//!
//! A Telegram bot that reads photos and PDFs with a Vision Language Model,
//! corrects the transcribed text, and sends back a formatted PDF. Plain text
//! messages get a conversational reply that remembers earlier turns.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo / PDF
//!  │
//!  ├─ 1. Input      download into a per-request workspace (temp dir)
//!  ├─ 2. Rasterise  PDF pages → images via pdfium (spawn_blocking)
//!  ├─ 3. Extract    image → text, one model call per page
//!  ├─ 4. Correct    spelling, grammar and scientific notation (H₂O, Ca²⁺, →)
//!  ├─ 5. Format     line heuristics → headings, paragraphs, bullet lists
//!  └─ 6. Render     genpdf → formatted_document.pdf, sent back to the chat
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docbot::{run_polling, BotConfig, Dispatcher, TelegramClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = BotConfig::default();
//!     let token = std::env::var("TELEGRAM_BOT_TOKEN")?;
//!     let client = TelegramClient::new(token, config.download_timeout_secs)?;
//!     let dispatcher = Dispatcher::from_config(&config, Arc::new(client.clone()))?;
//!     run_polling(&client, Arc::new(dispatcher), config.poll_timeout_secs).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docbot` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Runtime Requirements
//!
//! * a pdfium shared library (system-wide, next to the binary, or
//!   `--pdfium-lib-path`) for PDF input;
//! * a TrueType font family for the output document, by default Liberation
//!   Serif from `/usr/share/fonts/truetype/liberation`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod messages;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BotConfig, BotConfigBuilder, PaperSize, Stylesheet};
pub use convert::{convert_file, ConvertSummary, Pipeline, OUTPUT_FILE_NAME};
pub use dispatch::{run_polling, run_polling_until, Dispatcher};
pub use error::DocBotError;
pub use messages::Messages;
pub use pipeline::format::{classify_line, format_text, Block, LineKind};
pub use pipeline::llm::{AiGateway, ModelBackend, ModelRequest, ProviderBackend};
pub use pipeline::rasterize::{PageRasterizer, PdfiumRasterizer};
pub use pipeline::render::{render_html, DocumentRenderer, PdfRenderer};
pub use platform::{ChatPlatform, InboundEvent, TelegramClient};
pub use progress::{NoopProgress, PipelineProgress, Stage};
pub use prompts::PromptSet;
pub use session::{SessionStore, Turn, TurnRole};

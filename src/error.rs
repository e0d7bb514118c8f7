//! Error type for the edgequake-docbot library.
//!
//! [`DocBotError`] is **fatal to one request**: a photo or document pipeline
//! stops at the first error, nothing partial is sent, and the dispatcher turns
//! the error into a single user-facing message. It is never fatal to the
//! process; the polling loop keeps running.
//!
//! Chat replies are the one exception to propagation: the gateway logs the
//! error and answers with a localized apology instead (see
//! [`crate::pipeline::llm::AiGateway::chat`]).

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-docbot library.
#[derive(Debug, Error)]
pub enum DocBotError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Downloading a file from the chat platform failed.
    #[error("Failed to download '{file_id}': {reason}")]
    DownloadFailed { file_id: String, reason: String },

    /// The download did not finish within the configured timeout.
    #[error("Download timed out after {secs}s for '{file_id}'")]
    DownloadTimeout { file_id: String, secs: u64 },

    /// The bytes are neither a PDF nor a decodable image.
    #[error("Unsupported file type: {detail}")]
    UnsupportedMedia { detail: String },

    /// A local input file could not be read (CLI `convert` / `format`).
    #[error("Failed to read '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password; the bot never has one.
    #[error("PDF '{path}' is encrypted and requires a password")]
    PasswordRequired { path: PathBuf },

    /// The PDF opened but contains no pages.
    #[error("PDF '{path}' has no pages")]
    EmptyPdf { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install libpdfium or set PDFIUM_LIB_PATH / --pdfium-lib-path to the directory containing it."
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The LLM call did not answer within `api_timeout_secs`.
    #[error("LLM call timed out after {secs}s during {operation}")]
    ApiTimeout { operation: String, secs: u64 },

    /// Image could not be encoded for the model request.
    #[error("Image encoding failed: {0}")]
    EncodeFailed(String),

    // ── Rendering errors ──────────────────────────────────────────────────
    /// The font family for the output document could not be loaded.
    #[error("Failed to load font family '{family}' from '{dir}': {detail}")]
    FontLoadFailed {
        family: String,
        dir: PathBuf,
        detail: String,
    },

    /// The layout engine failed to produce the document.
    #[error("Failed to render document to '{path}': {detail}")]
    RenderFailed { path: PathBuf, detail: String },

    /// Could not write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Platform errors ───────────────────────────────────────────────────
    /// The chat platform API rejected a request.
    #[error("Telegram API error in {method}: {description}")]
    PlatformApi { method: String, description: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed or a config file is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocBotError {
    /// Whether the error came from the model provider rather than local work.
    pub fn is_llm_error(&self) -> bool {
        matches!(
            self,
            DocBotError::LlmApiError { .. }
                | DocBotError::ApiTimeout { .. }
                | DocBotError::ProviderNotConfigured { .. }
        )
    }
}

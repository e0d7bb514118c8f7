//! Configuration types for the bot and its conversion pipeline.
//!
//! Everything that shapes behaviour lives in [`BotConfig`], built via
//! [`BotConfigBuilder`]. The visual style of the output document is a
//! separate serde type, [`Stylesheet`], so it can be loaded from a JSON file
//! and swapped without touching code.
//!
//! Secrets are **not** part of this struct. The Telegram token is handed
//! straight to [`crate::platform::telegram::TelegramClient`] and model API
//! keys are read from the environment by `edgequake-llm`.

use crate::error::DocBotError;
use crate::messages::Messages;
use crate::prompts::PromptSet;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for the bot and the media → PDF pipeline.
///
/// # Example
/// ```rust
/// use edgequake_docbot::BotConfig;
///
/// let config = BotConfig::builder()
///     .dpi(300)
///     .session_capacity(500)
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 300);
/// ```
#[derive(Clone)]
pub struct BotConfig {
    /// Rendering DPI used when rasterising PDF pages. Range: 72–400. Default: 300.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2500.
    ///
    /// Caps memory for oversized pages regardless of DPI.
    pub max_rendered_pixels: u32,

    /// Directory containing the pdfium shared library. If None, the system
    /// library search path is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// LLM model identifier, e.g. "gemini-2.0-flash", "gpt-4.1-mini".
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for extraction and correction. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 8192.
    ///
    /// Correction runs over the whole document at once, so this must cover
    /// the longest expected transcription.
    pub max_tokens: usize,

    /// Per-model-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Timeout for downloading a file from the chat platform. Default: 120.
    pub download_timeout_secs: u64,

    /// Long-poll timeout passed to `getUpdates`. Default: 30.
    pub poll_timeout_secs: u64,

    /// Maximum number of users with a live conversation. Default: 1000.
    ///
    /// The least recently active user is evicted when a new one arrives.
    pub session_capacity: usize,

    /// Maximum turns kept per conversation. Default: 40.
    pub session_history_limit: usize,

    /// Visual style of the generated PDF.
    pub stylesheet: Stylesheet,

    /// Instruction templates sent to the model.
    pub prompts: PromptSet,

    /// User-facing strings.
    pub messages: Messages,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 2500,
            pdfium_lib_path: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 8192,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            poll_timeout_secs: 30,
            session_capacity: 1000,
            session_history_limit: 40,
            stylesheet: Stylesheet::default(),
            prompts: PromptSet::default(),
            messages: Messages::default(),
        }
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("session_capacity", &self.session_capacity)
            .field("session_history_limit", &self.session_history_limit)
            .field("prompts_version", &self.prompts.version)
            .finish()
    }
}

impl BotConfig {
    /// Create a new builder for `BotConfig`.
    pub fn builder() -> BotConfigBuilder {
        BotConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BotConfig`].
#[derive(Debug)]
pub struct BotConfigBuilder {
    config: BotConfig,
}

impl BotConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn poll_timeout_secs(mut self, secs: u64) -> Self {
        self.config.poll_timeout_secs = secs.min(50);
        self
    }

    pub fn session_capacity(mut self, n: usize) -> Self {
        self.config.session_capacity = n;
        self
    }

    pub fn session_history_limit(mut self, n: usize) -> Self {
        self.config.session_history_limit = n;
        self
    }

    pub fn stylesheet(mut self, stylesheet: Stylesheet) -> Self {
        self.config.stylesheet = stylesheet;
        self
    }

    pub fn prompts(mut self, prompts: PromptSet) -> Self {
        self.config.prompts = prompts;
        self
    }

    pub fn messages(mut self, messages: Messages) -> Self {
        self.config.messages = messages;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BotConfig, DocBotError> {
        let c = &self.config;
        if c.session_capacity == 0 {
            return Err(DocBotError::InvalidConfig(
                "Session capacity must be ≥ 1".into(),
            ));
        }
        if c.session_history_limit < 2 {
            return Err(DocBotError::InvalidConfig(format!(
                "Session history limit must keep at least one exchange (≥ 2 turns), got {}",
                c.session_history_limit
            )));
        }
        if c.api_timeout_secs == 0 || c.download_timeout_secs == 0 {
            return Err(DocBotError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        c.prompts.validate()?;
        c.stylesheet.validate()?;
        Ok(self.config)
    }
}

// ── Stylesheet ───────────────────────────────────────────────────────────

/// Page size of the generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    /// US Letter, 215.9 × 279.4 mm. (default)
    #[default]
    Letter,
    /// ISO A4, 210 × 297 mm.
    A4,
    /// US Legal, 215.9 × 355.6 mm.
    Legal,
}

impl PaperSize {
    /// Width and height in millimetres.
    pub fn dimensions_mm(self) -> (f64, f64) {
        match self {
            PaperSize::Letter => (215.9, 279.4),
            PaperSize::A4 => (210.0, 297.0),
            PaperSize::Legal => (215.9, 355.6),
        }
    }

    /// CSS `@page size` keyword.
    pub fn css_name(self) -> &'static str {
        match self {
            PaperSize::Letter => "letter",
            PaperSize::A4 => "A4",
            PaperSize::Legal => "legal",
        }
    }
}

/// Fixed visual style applied to every generated document.
///
/// Lengths are millimetres, font sizes points. The defaults give a
/// Times-like 12pt body on Letter paper with 1in margins and dark red 16pt
/// bold headings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stylesheet {
    pub paper: PaperSize,
    pub margin_mm: f64,
    /// Directory holding `{font_family}-Regular.ttf`, `-Bold.ttf`, `-Italic.ttf`, `-BoldItalic.ttf`.
    pub fonts_dir: PathBuf,
    pub font_family: String,
    /// Family name written into the HTML preview's CSS.
    pub css_font_family: String,
    pub font_size: u8,
    pub line_spacing: f64,
    pub heading_font_size: u8,
    /// RGB heading colour.
    pub heading_color: [u8; 3],
    pub heading_bold: bool,
    pub heading_space_before_mm: f64,
    pub heading_space_after_mm: f64,
    pub paragraph_space_mm: f64,
    pub list_indent_mm: f64,
    pub list_item_space_mm: f64,
    pub list_space_after_mm: f64,
}

impl Default for Stylesheet {
    fn default() -> Self {
        Self {
            paper: PaperSize::Letter,
            margin_mm: 25.4,
            fonts_dir: PathBuf::from("/usr/share/fonts/truetype/liberation"),
            font_family: "LiberationSerif".to_string(),
            css_font_family: "'Times New Roman', Times, serif".to_string(),
            font_size: 12,
            line_spacing: 1.6,
            heading_font_size: 16,
            heading_color: [0xCC, 0x00, 0x00],
            heading_bold: true,
            heading_space_before_mm: 5.6,
            heading_space_after_mm: 4.2,
            paragraph_space_mm: 3.5,
            list_indent_mm: 7.0,
            list_item_space_mm: 1.4,
            list_space_after_mm: 3.5,
        }
    }
}

impl Stylesheet {
    /// Load a stylesheet from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, DocBotError> {
        let raw = std::fs::read_to_string(path).map_err(|e| DocBotError::InputReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let sheet: Stylesheet = serde_json::from_str(&raw).map_err(|e| {
            DocBotError::InvalidConfig(format!("stylesheet '{}': {}", path.display(), e))
        })?;
        sheet.validate()?;
        Ok(sheet)
    }

    fn validate(&self) -> Result<(), DocBotError> {
        let (w, h) = self.paper.dimensions_mm();
        if self.margin_mm < 0.0 || self.margin_mm * 2.0 >= w.min(h) {
            return Err(DocBotError::InvalidConfig(format!(
                "margin {}mm leaves no room on {:?} paper",
                self.margin_mm, self.paper
            )));
        }
        if self.font_size == 0 || self.heading_font_size == 0 {
            return Err(DocBotError::InvalidConfig(
                "Font sizes must be ≥ 1pt".into(),
            ));
        }
        if self.font_family.trim().is_empty() {
            return Err(DocBotError::InvalidConfig("Font family is empty".into()));
        }
        Ok(())
    }

    /// Heading colour as a CSS hex string, e.g. `#CC0000`.
    pub fn heading_color_hex(&self) -> String {
        let [r, g, b] = self.heading_color;
        format!("#{r:02X}{g:02X}{b:02X}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let config = BotConfig::builder().build().expect("defaults are valid");
        assert_eq!(config.dpi, 300);
        assert_eq!(config.session_capacity, 1000);
        assert_eq!(config.stylesheet.paper, PaperSize::Letter);
    }

    #[test]
    fn builder_clamps() {
        let config = BotConfig::builder()
            .dpi(10)
            .temperature(5.0)
            .poll_timeout_secs(600)
            .build()
            .unwrap();
        assert_eq!(config.dpi, 72);
        assert_eq!(config.temperature, 2.0);
        assert_eq!(config.poll_timeout_secs, 50);
    }

    #[test]
    fn zero_session_capacity_rejected() {
        let err = BotConfig::builder().session_capacity(0).build().unwrap_err();
        assert!(matches!(err, DocBotError::InvalidConfig(_)));
    }

    #[test]
    fn tiny_history_limit_rejected() {
        assert!(BotConfig::builder().session_history_limit(1).build().is_err());
        assert!(BotConfig::builder().session_history_limit(2).build().is_ok());
    }

    #[test]
    fn oversized_margin_rejected() {
        let sheet = Stylesheet {
            margin_mm: 120.0,
            ..Stylesheet::default()
        };
        assert!(BotConfig::builder().stylesheet(sheet).build().is_err());
    }

    #[test]
    fn heading_color_hex() {
        assert_eq!(Stylesheet::default().heading_color_hex(), "#CC0000");
    }

    #[test]
    fn stylesheet_partial_json_keeps_defaults() {
        let sheet: Stylesheet = serde_json::from_str(r#"{"paper":"a4","font_size":11}"#).unwrap();
        assert_eq!(sheet.paper, PaperSize::A4);
        assert_eq!(sheet.font_size, 11);
        assert_eq!(sheet.heading_font_size, 16);
    }

    #[test]
    fn stylesheet_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("style.json");
        std::fs::write(&path, r#"{"margin_mm": 20.0, "heading_color": [0, 0, 128]}"#).unwrap();
        let sheet = Stylesheet::from_json_file(&path).unwrap();
        assert_eq!(sheet.margin_mm, 20.0);
        assert_eq!(sheet.heading_color_hex(), "#000080");
    }

    #[test]
    fn debug_hides_provider() {
        let dbg = format!("{:?}", BotConfig::default());
        assert!(dbg.contains("provider: None"));
        assert!(dbg.contains("prompts_version"));
    }
}

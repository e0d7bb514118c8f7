//! Instruction templates sent to the model.
//!
//! The three templates (chat system context, image extraction, text
//! correction) carry the bot's domain policy: scientific symbols must come back
//! as their proper Unicode characters (H₂O, Ca²⁺, →, Δ, μmol), never as ASCII
//! approximations. That policy lives only in the prompt text.
//!
//! Templates are versioned files under `prompts/<version>/`. The `v1` set is
//! compiled in as the default; [`PromptSet::load_dir`] replaces any of them at
//! runtime so wording can change without a rebuild.

use crate::error::DocBotError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Version tag of the compiled-in templates.
pub const DEFAULT_PROMPTS_VERSION: &str = "v1";

/// System context for conversational replies.
pub const DEFAULT_CHAT_SYSTEM_PROMPT: &str = include_str!("../prompts/v1/chat_system.txt");

/// Instruction sent together with a page or photo image.
pub const DEFAULT_EXTRACTION_PROMPT: &str = include_str!("../prompts/v1/extraction.txt");

/// Correction template. `{text}` is replaced by the text to correct.
pub const DEFAULT_CORRECTION_TEMPLATE: &str = include_str!("../prompts/v1/correction.txt");

/// Placeholder substituted by [`PromptSet::correction_request`].
pub const TEXT_PLACEHOLDER: &str = "{text}";

const CHAT_SYSTEM_FILE: &str = "chat_system.txt";
const EXTRACTION_FILE: &str = "extraction.txt";
const CORRECTION_FILE: &str = "correction.txt";
const VERSION_FILE: &str = "VERSION";

/// A versioned set of prompt templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSet {
    pub version: String,
    pub chat_system: String,
    pub extraction: String,
    pub correction: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            version: DEFAULT_PROMPTS_VERSION.to_string(),
            chat_system: DEFAULT_CHAT_SYSTEM_PROMPT.trim().to_string(),
            extraction: DEFAULT_EXTRACTION_PROMPT.trim().to_string(),
            correction: DEFAULT_CORRECTION_TEMPLATE.trim().to_string(),
        }
    }
}

impl PromptSet {
    /// Load templates from a directory laid out like `prompts/v1/`.
    ///
    /// Missing files keep the compiled-in default. The version is read from
    /// a `VERSION` file, else taken from the directory name.
    pub fn load_dir(dir: &Path) -> Result<Self, DocBotError> {
        if !dir.is_dir() {
            return Err(DocBotError::InvalidConfig(format!(
                "prompts directory '{}' does not exist",
                dir.display()
            )));
        }

        let mut set = PromptSet::default();
        if let Some(t) = read_optional(dir, CHAT_SYSTEM_FILE)? {
            set.chat_system = t;
        }
        if let Some(t) = read_optional(dir, EXTRACTION_FILE)? {
            set.extraction = t;
        }
        if let Some(t) = read_optional(dir, CORRECTION_FILE)? {
            set.correction = t;
        }
        set.version = match read_optional(dir, VERSION_FILE)? {
            Some(v) => v,
            None => dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "custom".to_string()),
        };

        set.validate()?;
        info!("Loaded prompt set '{}' from {}", set.version, dir.display());
        Ok(set)
    }

    /// Check every template is usable.
    pub fn validate(&self) -> Result<(), DocBotError> {
        if self.chat_system.is_empty() || self.extraction.is_empty() {
            return Err(DocBotError::InvalidConfig(format!(
                "prompt set '{}' has an empty template",
                self.version
            )));
        }
        if !self.correction.contains(TEXT_PLACEHOLDER) {
            return Err(DocBotError::InvalidConfig(format!(
                "correction template of prompt set '{}' lacks the {} placeholder",
                self.version, TEXT_PLACEHOLDER
            )));
        }
        Ok(())
    }

    /// Fill the correction template with the text to correct.
    pub fn correction_request(&self, text: &str) -> String {
        self.correction.replace(TEXT_PLACEHOLDER, text)
    }
}

fn read_optional(dir: &Path, name: &str) -> Result<Option<String>, DocBotError> {
    let path = dir.join(name);
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path).map_err(|e| DocBotError::InputReadFailed {
        path: path.clone(),
        source: e,
    })?;
    debug!("Read prompt file {} ({} bytes)", path.display(), raw.len());
    Ok(Some(raw.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let set = PromptSet::default();
        set.validate().unwrap();
        assert_eq!(set.version, "v1");
    }

    #[test]
    fn prompts_carry_symbol_policy() {
        let set = PromptSet::default();
        for template in [&set.extraction, &set.correction] {
            assert!(template.contains("H₂O"));
            assert!(template.contains("→"));
            assert!(template.contains("Δ"));
        }
        assert!(set.correction.contains("Do NOT add new content"));
        assert!(set.correction.contains("Do NOT remove content"));
    }

    #[test]
    fn correction_request_substitutes_text() {
        let set = PromptSet::default();
        let req = set.correction_request("H2O boils at 100C");
        assert!(req.contains("INPUT TEXT:\nH2O boils at 100C\n"));
        assert!(!req.contains(TEXT_PLACEHOLDER));
    }

    #[test]
    fn load_dir_overrides_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CORRECTION_FILE), "Fix this:\n{text}\n").unwrap();
        std::fs::write(dir.path().join(VERSION_FILE), "v2-test\n").unwrap();

        let set = PromptSet::load_dir(dir.path()).unwrap();
        assert_eq!(set.version, "v2-test");
        assert_eq!(set.correction, "Fix this:\n{text}");
        assert_eq!(set.extraction, PromptSet::default().extraction);
    }

    #[test]
    fn load_dir_rejects_template_without_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CORRECTION_FILE), "Fix the text.").unwrap();
        let err = PromptSet::load_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("{text}"));
    }

    #[test]
    fn load_dir_missing_directory() {
        assert!(PromptSet::load_dir(Path::new("/definitely/not/here")).is_err());
    }
}

//! Model interaction: chat replies, text extraction from images, correction.
//!
//! [`AiGateway`] owns the three operations the bot needs and the prompt set
//! that drives them. The wire side sits behind [`ModelBackend`] so the
//! dispatcher can be exercised without network access; [`ProviderBackend`]
//! is the production implementation over an `edgequake_llm` provider.
//!
//! Calls are never retried. A slow call is cut off after `api_timeout_secs`
//! and surfaces as [`DocBotError::ApiTimeout`].

use crate::config::BotConfig;
use crate::error::DocBotError;
use crate::prompts::PromptSet;
use crate::session::{SessionStore, Turn, TurnRole, UserId};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Model used when a provider is chosen without naming a model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// One model call, independent of provider wire formats.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    /// Short label for logs and timeout errors, e.g. `"text extraction"`.
    pub operation: &'static str,
    pub system: Option<String>,
    pub history: Vec<Turn>,
    pub prompt: String,
    pub image: Option<ImageData>,
}

/// Sends a [`ModelRequest`] and returns the raw reply text.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn complete(&self, request: ModelRequest) -> Result<String, DocBotError>;
}

// ── Production backend ───────────────────────────────────────────────────

/// [`ModelBackend`] over an `edgequake_llm` provider with a per-call timeout.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    timeout: Duration,
}

impl ProviderBackend {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        temperature: f32,
        max_tokens: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
            timeout,
        }
    }

    /// Resolve the provider from `config` (see [`resolve_provider`]).
    pub fn from_config(config: &BotConfig) -> Result<Self, DocBotError> {
        Ok(Self::new(
            resolve_provider(config)?,
            config.temperature,
            config.max_tokens,
            Duration::from_secs(config.api_timeout_secs),
        ))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ModelBackend for ProviderBackend {
    async fn complete(&self, request: ModelRequest) -> Result<String, DocBotError> {
        let operation = request.operation;
        let messages = build_messages(request);
        let options = self.options();
        let start = Instant::now();

        let response = with_timeout(operation, self.timeout, async {
            self.provider
                .chat(&messages, Some(&options))
                .await
                .map_err(|e| DocBotError::LlmApiError {
                    message: e.to_string(),
                })
        })
        .await?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            operation,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

/// Lay out system context, prior turns, then the new user message (with the
/// image attached when present).
fn build_messages(request: ModelRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    if let Some(system) = request.system {
        messages.push(ChatMessage::system(system));
    }
    for turn in request.history {
        messages.push(match turn.role {
            TurnRole::User => ChatMessage::user(turn.text),
            TurnRole::Model => ChatMessage::assistant(turn.text),
        });
    }
    messages.push(match request.image {
        Some(image) => ChatMessage::user_with_images(request.prompt, vec![image]),
        None => ChatMessage::user(request.prompt),
    });
    messages
}

/// Run `fut`, failing with [`DocBotError::ApiTimeout`] after `limit`.
pub async fn with_timeout<T, F>(
    operation: &str,
    limit: Duration,
    fut: F,
) -> Result<T, DocBotError>
where
    F: Future<Output = Result<T, DocBotError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| DocBotError::ApiTimeout {
            operation: operation.to_string(),
            secs: limit.as_secs(),
        })?
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DocBotError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocBotError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. `config.provider`, used as-is;
/// 2. `config.provider_name` with `config.model` (or [`DEFAULT_MODEL`]);
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set;
/// 4. Gemini when `GEMINI_API_KEY` is set;
/// 5. whatever `ProviderFactory::from_env` detects.
pub fn resolve_provider(config: &BotConfig) -> Result<Arc<dyn LLMProvider>, DocBotError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            return create_provider("gemini", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocBotError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

// ── Gateway ──────────────────────────────────────────────────────────────

/// The bot's three model operations.
#[derive(Clone)]
pub struct AiGateway {
    backend: Arc<dyn ModelBackend>,
    prompts: Arc<PromptSet>,
    apology: String,
}

impl AiGateway {
    /// `apology` is the reply sent when a chat call fails.
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        prompts: Arc<PromptSet>,
        apology: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            prompts,
            apology: apology.into(),
        }
    }

    /// Conversational reply that remembers earlier turns.
    ///
    /// Never fails: on any model error, or a blank reply, the apology is
    /// returned and the session is left untouched.
    pub async fn chat(&self, sessions: &SessionStore, user: UserId, message: &str) -> String {
        let history = sessions.history(user).await;
        let request = ModelRequest {
            operation: "chat",
            system: Some(self.prompts.chat_system.clone()),
            history,
            prompt: message.to_string(),
            image: None,
        };

        match self.backend.complete(request).await {
            Ok(reply) if !reply.trim().is_empty() => {
                let reply = reply.trim().to_string();
                sessions.record_exchange(user, message, &reply).await;
                debug!("Chat reply for user {}: {} chars", user, reply.len());
                reply
            }
            Ok(_) => {
                warn!("Empty chat reply for user {}", user);
                self.apology.clone()
            }
            Err(e) => {
                error!("Chat error for user {}: {}", user, e);
                self.apology.clone()
            }
        }
    }

    /// Transcribe the text visible in an image.
    pub async fn extract_text(&self, image: ImageData) -> Result<String, DocBotError> {
        let request = ModelRequest {
            operation: "text extraction",
            system: None,
            history: Vec::new(),
            prompt: self.prompts.extraction.clone(),
            image: Some(image),
        };
        let text = self.backend.complete(request).await?.trim().to_string();
        info!("Extracted {} chars", text.chars().count());
        Ok(text)
    }

    /// Fix spelling, grammar and symbol notation without changing content.
    pub async fn correct_text(&self, text: &str) -> Result<String, DocBotError> {
        let request = ModelRequest {
            operation: "text correction",
            system: None,
            history: Vec::new(),
            prompt: self.prompts.correction_request(text),
            image: None,
        };
        let corrected = self.backend.complete(request).await?.trim().to_string();
        info!(
            "Corrected text: {} → {} chars",
            text.chars().count(),
            corrected.chars().count()
        );
        Ok(corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replies with a fixed string, or fails; records what it was asked.
    struct FakeBackend {
        reply: Result<String, String>,
        seen: Mutex<Vec<(Option<String>, usize, String, bool)>>,
    }

    impl FakeBackend {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(msg: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(msg.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelBackend for FakeBackend {
        async fn complete(&self, request: ModelRequest) -> Result<String, DocBotError> {
            self.seen.lock().unwrap().push((
                request.system.clone(),
                request.history.len(),
                request.prompt.clone(),
                request.image.is_some(),
            ));
            self.reply
                .clone()
                .map_err(|message| DocBotError::LlmApiError { message })
        }
    }

    fn gateway(backend: Arc<FakeBackend>) -> AiGateway {
        AiGateway::new(backend, Arc::new(PromptSet::default()), "sorry")
    }

    #[tokio::test]
    async fn chat_records_exchange_and_replays_history() {
        let backend = FakeBackend::ok("  hello there \n");
        let gw = gateway(backend.clone());
        let sessions = SessionStore::new(10, 10);

        assert_eq!(gw.chat(&sessions, 1, "hi").await, "hello there");
        assert_eq!(gw.chat(&sessions, 1, "again").await, "hello there");

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].1, 0);
        assert_eq!(seen[1].1, 2);
        assert!(seen[0].0.is_some());
        assert_eq!(sessions.history(1).await.len(), 4);
    }

    #[tokio::test]
    async fn chat_failure_returns_apology_and_no_session() {
        let gw = gateway(FakeBackend::failing("quota"));
        let sessions = SessionStore::new(10, 10);

        assert_eq!(gw.chat(&sessions, 42, "hi").await, "sorry");
        assert!(!sessions.contains(42).await);
    }

    #[tokio::test]
    async fn blank_chat_reply_returns_apology_and_no_session() {
        let gw = gateway(FakeBackend::ok("  \n\t "));
        let sessions = SessionStore::new(10, 10);

        assert_eq!(gw.chat(&sessions, 42, "hi").await, "sorry");
        assert!(!sessions.contains(42).await);
    }

    #[tokio::test]
    async fn extraction_sends_image_and_propagates_errors() {
        let backend = FakeBackend::ok("H₂O\n");
        let gw = gateway(backend.clone());
        let image = ImageData::new("aGk=", "image/png");
        assert_eq!(gw.extract_text(image.clone()).await.unwrap(), "H₂O");
        assert!(backend.seen.lock().unwrap()[0].3);

        let gw = gateway(FakeBackend::failing("503"));
        let err = gw.extract_text(image).await.unwrap_err();
        assert!(err.is_llm_error());
    }

    #[tokio::test]
    async fn correction_fills_template() {
        let backend = FakeBackend::ok("H₂O boils at 100 °C");
        let gw = gateway(backend.clone());
        let out = gw.correct_text("H2O boils at 100C").await.unwrap();
        assert_eq!(out, "H₂O boils at 100 °C");

        let prompt = backend.seen.lock().unwrap()[0].2.clone();
        assert!(prompt.contains("H2O boils at 100C"));
        assert!(!prompt.contains("{text}"));
    }

    #[tokio::test]
    async fn empty_extraction_is_not_an_error() {
        let gw = gateway(FakeBackend::ok("   "));
        let image = ImageData::new("aGk=", "image/png");
        assert_eq!(gw.extract_text(image).await.unwrap(), "");
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let result: Result<(), DocBotError> =
            with_timeout("text correction", Duration::from_millis(10), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(DocBotError::ApiTimeout { .. })));
    }

    #[test]
    fn messages_are_ordered() {
        let request = ModelRequest {
            operation: "chat",
            system: Some("sys".into()),
            history: vec![Turn::user("q"), Turn::model("a")],
            prompt: "next".into(),
            image: None,
        };
        assert_eq!(build_messages(request).len(), 4);
    }
}

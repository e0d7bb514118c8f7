//! Event dispatch: route each inbound event to its handler, and the polling loop.
//!
//! Every handler is a boundary. Whatever goes wrong inside a media pipeline is
//! logged and answered with one localized failure message; nothing escapes to
//! the polling loop and nothing partial is sent.

use crate::config::BotConfig;
use crate::convert::{Pipeline, OUTPUT_FILE_NAME};
use crate::error::DocBotError;
use crate::messages::Messages;
use crate::pipeline::input::{sniff_media, MediaKind, Workspace};
use crate::pipeline::llm::{AiGateway, ProviderBackend};
use crate::pipeline::rasterize::PdfiumRasterizer;
use crate::pipeline::render::PdfRenderer;
use crate::platform::{ChatId, ChatPlatform, InboundEvent, TelegramClient};
use crate::progress::{PipelineProgress, Stage};
use crate::session::{SessionStore, UserId};
use async_trait::async_trait;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Pause after a failed `getUpdates` before polling again.
const POLL_ERROR_DELAY: Duration = Duration::from_secs(3);

/// Handles inbound events for all users.
pub struct Dispatcher {
    platform: Arc<dyn ChatPlatform>,
    pipeline: Pipeline,
    sessions: SessionStore,
    messages: Messages,
    scratch_dir: Option<PathBuf>,
}

impl Dispatcher {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        pipeline: Pipeline,
        sessions: SessionStore,
        messages: Messages,
    ) -> Self {
        Self {
            platform,
            pipeline,
            sessions,
            messages,
            scratch_dir: None,
        }
    }

    /// Wire up the production stack: provider backend, pdfium, genpdf.
    pub fn from_config(config: &BotConfig, platform: Arc<dyn ChatPlatform>) -> Result<Self, DocBotError> {
        let backend = Arc::new(ProviderBackend::from_config(config)?);
        let gateway = AiGateway::new(
            backend,
            Arc::new(config.prompts.clone()),
            config.messages.chat_apology.clone(),
        );
        let rasterizer = Arc::new(PdfiumRasterizer::from_config(config));
        let renderer = Arc::new(PdfRenderer::new(config.stylesheet.clone())?);
        let pipeline = Pipeline::new(gateway, rasterizer, renderer);
        let sessions = SessionStore::new(config.session_capacity, config.session_history_limit);

        info!(
            "Dispatcher ready (prompts {}, session capacity {})",
            config.prompts.version, config.session_capacity
        );
        Ok(Self::new(platform, pipeline, sessions, config.messages.clone()))
    }

    /// Create per-request workspaces under `dir` instead of the system temp dir.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handle one event to completion. Never fails.
    pub async fn handle(&self, event: InboundEvent) {
        debug!(
            "Handling {} event from user {} in chat {}",
            event.kind(),
            event.user(),
            event.chat()
        );
        match event {
            InboundEvent::Start { chat, .. } => {
                self.reply(chat, &self.messages.welcome).await;
            }
            InboundEvent::Text { chat, user, text } => self.handle_text(chat, user, &text).await,
            InboundEvent::Photo { chat, file_id, .. } => self.handle_photo(chat, &file_id).await,
            InboundEvent::Document {
                chat,
                file_id,
                mime_type,
                file_name,
                ..
            } => {
                self.handle_document(chat, &file_id, &mime_type, file_name.as_deref())
                    .await
            }
        }
    }

    async fn handle_text(&self, chat: ChatId, user: UserId, text: &str) {
        let reply = self
            .pipeline
            .gateway()
            .chat(&self.sessions, user, text)
            .await;
        self.reply(chat, &reply).await;
        debug!("{} live conversation(s)", self.sessions.len().await);
    }

    async fn handle_photo(&self, chat: ChatId, file_id: &str) {
        self.reply(chat, &self.messages.photo_received).await;

        if let Err(e) = self.run_media(chat, file_id, Some(MediaKind::Image)).await {
            error!("Error processing photo: {}", e);
            self.reply(chat, &self.messages.photo_failed(&e)).await;
        }
    }

    async fn handle_document(
        &self,
        chat: ChatId,
        file_id: &str,
        mime_type: &str,
        file_name: Option<&str>,
    ) {
        self.reply(chat, &self.messages.document_received).await;

        info!(
            "Document '{}' ({}) declared as {}",
            file_name.unwrap_or("unnamed"),
            file_id,
            mime_type
        );
        if let Err(e) = self.run_media(chat, file_id, None).await {
            error!("Error processing document: {}", e);
            self.reply(chat, &self.messages.document_failed(&e)).await;
        }
    }

    /// Download, convert and send. `kind` is sniffed from the bytes when `None`.
    async fn run_media(
        &self,
        chat: ChatId,
        file_id: &str,
        kind: Option<MediaKind>,
    ) -> Result<(), DocBotError> {
        let workspace = match &self.scratch_dir {
            Some(root) => Workspace::new_in(root)?,
            None => Workspace::new()?,
        };

        let bytes = self.platform.download(file_id).await?;
        let kind = match kind {
            Some(k) => k,
            None => sniff_media(&bytes)?,
        };
        info!("Processing {:?} for chat {} ({} bytes)", kind, chat, bytes.len());

        let progress = ChatProgress {
            platform: self.platform.as_ref(),
            chat,
            messages: &self.messages,
        };
        let document = self
            .pipeline
            .process(&workspace, &bytes, kind, &progress)
            .await?;

        self.platform
            .send_document(
                chat,
                &document,
                OUTPUT_FILE_NAME,
                &self.messages.document_caption,
            )
            .await
    }

    async fn reply(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.platform.send_text(chat, text).await {
            warn!("Failed to send message to chat {}: {}", chat, e);
        }
    }
}

/// Forwards pipeline stages to the user as status messages.
struct ChatProgress<'a> {
    platform: &'a dyn ChatPlatform,
    chat: ChatId,
    messages: &'a Messages,
}

#[async_trait]
impl PipelineProgress for ChatProgress<'_> {
    async fn on_stage(&self, stage: Stage) {
        let text = match stage {
            Stage::ConvertingPdf => self.messages.converting_pdf.clone(),
            Stage::ReadingPage { page, total } => self.messages.reading_page(page, total),
            Stage::Extracting => self.messages.extracting.clone(),
            Stage::Correcting => self.messages.correcting.clone(),
            Stage::BuildingDocument => self.messages.building_pdf.clone(),
        };
        if let Err(e) = self.platform.send_text(self.chat, &text).await {
            warn!("Failed to send status to chat {}: {}", self.chat, e);
        }
    }
}

// ── Polling loop ─────────────────────────────────────────────────────────

/// Long-poll Telegram until Ctrl-C, dispatching each event on its own task.
pub async fn run_polling(
    client: &TelegramClient,
    dispatcher: Arc<Dispatcher>,
    poll_timeout_secs: u64,
) -> Result<(), DocBotError> {
    run_polling_until(client, dispatcher, poll_timeout_secs, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Like [`run_polling`], stopping when `shutdown` completes.
///
/// In-flight events are allowed to finish before this returns.
pub async fn run_polling_until<S>(
    client: &TelegramClient,
    dispatcher: Arc<Dispatcher>,
    poll_timeout_secs: u64,
    shutdown: S,
) -> Result<(), DocBotError>
where
    S: Future<Output = ()>,
{
    let me = client.get_me().await?;
    info!(
        "Bot @{} started, polling for updates",
        me.username.as_deref().unwrap_or(&me.first_name)
    );

    tokio::pin!(shutdown);
    let mut offset: i64 = 0;
    let mut tasks = JoinSet::new();

    loop {
        let polled = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            polled = client.get_updates(offset, poll_timeout_secs) => polled,
        };

        match polled {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let Some(event) = update.message.as_ref().and_then(InboundEvent::from_message) else {
                        debug!("Ignoring update {}", update.update_id);
                        continue;
                    };
                    let dispatcher = Arc::clone(&dispatcher);
                    tasks.spawn(async move { dispatcher.handle(event).await });
                }
            }
            Err(e) => {
                warn!("Polling failed: {}", e);
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("Shutdown requested during back-off");
                        break;
                    }
                    _ = tokio::time::sleep(POLL_ERROR_DELAY) => {}
                }
            }
        }

        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                error!("Event task failed: {}", e);
            }
        }
    }

    if !tasks.is_empty() {
        info!("Waiting for {} in-flight request(s)", tasks.len());
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("Event task failed: {}", e);
        }
    }
    info!("Polling stopped");
    Ok(())
}

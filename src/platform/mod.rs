//! Chat platform boundary.
//!
//! The dispatcher talks to the platform only through [`ChatPlatform`]:
//! send a text, send a file, download a file. [`telegram::TelegramClient`]
//! implements it over the Telegram Bot API and also provides the long-poll
//! `getUpdates` feed that [`crate::dispatch::run_polling`] consumes.

pub mod telegram;
pub mod types;

use crate::error::DocBotError;
use async_trait::async_trait;
use std::path::Path;

pub use telegram::TelegramClient;
pub use types::{ChatId, InboundEvent};

/// Outbound operations the bot needs from a chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Send a plain text message.
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), DocBotError>;

    /// Upload the file at `path` as a document named `file_name`.
    async fn send_document(
        &self,
        chat: ChatId,
        path: &Path,
        file_name: &str,
        caption: &str,
    ) -> Result<(), DocBotError>;

    /// Fetch the bytes of a file previously sent by a user.
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DocBotError>;
}

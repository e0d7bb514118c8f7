//! Telegram Bot API client over reqwest.
//!
//! Only the handful of methods the bot uses are implemented: `getMe`,
//! `getUpdates` (long poll), `sendMessage`, `sendDocument` (multipart) and
//! `getFile` plus the file download endpoint.
//!
//! The bot token is part of every URL. Errors are built from
//! `reqwest::Error::without_url` so the token never reaches logs or users.

use crate::error::DocBotError;
use crate::platform::types::{
    ApiResponse, ChatId, File, GetFileRequest, GetUpdatesRequest, SendMessageRequest, Update,
    User,
};
use crate::platform::ChatPlatform;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Longest message Telegram accepts, in UTF-16 code units.
pub const MAX_MESSAGE_UTF16: usize = 4096;

/// Extra time allowed on top of the long-poll timeout before the HTTP request
/// itself is abandoned.
const POLL_SLACK: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
    download_timeout: Duration,
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .field("download_timeout", &self.download_timeout)
            .finish()
    }
}

impl TelegramClient {
    pub fn new(token: impl Into<String>, download_timeout_secs: u64) -> Result<Self, DocBotError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(DocBotError::InvalidConfig(
                "Telegram bot token is empty. Set TELEGRAM_BOT_TOKEN.".into(),
            ));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| DocBotError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token,
            api_base: DEFAULT_API_BASE.to_string(),
            download_timeout: Duration::from_secs(download_timeout_secs),
        })
    }

    /// Point the client at a self-hosted Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Option<Duration>) -> Result<T, DocBotError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.http.post(self.method_url(method)).json(body);
        if let Some(t) = timeout {
            request = request.timeout(t);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(method, e))?;
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| transport_error(method, e))?;
        unwrap_envelope(method, envelope)
    }

    /// Identify the bot; used as a token check at start-up.
    pub async fn get_me(&self) -> Result<User, DocBotError> {
        self.call("getMe", &serde_json::json!({}), None).await
    }

    /// Long-poll for updates with `update_id >= offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, DocBotError> {
        let body = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: vec!["message"],
        };
        let limit = Duration::from_secs(timeout_secs) + POLL_SLACK;
        self.call("getUpdates", &body, Some(limit)).await
    }

    async fn get_file(&self, file_id: &str) -> Result<File, DocBotError> {
        self.call("getFile", &GetFileRequest { file_id }, None).await
    }
}

#[async_trait]
impl ChatPlatform for TelegramClient {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), DocBotError> {
        let chunks = split_message(text, MAX_MESSAGE_UTF16);
        if chunks.is_empty() {
            warn!("Not sending empty message to chat {}", chat);
            return Ok(());
        }
        for chunk in &chunks {
            let _: serde_json::Value = self
                .call(
                    "sendMessage",
                    &SendMessageRequest { chat_id: chat, text: chunk },
                    None,
                )
                .await?;
        }
        debug!("Sent {} message part(s) to chat {}", chunks.len(), chat);
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatId,
        path: &Path,
        file_name: &str,
        caption: &str,
    ) -> Result<(), DocBotError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DocBotError::InputReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        let size = bytes.len();

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| transport_error("sendDocument", e))?;
        let form = Form::new()
            .text("chat_id", chat.to_string())
            .text("caption", caption.to_string())
            .part("document", part);

        let response = self
            .http
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error("sendDocument", e))?;
        let envelope: ApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| transport_error("sendDocument", e))?;
        unwrap_envelope("sendDocument", envelope)?;

        info!("Sent document '{}' ({} bytes) to chat {}", file_name, size, chat);
        Ok(())
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DocBotError> {
        let file = self.get_file(file_id).await?;
        let file_path = file.file_path.ok_or_else(|| DocBotError::DownloadFailed {
            file_id: file_id.to_string(),
            reason: "Telegram returned no file path (file may exceed the 20 MB bot limit)".into(),
        })?;

        let secs = self.download_timeout.as_secs();
        let response = self
            .http
            .get(self.file_url(&file_path))
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| download_error(file_id, secs, e))?;

        if !response.status().is_success() {
            return Err(DocBotError::DownloadFailed {
                file_id: file_id.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_error(file_id, secs, e))?;
        debug!("Downloaded {} ({} bytes)", file_id, bytes.len());
        Ok(bytes.to_vec())
    }
}

fn unwrap_envelope<T>(method: &str, envelope: ApiResponse<T>) -> Result<T, DocBotError> {
    match (envelope.ok, envelope.result) {
        (true, Some(result)) => Ok(result),
        (true, None) => Err(DocBotError::PlatformApi {
            method: method.to_string(),
            description: "response has no result".into(),
        }),
        (false, _) => Err(DocBotError::PlatformApi {
            method: method.to_string(),
            description: match (envelope.error_code, envelope.description) {
                (Some(code), Some(desc)) => format!("{} ({})", desc, code),
                (None, Some(desc)) => desc,
                (Some(code), None) => format!("error code {}", code),
                (None, None) => "unknown error".into(),
            },
        }),
    }
}

fn transport_error(method: &str, e: reqwest::Error) -> DocBotError {
    DocBotError::PlatformApi {
        method: method.to_string(),
        description: e.without_url().to_string(),
    }
}

fn download_error(file_id: &str, secs: u64, e: reqwest::Error) -> DocBotError {
    if e.is_timeout() {
        DocBotError::DownloadTimeout {
            file_id: file_id.to_string(),
            secs,
        }
    } else {
        DocBotError::DownloadFailed {
            file_id: file_id.to_string(),
            reason: e.without_url().to_string(),
        }
    }
}

/// Split `text` into parts of at most `max_units` UTF-16 code units,
/// breaking at the last newline of a part when there is one.
pub fn split_message(text: &str, max_units: usize) -> Vec<String> {
    let max_units = max_units.max(2);
    let mut parts = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let mut units = 0;
        let mut cut = rest.len();
        for (i, c) in rest.char_indices() {
            if units + c.len_utf16() > max_units {
                cut = i;
                break;
            }
            units += c.len_utf16();
        }

        if cut == rest.len() {
            parts.push(rest.to_string());
            break;
        }

        match rest[..cut].rfind('\n').filter(|&i| i > 0) {
            Some(newline) => {
                parts.push(rest[..newline].to_string());
                rest = &rest[newline + 1..];
            }
            None => {
                parts.push(rest[..cut].to_string());
                rest = &rest[cut..];
            }
        }
    }

    parts
}

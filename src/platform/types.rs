//! Telegram Bot API wire types and the inbound events derived from them.
//!
//! Only the fields the bot reads are modelled; serde ignores the rest.

use crate::session::UserId;
use serde::{Deserialize, Serialize};

/// Chat identifier; replies go to the chat a message came from.
pub type ChatId = i64;

/// Envelope of every Bot API response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub photo: Option<Vec<PhotoSize>>,
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
}

/// Result of `getFile`.
#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    pub file_path: Option<String>,
    pub file_size: Option<u64>,
}

/// Body of `getUpdates`.
#[derive(Debug, Clone, Serialize)]
pub struct GetUpdatesRequest {
    pub offset: i64,
    pub timeout: u64,
    pub allowed_updates: Vec<&'static str>,
}

/// Body of `sendMessage`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: ChatId,
    pub text: &'a str,
}

/// Body of `getFile`.
#[derive(Debug, Clone, Serialize)]
pub struct GetFileRequest<'a> {
    pub file_id: &'a str,
}

// ── Inbound events ───────────────────────────────────────────────────────

/// A message the bot reacts to. Anything else is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// `/start`, optionally addressed as `/start@botname`.
    Start { chat: ChatId, user: UserId },
    /// Plain text that is not a command.
    Text {
        chat: ChatId,
        user: UserId,
        text: String,
    },
    /// A photo; `file_id` is the largest available size.
    Photo {
        chat: ChatId,
        user: UserId,
        file_id: String,
    },
    /// A PDF or image sent as a file.
    Document {
        chat: ChatId,
        user: UserId,
        file_id: String,
        mime_type: String,
        file_name: Option<String>,
    },
}

impl InboundEvent {
    /// Classify a message. Returns `None` for commands other than `/start`,
    /// unsupported documents and message kinds the bot does not handle.
    pub fn from_message(message: &Message) -> Option<Self> {
        let chat = message.chat.id;
        let user = message.from.as_ref().map(|u| u.id).unwrap_or(chat);

        if let Some(sizes) = &message.photo {
            let largest = sizes
                .iter()
                .max_by_key(|p| u64::from(p.width) * u64::from(p.height))?;
            return Some(InboundEvent::Photo {
                chat,
                user,
                file_id: largest.file_id.clone(),
            });
        }

        if let Some(doc) = &message.document {
            let mime = doc.mime_type.as_deref().unwrap_or_default();
            if !is_supported_document(mime) {
                return None;
            }
            return Some(InboundEvent::Document {
                chat,
                user,
                file_id: doc.file_id.clone(),
                mime_type: mime.to_string(),
                file_name: doc.file_name.clone(),
            });
        }

        let text = message.text.as_deref()?;
        if let Some(command) = text.strip_prefix('/') {
            let name = command
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .split('@')
                .next()
                .unwrap_or_default();
            return (name == "start").then_some(InboundEvent::Start { chat, user });
        }

        Some(InboundEvent::Text {
            chat,
            user,
            text: text.to_string(),
        })
    }

    pub fn chat(&self) -> ChatId {
        match self {
            InboundEvent::Start { chat, .. }
            | InboundEvent::Text { chat, .. }
            | InboundEvent::Photo { chat, .. }
            | InboundEvent::Document { chat, .. } => *chat,
        }
    }

    pub fn user(&self) -> UserId {
        match self {
            InboundEvent::Start { user, .. }
            | InboundEvent::Text { user, .. }
            | InboundEvent::Photo { user, .. }
            | InboundEvent::Document { user, .. } => *user,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Start { .. } => "start",
            InboundEvent::Text { .. } => "text",
            InboundEvent::Photo { .. } => "photo",
            InboundEvent::Document { .. } => "document",
        }
    }
}

/// PDFs and any `image/*` type.
pub fn is_supported_document(mime: &str) -> bool {
    let mime = mime.trim().to_ascii_lowercase();
    mime == "application/pdf" || mime.starts_with("image/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(extra: serde_json::Value) -> Message {
        let mut base = json!({
            "message_id": 1,
            "from": {"id": 77, "is_bot": false, "first_name": "Ana"},
            "chat": {"id": 500, "type": "private"},
            "date": 0
        });
        if let (Some(obj), Some(add)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in add {
                obj.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn start_command() {
        let ev = InboundEvent::from_message(&message(json!({"text": "/start"})));
        assert_eq!(ev, Some(InboundEvent::Start { chat: 500, user: 77 }));

        let ev = InboundEvent::from_message(&message(json!({"text": "/start@doc_bot hi"})));
        assert_eq!(ev, Some(InboundEvent::Start { chat: 500, user: 77 }));
    }

    #[test]
    fn other_commands_ignored() {
        assert_eq!(
            InboundEvent::from_message(&message(json!({"text": "/help"}))),
            None
        );
    }

    #[test]
    fn plain_text() {
        let ev = InboundEvent::from_message(&message(json!({"text": "ما هو H₂O؟"}))).unwrap();
        assert_eq!(ev.kind(), "text");
        assert_eq!(ev.user(), 77);
        assert!(matches!(ev, InboundEvent::Text { ref text, .. } if text == "ما هو H₂O؟"));
    }

    #[test]
    fn photo_picks_largest_size() {
        let ev = InboundEvent::from_message(&message(json!({
            "photo": [
                {"file_id": "small", "file_unique_id": "a", "width": 90, "height": 60},
                {"file_id": "big", "file_unique_id": "b", "width": 1280, "height": 853},
                {"file_id": "mid", "file_unique_id": "c", "width": 320, "height": 213}
            ]
        })))
        .unwrap();
        assert_eq!(
            ev,
            InboundEvent::Photo {
                chat: 500,
                user: 77,
                file_id: "big".into()
            }
        );
    }

    #[test]
    fn empty_photo_list_ignored() {
        assert_eq!(
            InboundEvent::from_message(&message(json!({"photo": []}))),
            None
        );
    }

    #[test]
    fn pdf_and_image_documents_accepted() {
        let pdf = InboundEvent::from_message(&message(json!({
            "document": {"file_id": "f1", "file_unique_id": "u", "file_name": "notes.pdf", "mime_type": "application/pdf"}
        })));
        assert!(matches!(pdf, Some(InboundEvent::Document { ref mime_type, .. }) if mime_type == "application/pdf"));

        let png = InboundEvent::from_message(&message(json!({
            "document": {"file_id": "f2", "file_unique_id": "u", "mime_type": "image/png"}
        })));
        assert!(png.is_some());
    }

    #[test]
    fn other_documents_ignored() {
        let docx = InboundEvent::from_message(&message(json!({
            "document": {"file_id": "f3", "file_unique_id": "u", "mime_type": "application/vnd.openxmlformats-officedocument.wordprocessingml.document"}
        })));
        assert_eq!(docx, None);

        let unknown = InboundEvent::from_message(&message(json!({
            "document": {"file_id": "f4", "file_unique_id": "u"}
        })));
        assert_eq!(unknown, None);
    }

    #[test]
    fn sticker_only_message_ignored() {
        assert_eq!(
            InboundEvent::from_message(&message(json!({"sticker": {"file_id": "s"}}))),
            None
        );
    }

    #[test]
    fn error_envelope_parses() {
        let resp: ApiResponse<Vec<Update>> = serde_json::from_str(
            r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#,
        )
        .unwrap();
        assert!(!resp.ok);
        assert_eq!(resp.error_code, Some(401));
        assert!(resp.result.is_none());
    }
}

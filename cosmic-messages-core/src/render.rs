//! Message Rendering
//!
//! Every message in a thread renders through [`render_message`]. Content is a
//! closed set of variants, so adding a kind of message means adding a variant
//! and one match arm here.

use crate::store::SmsMessage;
use crate::ThreadId;
use serde::{Deserialize, Serialize};

/// Text shown for a text message without a body
pub const EMPTY_MESSAGE_TEXT: &str = "[Empty Message]";

/// Text shown for a media message with attachments but no caption
pub const MEDIA_MESSAGE_TEXT: &str = "[Media Message]";

/// Text shown for a media message with neither caption nor attachments
pub const MMS_MESSAGE_TEXT: &str = "[MMS Message]";

/// Marker appended to a caption when attachments are present
pub const ATTACHMENT_MARKER: &str = "📎";

/// Who sent a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Attachment of a media message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// MIME type, e.g. `image/jpeg`
    pub content_type: String,
    /// File name, if the sender provided one
    pub name: Option<String>,
}

impl Attachment {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            name: None,
        }
    }

    pub fn is_video(&self) -> bool {
        self.content_type.starts_with("video/")
    }
}

/// Message content variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain SMS text
    Text { body: String },
    /// MMS with optional caption
    Media {
        caption: Option<String>,
        attachments: Vec<Attachment>,
    },
    /// Notice generated by the client (e.g. "Thread archived")
    System { text: String },
}

/// Translation attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTranslation {
    pub text: String,
    pub target_language: String,
    /// Whether the translation replaces the original in the bubble
    pub shown: bool,
}

/// A message as displayed in a thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub thread_id: ThreadId,
    pub direction: Direction,
    /// Milliseconds since epoch
    pub timestamp: i64,
    pub content: MessageContent,
    pub translation: Option<MessageTranslation>,
}

impl Message {
    /// Text a translation request should use, if the message has any
    pub fn translatable_text(&self) -> Option<&str> {
        let text = match &self.content {
            MessageContent::Text { body } => body.as_str(),
            MessageContent::Media { caption, .. } => caption.as_deref().unwrap_or(""),
            MessageContent::System { .. } => return None,
        };
        let text = text.trim();
        (!text.is_empty()).then_some(text)
    }
}

impl From<&SmsMessage> for Message {
    fn from(sms: &SmsMessage) -> Self {
        Self {
            id: sms.id,
            thread_id: ThreadId(sms.thread_id),
            direction: if sms.is_sent() {
                Direction::Outgoing
            } else {
                Direction::Incoming
            },
            timestamp: sms.date,
            content: MessageContent::Text {
                body: sms.body.clone(),
            },
            translation: None,
        }
    }
}

/// Display form of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    /// Text shown in the bubble
    pub main_text: String,
    /// Original text shown under a translation
    pub original_text: Option<String>,
    pub direction: Direction,
    /// Centered notice rather than a bubble
    pub is_system: bool,
    /// Show a play overlay on the attachment preview
    pub show_play_button: bool,
}

/// Render any message
pub fn render_message(message: &Message) -> RenderedMessage {
    let (body, is_system, show_play_button) = match &message.content {
        MessageContent::Text { body } => {
            let body = if body.trim().is_empty() {
                EMPTY_MESSAGE_TEXT.to_string()
            } else {
                body.clone()
            };
            (body, false, false)
        }
        MessageContent::Media {
            caption,
            attachments,
        } => {
            let caption = caption.as_deref().map(str::trim).filter(|c| !c.is_empty());
            let body = match (caption, attachments.is_empty()) {
                (Some(caption), false) => format!("{} {}", caption, ATTACHMENT_MARKER),
                (Some(caption), true) => caption.to_string(),
                (None, false) => MEDIA_MESSAGE_TEXT.to_string(),
                (None, true) => MMS_MESSAGE_TEXT.to_string(),
            };
            (body, false, attachments.iter().any(Attachment::is_video))
        }
        MessageContent::System { text } => (text.clone(), true, false),
    };

    match &message.translation {
        Some(translation) if translation.shown && !is_system => RenderedMessage {
            main_text: translation.text.clone(),
            original_text: Some(format!("Original: {}", body)),
            direction: message.direction,
            is_system,
            show_play_button,
        },
        _ => RenderedMessage {
            main_text: body,
            original_text: None,
            direction: message.direction,
            is_system,
            show_play_button,
        },
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub trace_id: Uuid,
    pub channel_type: String,
    pub connector_id: String,
    /// Channel-qualified chat key, e.g. `chat:123`. Sessions are keyed by it.
    pub conversation_scope: String,
    pub user_scope: String,
    pub text: String,
    pub at: DateTime<Utc>,
    /// Display name of the sender, used to personalise the greeting
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Platform-specific message ID
    #[serde(default)]
    pub message_id: Option<String>,
}

/// A run of reply text with optional emphasis.
///
/// Channels decide how emphasis is rendered (Telegram uses MarkdownV2, the
/// REPL prints it as-is).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Span {
    Plain(String),
    Bold(String),
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Span::Plain(text.into())
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Span::Bold(text.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Span::Plain(text) | Span::Bold(text) => text,
        }
    }
}

/// Concatenates spans without any markup.
pub fn plain_text(spans: &[Span]) -> String {
    spans.iter().map(Span::as_str).collect()
}

/// Media attachment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    /// URL or file path
    pub url: String,
}

impl Attachment {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            kind: AttachmentKind::Image,
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub trace_id: Uuid,
    pub channel_type: String,
    pub connector_id: String,
    pub conversation_scope: String,
    pub body: Vec<Span>,
    pub at: DateTime<Utc>,
    /// Reply to a specific message
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl OutboundMessage {
    pub fn text(&self) -> String {
        plain_text(&self.body)
    }

    /// First image attachment, if any. Channels send it as a photo with the
    /// body as caption.
    pub fn image(&self) -> Option<&Attachment> {
        self.attachments
            .iter()
            .find(|a| a.kind == AttachmentKind::Image)
    }
}

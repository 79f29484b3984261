use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Full-fidelity message resource as returned by `messages.get` with
/// `format=full`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResource {
    pub id: String,
    pub thread_id: Option<String>,
    #[serde(default)]
    pub label_ids: Vec<String>,
    pub snippet: Option<String>,
    pub size_estimate: Option<u64>,
    pub history_id: Option<String>,
    pub internal_date: Option<String>,
    pub payload: Option<MessagePart>,
}

/// One node of the payload tree: either a leaf carrying content or a
/// multipart container with child parts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// Tagged view over a payload node, so traversal can match exhaustively
/// instead of probing optional fields.
#[derive(Debug)]
pub enum PartKind<'a> {
    Leaf(Option<&'a PartBody>),
    Multipart(&'a [MessagePart]),
}

impl MessagePart {
    pub fn kind(&self) -> PartKind<'_> {
        if self.parts.is_empty() {
            PartKind::Leaf(self.body.as_ref())
        } else {
            PartKind::Multipart(&self.parts)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub size: u64,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Minimal identity record produced by `messages.list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub id: String,
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "messagesTotal")]
    pub messages_total: Option<u64>,
    #[serde(rename = "messagesUnread")]
    pub messages_unread: Option<u64>,
}

/// Flat message record decoded from a [`MessageResource`].
///
/// The read/starred/important flags are derived from `label_ids` at decode
/// time and are never stored independently.
#[derive(Debug, Clone, Serialize)]
pub struct MessageDetail {
    pub id: String,
    pub thread_id: Option<String>,
    pub label_ids: Vec<String>,
    pub snippet: String,
    pub size_estimate: u64,
    pub history_id: Option<String>,
    pub internal_date: Option<String>,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub date: String,
    pub message_id: String,
    pub body: String,
    pub attachments: Vec<AttachmentRef>,
    pub is_read: bool,
    pub is_starred: bool,
    pub is_important: bool,
}

/// Attachment identity; content is fetched separately by attachment id.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentRef {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub attachment_id: Option<String>,
}

/// Structured parameters for an outbound message. Attachments are local
/// file paths read at encode time.
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub attachments: Vec<PathBuf>,
    pub html_body: Option<String>,
}

/// Outcome of a send. Mutating operations resolve into these outcome
/// records instead of raising, so the dispatch layer has a uniform
/// non-throwing contract.
#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub success: bool,
    pub message_id: Option<String>,
    pub thread_id: Option<String>,
    pub to: String,
    pub subject: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModifyOutcome {
    pub success: bool,
    pub message_id: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub success: bool,
    pub message_id: String,
    pub error: Option<String>,
}

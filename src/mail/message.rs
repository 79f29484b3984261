use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::api::models::{AttachmentRef, MessageDetail, MessagePart, MessageResource, PartKind};

const UNREAD_LABEL: &str = "UNREAD";
const STARRED_LABEL: &str = "STARRED";
const IMPORTANT_LABEL: &str = "IMPORTANT";

/// Flatten a full message resource into a [`MessageDetail`].
///
/// Header names are matched case-sensitively and the last occurrence of a
/// duplicated header wins; both are deliberate policy, not accidents.
pub fn decode(resource: MessageResource) -> MessageDetail {
    let headers = resource
        .payload
        .as_ref()
        .map(header_map)
        .unwrap_or_default();

    let body = resource
        .payload
        .as_ref()
        .map(extract_body)
        .unwrap_or_default();

    let attachments = resource
        .payload
        .as_ref()
        .map(extract_attachments)
        .unwrap_or_default();

    let header = |name: &str, fallback: &str| {
        headers
            .get(name)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    };

    MessageDetail {
        is_read: !resource.label_ids.iter().any(|label| label == UNREAD_LABEL),
        is_starred: resource.label_ids.iter().any(|label| label == STARRED_LABEL),
        is_important: resource
            .label_ids
            .iter()
            .any(|label| label == IMPORTANT_LABEL),
        subject: header("Subject", "No Subject"),
        from: header("From", "Unknown Sender"),
        to: header("To", "Unknown Recipient"),
        cc: header("Cc", ""),
        bcc: header("Bcc", ""),
        date: header("Date", ""),
        message_id: header("Message-ID", ""),
        id: resource.id,
        thread_id: resource.thread_id,
        label_ids: resource.label_ids,
        snippet: resource.snippet.unwrap_or_default(),
        size_estimate: resource.size_estimate.unwrap_or_default(),
        history_id: resource.history_id,
        internal_date: resource.internal_date,
        body,
        attachments,
    }
}

fn header_map(payload: &MessagePart) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for header in &payload.headers {
        map.insert(header.name.clone(), header.value.clone());
    }
    map
}

/// Body selection policy: in a multipart payload the first decodable
/// `text/plain` part wins outright; failing that, the first decodable
/// `text/html` part is used. A single-part payload contributes its body
/// only when its media type is exactly `text/plain` — single-part HTML
/// yields an empty body (known limitation, kept as documented behavior).
fn extract_body(payload: &MessagePart) -> String {
    match payload.kind() {
        PartKind::Multipart(parts) => {
            let mut body = String::new();
            for part in parts {
                if part.mime_type == "text/plain" {
                    if let Some(text) = part_text(part) {
                        body = text;
                        break;
                    }
                } else if part.mime_type == "text/html" && body.is_empty() {
                    if let Some(text) = part_text(part) {
                        body = text;
                    }
                }
            }
            body
        }
        PartKind::Leaf(_) if payload.mime_type == "text/plain" => {
            part_text(payload).unwrap_or_default()
        }
        PartKind::Leaf(_) => String::new(),
    }
}

/// Every part carrying a filename is an attachment; inline parts without
/// one are not the codec's concern.
fn extract_attachments(payload: &MessagePart) -> Vec<AttachmentRef> {
    let PartKind::Multipart(parts) = payload.kind() else {
        return Vec::new();
    };

    parts
        .iter()
        .filter(|part| !part.filename.is_empty())
        .map(|part| AttachmentRef {
            filename: part.filename.clone(),
            mime_type: part.mime_type.clone(),
            size: part.body.as_ref().map(|body| body.size).unwrap_or_default(),
            attachment_id: part
                .body
                .as_ref()
                .and_then(|body| body.attachment_id.clone()),
        })
        .collect()
}

/// Part content arrives base64url-encoded; decode failure (bad base64 or
/// non-UTF-8 bytes) yields nothing rather than an error.
fn part_text(part: &MessagePart) -> Option<String> {
    let data = part.body.as_ref()?.data.as_deref()?;
    if data.is_empty() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(data.trim_end_matches('=')).ok()?;
    String::from_utf8(bytes).ok()
}

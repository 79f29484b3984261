use serde::Serialize;
use serde_json::Value;

use crate::api::models::{Label, MessageDetail, MessageSummary, SendRequest};
use crate::error::{AppError, AppResult};
use crate::ops::MailApi;

/// Operation names recognized by [`ToolDispatcher::dispatch`].
pub const TOOL_NAMES: &[&str] = &[
    "list_messages",
    "get_message",
    "search_messages",
    "send_message",
    "modify_message",
    "delete_message",
    "get_labels",
    "mark_as_read",
    "mark_as_unread",
    "star_message",
    "unstar_message",
];

const LIST_PREVIEW_LIMIT: usize = 10;
const SNIPPET_PREVIEW_CHARS: usize = 100;

/// Uniform result envelope returned for every dispatch, success or
/// failure. Nothing propagates past the tool boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResponse {
    pub text: String,
    pub is_error: bool,
}

impl ToolResponse {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Maps a named tool call onto one mail operation, validating arguments
/// first; a missing required argument never reaches the backend.
#[derive(Debug)]
pub struct ToolDispatcher<M> {
    mail: M,
}

impl<M: MailApi> ToolDispatcher<M> {
    pub fn new(mail: M) -> Self {
        Self { mail }
    }

    pub fn backend(&self) -> &M {
        &self.mail
    }

    pub async fn dispatch(&self, name: &str, args: &Value) -> ToolResponse {
        match name {
            "list_messages" => self.list_messages(args).await,
            "get_message" => self.get_message(args).await,
            "search_messages" => self.search_messages(args).await,
            "send_message" => self.send_message(args).await,
            "modify_message" => self.modify_message(args).await,
            "delete_message" => self.delete_message(args).await,
            "get_labels" => self.get_labels().await,
            "mark_as_read" => self.modify_fixed(args, &[], &["UNREAD"]).await,
            "mark_as_unread" => self.modify_fixed(args, &["UNREAD"], &[]).await,
            "star_message" => self.modify_fixed(args, &["STARRED"], &[]).await,
            "unstar_message" => self.modify_fixed(args, &[], &["STARRED"]).await,
            _ => ToolResponse::error(format!("unknown tool: {name}")),
        }
    }

    async fn list_messages(&self, args: &Value) -> ToolResponse {
        let parsed: AppResult<_> = (|| {
            let query = optional_str(args, "query")?;
            let max_results = optional_u32(args, "max_results")?;
            let label_ids = optional_str_array(args, "label_ids")?;
            Ok((query, max_results, label_ids))
        })();

        let (query, max_results, label_ids) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => return validation_envelope(err),
        };

        match self
            .mail
            .list_messages(query.as_deref(), max_results, &label_ids)
            .await
        {
            Ok(messages) => ToolResponse::ok(render_message_list(&messages)),
            Err(err) => ToolResponse::error(format!("Error listing messages: {err}")),
        }
    }

    async fn get_message(&self, args: &Value) -> ToolResponse {
        let message_id = match required_str(args, "message_id") {
            Ok(id) => id,
            Err(err) => return validation_envelope(err),
        };

        match self.mail.get_message_details(&message_id).await {
            Ok(details) => ToolResponse::ok(render_message_detail(&details)),
            Err(err) => ToolResponse::error(format!("Error getting message: {err}")),
        }
    }

    async fn search_messages(&self, args: &Value) -> ToolResponse {
        let parsed: AppResult<_> = (|| {
            let query = required_str(args, "query")?;
            let max_results = optional_u32(args, "max_results")?;
            Ok((query, max_results))
        })();

        let (query, max_results) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => return validation_envelope(err),
        };

        match self.mail.search_messages(&query, max_results).await {
            Ok(messages) => ToolResponse::ok(render_search_results(&query, &messages)),
            Err(err) => ToolResponse::error(format!("Error searching messages: {err}")),
        }
    }

    async fn send_message(&self, args: &Value) -> ToolResponse {
        let request = match parse_send_request(args) {
            Ok(request) => request,
            Err(err) => return validation_envelope(err),
        };

        let outcome = self.mail.send_message(&request).await;
        let mut text = if outcome.success {
            let mut text = "Message sent successfully!\n".to_string();
            if let Some(message_id) = &outcome.message_id {
                text.push_str(&format!("Message ID: {message_id}\n"));
            }
            if let Some(thread_id) = &outcome.thread_id {
                text.push_str(&format!("Thread ID: {thread_id}\n"));
            }
            text
        } else {
            let error = outcome.error.as_deref().unwrap_or("unknown error");
            format!("Failed to send message: {error}\n")
        };
        text.push_str(&format!("To: {}\nSubject: {}\n", outcome.to, outcome.subject));

        ToolResponse {
            text,
            is_error: !outcome.success,
        }
    }

    async fn modify_message(&self, args: &Value) -> ToolResponse {
        let parsed: AppResult<_> = (|| {
            let message_id = required_str(args, "message_id")?;
            let add = optional_str_array(args, "add_label_ids")?;
            let remove = optional_str_array(args, "remove_label_ids")?;
            Ok((message_id, add, remove))
        })();

        let (message_id, add, remove) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => return validation_envelope(err),
        };

        self.run_modify(&message_id, &add, &remove).await
    }

    /// mark-as-read/unread and star/unstar are not separate provider
    /// operations; they are exactly a modify with the fixed label sets.
    async fn modify_fixed(&self, args: &Value, add: &[&str], remove: &[&str]) -> ToolResponse {
        let message_id = match required_str(args, "message_id") {
            Ok(id) => id,
            Err(err) => return validation_envelope(err),
        };

        let add: Vec<String> = add.iter().map(ToString::to_string).collect();
        let remove: Vec<String> = remove.iter().map(ToString::to_string).collect();
        self.run_modify(&message_id, &add, &remove).await
    }

    async fn run_modify(
        &self,
        message_id: &str,
        add: &[String],
        remove: &[String],
    ) -> ToolResponse {
        let outcome = self.mail.modify_message(message_id, add, remove).await;

        let text = if outcome.success {
            let mut text = format!("Message {message_id} modified successfully\n");
            if !outcome.added.is_empty() {
                text.push_str(&format!("Added labels: {}\n", outcome.added.join(", ")));
            }
            if !outcome.removed.is_empty() {
                text.push_str(&format!("Removed labels: {}\n", outcome.removed.join(", ")));
            }
            text
        } else {
            let error = outcome.error.as_deref().unwrap_or("unknown error");
            format!("Failed to modify message: {error}\n")
        };

        ToolResponse {
            text,
            is_error: !outcome.success,
        }
    }

    async fn delete_message(&self, args: &Value) -> ToolResponse {
        let message_id = match required_str(args, "message_id") {
            Ok(id) => id,
            Err(err) => return validation_envelope(err),
        };

        let outcome = self.mail.delete_message(&message_id).await;
        let text = if outcome.success {
            format!("Message {message_id} deleted successfully\n")
        } else {
            let error = outcome.error.as_deref().unwrap_or("unknown error");
            format!("Failed to delete message: {error}\n")
        };

        ToolResponse {
            text,
            is_error: !outcome.success,
        }
    }

    async fn get_labels(&self) -> ToolResponse {
        match self.mail.get_labels().await {
            Ok(labels) => ToolResponse::ok(render_labels(&labels)),
            Err(err) => ToolResponse::error(format!("Error getting labels: {err}")),
        }
    }
}

fn validation_envelope(err: AppError) -> ToolResponse {
    ToolResponse::error(err.to_string())
}

fn parse_send_request(args: &Value) -> AppResult<SendRequest> {
    let to = required_str(args, "to")?;
    let subject = required_str(args, "subject")?;
    let body = required_str(args, "body")?;
    let cc = optional_str_array(args, "cc")?;
    let bcc = optional_str_array(args, "bcc")?;
    let attachments = optional_str_array(args, "attachments")?
        .into_iter()
        .map(Into::into)
        .collect();
    let html_body = optional_str(args, "html_body")?;

    Ok(SendRequest {
        to,
        subject,
        body,
        cc,
        bcc,
        attachments,
        html_body,
    })
}

fn required_str(args: &Value, key: &str) -> AppResult<String> {
    optional_str(args, key)?
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("missing required argument `{key}`")))
}

fn optional_str(args: &Value, key: &str) -> AppResult<Option<String>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(AppError::InvalidInput(format!(
            "argument `{key}` must be a string"
        ))),
    }
}

fn optional_u32(args: &Value, key: &str) -> AppResult<Option<u32>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|value| u32::try_from(value).ok())
            .map(Some)
            .ok_or_else(|| {
                AppError::InvalidInput(format!("argument `{key}` must be a positive integer"))
            }),
    }
}

fn optional_str_array(args: &Value, key: &str) -> AppResult<Vec<String>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(values)) => values
            .iter()
            .map(|value| {
                value.as_str().map(ToString::to_string).ok_or_else(|| {
                    AppError::InvalidInput(format!("argument `{key}` must be an array of strings"))
                })
            })
            .collect(),
        Some(_) => Err(AppError::InvalidInput(format!(
            "argument `{key}` must be an array of strings"
        ))),
    }
}

fn render_message_list(messages: &[MessageSummary]) -> String {
    let mut text = format!("Found {} messages\n\n", messages.len());

    for (index, message) in messages.iter().take(LIST_PREVIEW_LIMIT).enumerate() {
        text.push_str(&format!("{}. Message ID: {}\n", index + 1, message.id));
        text.push_str(&format!(
            "   Thread ID: {}\n\n",
            message.thread_id.as_deref().unwrap_or("N/A")
        ));
    }

    if messages.len() > LIST_PREVIEW_LIMIT {
        text.push_str(&format!(
            "... and {} more messages\n",
            messages.len() - LIST_PREVIEW_LIMIT
        ));
    }

    text
}

fn render_message_detail(details: &MessageDetail) -> String {
    let mut text = String::from("Message Details:\n");
    text.push_str(&format!("ID: {}\n", details.id));
    text.push_str(&format!("Subject: {}\n", details.subject));
    text.push_str(&format!("From: {}\n", details.from));
    text.push_str(&format!("To: {}\n", details.to));
    text.push_str(&format!("Date: {}\n", details.date));
    text.push_str(&format!("Read: {}\n", details.is_read));
    text.push_str(&format!("Starred: {}\n", details.is_starred));
    text.push_str(&format!("Important: {}\n", details.is_important));
    text.push_str(&format!("Snippet: {}\n", details.snippet));
    text.push_str(&format!("\nBody:\n{}\n", details.body));

    if !details.attachments.is_empty() {
        text.push_str("\nAttachments:\n");
        for attachment in &details.attachments {
            text.push_str(&format!(
                "- {} ({})\n",
                attachment.filename, attachment.mime_type
            ));
        }
    }

    text
}

fn render_search_results(query: &str, messages: &[MessageDetail]) -> String {
    let mut text = format!("Search Results for '{query}':\n");
    text.push_str(&format!("Found {} messages\n\n", messages.len()));

    for (index, message) in messages.iter().take(LIST_PREVIEW_LIMIT).enumerate() {
        text.push_str(&format!("{}. {}\n", index + 1, message.subject));
        text.push_str(&format!("   From: {}\n", message.from));
        text.push_str(&format!("   Date: {}\n", message.date));
        text.push_str(&format!("   ID: {}\n", message.id));
        text.push_str(&format!(
            "   Snippet: {}...\n\n",
            snippet_preview(&message.snippet)
        ));
    }

    if messages.len() > LIST_PREVIEW_LIMIT {
        text.push_str(&format!(
            "... and {} more messages\n",
            messages.len() - LIST_PREVIEW_LIMIT
        ));
    }

    text
}

fn render_labels(labels: &[Label]) -> String {
    let mut text = format!("Gmail Labels ({} total):\n\n", labels.len());

    for label in labels {
        text.push_str(&format!("- {} (ID: {})\n", label.name, label.id));
        text.push_str(&format!("  Type: {}\n", label.kind));
        if let Some(total) = label.messages_total {
            text.push_str(&format!("  Messages: {total}\n"));
        }
        if let Some(unread) = label.messages_unread {
            text.push_str(&format!("  Unread: {unread}\n"));
        }
        text.push('\n');
    }

    text
}

fn snippet_preview(snippet: &str) -> String {
    let decoded = html_escape::decode_html_entities(snippet);
    decoded.chars().take(SNIPPET_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_str_rejects_blank_values() {
        let args = serde_json::json!({"message_id": "   "});
        assert!(required_str(&args, "message_id").is_err());
    }

    #[test]
    fn optional_u32_rejects_negative_numbers() {
        let args = serde_json::json!({"max_results": -5});
        assert!(optional_u32(&args, "max_results").is_err());
    }

    #[test]
    fn snippet_preview_decodes_entities_and_truncates() {
        let long = format!("I&#39;ve {}", "x".repeat(200));
        let preview = snippet_preview(&long);
        assert!(preview.starts_with("I've"));
        assert_eq!(preview.chars().count(), SNIPPET_PREVIEW_CHARS);
    }

    #[test]
    fn list_rendering_caps_at_ten_entries() {
        let messages: Vec<MessageSummary> = (0..12)
            .map(|index| MessageSummary {
                id: format!("msg-{index}"),
                thread_id: None,
            })
            .collect();

        let text = render_message_list(&messages);
        assert!(text.contains("Found 12 messages"));
        assert!(text.contains("10. Message ID: msg-9"));
        assert!(!text.contains("msg-10"));
        assert!(text.contains("... and 2 more messages"));
    }
}

use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use rand::Rng;

use crate::api::models::SendRequest;

/// Assemble the outbound MIME envelope and base64url-encode it for the
/// `messages.send` endpoint.
///
/// The container is always multipart/alternative: a mandatory plain-text
/// part, the HTML part second when provided, then any attachment parts.
/// An attachment that cannot be read is logged and skipped; it never
/// aborts the send.
pub fn build_raw_message(request: &SendRequest) -> String {
    let boundary = random_boundary();
    let mut headers = build_address_headers(request);
    headers.push("MIME-Version: 1.0".to_string());
    headers.push(format!(
        "Content-Type: multipart/alternative; boundary=\"{boundary}\""
    ));

    let payload = format!(
        "{}\r\n\r\n{}",
        headers.join("\r\n"),
        multipart_body(request, &boundary)
    );

    URL_SAFE_NO_PAD.encode(payload.as_bytes())
}

/// Cc and Bcc are comma-joined and omitted entirely when empty; an empty
/// header is never emitted.
fn build_address_headers(request: &SendRequest) -> Vec<String> {
    let mut headers = Vec::new();
    headers.push(format!("To: {}", request.to));

    if !request.cc.is_empty() {
        headers.push(format!("Cc: {}", request.cc.join(", ")));
    }

    if !request.bcc.is_empty() {
        headers.push(format!("Bcc: {}", request.bcc.join(", ")));
    }

    headers.push(format!("Subject: {}", request.subject));
    headers
}

fn multipart_body(request: &SendRequest, boundary: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("--{boundary}\r\n"));
    out.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
    out.push_str(&request.body);
    out.push_str("\r\n");

    if let Some(html_body) = &request.html_body {
        out.push_str(&format!("--{boundary}\r\n"));
        out.push_str("Content-Type: text/html; charset=utf-8\r\n\r\n");
        out.push_str(html_body);
        out.push_str("\r\n");
    }

    for path in &request.attachments {
        let Some(part) = attachment_part(path, boundary) else {
            continue;
        };
        out.push_str(&part);
    }

    out.push_str(&format!("--{boundary}--\r\n"));
    out
}

fn attachment_part(path: &Path, boundary: &str) -> Option<String> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            tracing::warn!("failed to attach {}: {err}", path.display());
            return None;
        }
    };

    let Some(filename) = path.file_name().map(|name| name.to_string_lossy().to_string()) else {
        tracing::warn!("failed to attach {}: path has no file name", path.display());
        return None;
    };

    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    let mut out = String::new();
    out.push_str(&format!("--{boundary}\r\n"));
    out.push_str(&format!(
        "Content-Type: {mime_type}; name=\"{}\"\r\n",
        escape_header_value(&filename)
    ));
    out.push_str("Content-Transfer-Encoding: base64\r\n");
    out.push_str(&format!(
        "Content-Disposition: attachment; filename=\"{}\"\r\n\r\n",
        escape_header_value(&filename)
    ));

    let encoded = STANDARD.encode(&data);
    out.push_str(&fold_base64_lines(&encoded));
    out.push_str("\r\n");
    Some(out)
}

fn fold_base64_lines(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 76 + 8);
    let mut start = 0;
    while start < input.len() {
        let end = (start + 76).min(input.len());
        out.push_str(&input[start..end]);
        out.push_str("\r\n");
        start = end;
    }
    out
}

fn random_boundary() -> String {
    let mut bytes = [0_u8; 12];
    rand::thread_rng().fill(&mut bytes);
    let token = STANDARD.encode(bytes);
    format!("gmail-mcp-{token}")
}

fn escape_header_value(value: &str) -> String {
    value.replace('"', "")
}

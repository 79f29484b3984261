use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use gmail_mcp::api::GmailClient;
use gmail_mcp::auth::{AuthSession, TokenExchanger, TokenSet, TokenStore};
use gmail_mcp::config::Config;
use gmail_mcp::error::{AppError, AppResult};
use gmail_mcp::ops::{MailApi, MailOps};

struct StaticStore {
    token: TokenSet,
}

impl TokenStore for StaticStore {
    fn load(&self) -> AppResult<Option<TokenSet>> {
        Ok(Some(self.token.clone()))
    }

    fn save(&self, _token: &TokenSet) -> AppResult<()> {
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        Ok(())
    }
}

// These operations must never trigger a renewal; the stored token is fresh.
struct NoRenewal;

impl TokenExchanger for NoRenewal {
    async fn refresh(&self, _config: &Config, _refresh_token: &str) -> AppResult<TokenSet> {
        Err(AppError::Auth("unexpected refresh attempt".to_string()))
    }

    async fn consent(&self, _config: &Config) -> AppResult<TokenSet> {
        Err(AppError::Auth("unexpected consent attempt".to_string()))
    }

    async fn revoke(&self, _token: &str) -> AppResult<()> {
        Ok(())
    }
}

/// Minimal Gmail stand-in on a loopback port: a three-message inbox where
/// fetching `m-bad` always fails server-side.
async fn spawn_gmail_stub() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };

            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0_u8; 1024];
                loop {
                    let read = stream.read(&mut chunk).await.unwrap_or(0);
                    if read == 0 {
                        break;
                    }
                    request.extend_from_slice(&chunk[..read]);
                    if request.windows(4).any(|window| window == b"\r\n\r\n") {
                        break;
                    }
                }

                let request = String::from_utf8_lossy(&request).to_string();
                let target = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                let (status, body) = respond(&target);
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

fn respond(target: &str) -> (&'static str, String) {
    if target.contains("/messages/m-ok-1") {
        ("200 OK", message_json("m-ok-1", "First"))
    } else if target.contains("/messages/m-ok-2") {
        ("200 OK", message_json("m-ok-2", "Second"))
    } else if target.contains("/messages/m-bad") {
        (
            "500 Internal Server Error",
            r#"{"error":{"code":500,"message":"backend failure","status":"INTERNAL"}}"#.to_string(),
        )
    } else if target.contains("/messages?") {
        (
            "200 OK",
            r#"{"messages":[{"id":"m-ok-1"},{"id":"m-bad"},{"id":"m-ok-2"}]}"#.to_string(),
        )
    } else {
        (
            "404 Not Found",
            r#"{"error":{"code":404,"message":"unknown route","status":"NOT_FOUND"}}"#.to_string(),
        )
    }
}

fn message_json(id: &str, subject: &str) -> String {
    // "aGVsbG8" is base64url for "hello".
    format!(
        r#"{{"id":"{id}","threadId":"t-{id}","labelIds":["INBOX"],"snippet":"snippet for {id}","payload":{{"mimeType":"multipart/alternative","headers":[{{"name":"Subject","value":"{subject}"}}],"parts":[{{"mimeType":"text/plain","body":{{"size":5,"data":"aGVsbG8"}}}}]}}}}"#
    )
}

fn ops_against(base_url: String) -> MailOps<StaticStore, NoRenewal> {
    let config = Config {
        credentials_path: PathBuf::from("/tmp/credentials.json"),
        token_path: PathBuf::from("/tmp/token.json"),
        default_query: "in:inbox".to_string(),
        default_max_results: 50,
    };

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs();
    let store = StaticStore {
        token: TokenSet {
            access_token: "ya29.test".to_string(),
            refresh_token: None,
            expires_at_unix: Some(now + 3600),
            token_type: Some("Bearer".to_string()),
            scope: None,
        },
    };

    MailOps::new(
        AuthSession::with_parts(config, store, NoRenewal),
        GmailClient::with_base_url(base_url),
    )
}

#[tokio::test]
async fn search_skips_messages_that_fail_to_load() {
    let base_url = spawn_gmail_stub().await;
    let ops = ops_against(base_url);

    let results = ops
        .search_messages("anything", Some(10))
        .await
        .expect("search should succeed despite one failing message");

    let ids: Vec<&str> = results.iter().map(|detail| detail.id.as_str()).collect();
    assert_eq!(ids, vec!["m-ok-1", "m-ok-2"]);
    assert_eq!(results[0].subject, "First");
    assert_eq!(results[0].body, "hello");
}

#[tokio::test]
async fn get_message_details_decodes_a_full_resource() {
    let base_url = spawn_gmail_stub().await;
    let ops = ops_against(base_url);

    let detail = ops.get_message_details("m-ok-2").await.expect("details");
    assert_eq!(detail.id, "m-ok-2");
    assert_eq!(detail.subject, "Second");
    assert_eq!(detail.body, "hello");
    assert!(detail.is_read);
}

#[tokio::test]
async fn failing_single_fetch_surfaces_as_api_error() {
    let base_url = spawn_gmail_stub().await;
    let ops = ops_against(base_url);

    match ops.get_message_details("m-bad").await {
        Err(AppError::Api(message)) => assert!(message.contains("backend failure")),
        other => panic!("expected api error, got {other:?}"),
    }
}

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time;
use url::Url;

use crate::error::{AppError, AppResult};

use super::token::TokenSet;

const GOOGLE_AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_REVOKE_ENDPOINT: &str = "https://oauth2.googleapis.com/revoke";
const OAUTH_REDIRECT_URI: &str = "http://127.0.0.1:8765/oauth2callback";
const OAUTH_CALLBACK_TIMEOUT_SECS: u64 = 180;
const OAUTH_SCOPES: &str = "https://www.googleapis.com/auth/gmail.readonly \
    https://www.googleapis.com/auth/gmail.send \
    https://www.googleapis.com/auth/gmail.modify \
    https://www.googleapis.com/auth/gmail.compose";

/// OAuth client registration, read from the operator-supplied
/// credentials.json (google cloud console "desktop application" download).
#[derive(Debug, Clone)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecretsEntry>,
    web: Option<ClientSecretsEntry>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsEntry {
    client_id: String,
    client_secret: Option<String>,
}

impl ClientSecrets {
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Config(format!(
                "gmail credentials file not found: {}. download oauth client credentials \
                 (desktop application) from google cloud console and save them there",
                path.display()
            )));
        }

        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> AppResult<Self> {
        let file: ClientSecretsFile = serde_json::from_str(raw)?;
        let entry = file.installed.or(file.web).ok_or_else(|| {
            AppError::Config(
                "credentials file has neither an `installed` nor a `web` client entry".to_string(),
            )
        })?;

        if entry.client_id.trim().is_empty() {
            return Err(AppError::Config(
                "credentials file has an empty client_id".to_string(),
            ));
        }

        Ok(Self {
            client_id: entry.client_id,
            client_secret: entry
                .client_secret
                .filter(|secret| !secret.trim().is_empty()),
            redirect_uri: OAUTH_REDIRECT_URI.to_string(),
        })
    }
}

/// Run the interactive authorization-code flow: open the consent page,
/// capture the redirect on a loopback listener, exchange the code.
///
/// Acceptable during setup only; steady-state serving assumes a persisted,
/// refreshable credential already exists.
pub async fn run_consent_flow(secrets: &ClientSecrets) -> AppResult<TokenSet> {
    let flow = ConsentFlow::new(secrets)?;
    if open_browser(&flow.authorization_url) {
        tracing::info!("opened browser for oauth consent");
    } else {
        eprintln!(
            "open this URL in your browser to authorize gmail access:\n{}",
            flow.authorization_url
        );
    }

    let code = wait_for_auth_callback(
        &secrets.redirect_uri,
        &flow.state,
        Duration::from_secs(OAUTH_CALLBACK_TIMEOUT_SECS),
    )
    .await?;

    exchange_auth_code(secrets, &code, &flow.code_verifier).await
}

pub async fn refresh_access_token(
    secrets: &ClientSecrets,
    refresh_token: &str,
) -> AppResult<TokenSet> {
    let mut form = HashMap::from([
        ("grant_type", "refresh_token".to_string()),
        ("refresh_token", refresh_token.to_string()),
        ("client_id", secrets.client_id.clone()),
    ]);

    if let Some(client_secret) = &secrets.client_secret {
        form.insert("client_secret", client_secret.clone());
    }

    let response = reqwest::Client::new()
        .post(GOOGLE_TOKEN_ENDPOINT)
        .form(&form)
        .send()
        .await?;

    let mut token = parse_token_response(response).await?;
    // Google omits the refresh token from refresh responses; carry it over
    // so the credential stays renewable.
    if token.refresh_token.is_none() {
        token.refresh_token = Some(refresh_token.to_string());
    }

    Ok(token)
}

pub async fn revoke_token(token: &str) -> AppResult<()> {
    let response = reqwest::Client::new()
        .post(GOOGLE_REVOKE_ENDPOINT)
        .form(&HashMap::from([("token", token.to_string())]))
        .send()
        .await?;

    if response.status().is_success() {
        return Ok(());
    }

    Err(AppError::Auth(format!(
        "revoke endpoint returned {}",
        response.status()
    )))
}

#[derive(Debug)]
struct ConsentFlow {
    authorization_url: String,
    code_verifier: String,
    state: String,
}

impl ConsentFlow {
    fn new(secrets: &ClientSecrets) -> AppResult<Self> {
        let state = random_token(32);
        let code_verifier = random_token(96);
        let code_challenge = pkce_challenge(&code_verifier);

        let mut url = Url::parse(GOOGLE_AUTH_ENDPOINT)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &secrets.client_id)
            .append_pair("redirect_uri", &secrets.redirect_uri)
            .append_pair("scope", &normalized_scopes())
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", &state)
            .append_pair("code_challenge", &code_challenge)
            .append_pair("code_challenge_method", "S256");

        Ok(Self {
            authorization_url: url.to_string(),
            code_verifier,
            state,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    token_type: Option<String>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

async fn exchange_auth_code(
    secrets: &ClientSecrets,
    code: &str,
    code_verifier: &str,
) -> AppResult<TokenSet> {
    let mut form = HashMap::from([
        ("grant_type", "authorization_code".to_string()),
        ("code", code.to_string()),
        ("client_id", secrets.client_id.clone()),
        ("redirect_uri", secrets.redirect_uri.clone()),
        ("code_verifier", code_verifier.to_string()),
    ]);

    if let Some(client_secret) = &secrets.client_secret {
        form.insert("client_secret", client_secret.clone());
    }

    let response = reqwest::Client::new()
        .post(GOOGLE_TOKEN_ENDPOINT)
        .form(&form)
        .send()
        .await?;

    parse_token_response(response).await
}

async fn parse_token_response(response: reqwest::Response) -> AppResult<TokenSet> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(token_endpoint_error(status, &body));
    }

    let payload: OAuthTokenResponse = serde_json::from_str(&body)?;
    Ok(TokenSet {
        access_token: payload.access_token,
        refresh_token: payload.refresh_token,
        expires_at_unix: expires_at_unix(payload.expires_in),
        token_type: payload.token_type,
        scope: payload.scope,
    })
}

fn token_endpoint_error(status: reqwest::StatusCode, body: &str) -> AppError {
    let detail = match serde_json::from_str::<OAuthErrorResponse>(body) {
        Ok(payload) => {
            let error = payload.error.unwrap_or_else(|| "unknown_oauth_error".to_string());
            match payload.error_description {
                Some(description) => format!("{error} ({description})"),
                None => error,
            }
        }
        Err(_) => body.trim().to_string(),
    };

    AppError::Auth(format!("oauth token exchange failed ({status}): {detail}"))
}

fn expires_at_unix(expires_in: Option<u64>) -> Option<u64> {
    let expires_in = expires_in?;
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
    Some(now.saturating_add(expires_in))
}

fn normalized_scopes() -> String {
    OAUTH_SCOPES.split_whitespace().collect::<Vec<_>>().join(" ")
}

async fn wait_for_auth_callback(
    redirect_uri: &str,
    expected_state: &str,
    timeout: Duration,
) -> AppResult<String> {
    let redirect = Url::parse(redirect_uri)?;
    if redirect.scheme() != "http" {
        return Err(AppError::Config(
            "redirect_uri must use http for local callback capture".to_string(),
        ));
    }

    let host = redirect
        .host_str()
        .ok_or_else(|| AppError::Config("redirect_uri is missing host".to_string()))?;
    let port = redirect
        .port_or_known_default()
        .ok_or_else(|| AppError::Config("redirect_uri is missing port".to_string()))?;
    let path = redirect.path().to_string();

    let listener = TcpListener::bind((host, port)).await.map_err(|err| {
        AppError::Auth(format!(
            "failed to bind oauth callback listener on {host}:{port}: {err}"
        ))
    })?;

    time::timeout(timeout, accept_callback(&listener, &path, expected_state))
        .await
        .map_err(|_| AppError::Auth("timed out waiting for oauth callback".to_string()))?
}

/// Serve exactly one redirect request from the listener, acknowledge it in
/// the browser, and hand back the authorization code.
async fn accept_callback(
    listener: &TcpListener,
    path: &str,
    expected_state: &str,
) -> AppResult<String> {
    let (mut stream, _) = listener.accept().await?;
    let request_line = read_request_line(&mut stream).await?;

    let mut pieces = request_line.split_whitespace();
    let method = pieces.next().unwrap_or_default();
    let target = pieces.next().unwrap_or_default();

    if method != "GET" {
        finish_callback(
            &mut stream,
            "405 Method Not Allowed",
            "the oauth callback only accepts GET requests",
        )
        .await?;
        return Err(AppError::Auth(
            "oauth callback received non-GET request".to_string(),
        ));
    }

    match extract_callback_code(target, path, expected_state) {
        Ok(code) => {
            finish_callback(
                &mut stream,
                "200 OK",
                "gmail authorization complete. you can return to the terminal.",
            )
            .await?;
            Ok(code)
        }
        Err(err) => {
            let _ = finish_callback(
                &mut stream,
                "400 Bad Request",
                &format!("oauth callback error: {err}"),
            )
            .await;
            Err(err)
        }
    }
}

async fn read_request_line(stream: &mut TcpStream) -> AppResult<String> {
    let mut buf = vec![0_u8; 8192];
    let read = stream.read(&mut buf).await?;
    if read == 0 {
        return Err(AppError::Auth("empty oauth callback request".to_string()));
    }

    String::from_utf8_lossy(&buf[..read])
        .lines()
        .next()
        .map(str::to_owned)
        .ok_or_else(|| AppError::Auth("malformed oauth callback request".to_string()))
}

#[derive(Debug, Default)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

fn extract_callback_code(
    target: &str,
    expected_path: &str,
    expected_state: &str,
) -> AppResult<String> {
    let callback_url = Url::parse(&format!("http://localhost{target}"))?;
    if callback_url.path() != expected_path {
        return Err(AppError::Auth(format!(
            "oauth callback path mismatch: expected {expected_path}, got {}",
            callback_url.path()
        )));
    }

    let mut query = CallbackQuery::default();
    for (key, value) in callback_url.query_pairs() {
        let value = Some(value.to_string());
        match key.as_ref() {
            "code" => query.code = value,
            "state" => query.state = value,
            "error" => query.error = value,
            "error_description" => query.error_description = value,
            _ => {}
        }
    }

    if let Some(error) = query.error {
        let description = query
            .error_description
            .unwrap_or_else(|| "no description".to_string());
        return Err(AppError::Auth(format!(
            "oauth authorization failed: {error} ({description})"
        )));
    }

    match query.state {
        Some(state) if state == expected_state => {}
        Some(_) => {
            return Err(AppError::Auth(
                "oauth state mismatch; aborting authorization".to_string(),
            ));
        }
        None => {
            return Err(AppError::Auth(
                "oauth callback missing state parameter".to_string(),
            ));
        }
    }

    query
        .code
        .ok_or_else(|| AppError::Auth("oauth callback missing code parameter".to_string()))
}

async fn finish_callback(stream: &mut TcpStream, status: &str, message: &str) -> AppResult<()> {
    let page = format!(
        "<!doctype html><html><head><title>gmail-mcp</title></head>\
         <body><h3>{}</h3></body></html>",
        html_escape::encode_text(message)
    );

    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{page}",
        page.len()
    );

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Url-safe random string for the PKCE verifier and the state parameter.
fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(rand::distributions::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn pkce_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

fn open_browser(url: &str) -> bool {
    let launcher: Option<(&str, Vec<&str>)> = if cfg!(target_os = "macos") {
        Some(("open", Vec::new()))
    } else if cfg!(target_os = "linux") {
        Some(("xdg-open", Vec::new()))
    } else if cfg!(target_os = "windows") {
        Some(("cmd", vec!["/C", "start", ""]))
    } else {
        None
    };

    let Some((program, mut args)) = launcher else {
        return false;
    };
    args.push(url);

    std::process::Command::new(program)
        .args(args)
        .status()
        .is_ok_and(|status| status.success())
}

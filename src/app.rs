use std::time::SystemTime;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::api::GmailClient;
use crate::auth::AuthSession;
use crate::cli::{AuthCommand, Cli, Command};
use crate::config::Config;
use crate::error::AppResult;
use crate::ops::MailOps;
use crate::tools::{TOOL_NAMES, ToolDispatcher, ToolResponse};

pub async fn run(cli: Cli) -> AppResult<()> {
    let config = Config::resolve(cli.credentials, cli.token)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Auth(args) => auth(config, args.command).await,
    }
}

/// One tool call per input line: `{"name": ..., "arguments": {...}}`.
/// Requests are processed to completion in order; a malformed line yields
/// an error envelope, never a dead loop.
async fn serve(config: Config) -> AppResult<()> {
    config.validate()?;

    let session = AuthSession::new(config);
    let dispatcher = ToolDispatcher::new(MailOps::new(session, GmailClient::new()));
    tracing::info!("gmail tool server ready, {} tools registered", TOOL_NAMES.len());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ToolCallRequest>(line) {
            Ok(request) => {
                tracing::info!("dispatching tool call: {}", request.name);
                dispatcher.dispatch(&request.name, &request.arguments).await
            }
            Err(err) => ToolResponse::error(format!("malformed tool call: {err}")),
        };

        let mut payload = serde_json::to_string(&response)?;
        payload.push('\n');
        stdout.write_all(payload.as_bytes()).await?;
        stdout.flush().await?;
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ToolCallRequest {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

async fn auth(config: Config, command: AuthCommand) -> AppResult<()> {
    let session = AuthSession::new(config);

    match command {
        AuthCommand::Login => {
            session.config().validate()?;
            session.login().await?;
            println!(
                "authorization complete; token stored at {}",
                session.config().token_path.display()
            );
        }
        AuthCommand::Status => match session.stored_token()? {
            None => println!("logged out (no stored token)"),
            Some(token) => {
                let now = SystemTime::now();
                let refresh = if token.has_refresh_token() {
                    "refresh available"
                } else {
                    "no refresh token"
                };
                let state = if !token.is_valid(now) {
                    "unusable"
                } else if token.is_expired(now) {
                    "expired, renewable"
                } else {
                    "valid"
                };
                println!(
                    "logged in ({state}, {refresh}, {} scopes granted)",
                    token.scopes().len()
                );
            }
        },
        AuthCommand::Logout => {
            let note = session.invalidate().await?;
            println!("{}", note.unwrap_or_else(|| "no stored token".to_string()));
        }
    }

    Ok(())
}

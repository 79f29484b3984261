use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "gmail-mcp", version, about = "Gmail tool server over stdio")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        help = "Path to the oauth client credentials file (overrides GMAIL_CREDENTIALS_FILE)"
    )]
    pub credentials: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Path to the token artifact (overrides GMAIL_TOKEN_FILE)"
    )]
    pub token: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve tool calls over stdio (the default)
    Serve,
    /// Manage the stored oauth credential
    Auth(AuthArgs),
}

#[derive(Debug, Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Run the interactive consent flow and store the token
    Login,
    /// Show whether a usable token is stored
    Status,
    /// Revoke and remove the stored token
    Logout,
}

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Stdout carries the tool protocol; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = gmail_mcp::cli::Cli::parse();

    if let Err(err) = gmail_mcp::run(cli).await {
        tracing::error!("fatal: {err}");
        std::process::exit(1);
    }
}

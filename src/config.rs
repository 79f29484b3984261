use std::env;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

const APP_DIR: &str = "gmail-mcp";
const DEFAULT_QUERY: &str = "in:inbox";
const DEFAULT_MAX_RESULTS: u32 = 50;

/// Runtime configuration for the tool server.
///
/// Paths resolve in order: explicit override (CLI flag), environment
/// variable, then a default under the platform config/data directories.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub default_query: String,
    pub default_max_results: u32,
}

impl Config {
    pub fn resolve(
        credentials_override: Option<PathBuf>,
        token_override: Option<PathBuf>,
    ) -> AppResult<Self> {
        let credentials_path = match credentials_override.or_else(|| env_path("GMAIL_CREDENTIALS_FILE")) {
            Some(path) => path,
            None => default_config_dir()?.join("credentials.json"),
        };

        let token_path = match token_override.or_else(|| env_path("GMAIL_TOKEN_FILE")) {
            Some(path) => path,
            None => default_data_dir()?.join("token.json"),
        };

        let default_query = env::var("GMAIL_DEFAULT_QUERY")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_QUERY.to_string());

        let default_max_results = match env::var("GMAIL_DEFAULT_MAX_RESULTS") {
            Ok(raw) => raw.trim().parse::<u32>().map_err(|_| {
                AppError::Config(format!("GMAIL_DEFAULT_MAX_RESULTS is not a number: {raw}"))
            })?,
            Err(_) => DEFAULT_MAX_RESULTS,
        };

        if default_max_results == 0 {
            return Err(AppError::Config(
                "GMAIL_DEFAULT_MAX_RESULTS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            credentials_path,
            token_path,
            default_query,
            default_max_results,
        })
    }

    /// The client-secret artifact is supplied by the operator, never written
    /// by this server. Without it the consent flow cannot start.
    pub fn validate(&self) -> AppResult<()> {
        if !self.credentials_path.exists() {
            return Err(AppError::Config(format!(
                "gmail credentials file not found: {}. download oauth client credentials \
                 (desktop application) from google cloud console and save them there",
                self.credentials_path.display()
            )));
        }

        Ok(())
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn default_config_dir() -> AppResult<PathBuf> {
    let root = dirs::config_dir()
        .ok_or_else(|| AppError::Config("unable to resolve config directory".to_string()))?;
    Ok(root.join(APP_DIR))
}

fn default_data_dir() -> AppResult<PathBuf> {
    let root = dirs::data_dir()
        .ok_or_else(|| AppError::Config("unable to resolve data directory".to_string()))?;
    Ok(root.join(APP_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_overrides_win() {
        let config = Config::resolve(
            Some(PathBuf::from("/tmp/creds.json")),
            Some(PathBuf::from("/tmp/token.json")),
        )
        .expect("config should resolve");

        assert_eq!(config.credentials_path, PathBuf::from("/tmp/creds.json"));
        assert_eq!(config.token_path, PathBuf::from("/tmp/token.json"));
    }

    #[test]
    fn applies_builtin_defaults() {
        let config = Config::resolve(
            Some(PathBuf::from("/tmp/creds.json")),
            Some(PathBuf::from("/tmp/token.json")),
        )
        .expect("config should resolve");

        assert_eq!(config.default_query, "in:inbox");
        assert_eq!(config.default_max_results, 50);
    }

    #[test]
    fn missing_credentials_file_is_a_config_error() {
        let config = Config {
            credentials_path: PathBuf::from("/nonexistent/credentials.json"),
            token_path: PathBuf::from("/tmp/token.json"),
            default_query: "in:inbox".to_string(),
            default_max_results: 50,
        };

        match config.validate() {
            Err(AppError::Config(message)) => {
                assert!(message.contains("credentials file not found"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }
}

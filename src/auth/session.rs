use std::time::SystemTime;

use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::AppResult;

use super::oauth::{self, ClientSecrets};
use super::token::TokenSet;
use super::token_store::{FileTokenStore, TokenStore};

/// The interactive exchanges a credential renewal can need. Split out so
/// the renewal ladder can be exercised without Google's endpoints.
#[allow(async_fn_in_trait)]
pub trait TokenExchanger {
    async fn refresh(&self, config: &Config, refresh_token: &str) -> AppResult<TokenSet>;
    async fn consent(&self, config: &Config) -> AppResult<TokenSet>;
    async fn revoke(&self, token: &str) -> AppResult<()>;
}

/// Production exchanger backed by Google's OAuth endpoints.
#[derive(Debug, Default)]
pub struct GoogleOAuth;

impl TokenExchanger for GoogleOAuth {
    async fn refresh(&self, config: &Config, refresh_token: &str) -> AppResult<TokenSet> {
        let secrets = ClientSecrets::load(&config.credentials_path)?;
        oauth::refresh_access_token(&secrets, refresh_token).await
    }

    async fn consent(&self, config: &Config) -> AppResult<TokenSet> {
        let secrets = ClientSecrets::load(&config.credentials_path)?;
        oauth::run_consent_flow(&secrets).await
    }

    async fn revoke(&self, token: &str) -> AppResult<()> {
        oauth::revoke_token(token).await
    }
}

/// Produces a fresh access token for outbound Gmail calls.
///
/// The in-memory credential sits behind a mutex so overlapping requests
/// await a single refresh or consent flow instead of running their own.
#[derive(Debug)]
pub struct AuthSession<S = FileTokenStore, X = GoogleOAuth> {
    config: Config,
    store: S,
    oauth: X,
    cached: Mutex<Option<TokenSet>>,
}

impl AuthSession {
    pub fn new(config: Config) -> Self {
        let store = FileTokenStore::new(config.token_path.clone());
        Self::with_parts(config, store, GoogleOAuth)
    }
}

impl<S: TokenStore, X: TokenExchanger> AuthSession<S, X> {
    pub fn with_parts(config: Config, store: S, oauth: X) -> Self {
        Self {
            config,
            store,
            oauth,
            cached: Mutex::new(None),
        }
    }

    /// Return a fresh access token, refreshing or running the consent flow
    /// as needed. A renewed credential is persisted before being handed out.
    pub async fn access_token(&self) -> AppResult<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(SystemTime::now()) {
                return Ok(token.access_token.clone());
            }
        }

        let stored = match cached.take() {
            Some(token) => Some(token),
            None => self.store.load()?,
        };

        let token = self.renew(stored).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn renew(&self, current: Option<TokenSet>) -> AppResult<TokenSet> {
        if let Some(token) = current {
            if token.is_fresh(SystemTime::now()) {
                return Ok(token);
            }

            if let Some(refresh_token) = token.refresh_token.clone() {
                match self.oauth.refresh(&self.config, &refresh_token).await {
                    Ok(refreshed) => {
                        self.store.save(&refreshed)?;
                        tracing::info!("refreshed gmail access token");
                        return Ok(refreshed);
                    }
                    Err(err) => {
                        tracing::warn!("token refresh failed, falling back to consent flow: {err}");
                    }
                }
            }
        }

        let token = self.oauth.consent(&self.config).await?;
        self.store.save(&token)?;
        tracing::info!("completed gmail consent flow and stored token");
        Ok(token)
    }

    /// Interactive setup entry point: forces a fresh consent flow even when
    /// a valid token exists, then persists the result.
    pub async fn login(&self) -> AppResult<TokenSet> {
        let token = self.oauth.consent(&self.config).await?;
        self.store.save(&token)?;

        let mut cached = self.cached.lock().await;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Revoke the credential remotely (best effort) and drop local state.
    pub async fn invalidate(&self) -> AppResult<Option<String>> {
        let mut cached = self.cached.lock().await;
        *cached = None;

        let Some(token) = self.store.load()? else {
            return Ok(None);
        };

        let target = token
            .refresh_token
            .as_deref()
            .unwrap_or(token.access_token.as_str());
        let note = match self.oauth.revoke(target).await {
            Ok(()) => "remote token revoked and local credentials removed".to_string(),
            Err(err) => format!("local credentials removed (revoke failed: {err})"),
        };

        self.store.clear()?;
        Ok(Some(note))
    }

    pub fn stored_token(&self) -> AppResult<Option<TokenSet>> {
        self.store.load()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;
    use std::time::UNIX_EPOCH;

    use crate::error::AppError;

    use super::*;

    fn config() -> Config {
        Config {
            credentials_path: PathBuf::from("/tmp/credentials.json"),
            token_path: PathBuf::from("/tmp/token.json"),
            default_query: "in:inbox".to_string(),
            default_max_results: 50,
        }
    }

    fn unix_now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock after epoch")
            .as_secs()
    }

    fn token(access: &str, expires_at_unix: Option<u64>, refresh: Option<&str>) -> TokenSet {
        TokenSet {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_owned),
            expires_at_unix,
            token_type: Some("Bearer".to_string()),
            scope: None,
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        initial: Option<TokenSet>,
        saved: StdMutex<Vec<TokenSet>>,
    }

    impl TokenStore for MemoryStore {
        fn load(&self) -> AppResult<Option<TokenSet>> {
            Ok(self.initial.clone())
        }

        fn save(&self, token: &TokenSet) -> AppResult<()> {
            self.saved.lock().expect("saved lock").push(token.clone());
            Ok(())
        }

        fn clear(&self) -> AppResult<()> {
            Ok(())
        }
    }

    struct ScriptedExchanger {
        refresh_result: Option<TokenSet>,
        consent_result: Option<TokenSet>,
        calls: StdMutex<Vec<&'static str>>,
    }

    impl ScriptedExchanger {
        fn new(refresh_result: Option<TokenSet>, consent_result: Option<TokenSet>) -> Self {
            Self {
                refresh_result,
                consent_result,
                calls: StdMutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    impl TokenExchanger for ScriptedExchanger {
        async fn refresh(&self, _config: &Config, _refresh_token: &str) -> AppResult<TokenSet> {
            self.calls.lock().expect("calls lock").push("refresh");
            self.refresh_result
                .clone()
                .ok_or_else(|| AppError::Auth("refresh rejected".to_string()))
        }

        async fn consent(&self, _config: &Config) -> AppResult<TokenSet> {
            self.calls.lock().expect("calls lock").push("consent");
            self.consent_result
                .clone()
                .ok_or_else(|| AppError::Auth("consent rejected".to_string()))
        }

        async fn revoke(&self, _token: &str) -> AppResult<()> {
            self.calls.lock().expect("calls lock").push("revoke");
            Ok(())
        }
    }

    fn session(
        stored: Option<TokenSet>,
        exchanger: ScriptedExchanger,
    ) -> AuthSession<MemoryStore, ScriptedExchanger> {
        let store = MemoryStore {
            initial: stored,
            ..MemoryStore::default()
        };
        AuthSession::with_parts(config(), store, exchanger)
    }

    #[tokio::test]
    async fn fresh_stored_token_is_handed_out_unchanged() {
        let stored = token("live", Some(unix_now() + 3600), None);
        let session = session(Some(stored), ScriptedExchanger::new(None, None));

        let access = session.access_token().await.expect("access token");
        assert_eq!(access, "live");
        assert!(session.oauth.calls().is_empty());
        assert!(session.store.saved.lock().expect("saved lock").is_empty());
    }

    #[tokio::test]
    async fn expired_with_refresh_token_refreshes_and_persists_before_return() {
        let stored = token("stale", Some(unix_now() - 10), Some("1//r"));
        let renewed = token("renewed", Some(unix_now() + 3600), Some("1//r"));
        let session = session(Some(stored), ScriptedExchanger::new(Some(renewed), None));

        let access = session.access_token().await.expect("access token");
        assert_eq!(access, "renewed");
        assert_eq!(session.oauth.calls(), vec!["refresh"]);

        let saved = session.store.saved.lock().expect("saved lock");
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].access_token, "renewed");
    }

    #[tokio::test]
    async fn expired_without_refresh_token_goes_straight_to_consent() {
        let stored = token("stale", Some(unix_now() - 10), None);
        let granted = token("granted", Some(unix_now() + 3600), Some("1//new"));
        let session = session(Some(stored), ScriptedExchanger::new(None, Some(granted)));

        let access = session.access_token().await.expect("access token");
        assert_eq!(access, "granted");
        assert_eq!(session.oauth.calls(), vec!["consent"]);
        assert_eq!(session.store.saved.lock().expect("saved lock").len(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_consent() {
        let stored = token("stale", Some(unix_now() - 10), Some("1//dead"));
        let granted = token("granted", Some(unix_now() + 3600), Some("1//new"));
        let session = session(Some(stored), ScriptedExchanger::new(None, Some(granted)));

        let access = session.access_token().await.expect("access token");
        assert_eq!(access, "granted");
        assert_eq!(session.oauth.calls(), vec!["refresh", "consent"]);
    }

    #[tokio::test]
    async fn empty_access_token_is_never_handed_out() {
        let stored = token("", Some(unix_now() + 3600), None);
        let granted = token("granted", Some(unix_now() + 3600), None);
        let session = session(Some(stored), ScriptedExchanger::new(None, Some(granted)));

        let access = session.access_token().await.expect("access token");
        assert_eq!(access, "granted");
        assert_eq!(session.oauth.calls(), vec!["consent"]);
    }

    #[tokio::test]
    async fn renewed_token_is_cached_for_subsequent_calls() {
        let stored = token("stale", Some(unix_now() - 10), Some("1//r"));
        let renewed = token("renewed", Some(unix_now() + 3600), Some("1//r"));
        let session = session(Some(stored), ScriptedExchanger::new(Some(renewed), None));

        session.access_token().await.expect("first call");
        let access = session.access_token().await.expect("second call");

        assert_eq!(access, "renewed");
        assert_eq!(session.oauth.calls(), vec!["refresh"]);
    }

    #[tokio::test]
    async fn no_stored_token_runs_the_consent_flow() {
        let granted = token("granted", Some(unix_now() + 3600), Some("1//new"));
        let session = session(None, ScriptedExchanger::new(None, Some(granted)));

        let access = session.access_token().await.expect("access token");
        assert_eq!(access, "granted");
        assert_eq!(session.oauth.calls(), vec!["consent"]);
    }
}

use super::types::TokenResponse;
use crate::config::BrokerConfig;
use crate::errors::{WheelError, WheelResult};
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Tokens expiring within this window are refreshed before use.
const EXPIRY_SKEW_SECS: i64 = 60;
/// Access-token lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 1800;

/// Supplies a bearer token for each brokerage request.
pub trait TokenProvider: Send + Sync {
    fn get_access_token(&self) -> impl Future<Output = WheelResult<String>> + Send;
}

/// Fixed token, e.g. from `BROKER_ACCESS_TOKEN`.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl TokenProvider for StaticTokenProvider {
    async fn get_access_token(&self) -> WheelResult<String> {
        if self.token.is_empty() {
            return Err(WheelError::Auth("empty access token".into()));
        }
        Ok(self.token.clone())
    }
}

/// Token pair as persisted on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredTokens {
    #[inline]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now > Duration::seconds(EXPIRY_SKEW_SECS)
    }
}

/// JSON token file. Writes go to a sibling temp file and are renamed into place;
/// on Unix the file is readable by the owner only.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// None when no token file exists yet.
    pub async fn load(&self) -> WheelResult<Option<StoredTokens>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WheelError::Storage(format!("read {}: {e}", self.path.display()))),
        }
    }

    pub async fn save(&self, tokens: &StoredTokens) -> WheelResult<()> {
        let raw = serde_json::to_string_pretty(tokens)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, raw).await?;
        // Owner-only: the file holds a long-lived refresh token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// OAuth2 authorization-code manager: exchanges the one-time code, refreshes
/// near expiry, and keeps the current pair cached in memory and on disk.
#[derive(Clone)]
pub struct OAuthTokenManager {
    http: Client,
    config: BrokerConfig,
    store: TokenStore,
    cached: Arc<Mutex<Option<StoredTokens>>>,
}

impl OAuthTokenManager {
    pub fn new(config: BrokerConfig) -> WheelResult<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        let store = TokenStore::new(config.token_path.clone());
        Ok(Self {
            http,
            config,
            store,
            cached: Arc::new(Mutex::new(None)),
        })
    }

    /// URL the user opens to grant access; the redirect carries `code`.
    pub fn authorization_url(&self) -> WheelResult<String> {
        let url = reqwest::Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ],
        )
        .map_err(|e| WheelError::Config(format!("BROKER_AUTH_URL {}: {e}", self.config.auth_url)))?;
        Ok(url.into())
    }

    fn basic_auth_header(&self) -> String {
        let raw = format!("{}:{}", self.config.client_id, self.config.client_secret);
        format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(raw))
    }

    /// Trades an authorization code for a fresh token pair and persists it.
    pub async fn exchange_code(&self, code: &str) -> WheelResult<StoredTokens> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        let resp = self.post_token(&form).await?;
        let tokens = stored_from_response(resp, None, Utc::now())?;

        self.store.save(&tokens).await?;
        *self.cached.lock().await = Some(tokens.clone());
        tracing::info!(path = %self.store.path().display(), "authorization code exchanged");
        Ok(tokens)
    }

    /// Refreshes using the stored refresh token.
    pub async fn refresh(&self) -> WheelResult<StoredTokens> {
        let mut guard = self.cached.lock().await;
        self.refresh_locked(&mut guard).await
    }

    async fn refresh_locked(&self, cached: &mut Option<StoredTokens>) -> WheelResult<StoredTokens> {
        let current = match cached.clone() {
            Some(t) => t,
            None => self.store.load().await?.ok_or_else(not_authenticated)?,
        };

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", current.refresh_token.as_str()),
        ];
        let resp = self.post_token(&form).await?;
        let tokens = stored_from_response(resp, Some(&current.refresh_token), Utc::now())?;

        self.store.save(&tokens).await?;
        *cached = Some(tokens.clone());
        tracing::info!(expires_at = %tokens.expires_at, "access token refreshed");
        Ok(tokens)
    }

    async fn post_token(&self, form: &[(&str, &str)]) -> WheelResult<TokenResponse> {
        let resp = self
            .http
            .post(&self.config.token_url)
            .header("Authorization", self.basic_auth_header())
            .form(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WheelError::Auth(format!("token endpoint returned {status}: {body}")));
        }

        resp.json::<TokenResponse>()
            .await
            .map_err(|e| WheelError::Parse(format!("token response: {e}")))
    }
}

impl TokenProvider for OAuthTokenManager {
    async fn get_access_token(&self) -> WheelResult<String> {
        let mut guard = self.cached.lock().await;
        if guard.is_none() {
            *guard = self.store.load().await?;
        }

        let fresh = guard
            .as_ref()
            .filter(|t| t.is_fresh(Utc::now()))
            .map(|t| t.access_token.clone());
        if let Some(token) = fresh {
            return Ok(token);
        }
        if guard.is_none() {
            return Err(not_authenticated());
        }

        tracing::debug!("access token near expiry, refreshing");
        Ok(self.refresh_locked(&mut guard).await?.access_token)
    }
}

fn not_authenticated() -> WheelError {
    WheelError::Auth("not authenticated: run `wheelhouse auth-url` then `wheelhouse exchange-code`".into())
}

/// Some token endpoints omit the refresh token on refresh; keep the previous one then.
fn stored_from_response(
    resp: TokenResponse,
    previous_refresh: Option<&str>,
    now: DateTime<Utc>,
) -> WheelResult<StoredTokens> {
    let refresh_token = resp
        .refresh_token
        .or_else(|| previous_refresh.map(str::to_string))
        .ok_or_else(|| WheelError::Auth("token response carried no refresh token".into()))?;
    let expires_in = resp.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);

    Ok(StoredTokens {
        access_token: resp.access_token,
        refresh_token,
        expires_at: now + Duration::seconds(expires_in),
    })
}

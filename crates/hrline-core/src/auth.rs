//! OAuth2 client-credentials token manager
//!
//! Caches one bearer token per pipeline run:
//! - Token requested with HTTP Basic client credentials
//! - Token and expiry read from configurable JSON paths
//! - Served until `expiry - safety_margin`, then refreshed
//! - Refresh is single-flight: concurrent callers wait on one request

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::PipelineError;
use crate::http::Transport;
use crate::json_path::{self, Numeric};

/// Longest token-endpoint body echoed back in an auth error
const ERROR_BODY_LEN: usize = 200;

/// Where and how to obtain tokens
#[derive(Clone)]
pub struct TokenConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Dot-path of the access token in the token response
    pub token_path: String,
    /// Dot-path of the lifetime in seconds in the token response
    pub expires_in_path: String,
    /// Lifetime assumed when the response carries none
    pub default_expiration: Duration,
    /// Tokens are considered stale this long before they actually expire
    pub safety_margin: Duration,
}

impl TokenConfig {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_path: "data.token".to_string(),
            expires_in_path: "data.expires_in".to_string(),
            default_expiration: Duration::from_secs(86_400),
            safety_margin: Duration::from_secs(60),
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("token_path", &self.token_path)
            .field("expires_in_path", &self.expires_in_path)
            .field("default_expiration", &self.default_expiration)
            .field("safety_margin", &self.safety_margin)
            .finish_non_exhaustive()
    }
}

/// Cached token status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Absent,
    Valid,
    Stale,
}

struct TokenState {
    access_token: String,
    /// `fetched_at + expires_in - safety_margin`
    valid_until: Instant,
}

impl TokenState {
    fn is_valid(&self, now: Instant) -> bool {
        now < self.valid_until
    }
}

/// Bearer token provider shared by all extraction workers.
///
/// The mutex is held across the refresh request, which is what gives the
/// single-flight behavior: the first caller that finds the token stale
/// refreshes it, everyone queued behind it sees the fresh token.
pub struct TokenManager {
    transport: Arc<dyn Transport>,
    config: TokenConfig,
    state: Mutex<Option<TokenState>>,
}

impl TokenManager {
    pub fn new(transport: Arc<dyn Transport>, config: TokenConfig) -> Self {
        Self {
            transport,
            config,
            state: Mutex::new(None),
        }
    }

    /// Return a valid token, refreshing it first if absent or stale.
    ///
    /// # Errors
    /// [`PipelineError::Auth`] if the token endpoint fails or its response
    /// carries no usable token.
    pub fn get_token(&self) -> Result<String, PipelineError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = state.as_ref() {
            if current.is_valid(Instant::now()) {
                return Ok(current.access_token.clone());
            }
            log::debug!("Access token stale, refreshing");
        }

        let fresh = self.request_token()?;
        let token = fresh.access_token.clone();
        *state = Some(fresh);
        Ok(token)
    }

    pub fn status(&self) -> TokenStatus {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.as_ref() {
            None => TokenStatus::Absent,
            Some(s) if s.is_valid(Instant::now()) => TokenStatus::Valid,
            Some(_) => TokenStatus::Stale,
        }
    }

    /// Drop the cached token so the next call refreshes (e.g. after a 401)
    pub fn invalidate(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn request_token(&self) -> Result<TokenState, PipelineError> {
        let cfg = &self.config;
        log::debug!("Requesting access token from {}", cfg.token_url);
        let fetched_at = Instant::now();

        let resp = self
            .transport
            .post_form_basic(
                &cfg.token_url,
                &cfg.client_id,
                &cfg.client_secret,
                &[("grant_type", "client_credentials")],
            )
            .map_err(|e| PipelineError::Auth(format!("token request failed: {e}")))?;

        if !resp.is_success() {
            return Err(PipelineError::Auth(format!(
                "token endpoint returned HTTP {}: {}",
                resp.status,
                snippet(&resp.body)
            )));
        }

        let json: Value = serde_json::from_str(&resp.body)
            .map_err(|e| PipelineError::Auth(format!("token response is not JSON: {e}")))?;

        let access_token = json_path::select(&json, &cfg.token_path)
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                PipelineError::Auth(format!(
                    "no token at `{}` in token response: {}",
                    cfg.token_path,
                    snippet(&resp.body)
                ))
            })?
            .to_string();

        let expires_in = match json_path::select_u64(&json, &cfg.expires_in_path) {
            Numeric::Value(secs) => Duration::from_secs(secs),
            Numeric::Missing => {
                log::debug!(
                    "No expiry at `{}`, assuming {}s",
                    cfg.expires_in_path,
                    cfg.default_expiration.as_secs()
                );
                cfg.default_expiration
            }
            Numeric::Invalid(raw) => {
                return Err(PipelineError::Auth(format!(
                    "expiry at `{}` is not a number of seconds: {raw}",
                    cfg.expires_in_path
                )));
            }
        };

        log::info!("Obtained access token (expires in {}s)", expires_in.as_secs());
        Ok(TokenState {
            access_token,
            valid_until: fetched_at + expires_in.saturating_sub(cfg.safety_margin),
        })
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(ERROR_BODY_LEN).collect()
}

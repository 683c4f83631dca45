//! Credential strategies the engine runs against every outbound request.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use super::constants::{TOKEN_EXPIRY_SKEW, TOKEN_REQUEST_TIMEOUT};
use crate::core::error::ScholiaError;

/// Policy that stamps credentials onto an outbound request.
///
/// Strategies are held behind `Arc` by the engine and invoked for every
/// attempt, so implementations must be safe under concurrent use. `apply`
/// may perform I/O (e.g. a token fetch) and fails with
/// [`ScholiaError::Auth`] or [`ScholiaError::Config`].
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    async fn apply(&self, request: &mut reqwest::Request) -> Result<(), ScholiaError>;
}

/// No authentication; leaves the request untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuth;

#[async_trait]
impl AuthStrategy for NoAuth {
    async fn apply(&self, _request: &mut reqwest::Request) -> Result<(), ScholiaError> {
        Ok(())
    }
}

/// Static pre-issued token sent as `Authorization: Bearer <token>`.
pub struct BearerAuth {
    token: String,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Result<Self, ScholiaError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ScholiaError::Config(
                "bearer authentication requires a non-empty token".into(),
            ));
        }
        Ok(Self { token })
    }

    /// Build from optional caller-provided configuration.
    pub fn from_config(token: Option<String>) -> Result<Self, ScholiaError> {
        match token {
            Some(token) => Self::new(token),
            None => Err(ScholiaError::Config("no API token configured".into())),
        }
    }
}

impl fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuth").field("token", &"<redacted>").finish()
    }
}

#[async_trait]
impl AuthStrategy for BearerAuth {
    async fn apply(&self, request: &mut reqwest::Request) -> Result<(), ScholiaError> {
        request
            .headers_mut()
            .insert(AUTHORIZATION, bearer_value(&self.token)?);
        Ok(())
    }
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_stale(&self) -> bool {
        Instant::now() + TOKEN_EXPIRY_SKEW >= self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenGrant {
    access_token: String,
    expires_in: u64,
}

/// OAuth2 client-credentials grant with cached-token refresh.
///
/// `apply` reuses the cached token until it is within the expiry skew, then
/// refreshes via a form-encoded POST against the token endpoint with HTTP
/// Basic authentication. Refreshes are serialized: concurrent callers wait
/// on the in-flight fetch and reuse its token.
pub struct ClientCredentialsAuth {
    client_id: String,
    client_secret: String,
    token_url: Url,
    http: reqwest::Client,
    token: RwLock<Option<CachedToken>>,
    refresh_lock: Mutex<()>,
}

impl ClientCredentialsAuth {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_url: Url,
    ) -> Result<Self, ScholiaError> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(ScholiaError::Config(
                "client-credentials authentication requires a client id and secret".into(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                ScholiaError::Config(format!("failed to build token-endpoint transport: {e}"))
            })?;

        Ok(Self {
            client_id,
            client_secret,
            token_url,
            http,
            token: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    async fn current_token(&self) -> Result<String, ScholiaError> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref()
                && !token.is_stale()
            {
                return Ok(token.access_token.clone());
            }
        }

        let _refresh = self.refresh_lock.lock().await;

        // A concurrent caller may have refreshed while we waited.
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref()
                && !token.is_stale()
            {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let access_token = fresh.access_token.clone();
        *self.token.write().await = Some(fresh);
        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<CachedToken, ScholiaError> {
        tracing::info!(url = %self.token_url, "fetching new access token");

        let auth_err = |message: String| ScholiaError::Auth {
            message,
            method: Some("POST".into()),
            url: Some(self.token_url.to_string()),
        };

        let response = self
            .http
            .post(self.token_url.clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| auth_err(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(auth_err(format!(
                "token endpoint returned status {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }

        let grant: TokenGrant = response
            .json()
            .await
            .map_err(|e| auth_err(format!("token response was not the expected JSON: {e}")))?;

        tracing::debug!(expires_in = grant.expires_in, "access token refreshed");
        Ok(CachedToken {
            access_token: grant.access_token,
            expires_at: Instant::now() + Duration::from_secs(grant.expires_in),
        })
    }
}

impl fmt::Debug for ClientCredentialsAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentialsAuth")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url.as_str())
            .finish()
    }
}

#[async_trait]
impl AuthStrategy for ClientCredentialsAuth {
    async fn apply(&self, request: &mut reqwest::Request) -> Result<(), ScholiaError> {
        let token = self.current_token().await?;
        request
            .headers_mut()
            .insert(AUTHORIZATION, bearer_value(&token)?);
        Ok(())
    }
}

fn bearer_value(token: &str) -> Result<HeaderValue, ScholiaError> {
    let mut value = HeaderValue::try_from(format!("Bearer {token}")).map_err(|_| {
        ScholiaError::Config("token contains characters not permitted in a header".into())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

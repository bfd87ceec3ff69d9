use super::CredentialVault;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

/// Seconds before expiry at which a cached token is considered stale.
const SAFETY_MARGIN_SECS: i64 = 60;

/// Supplies bearer tokens for a provider.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> AppResult<String>;
}

/// Wall clock, swappable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Cached bearer token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(SAFETY_MARGIN_SECS) < self.expires_at
    }
}

/// Long-lived token stored as an encrypted parameter.
pub struct StaticTokenSource {
    vault: Arc<CredentialVault>,
    parameter_id: String,
    token: OnceCell<String>,
}

impl StaticTokenSource {
    pub fn new(vault: Arc<CredentialVault>, parameter_id: String) -> Self {
        Self {
            vault,
            parameter_id,
            token: OnceCell::new(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> AppResult<String> {
        let token = self
            .token
            .get_or_try_init(|| async {
                match self.vault.decrypted_parameter(&self.parameter_id).await? {
                    Some(token) if !token.is_empty() => Ok(token),
                    _ => {
                        warn!(parameter_id = %self.parameter_id, "Token parameter not found or empty");
                        Err(AppError::CredentialUnavailable(format!(
                            "Token parameter '{}' not available",
                            self.parameter_id
                        )))
                    }
                }
            })
            .await?;
        Ok(token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: i64,
}

/// OAuth2 client-credentials token cache.
///
/// The cache check, token exchange and store happen under one lock, so
/// callers that arrive during a refresh wait for it instead of starting
/// their own exchange.
pub struct OAuthTokenSource {
    client: Client,
    token_url: String,
    vault: Arc<CredentialVault>,
    credentials_param: String,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<AccessToken>>,
}

impl OAuthTokenSource {
    pub fn new(
        client: Client,
        token_url: String,
        vault: Arc<CredentialVault>,
        credentials_param: String,
    ) -> Self {
        Self::with_clock(client, token_url, vault, credentials_param, Arc::new(SystemClock))
    }

    pub fn with_clock(
        client: Client,
        token_url: String,
        vault: Arc<CredentialVault>,
        credentials_param: String,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            token_url,
            vault,
            credentials_param,
            clock,
            cached: Mutex::new(None),
        }
    }

    /// Exchange client credentials at the token endpoint.
    async fn exchange(&self) -> AppResult<AccessToken> {
        let credentials = self.vault.client_credentials(&self.credentials_param).await?;

        debug!("Requesting client-credentials token from: {}", self.token_url);

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", credentials.key.as_str()),
                ("client_secret", credentials.secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::TokenAcquisition { status, body });
        }

        let token: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to parse token response: {}", e)))?;

        let expires_at = Duration::try_seconds(token.expires_in)
            .and_then(|lifetime| self.clock.now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                AppError::ExternalService(format!(
                    "Token endpoint returned an out-of-range expires_in: {}",
                    token.expires_in
                ))
            })?;

        Ok(AccessToken {
            value: token.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl TokenSource for OAuthTokenSource {
    async fn access_token(&self) -> AppResult<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(self.clock.now()) {
                return Ok(token.value.clone());
            }
            debug!(expires_at = %token.expires_at, "Cached token is stale, refreshing");
        }

        let token = self.exchange().await?;
        info!(expires_at = %token.expires_at, "Obtained new access token");
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

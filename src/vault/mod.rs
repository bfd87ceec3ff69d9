pub mod cipher;
pub mod token;

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::env;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

pub use token::{OAuthTokenSource, StaticTokenSource, TokenSource};

/// Read access to named secrets (AES key, provider secrets).
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn secret_value(&self, name: &str) -> AppResult<Option<String>>;
}

/// Read access to stored (encrypted) parameter records.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn parameter_value(&self, parameter_id: &str) -> AppResult<Option<String>>;
}

/// Secret store backed by process environment variables.
///
/// A secret path such as `/titvo/aes-key` maps to `TITVO_AES_KEY`.
#[derive(Debug, Default)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    fn variable_name(name: &str) -> String {
        name.trim_matches('/')
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect()
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn secret_value(&self, name: &str) -> AppResult<Option<String>> {
        Ok(env::var(Self::variable_name(name)).ok())
    }
}

/// OAuth client id/secret pair as stored in the parameter table.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientCredentials {
    pub key: String,
    pub secret: String,
}

/// Resolves and decrypts stored credentials.
///
/// The AES key is loaded from the secret store on first use and kept for the
/// lifetime of the process. It is never written anywhere.
pub struct CredentialVault {
    parameters: Arc<dyn ParameterStore>,
    secrets: Arc<dyn SecretStore>,
    aes_key_path: String,
    aes_key: OnceCell<Vec<u8>>,
}

impl CredentialVault {
    pub fn new(
        parameters: Arc<dyn ParameterStore>,
        secrets: Arc<dyn SecretStore>,
        aes_key_path: String,
    ) -> Self {
        Self {
            parameters,
            secrets,
            aes_key_path,
            aes_key: OnceCell::new(),
        }
    }

    async fn key(&self) -> AppResult<&[u8]> {
        let key = self
            .aes_key
            .get_or_try_init(|| async {
                debug!(path = %self.aes_key_path, "Loading AES key from secret store");
                let raw = self
                    .secrets
                    .secret_value(&self.aes_key_path)
                    .await?
                    .ok_or_else(|| {
                        AppError::CredentialUnavailable(format!(
                            "AES key '{}' is not set",
                            self.aes_key_path
                        ))
                    })?;
                cipher::normalize_key(&raw)
            })
            .await?;
        Ok(key.as_slice())
    }

    /// Decrypt a base64 AES-256-ECB ciphertext.
    pub async fn decrypt(&self, ciphertext_b64: &str) -> AppResult<String> {
        let key = self.key().await?;
        cipher::decrypt_ecb(key, ciphertext_b64)
    }

    /// Fetch a parameter and decrypt it. `None` when the record is absent.
    pub async fn decrypted_parameter(&self, parameter_id: &str) -> AppResult<Option<String>> {
        debug!(parameter_id, "Resolving encrypted parameter");
        match self.parameters.parameter_value(parameter_id).await? {
            Some(ciphertext) => Ok(Some(self.decrypt(&ciphertext).await?)),
            None => Ok(None),
        }
    }

    /// Fetch and decode a `{key, secret}` credential pair.
    pub async fn client_credentials(&self, parameter_id: &str) -> AppResult<ClientCredentials> {
        let plaintext = self.decrypted_parameter(parameter_id).await?.ok_or_else(|| {
            AppError::CredentialUnavailable(format!("Parameter '{}' not found", parameter_id))
        })?;
        serde_json::from_str(&plaintext).map_err(|e| {
            AppError::CredentialUnavailable(format!(
                "Parameter '{}' is not a credential pair: {}",
                parameter_id, e
            ))
        })
    }
}

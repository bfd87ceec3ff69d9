use crate::error::{AppError, AppResult};
use crate::vault::ParameterStore;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// Client for the parameter service holding encrypted configuration values.
pub struct ParameterClient {
    client: Client,
    base_url: String,
    table_name: String,
    internal_api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParameterRecord {
    #[allow(dead_code)]
    parameter_id: String,
    value: Option<String>,
}

impl ParameterClient {
    /// Create with internal API key for S2S authentication.
    pub fn with_api_key(
        client: Client,
        base_url: String,
        table_name: String,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url,
            table_name,
            internal_api_key: api_key,
        }
    }
}

#[async_trait]
impl ParameterStore for ParameterClient {
    /// Get a raw (still encrypted) parameter value.
    /// Calls: GET {PARAMETER_SERVICE_URL}/parameters/{table}/{parameter_id}
    async fn parameter_value(&self, parameter_id: &str) -> AppResult<Option<String>> {
        let url = format!(
            "{}/parameters/{}/{}",
            self.base_url, self.table_name, parameter_id
        );

        debug!("Getting parameter value for {} on table {}", parameter_id, self.table_name);

        let mut request = self.client.get(&url);

        // Add internal API key if configured
        if let Some(ref api_key) = self.internal_api_key {
            request = request.header("X-Internal-Api-Key", api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Parameter service request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Parameter service returned {}: {}",
                status, body
            )));
        }

        let record: ParameterRecord = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to parse parameter record: {}", e)))?;

        Ok(record.value)
    }
}

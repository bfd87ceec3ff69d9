use crate::domain::models::OutcomeDetail;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const EVENT_SOURCE: &str = "mcp.tool.git.commit-files";
pub const EVENT_DETAIL_TYPE: &str = "output";

/// Entry put on the event bus.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEntry {
    pub source: String,
    pub detail_type: String,
    pub detail: OutcomeDetail,
    pub event_bus_name: String,
}

impl EventEntry {
    /// Build the outcome entry for a job.
    pub fn outcome(detail: OutcomeDetail, event_bus_name: &str) -> Self {
        Self {
            source: EVENT_SOURCE.to_string(),
            detail_type: EVENT_DETAIL_TYPE.to_string(),
            detail,
            event_bus_name: event_bus_name.to_string(),
        }
    }
}

/// Sink for outcome events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, entry: EventEntry) -> AppResult<()>;
}

/// Response from the event bus.
#[derive(Debug, Deserialize)]
pub struct PutEventsResponse {
    #[serde(default)]
    pub failed_entry_count: usize,
}

/// Client for the event bus ingestion endpoint.
pub struct EventBusClient {
    client: Client,
    base_url: String,
}

impl EventBusClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl EventPublisher for EventBusClient {
    /// Calls: POST {EVENT_BUS_URL}/events
    async fn publish(&self, entry: EventEntry) -> AppResult<()> {
        let url = format!("{}/events", self.base_url);

        debug!("Putting event for job {} on bus {}", entry.detail.job_id, entry.event_bus_name);

        let response = self
            .client
            .post(&url)
            .json(&[&entry])
            .send()
            .await
            .map_err(|e| AppError::EventEmission(format!("Event bus request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EventEmission(format!(
                "Event bus returned {}: {}",
                status, body
            )));
        }

        let put_response: PutEventsResponse = response
            .json()
            .await
            .map_err(|e| AppError::EventEmission(format!("Failed to parse event bus response: {}", e)))?;

        if put_response.failed_entry_count > 0 {
            return Err(AppError::EventEmission(format!(
                "Event bus rejected {} entries",
                put_response.failed_entry_count
            )));
        }

        info!("Event sent for job {}", entry.detail.job_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::OutcomeData;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry() -> EventEntry {
        EventEntry::outcome(
            OutcomeDetail {
                job_id: "job-1".to_string(),
                success: true,
                message: "ok".to_string(),
                data: OutcomeData {
                    commit_id: "abc".to_string(),
                    uploaded_files: vec!["abc/a.ts".to_string()],
                },
            },
            "titvo-bus",
        )
    }

    #[tokio::test]
    async fn posts_outcome_entry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "failed_entry_count": 0 })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = EventBusClient::new(Client::new(), server.uri());
        client.publish(entry()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body[0]["source"], "mcp.tool.git.commit-files");
        assert_eq!(body[0]["detailType"], "output");
        assert_eq!(body[0]["eventBusName"], "titvo-bus");
        assert!(body[0].get("detail_type").is_none());
        assert_eq!(body[0]["detail"]["job_id"], "job-1");
        assert_eq!(body[0]["detail"]["data"]["uploaded_files"][0], "abc/a.ts");
    }

    #[tokio::test]
    async fn rejected_entries_are_emission_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "failed_entry_count": 1 })),
            )
            .mount(&server)
            .await;

        let client = EventBusClient::new(Client::new(), server.uri());
        assert!(matches!(
            client.publish(entry()).await,
            Err(AppError::EventEmission(_))
        ));
    }
}

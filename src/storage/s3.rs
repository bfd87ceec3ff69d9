use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::storage::{content_type_for, ObjectSink};
use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// S3 bucket settings.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint; enables path-style addressing
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl S3Settings {
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let bucket = config.bucket_name.clone().ok_or_else(|| {
            AppError::Internal(
                "Configuration key S3_GIT_FILES_BUCKET_NAME is missing".to_string(),
            )
        })?;
        Ok(Self {
            bucket,
            region: config.aws_region.clone(),
            endpoint: config.aws_endpoint.clone(),
            access_key: config.aws_access_key_id.clone(),
            secret_key: config.aws_secret_access_key.clone(),
        })
    }
}

/// Object sink writing to an S3 (or S3-compatible) bucket.
#[derive(Clone, Debug)]
pub struct S3ObjectSink {
    bucket: Arc<Bucket>,
}

impl S3ObjectSink {
    #[instrument(skip(settings), fields(bucket = %settings.bucket))]
    pub fn new(settings: &S3Settings) -> AppResult<Self> {
        info!("Initializing S3 client");

        // Without explicit keys the environment/profile chain is used.
        let credentials = Credentials::new(
            settings.access_key.as_deref(),
            settings.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| {
            error!(error = %e, "Failed to create S3 credentials");
            AppError::Storage(format!("Failed to create credentials: {}", e))
        })?;

        let region = match &settings.endpoint {
            Some(endpoint) => Region::Custom {
                region: settings.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => settings
                .region
                .parse()
                .map_err(|e| AppError::Storage(format!("Invalid region '{}': {}", settings.region, e)))?,
        };

        let bucket = Bucket::new(&settings.bucket, region, credentials).map_err(|e| {
            error!(error = %e, "Failed to create S3 bucket handle");
            AppError::Storage(format!("Failed to create bucket: {}", e))
        })?;
        let bucket = if settings.endpoint.is_some() {
            bucket.with_path_style()
        } else {
            bucket
        };

        info!(bucket = %settings.bucket, "S3 client initialized");

        Ok(Self {
            bucket: Arc::from(bucket),
        })
    }
}

#[async_trait]
impl ObjectSink for S3ObjectSink {
    #[instrument(skip(self, data), fields(key = %key, size = data.len()))]
    async fn put_object(&self, key: &str, data: &[u8]) -> AppResult<()> {
        let content_type = content_type_for(key);
        debug!(key = %key, content_type = %content_type, "Uploading object");

        let response = self
            .bucket
            .put_object_with_content_type(key, data, &content_type)
            .await
            .map_err(|e| {
                error!(error = %e, key = %key, "Failed to upload object");
                AppError::Storage(format!("Failed to put object '{}': {}", key, e))
            })?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(AppError::Storage(format!(
                "Failed to put object '{}': status {}",
                key, status
            )));
        }

        debug!(key = %key, "Object stored successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(endpoint: String) -> S3Settings {
        S3Settings {
            bucket: "git-files".to_string(),
            region: "us-east-1".to_string(),
            endpoint: Some(endpoint),
            access_key: Some("test".to_string()),
            secret_key: Some("test".to_string()),
        }
    }

    #[test]
    fn missing_bucket_is_rejected() {
        let mut config = Config::from_env();
        config.bucket_name = None;
        assert!(S3Settings::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn puts_object_path_style() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/git-files/abc123/src/a.json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = S3ObjectSink::new(&settings(server.uri())).unwrap();
        sink.put_object("abc123/src/a.json", b"{}").await.unwrap();
        server.verify().await;
    }

    #[tokio::test]
    async fn error_status_is_storage_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sink = S3ObjectSink::new(&settings(server.uri())).unwrap();
        let result = sink.put_object("abc123/a.ts", b"x").await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }
}

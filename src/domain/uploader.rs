use crate::domain::connectors::RepoClient;
use crate::domain::models::FileRef;
use crate::error::{AppError, AppResult};
use crate::storage::ObjectSink;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Object key for a file of a commit.
pub fn object_key(commit_id: &str, path: &str) -> String {
    format!("{}/{}", commit_id, path)
}

/// Copies commit files from a repository into object storage with at most
/// `max_concurrency` transfers in flight.
///
/// A failed download or upload drops that file from the result and is never
/// retried; the returned keys keep the input order.
#[derive(Debug, Clone)]
pub struct BoundedUploader {
    max_concurrency: usize,
}

impl BoundedUploader {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub async fn run(
        &self,
        files: &[FileRef],
        commit_id: &str,
        client: &dyn RepoClient,
        sink: &dyn ObjectSink,
    ) -> AppResult<Vec<String>> {
        info!(
            max_concurrency = self.max_concurrency,
            "Starting parallel upload for {} files", files.len()
        );

        let gate = Semaphore::new(self.max_concurrency);

        let transfers = files.iter().map(|file| {
            let gate = &gate;
            async move {
                let _permit = gate
                    .acquire()
                    .await
                    .map_err(|e| AppError::Internal(format!("Upload gate closed: {}", e)))?;
                Ok::<_, AppError>(Self::transfer(file, commit_id, client, sink).await)
            }
        });

        // join_all yields results positionally, not in completion order.
        let results = join_all(transfers).await.into_iter().collect::<AppResult<Vec<_>>>()?;
        let uploaded: Vec<String> = results.into_iter().flatten().collect();

        info!(
            "Batch upload finished. {} out of {} files uploaded successfully.",
            uploaded.len(),
            files.len()
        );
        if uploaded.len() != files.len() {
            warn!("{} uploads failed.", files.len() - uploaded.len());
        }

        Ok(uploaded)
    }

    async fn transfer(
        file: &FileRef,
        commit_id: &str,
        client: &dyn RepoClient,
        sink: &dyn ObjectSink,
    ) -> Option<String> {
        let bytes = match client.fetch_file_bytes(&file.path, commit_id, None).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(path = %file.path, "Failed to download file: {}", e);
                return None;
            }
        };

        let key = object_key(commit_id, &file.path);
        match sink.put_object(&key, &bytes).await {
            Ok(()) => {
                info!("File successfully uploaded: {}", key);
                Some(key)
            }
            Err(e) => {
                error!(path = %file.path, "Failed to upload file: {}", e);
                None
            }
        }
    }
}

impl Default for BoundedUploader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

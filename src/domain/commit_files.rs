use crate::clients::{EventEntry, EventPublisher};
use crate::domain::connectors::RepoResolver;
use crate::domain::models::{CommitJob, JobOutcome, OutcomeDetail};
use crate::domain::uploader::BoundedUploader;
use crate::error::AppResult;
use crate::storage::ObjectSink;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

/// Job progress. Any stage may end in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Received,
    Resolved,
    Listed,
    Uploaded,
    Completed,
    Failed,
}

/// Drives a commit job end to end and reports its outcome.
pub struct CommitFilesService {
    resolver: Arc<RepoResolver>,
    uploader: BoundedUploader,
    sink: Arc<dyn ObjectSink>,
    events: Arc<dyn EventPublisher>,
    event_bus_name: Option<String>,
}

impl CommitFilesService {
    pub fn new(
        resolver: Arc<RepoResolver>,
        uploader: BoundedUploader,
        sink: Arc<dyn ObjectSink>,
        events: Arc<dyn EventPublisher>,
        event_bus_name: Option<String>,
    ) -> Self {
        Self {
            resolver,
            uploader,
            sink,
            events,
            event_bus_name,
        }
    }

    /// Process one job. Always yields exactly one outcome, which is also
    /// handed to the event bus.
    pub async fn process(&self, job: &CommitJob) -> JobOutcome {
        let span = tracing::info_span!("commit_job", job_id = %job.job_id, commit_id = %job.commit_id);

        async {
            let outcome = if job.is_processable() {
                info!(
                    stage = ?JobStage::Received,
                    "Starting commit processing for {} in repository {}",
                    job.commit_id, job.repository
                );
                match self.replicate(job).await {
                    Ok(uploaded_keys) => {
                        info!("All files processed successfully.");
                        JobOutcome {
                            job_id: job.job_id.clone(),
                            success: true,
                            message: format!("Commit {} processed successfully.", job.commit_id),
                            commit_id: job.commit_id.clone(),
                            uploaded_keys,
                        }
                    }
                    Err(e) => {
                        error!(stage = ?JobStage::Failed, "Error processing commit {}: {}", job.commit_id, e);
                        self.failed(job, format!("Error processing commit: {}", e))
                    }
                }
            } else {
                warn!(
                    status = job.status.as_deref().unwrap_or_default(),
                    "Job status is not success, skipping"
                );
                self.failed(
                    job,
                    format!(
                        "Commit {} skipped: status is {}",
                        job.commit_id,
                        job.status.as_deref().unwrap_or_default()
                    ),
                )
            };

            self.emit(&outcome).await;
            info!(stage = ?JobStage::Completed, success = outcome.success, "Job completed");
            outcome
        }
        .instrument(span)
        .await
    }

    /// Process a batch concurrently; outcomes keep the input order.
    pub async fn process_batch(&self, jobs: &[CommitJob]) -> Vec<JobOutcome> {
        join_all(jobs.iter().map(|job| self.process(job))).await
    }

    async fn replicate(&self, job: &CommitJob) -> AppResult<Vec<String>> {
        let client = self.resolver.resolve(&job.repository)?;
        let repo = client.coordinates();
        info!(
            stage = ?JobStage::Resolved,
            provider = %client.provider(),
            "Repository resolved to {}/{}",
            repo.owner, repo.name
        );

        let files = client
            .list_commit_files(&job.commit_id, job.branch.as_deref())
            .await?;
        info!(stage = ?JobStage::Listed, "Found {} modified files.", files.len());

        let uploaded = self
            .uploader
            .run(&files, &job.commit_id, client.as_ref(), self.sink.as_ref())
            .await?;
        info!(stage = ?JobStage::Uploaded, uploaded = uploaded.len(), "Upload stage finished");

        Ok(uploaded)
    }

    fn failed(&self, job: &CommitJob, message: String) -> JobOutcome {
        JobOutcome {
            job_id: job.job_id.clone(),
            success: false,
            message,
            commit_id: job.commit_id.clone(),
            uploaded_keys: Vec::new(),
        }
    }

    /// Publish the outcome. Failures are logged, never retried.
    async fn emit(&self, outcome: &JobOutcome) {
        let Some(bus) = self.event_bus_name.as_deref() else {
            warn!(
                "TITVO_EVENT_BUS_NAME not found in configuration. Event skipped for job {}.",
                outcome.job_id
            );
            return;
        };

        let entry = EventEntry::outcome(OutcomeDetail::from(outcome), bus);
        if let Err(e) = self.events.publish(entry).await {
            error!("Error sending event for job {}: {}", outcome.job_id, e);
        }
    }
}

use crate::api::response::success_response;
use crate::domain::models::{CommitJob, JobMessage};
use crate::error::{AppError, AppResult};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{debug, info};

/// Body of `POST /jobs`: one job message or a batch of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum JobsRequest {
    Batch(Vec<JobMessage>),
    Single(JobMessage),
}

impl JobsRequest {
    fn into_jobs(self) -> Vec<CommitJob> {
        match self {
            JobsRequest::Batch(messages) => messages.into_iter().map(CommitJob::from).collect(),
            JobsRequest::Single(message) => vec![CommitJob::from(message)],
        }
    }
}

/// Run commit jobs and return their outcomes.
/// POST /jobs
pub async fn submit_jobs(
    app_state: web::Data<crate::AppState>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let request: JobsRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid job message: {}", e)))?;
    let jobs = request.into_jobs();

    info!("Processing {} job messages", jobs.len());
    for job in &jobs {
        debug!(job_id = %job.job_id, "Processing message: {:?}", job);
    }

    let outcomes = app_state.commit_files.process_batch(&jobs).await;

    info!("Finished {} job messages", outcomes.len());
    Ok(success_response(outcomes))
}

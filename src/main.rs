mod api;
mod clients;
mod config;
mod domain;
mod error;
mod storage;
mod vault;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clients::{BitbucketApiClient, EventBusClient, GitHubApiClient, ParameterClient};
use config::{Config, StorageBackend};
use domain::commit_files::CommitFilesService;
use domain::connectors::RepoResolver;
use domain::uploader::BoundedUploader;
use std::sync::Arc;
use std::time::Instant;
use storage::memory::InMemoryObjectSink;
use storage::s3::{S3ObjectSink, S3Settings};
use storage::ObjectSink;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vault::{CredentialVault, EnvSecretStore, OAuthTokenSource, StaticTokenSource};

/// Application state shared across handlers.
pub struct AppState {
    pub config: Config,
    pub commit_files: Arc<CommitFilesService>,
    pub started_at: Instant,
}

fn build_sink(config: &Config) -> anyhow::Result<Arc<dyn ObjectSink>> {
    match config.storage_backend {
        StorageBackend::S3 => {
            let settings = S3Settings::from_config(config)?;
            Ok(Arc::new(S3ObjectSink::new(&settings)?))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory object storage, uploaded files are not persisted");
            Ok(Arc::new(InMemoryObjectSink::new()))
        }
    }
}

fn build_service(config: &Config) -> anyhow::Result<CommitFilesService> {
    let http = reqwest::Client::new();

    let parameters = Arc::new(ParameterClient::with_api_key(
        http.clone(),
        config.parameter_service_url.clone(),
        config.parameter_table_name.clone(),
        config.internal_api_key.clone(),
    ));
    let vault = Arc::new(CredentialVault::new(
        parameters,
        Arc::new(EnvSecretStore),
        config.aes_key_path.clone(),
    ));

    let github_tokens = Arc::new(StaticTokenSource::new(
        Arc::clone(&vault),
        config.github_token_param_name.clone(),
    ));
    let bitbucket_tokens = Arc::new(OAuthTokenSource::new(
        http.clone(),
        config.bitbucket_token_url.clone(),
        Arc::clone(&vault),
        config.bitbucket_credentials_param_name.clone(),
    ));

    let resolver = Arc::new(RepoResolver::new(
        Arc::new(GitHubApiClient::new(http.clone(), config.github_api_url.clone())),
        github_tokens,
        Arc::new(BitbucketApiClient::new(http.clone(), config.bitbucket_api_url.clone())),
        bitbucket_tokens,
    ));

    let sink = build_sink(config).context("Cannot initialize object storage")?;
    let events = Arc::new(EventBusClient::new(http, config.event_bus_url.clone()));

    Ok(CommitFilesService::new(
        resolver,
        BoundedUploader::new(config.max_concurrent_uploads),
        sink,
        events,
        config.event_bus_name.clone(),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "commit_files_service=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    let port = config.port;

    info!("Starting commit-files-service on port {}", port);
    info!("Upload concurrency limit: {}", config.max_concurrent_uploads);
    info!("Parameter service URL: {}", config.parameter_service_url);

    let commit_files = Arc::new(build_service(&config)?);

    // Create app state
    let app_state = web::Data::new(AppState {
        config: config.clone(),
        commit_files,
        started_at: Instant::now(),
    });

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(api::configure_routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}

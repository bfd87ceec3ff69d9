pub mod bitbucket;
pub mod github;

use crate::clients::{BitbucketApiClient, GitHubApiClient};
use crate::domain::models::{FileRef, Provider, RepoCoordinates};
use crate::error::{AppError, AppResult};
use crate::vault::TokenSource;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Host fragment to provider, checked in order.
const PROVIDER_TABLE: &[(&str, Provider)] = &[
    ("github.com", Provider::GitHub),
    ("bitbucket.org", Provider::Bitbucket),
];

/// Read access to the files of a commit on one hosting provider.
#[async_trait]
pub trait RepoClient: Send + Sync {
    /// The provider this client talks to.
    fn provider(&self) -> Provider;

    /// Repository the client was created for.
    fn coordinates(&self) -> &RepoCoordinates;

    /// List the files changed in a commit.
    async fn list_commit_files(&self, commit_id: &str, branch: Option<&str>) -> AppResult<Vec<FileRef>>;

    /// Download one file as it exists at the commit.
    async fn fetch_file_bytes(
        &self,
        path: &str,
        commit_id: &str,
        branch: Option<&str>,
    ) -> AppResult<Vec<u8>>;
}

/// Split a repository URL into owner and name.
///
/// A leading `git+` and a trailing `.git` are ignored; the last two path
/// segments are used. Nothing is checked against the provider.
pub fn parse_repository_url(url: &str) -> AppResult<RepoCoordinates> {
    let cleaned = url.trim();
    let cleaned = cleaned.strip_prefix("git+").unwrap_or(cleaned);
    let cleaned = cleaned.trim_end_matches('/');
    let cleaned = cleaned.strip_suffix(".git").unwrap_or(cleaned);

    let mut segments = cleaned.rsplit('/');
    let name = segments.next().unwrap_or_default();
    let owner = segments.next().unwrap_or_default();

    // "https:" and "" are scheme leftovers, not an owner.
    if name.is_empty() || owner.is_empty() || owner.ends_with(':') {
        return Err(AppError::InvalidRepositoryUrl(url.to_string()));
    }

    Ok(RepoCoordinates {
        owner: owner.to_string(),
        name: name.to_string(),
    })
}

/// Picks the provider for a repository URL by host substring.
pub fn detect_provider(url: &str) -> AppResult<Provider> {
    PROVIDER_TABLE
        .iter()
        .find(|(host, _)| url.contains(host))
        .map(|(_, provider)| *provider)
        .ok_or_else(|| AppError::UnsupportedProvider(url.to_string()))
}

/// Creates the right `RepoClient` for a repository URL.
///
/// Token sources are shared by every client of the same provider, so cached
/// tokens survive across jobs.
pub struct RepoResolver {
    github_client: Arc<GitHubApiClient>,
    github_tokens: Arc<dyn TokenSource>,
    bitbucket_client: Arc<BitbucketApiClient>,
    bitbucket_tokens: Arc<dyn TokenSource>,
}

impl RepoResolver {
    pub fn new(
        github_client: Arc<GitHubApiClient>,
        github_tokens: Arc<dyn TokenSource>,
        bitbucket_client: Arc<BitbucketApiClient>,
        bitbucket_tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            github_client,
            github_tokens,
            bitbucket_client,
            bitbucket_tokens,
        }
    }

    /// Get a client for the given repository URL.
    pub fn resolve(&self, repository_url: &str) -> AppResult<Box<dyn RepoClient>> {
        let provider = detect_provider(repository_url)?;
        let coordinates = parse_repository_url(repository_url)?;

        info!(
            provider = %provider,
            "Client initialized for {}/{}",
            coordinates.owner, coordinates.name
        );

        Ok(match provider {
            Provider::GitHub => Box::new(github::GitHubRepoClient::new(
                Arc::clone(&self.github_client),
                Arc::clone(&self.github_tokens),
                coordinates,
            )),
            Provider::Bitbucket => Box::new(bitbucket::BitbucketRepoClient::new(
                Arc::clone(&self.bitbucket_client),
                Arc::clone(&self.bitbucket_tokens),
                coordinates,
            )),
        })
    }
}

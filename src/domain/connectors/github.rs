use crate::clients::GitHubApiClient;
use crate::domain::connectors::RepoClient;
use crate::domain::models::{FileRef, Provider, RepoCoordinates};
use crate::error::AppResult;
use crate::vault::TokenSource;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// GitHub repository client for one repository.
pub struct GitHubRepoClient {
    github_client: Arc<GitHubApiClient>,
    tokens: Arc<dyn TokenSource>,
    coordinates: RepoCoordinates,
}

impl GitHubRepoClient {
    pub fn new(
        github_client: Arc<GitHubApiClient>,
        tokens: Arc<dyn TokenSource>,
        coordinates: RepoCoordinates,
    ) -> Self {
        Self {
            github_client,
            tokens,
            coordinates,
        }
    }
}

#[async_trait]
impl RepoClient for GitHubRepoClient {
    fn provider(&self) -> Provider {
        Provider::GitHub
    }

    fn coordinates(&self) -> &RepoCoordinates {
        &self.coordinates
    }

    async fn list_commit_files(&self, commit_id: &str, branch: Option<&str>) -> AppResult<Vec<FileRef>> {
        info!(
            branch = branch.unwrap_or("-"),
            "Fetching commit {} files for {}/{}",
            commit_id, self.coordinates.owner, self.coordinates.name
        );

        let token = self.tokens.access_token().await?;
        let paths = self
            .github_client
            .get_commit_files(&token, &self.coordinates, commit_id)
            .await?;

        Ok(paths.into_iter().map(FileRef::new).collect())
    }

    async fn fetch_file_bytes(
        &self,
        path: &str,
        commit_id: &str,
        _branch: Option<&str>,
    ) -> AppResult<Vec<u8>> {
        info!("Downloading file {} @ commit {}", path, commit_id);

        // The commit pins the content; the branch is not needed to address it.
        let token = self.tokens.access_token().await?;
        self.github_client
            .get_file_content(&token, &self.coordinates, path, commit_id)
            .await
    }
}

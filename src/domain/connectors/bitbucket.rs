use crate::clients::BitbucketApiClient;
use crate::domain::connectors::RepoClient;
use crate::domain::models::{FileRef, Provider, RepoCoordinates};
use crate::error::AppResult;
use crate::vault::TokenSource;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Bitbucket repository client for one repository.
///
/// Listing tries the commit endpoint first and falls back to the tree at the
/// commit when that endpoint does not report the changed files.
pub struct BitbucketRepoClient {
    bitbucket_client: Arc<BitbucketApiClient>,
    tokens: Arc<dyn TokenSource>,
    coordinates: RepoCoordinates,
}

impl BitbucketRepoClient {
    pub fn new(
        bitbucket_client: Arc<BitbucketApiClient>,
        tokens: Arc<dyn TokenSource>,
        coordinates: RepoCoordinates,
    ) -> Self {
        Self {
            bitbucket_client,
            tokens,
            coordinates,
        }
    }

    /// Files from the commit endpoint, `None` when it has none to offer.
    async fn files_from_commit(&self, token: &str, commit_id: &str) -> Option<Vec<FileRef>> {
        match self
            .bitbucket_client
            .get_commit(token, &self.coordinates, commit_id)
            .await
        {
            Ok(detail) => match detail.files {
                Some(files) => {
                    info!("Commit endpoint listed {} files for {}", files.len(), commit_id);
                    Some(files.into_iter().map(|f| FileRef::new(f.path)).collect())
                }
                None => {
                    info!("Commit endpoint did not return a files array for {}", commit_id);
                    None
                }
            },
            Err(e) => {
                warn!("Commit endpoint failed for {}: {}", commit_id, e);
                None
            }
        }
    }

    async fn files_from_src(&self, token: &str, commit_id: &str) -> AppResult<Vec<FileRef>> {
        let entries = self
            .bitbucket_client
            .list_src(token, &self.coordinates, commit_id)
            .await?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.is_file())
            .map(|entry| FileRef::new(entry.path))
            .collect())
    }
}

#[async_trait]
impl RepoClient for BitbucketRepoClient {
    fn provider(&self) -> Provider {
        Provider::Bitbucket
    }

    fn coordinates(&self) -> &RepoCoordinates {
        &self.coordinates
    }

    async fn list_commit_files(&self, commit_id: &str, branch: Option<&str>) -> AppResult<Vec<FileRef>> {
        info!(
            branch = branch.unwrap_or("-"),
            "Bitbucket getting files for commit {} in {}/{}",
            commit_id, self.coordinates.owner, self.coordinates.name
        );

        // Token failures abort the listing instead of triggering the fallback.
        let token = self.tokens.access_token().await?;

        if let Some(files) = self.files_from_commit(&token, commit_id).await {
            return Ok(files);
        }

        info!("Falling back to src listing for {}", commit_id);
        self.files_from_src(&token, commit_id).await
    }

    async fn fetch_file_bytes(
        &self,
        path: &str,
        commit_id: &str,
        _branch: Option<&str>,
    ) -> AppResult<Vec<u8>> {
        info!("Bitbucket download {} @ {}", path, commit_id);

        let token = self.tokens.access_token().await?;
        self.bitbucket_client
            .get_raw_file(&token, &self.coordinates, path, commit_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::connectors::tests::FixedToken;
    use crate::error::AppError;
    use reqwest::Client;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, tokens: Arc<dyn TokenSource>) -> BitbucketRepoClient {
        BitbucketRepoClient::new(
            Arc::new(BitbucketApiClient::new(Client::new(), server.uri())),
            tokens,
            RepoCoordinates {
                owner: "workspace".to_string(),
                name: "repo".to_string(),
            },
        )
    }

    struct FailingToken;

    #[async_trait]
    impl TokenSource for FailingToken {
        async fn access_token(&self) -> AppResult<String> {
            Err(AppError::TokenAcquisition {
                status: 400,
                body: "invalid_client".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn uses_files_array_from_commit_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/workspace/repo/commit/abc123/"))
            .and(header("Authorization", "Bearer bb-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{ "path": "file1.ts" }, { "path": "file2.ts" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/workspace/repo/src/abc123/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let files = client_for(&server, Arc::new(FixedToken("bb-token")))
            .list_commit_files("abc123", None)
            .await
            .unwrap();
        assert_eq!(files, vec![FileRef::new("file1.ts"), FileRef::new("file2.ts")]);
        server.verify().await;
    }

    #[tokio::test]
    async fn falls_back_to_src_listing_and_keeps_only_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/workspace/repo/commit/abc123/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "values": [] })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/workspace/repo/src/abc123/"))
            .and(header("Authorization", "Bearer bb-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [
                    { "type": "commit_file", "path": "fileA.ts" },
                    { "type": "commit_directory", "path": "lib" },
                    { "type": "commit_file", "path": "fileB.ts" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let files = client_for(&server, Arc::new(FixedToken("bb-token")))
            .list_commit_files("abc123", None)
            .await
            .unwrap();
        assert_eq!(files, vec![FileRef::new("fileA.ts"), FileRef::new("fileB.ts")]);
        server.verify().await;
    }

    #[tokio::test]
    async fn falls_back_when_commit_endpoint_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/workspace/repo/commit/abc123/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/workspace/repo/src/abc123/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [{ "type": "commit_file", "path": "only.ts" }]
            })))
            .mount(&server)
            .await;

        let files = client_for(&server, Arc::new(FixedToken("bb-token")))
            .list_commit_files("abc123", None)
            .await
            .unwrap();
        assert_eq!(files, vec![FileRef::new("only.ts")]);
    }

    #[tokio::test]
    async fn src_failure_is_propagated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client_for(&server, Arc::new(FixedToken("bb-token")))
            .list_commit_files("abc123", None)
            .await;
        assert!(matches!(result, Err(AppError::ExternalService(_))));
    }

    #[tokio::test]
    async fn token_failure_aborts_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = client_for(&server, Arc::new(FailingToken))
            .list_commit_files("abc123", None)
            .await;
        assert!(matches!(result, Err(AppError::TokenAcquisition { status: 400, .. })));
        server.verify().await;
    }

    #[tokio::test]
    async fn download_failure_is_propagated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client_for(&server, Arc::new(FixedToken("bb-token")))
            .fetch_file_bytes("file1.ts", "abc123", None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn upload_stores_bytes_of_file_with_reserved_characters() {
        use crate::domain::uploader::BoundedUploader;
        use crate::storage::memory::InMemoryObjectSink;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/workspace/repo/src/abc123/docs/%23notes.md"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"# notes".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/workspace/repo/src/abc123/docs/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": []
            })))
            .expect(0)
            .mount(&server)
            .await;

        let repo = client_for(&server, Arc::new(FixedToken("bb-token")));
        let sink = InMemoryObjectSink::new();
        let keys = BoundedUploader::default()
            .run(&[FileRef::new("docs/#notes.md")], "abc123", &repo, &sink)
            .await
            .unwrap();

        assert_eq!(keys, vec!["abc123/docs/#notes.md"]);
        assert_eq!(sink.get("abc123/docs/#notes.md").unwrap(), Some(b"# notes".to_vec()));
        server.verify().await;
    }
}

use crate::clients::file_url;
use crate::domain::models::RepoCoordinates;
use crate::error::{AppError, AppResult};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::debug;

const MAX_SRC_PAGES: usize = 100;
const FILE_ENTRY_TYPE: &str = "commit_file";

/// Client for Bitbucket Cloud 2.0 API operations.
pub struct BitbucketApiClient {
    client: Client,
    base_url: String,
}

/// Commit detail. Only some deployments include the changed files.
#[derive(Debug, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub files: Option<Vec<CommitFile>>,
}

#[derive(Debug, Deserialize)]
pub struct CommitFile {
    pub path: String,
}

/// Entry of a `/src` directory listing.
#[derive(Debug, Clone, Deserialize)]
pub struct SrcEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub path: String,
}

impl SrcEntry {
    pub fn is_file(&self) -> bool {
        self.entry_type == FILE_ENTRY_TYPE
    }
}

#[derive(Debug, Deserialize)]
struct SrcPage {
    #[serde(default)]
    values: Vec<SrcEntry>,
    next: Option<String>,
}

impl BitbucketApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn get(&self, url: &str, token: &str) -> RequestBuilder {
        self.client.get(url).bearer_auth(token)
    }

    async fn check(response: Response, what: &str) -> AppResult<Response> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Bitbucket {} returned {}: {}",
                what, status, body
            )));
        }
        Ok(response)
    }

    /// Get commit details.
    /// Calls: GET /repositories/{workspace}/{repo_slug}/commit/{commit}/
    pub async fn get_commit(
        &self,
        token: &str,
        repo: &RepoCoordinates,
        commit_id: &str,
    ) -> AppResult<CommitDetail> {
        let url = format!(
            "{}/repositories/{}/{}/commit/{}/",
            self.base_url, repo.owner, repo.name, commit_id
        );

        debug!("Fetching commit: {}", url);

        let response = Self::check(self.get(&url, token).send().await?, "commit endpoint").await?;
        Ok(response.json().await?)
    }

    /// List the tree at a commit, following pagination links.
    /// Calls: GET /repositories/{workspace}/{repo_slug}/src/{commit}/
    pub async fn list_src(
        &self,
        token: &str,
        repo: &RepoCoordinates,
        commit_id: &str,
    ) -> AppResult<Vec<SrcEntry>> {
        // The trailing slash is required, the API answers 404 without it.
        let mut url = format!(
            "{}/repositories/{}/{}/src/{}/",
            self.base_url, repo.owner, repo.name, commit_id
        );
        let mut entries = Vec::new();

        for _ in 0..MAX_SRC_PAGES {
            debug!("Listing src: {}", url);

            let response = Self::check(self.get(&url, token).send().await?, "src endpoint").await?;
            let page: SrcPage = response.json().await?;
            entries.extend(page.values);

            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(entries)
    }

    /// Get the raw bytes of a file at a commit.
    /// Calls: GET /repositories/{workspace}/{repo_slug}/src/{commit}/{path}
    pub async fn get_raw_file(
        &self,
        token: &str,
        repo: &RepoCoordinates,
        path: &str,
        commit_id: &str,
    ) -> AppResult<Vec<u8>> {
        let url = file_url(
            &self.base_url,
            &["repositories", repo.owner.as_str(), repo.name.as_str(), "src", commit_id],
            path,
        )?;

        let response = Self::check(self.get(url.as_str(), token).send().await?, "file download").await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo() -> RepoCoordinates {
        RepoCoordinates {
            owner: "workspace".to_string(),
            name: "repo".to_string(),
        }
    }

    #[tokio::test]
    async fn commit_without_files_parses_as_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/workspace/repo/commit/abc123/"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "hash": "abc123",
                "message": "fix"
            })))
            .mount(&server)
            .await;

        let client = BitbucketApiClient::new(Client::new(), server.uri());
        let detail = client.get_commit("tok", &repo(), "abc123").await.unwrap();
        assert!(detail.files.is_none());
    }

    #[tokio::test]
    async fn src_listing_follows_next_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/workspace/repo/src/abc123/"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [{ "type": "commit_file", "path": "b.ts" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/workspace/repo/src/abc123/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [
                    { "type": "commit_directory", "path": "src" },
                    { "type": "commit_file", "path": "a.ts" }
                ],
                "next": format!("{}/repositories/workspace/repo/src/abc123/?page=2", server.uri())
            })))
            .mount(&server)
            .await;

        let client = BitbucketApiClient::new(Client::new(), server.uri());
        let entries = client.list_src("tok", &repo(), "abc123").await.unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["src", "a.ts", "b.ts"]);
        assert!(!entries[0].is_file());
        assert!(entries[1].is_file());
    }

    #[tokio::test]
    async fn downloads_raw_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/workspace/repo/src/abc123/dir/file1.ts"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello bitbucket".to_vec()))
            .mount(&server)
            .await;

        let client = BitbucketApiClient::new(Client::new(), server.uri());
        let bytes = client
            .get_raw_file("tok", &repo(), "dir/file1.ts", "abc123")
            .await
            .unwrap();
        assert_eq!(bytes, b"hello bitbucket");
    }

    #[tokio::test]
    async fn reserved_characters_stay_in_the_file_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/workspace/repo/src/abc123/docs/%23notes%3F.md"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"notes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/workspace/repo/src/abc123/docs/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": ["DIRECTORY LISTING"]
            })))
            .expect(0)
            .mount(&server)
            .await;

        let client = BitbucketApiClient::new(Client::new(), server.uri());
        let bytes = client
            .get_raw_file("tok", &repo(), "docs/#notes?.md", "abc123")
            .await
            .unwrap();
        assert_eq!(bytes, b"notes");
        server.verify().await;
    }
}

use crate::clients::file_url;
use crate::domain::models::RepoCoordinates;
use crate::error::{AppError, AppResult};
use base64::Engine;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

const FILES_PER_PAGE: usize = 100;
/// GitHub stops listing commit files after 3000 entries.
const MAX_FILE_PAGES: usize = 30;

/// Client for GitHub API operations.
pub struct GitHubApiClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    files: Vec<CommitFile>,
}

#[derive(Debug, Deserialize)]
struct CommitFile {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    content: Option<String>,
    encoding: Option<String>,
}

impl GitHubApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn get(&self, url: &str, token: &str) -> RequestBuilder {
        self.client
            .get(url)
            .header("Authorization", format!("Bearer {}", token))
            .header("User-Agent", "commit-files-service")
            .header("Accept", "application/vnd.github+json")
    }

    /// List the paths of all files touched by a commit.
    pub async fn get_commit_files(
        &self,
        token: &str,
        repo: &RepoCoordinates,
        commit_id: &str,
    ) -> AppResult<Vec<String>> {
        let mut paths = Vec::new();

        for page in 1..=MAX_FILE_PAGES {
            let url = format!(
                "{}/repos/{}/{}/commits/{}?per_page={}&page={}",
                self.base_url, repo.owner, repo.name, commit_id, FILES_PER_PAGE, page
            );

            debug!("Fetching commit files: {}", url);

            let response = self.get(&url, token).send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::ExternalService(format!(
                    "GitHub API returned {}: {}",
                    status, body
                )));
            }

            let commit: CommitResponse = response.json().await?;
            let count = commit.files.len();
            paths.extend(commit.files.into_iter().map(|f| f.filename));

            if count < FILES_PER_PAGE {
                break;
            }
        }

        Ok(paths)
    }

    /// Get the raw bytes of a file at a given ref.
    pub async fn get_file_content(
        &self,
        token: &str,
        repo: &RepoCoordinates,
        path: &str,
        reference: &str,
    ) -> AppResult<Vec<u8>> {
        let mut url = file_url(
            &self.base_url,
            &["repos", repo.owner.as_str(), repo.name.as_str(), "contents"],
            path,
        )?;
        url.query_pairs_mut().append_pair("ref", reference);

        let response = self.get(url.as_str(), token).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalService(format!(
                "Failed to fetch file {}: {}",
                path, status
            )));
        }

        let body: serde_json::Value = response.json().await?;
        if body.is_array() {
            return Err(AppError::NotAFile(path.to_string()));
        }

        let content_response: ContentResponse = serde_json::from_value(body)?;

        match (content_response.content, content_response.encoding.as_deref()) {
            (Some(content), Some("base64") | None) => {
                // Remove newlines from base64 content and decode
                let cleaned = content.replace('\n', "");
                base64::engine::general_purpose::STANDARD
                    .decode(&cleaned)
                    .map_err(|e| AppError::ExternalService(format!("Failed to decode base64: {}", e)))
            }
            (None, _) => Err(AppError::ExternalService(format!(
                "No content found in GitHub response for {}",
                path
            ))),
            (Some(_), Some(other)) => Err(AppError::ExternalService(format!(
                "Unexpected content encoding '{}' for {}",
                other, path
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo() -> RepoCoordinates {
        RepoCoordinates {
            owner: "acme".to_string(),
            name: "widgets".to_string(),
        }
    }

    #[tokio::test]
    async fn lists_commit_files_across_pages() {
        let server = MockServer::start().await;
        let first_page: Vec<_> = (0..FILES_PER_PAGE)
            .map(|i| serde_json::json!({ "filename": format!("src/f{}.ts", i) }))
            .collect();

        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/commits/abc123"))
            .and(query_param("page", "1"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sha": "abc123",
                "files": first_page
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/commits/abc123"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sha": "abc123",
                "files": [{ "filename": "README.md" }]
            })))
            .mount(&server)
            .await;

        let client = GitHubApiClient::new(Client::new(), server.uri());
        let files = client.get_commit_files("tok", &repo(), "abc123").await.unwrap();
        assert_eq!(files.len(), FILES_PER_PAGE + 1);
        assert_eq!(files[0], "src/f0.ts");
        assert_eq!(files[FILES_PER_PAGE], "README.md");
    }

    #[tokio::test]
    async fn decodes_base64_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/contents/file1.ts"))
            .and(query_param("ref", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "file",
                "content": "aGVsbG8g\nd29ybGQ=\n",
                "encoding": "base64"
            })))
            .mount(&server)
            .await;

        let client = GitHubApiClient::new(Client::new(), server.uri());
        let bytes = client
            .get_file_content("tok", &repo(), "file1.ts", "abc123")
            .await
            .unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[tokio::test]
    async fn directory_listing_is_not_a_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/contents/src"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = GitHubApiClient::new(Client::new(), server.uri());
        let result = client.get_file_content("tok", &repo(), "src", "abc123").await;
        assert!(matches!(result, Err(AppError::NotAFile(p)) if p == "src"));
    }

    #[tokio::test]
    async fn error_status_is_external_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let client = GitHubApiClient::new(Client::new(), server.uri());
        let result = client.get_commit_files("tok", &repo(), "abc123").await;
        assert!(matches!(result, Err(AppError::ExternalService(_))));
    }

    #[tokio::test]
    async fn reserved_characters_keep_ref_pinning() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/contents/src/a%3Fb%23c.ts"))
            .and(query_param("ref", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": "cGlubmVk",
                "encoding": "base64"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GitHubApiClient::new(Client::new(), server.uri());
        let bytes = client
            .get_file_content("tok", &repo(), "src/a?b#c.ts", "abc123")
            .await
            .unwrap();
        assert_eq!(bytes, b"pinned");
        server.verify().await;
    }
}

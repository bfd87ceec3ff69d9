pub mod bitbucket_api;
pub mod events;
pub mod github_api;
pub mod parameters;

pub use bitbucket_api::BitbucketApiClient;
pub use events::{EventBusClient, EventEntry, EventPublisher};
pub use github_api::GitHubApiClient;
pub use parameters::ParameterClient;

use crate::error::{AppError, AppResult};
use reqwest::Url;

/// Append `segments`, then each `/`-separated part of `file_path`, to
/// `base_url`. Every part is percent-encoded, so `#`, `?` and `%` in a
/// file name stay in the path.
pub(crate) fn file_url(base_url: &str, segments: &[&str], file_path: &str) -> AppResult<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| AppError::Internal(format!("Invalid API base URL {}: {}", base_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| AppError::Internal(format!("API base URL cannot carry a path: {}", base_url)))?
        .pop_if_empty()
        .extend(segments)
        .extend(file_path.split('/'));
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_reserved_characters_per_segment() {
        let url = file_url("https://api.example.org/2.0", &["src", "abc123"], "docs/#notes?%.md").unwrap();
        assert_eq!(url.path(), "/2.0/src/abc123/docs/%23notes%3F%25.md");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn rejects_unparseable_base() {
        assert!(matches!(file_url("not a url", &[], "a.ts"), Err(AppError::Internal(_))));
    }
}

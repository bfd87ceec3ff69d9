pub mod memory;
pub mod s3;

use crate::error::AppResult;
use async_trait::async_trait;

/// Destination for replicated commit files.
#[async_trait]
pub trait ObjectSink: Send + Sync {
    /// Store `data` under `key`, replacing any previous object.
    async fn put_object(&self, key: &str, data: &[u8]) -> AppResult<()>;
}

/// Content type for an object key, guessed from its extension.
pub fn content_type_for(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

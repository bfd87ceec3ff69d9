use std::env;

const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 10;

/// Object storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    /// In-process storage for local runs
    Memory,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3014)
    pub port: u16,
    pub storage_backend: StorageBackend,
    /// Target bucket for commit files
    pub bucket_name: Option<String>,
    pub aws_region: String,
    /// Custom S3 endpoint (LocalStack, MinIO)
    pub aws_endpoint: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    /// Upload worker ceiling per job (default: 10)
    pub max_concurrent_uploads: usize,
    /// Event bus name; outcome events are skipped when unset
    pub event_bus_name: Option<String>,
    pub event_bus_url: String,
    pub parameter_service_url: String,
    pub parameter_table_name: String,
    /// Internal API key for S2S calls to the parameter service
    pub internal_api_key: Option<String>,
    /// Secret name holding the AES key for encrypted parameters
    pub aes_key_path: String,
    pub github_api_url: String,
    pub bitbucket_api_url: String,
    pub bitbucket_token_url: String,
    pub github_token_param_name: String,
    pub bitbucket_credentials_param_name: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3014),
            storage_backend: match env::var("STORAGE_BACKEND").as_deref() {
                Ok("memory") => StorageBackend::Memory,
                _ => StorageBackend::S3,
            },
            bucket_name: env::var("S3_GIT_FILES_BUCKET_NAME").ok(),
            aws_region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            aws_endpoint: env::var("AWS_ENDPOINT").ok(),
            aws_access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
            aws_secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            max_concurrent_uploads: parse_concurrency(env::var("MAX_CONCURRENT_UPLOADS").ok()),
            event_bus_name: env::var("TITVO_EVENT_BUS_NAME").ok(),
            event_bus_url: env::var("EVENT_BUS_URL")
                .unwrap_or_else(|_| "http://localhost:3015".to_string()),
            parameter_service_url: env::var("PARAMETER_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:3016".to_string()),
            parameter_table_name: env::var("PARAMETER_TABLE_NAME")
                .unwrap_or_else(|_| "parameters".to_string()),
            internal_api_key: env::var("INTERNAL_API_KEY").ok(),
            aes_key_path: env::var("AES_KEY_PATH").unwrap_or_else(|_| "AES_KEY".to_string()),
            github_api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            bitbucket_api_url: env::var("BITBUCKET_API_URL")
                .unwrap_or_else(|_| "https://api.bitbucket.org/2.0".to_string()),
            bitbucket_token_url: env::var("BITBUCKET_TOKEN_URL")
                .unwrap_or_else(|_| "https://bitbucket.org/site/oauth2/access_token".to_string()),
            github_token_param_name: env::var("GITHUB_TOKEN_PARAM_NAME")
                .unwrap_or_else(|_| "github_access_token".to_string()),
            bitbucket_credentials_param_name: env::var("BITBUCKET_CREDENTIALS_PARAM_NAME")
                .unwrap_or_else(|_| "bitbucket_client_credentials".to_string()),
        }
    }
}

/// Parse the upload concurrency, falling back to the default on junk and
/// never going below one worker.
fn parse_concurrency(raw: Option<String>) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_CONCURRENT_UPLOADS)
        .max(1)
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

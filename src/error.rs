use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Repository host does not match any known provider
    #[error("Unsupported repo provider: {0}")]
    UnsupportedProvider(String),
    /// Repository URL could not be split into owner and name
    #[error("Invalid repository URL: {0}")]
    InvalidRepositoryUrl(String),
    /// Token endpoint answered with a non-success status
    #[error("Token acquisition failed with status {status}: {body}")]
    TokenAcquisition { status: u16, body: String },
    /// A credential, key or token is missing from its store
    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),
    /// AES key material is not 32 bytes
    #[error("AES key must be 32 bytes, got {len}")]
    InvalidKeyLength { len: usize },
    /// Ciphertext could not be decrypted
    #[error("Decryption error: {0}")]
    Decryption(String),
    /// Path resolved to a directory instead of a single file
    #[error("Expected single file content, got a directory: {0}")]
    NotAFile(String),
    /// External service error
    #[error("External Service Error: {0}")]
    ExternalService(String),
    /// Object storage error
    #[error("Storage Error: {0}")]
    Storage(String),
    /// Outcome event could not be published
    #[error("Event Emission Error: {0}")]
    EventEmission(String),
    /// Bad request with message
    #[error("Bad Request: {0}")]
    BadRequest(String),
    /// Internal server error
    #[error("Internal Error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type) = match self {
            AppError::BadRequest(_) | AppError::InvalidRepositoryUrl(_) => {
                (actix_web::http::StatusCode::BAD_REQUEST, "bad_request")
            }
            AppError::UnsupportedProvider(_) => {
                (actix_web::http::StatusCode::UNPROCESSABLE_ENTITY, "unsupported_provider")
            }
            AppError::NotAFile(_) => (actix_web::http::StatusCode::NOT_FOUND, "not_a_file"),
            AppError::TokenAcquisition { .. }
            | AppError::ExternalService(_)
            | AppError::Storage(_)
            | AppError::EventEmission(_) => {
                (actix_web::http::StatusCode::BAD_GATEWAY, "external_service_error")
            }
            AppError::CredentialUnavailable(_)
            | AppError::InvalidKeyLength { .. }
            | AppError::Decryption(_)
            | AppError::Internal(_) => {
                (actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        HttpResponse::build(status).json(serde_json::json!({
            "error": error_type,
            "message": self.to_string()
        }))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalService(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;

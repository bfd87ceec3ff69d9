use actix_web::{HttpResponse, web};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct StatusResponse {
    service: String,
    version: String,
    status: String,
    uptime_seconds: u64,
    max_concurrent_uploads: usize,
    event_bus_configured: bool,
}

/// Health check endpoint.
/// GET /health
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Status endpoint with uptime and pipeline settings.
/// GET /status
pub async fn status(app_state: web::Data<crate::AppState>) -> HttpResponse {
    let uptime = app_state.started_at.elapsed().as_secs();

    HttpResponse::Ok().json(StatusResponse {
        service: "commit-files-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        uptime_seconds: uptime,
        max_concurrent_uploads: app_state.config.max_concurrent_uploads,
        event_bus_configured: app_state.config.event_bus_name.is_some(),
    })
}

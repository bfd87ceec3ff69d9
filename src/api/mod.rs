pub mod health;
pub mod jobs;
pub mod response;

use actix_web::web;

/// Configure all API routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    // Health endpoints
    cfg.route("/health", web::get().to(health::health_check))
        .route("/status", web::get().to(health::status));

    // Job intake
    cfg.route("/jobs", web::post().to(jobs::submit_jobs));
}

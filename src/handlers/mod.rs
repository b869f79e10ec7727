pub mod admin;
pub mod auth;
pub mod webhook;

pub use admin::admin_config;
pub use auth::auth_config;
pub use webhook::webhook_config;

use actix_web::{HttpResponse, web};

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "服务存活"))
)]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn health_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
}

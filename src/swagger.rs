use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::conversations::Sender;
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::auth::send_two_factor,
        handlers::auth::verify_two_factor,
        handlers::admin::get_stats,
        handlers::admin::get_conversations,
        handlers::admin::get_users,
        handlers::admin::get_conversation_history,
    ),
    components(
        schemas(
            DeliveryMethod,
            SendTwoFactorRequest,
            SendTwoFactorResponse,
            VerifyTwoFactorRequest,
            VerifyTwoFactorResponse,
            AdminProfile,
            StatsResponse,
            ConversationEntry,
            UserSummary,
            Sender,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness check"),
        (name = "auth", description = "Admin two-factor login API"),
        (name = "admin", description = "Read-only conversation API"),
    ),
    info(
        title = "WhatsApp Relay API",
        version = "0.1.0",
        description = "WhatsApp auto-reply relay with admin read API"
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/auth/send-2fa",
            "/auth/verify-2fa",
            "/stats",
            "/conversations",
            "/users",
            "/conversations/{phoneNumber}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let schemes = doc
            .components
            .map(|c| c.security_schemes.contains_key("bearer_auth"))
            .unwrap_or(false);
        assert!(schemes);
    }
}

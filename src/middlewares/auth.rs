use crate::error::AppError;
use crate::utils::{Claims, JwtService};
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage, HttpRequest,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

// 公开路径配置
struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            // 完全匹配的公开路径
            exact_paths: vec![
                "/health",
                "/webhook",
                "/swagger-ui",
                "/api-docs/openapi.json",
            ],
            // 前缀匹配的公开路径
            prefix_paths: vec!["/swagger-ui/", "/api-docs/", "/auth/"],
        }
    }

    fn is_public_path(&self, path: &str) -> bool {
        if self.exact_paths.contains(&path) {
            return true;
        }

        self.prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
    }
}

pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            public_paths: PublicPaths::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    public_paths: PublicPaths,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // 放行所有 CORS 预检请求
        if req.method() == Method::OPTIONS || self.public_paths.is_public_path(req.path()) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let token = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());

        let Some(token) = token else {
            let error = AppError::AuthError("Missing access token".to_string());
            return Box::pin(async move { Err(error.into()) });
        };

        match self.jwt_service.verify_access_token(token) {
            Ok(claims) => {
                // 管理接口通过 current_admin 取到管理员邮箱
                req.extensions_mut().insert(claims);
                let fut = self.service.call(req);
                Box::pin(fut)
            }
            Err(_) => {
                let error = AppError::AuthError("Invalid access token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}

/// 当前登录的管理员邮箱
pub fn current_admin(req: &HttpRequest) -> Option<String> {
    req.extensions().get::<Claims>().map(|claims| claims.sub.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test, web};

    async fn whoami(req: HttpRequest) -> HttpResponse {
        HttpResponse::Ok().body(current_admin(&req).unwrap_or_default())
    }

    #[actix_web::test]
    async fn test_public_paths() {
        let paths = PublicPaths::new();
        assert!(paths.is_public_path("/webhook"));
        assert!(paths.is_public_path("/health"));
        assert!(paths.is_public_path("/auth/send-2fa"));
        assert!(paths.is_public_path("/swagger-ui/index.html"));
        assert!(!paths.is_public_path("/stats"));
        assert!(!paths.is_public_path("/conversations/525511111111"));
        assert!(!paths.is_public_path("/webhooks"));
    }

    #[actix_web::test]
    async fn test_bearer_token_required() {
        let jwt = JwtService::new("test-secret", 900);
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt.clone()))
                .route("/stats", web::get().to(whoami))
                .route("/health", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/stats").to_request();
        let err = test::try_call_service(&app, req).await.err().unwrap();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/stats")
            .insert_header(("Authorization", "Bearer not-a-jwt"))
            .to_request();
        let err = test::try_call_service(&app, req).await.err().unwrap();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);

        let token = jwt
            .generate_access_token("admin@example.com", "whatsapp")
            .unwrap();
        let req = test::TestRequest::get()
            .uri("/stats")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(test::read_body(resp).await, "admin@example.com");
    }
}

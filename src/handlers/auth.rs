use crate::models::*;
use crate::services::AuthService;
use actix_web::{HttpResponse, ResponseError, Result, web};

#[utoipa::path(
    post,
    path = "/auth/send-2fa",
    tag = "auth",
    request_body = SendTwoFactorRequest,
    responses(
        (status = 200, description = "验证码已发送", body = SendTwoFactorResponse),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 401, description = "账号或密码错误", body = ApiError),
        (status = 403, description = "手机号与账号不匹配", body = ApiError),
        (status = 502, description = "验证码发送失败", body = ApiError)
    )
)]
pub async fn send_two_factor(
    auth_service: web::Data<AuthService>,
    request: web::Json<SendTwoFactorRequest>,
) -> Result<HttpResponse> {
    match auth_service.send_two_factor(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            response,
            "Verification code sent",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/verify-2fa",
    tag = "auth",
    request_body = VerifyTwoFactorRequest,
    responses(
        (status = 200, description = "验证成功，返回访问令牌", body = VerifyTwoFactorResponse),
        (status = 401, description = "验证码不存在、已过期或不正确", body = ApiError)
    )
)]
pub async fn verify_two_factor(
    auth_service: web::Data<AuthService>,
    request: web::Json<VerifyTwoFactorRequest>,
) -> Result<HttpResponse> {
    match auth_service.verify_two_factor(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/send-2fa", web::post().to(send_two_factor))
            .route("/verify-2fa", web::post().to(verify_two_factor)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppResult;
    use crate::external::MessageSender;
    use crate::services::admin_directory::tests::principal;
    use crate::services::{AdminDirectory, ChallengeManager, InMemoryChallengeStore};
    use crate::utils::JwtService;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, String)>>);

    #[async_trait]
    impl MessageSender for Outbox {
        fn channel(&self) -> &'static str {
            "whatsapp"
        }

        async fn send_text(&self, to: &str, body: &str) -> AppResult<()> {
            self.0.lock().unwrap().push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn auth_service(outbox: Arc<Outbox>) -> AuthService {
        let directory = AdminDirectory::new(
            vec![principal("admin@example.com", "Password123", Some("5512345678"))],
            "52",
        );
        let challenges =
            ChallengeManager::new(Arc::new(InMemoryChallengeStore::new()), directory.clone())
                .with_sender(DeliveryMethod::Whatsapp, outbox);
        AuthService::new(directory, challenges, JwtService::new("test-secret", 900))
    }

    #[actix_web::test]
    async fn test_two_factor_endpoints() {
        let outbox = Arc::new(Outbox::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(auth_service(outbox.clone())))
                .configure(auth_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/auth/send-2fa")
            .set_json(json!({"email": "admin@example.com", "password": "wrong", "phoneNumber": "5512345678"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");

        let req = test::TestRequest::post()
            .uri("/auth/send-2fa")
            .set_json(json!({"email": "admin@example.com", "password": "Password123", "phoneNumber": "5599999999"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::post()
            .uri("/auth/send-2fa")
            .set_json(json!({"email": "admin@example.com", "password": "Password123"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/auth/send-2fa")
            .set_json(json!({"email": "admin@example.com", "password": "Password123", "phoneNumber": "+52 55 1234 5678"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["method"], "whatsapp");
        assert_eq!(body["data"]["expiresIn"], 300);

        let (to, text) = outbox.0.lock().unwrap()[0].clone();
        assert_eq!(to, "525512345678");
        let code: String = text.chars().filter(|c| c.is_ascii_digit()).take(6).collect();

        let req = test::TestRequest::post()
            .uri("/auth/verify-2fa")
            .set_json(json!({"email": "admin@example.com", "code": code}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["tokenType"], "Bearer");
        assert!(body["data"]["accessToken"].as_str().is_some_and(|t| !t.is_empty()));

        // 验证码只能使用一次
        let req = test::TestRequest::post()
            .uri("/auth/verify-2fa")
            .set_json(json!({"email": "admin@example.com", "code": code}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "CHALLENGE_NOT_FOUND");
    }
}

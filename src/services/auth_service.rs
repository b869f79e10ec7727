use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::{AdminDirectory, ChallengeManager};
use crate::utils::JwtService;

/// 管理后台登录：密码校验 + 二次验证码 + 签发访问令牌
#[derive(Clone)]
pub struct AuthService {
    directory: AdminDirectory,
    challenges: ChallengeManager,
    jwt_service: JwtService,
}

impl AuthService {
    pub fn new(
        directory: AdminDirectory,
        challenges: ChallengeManager,
        jwt_service: JwtService,
    ) -> Self {
        Self {
            directory,
            challenges,
            jwt_service,
        }
    }

    pub async fn send_two_factor(
        &self,
        request: SendTwoFactorRequest,
    ) -> AppResult<SendTwoFactorResponse> {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return Err(AppError::InvalidCredentials);
        }

        let principal = self
            .directory
            .authenticate(&request.email, &request.password)?;

        self.challenges
            .issue(
                &principal.email,
                request.method,
                request.phone_number.as_deref(),
            )
            .await
    }

    pub async fn verify_two_factor(
        &self,
        request: VerifyTwoFactorRequest,
    ) -> AppResult<VerifyTwoFactorResponse> {
        let consumed = self.challenges.verify(&request.email, &request.code).await?;

        // 验证码有效但账号已从配置中移除
        let principal = self
            .directory
            .find(&request.email)
            .ok_or(AppError::InvalidCredentials)?;

        let access_token = self
            .jwt_service
            .generate_access_token(&principal.email, consumed.method.as_str())?;

        log::info!("Admin session opened for {}", crate::utils::mask_email(&principal.email));

        Ok(VerifyTwoFactorResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.get_access_token_expires_in(),
            admin: AdminProfile {
                email: principal.email.clone(),
                name: principal.name.clone(),
            },
        })
    }
}

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Contact address does not match the registered one")]
    InvalidContact,

    #[error("No verification code was requested for this account")]
    ChallengeNotFound,

    #[error("Verification code has expired")]
    ChallengeExpired,

    #[error("Verification code is incorrect")]
    ChallengeMismatch,

    #[error("Delivery failure: {0}")]
    DeliveryFailure(String),

    #[error("Upstream AI failure: {0}")]
    UpstreamAiFailure(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    /// 对外暴露的错误码
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) | AppError::JwtError(_) => "AUTH_ERROR",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::InvalidContact => "INVALID_CONTACT",
            AppError::ChallengeNotFound => "CHALLENGE_NOT_FOUND",
            AppError::ChallengeExpired => "CHALLENGE_EXPIRED",
            AppError::ChallengeMismatch => "CHALLENGE_MISMATCH",
            AppError::DeliveryFailure(_) => "DELIVERY_FAILURE",
            AppError::UpstreamAiFailure(_) => "UPSTREAM_AI_FAILURE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_)
            | AppError::JwtError(_)
            | AppError::InvalidCredentials
            | AppError::ChallengeNotFound
            | AppError::ChallengeExpired
            | AppError::ChallengeMismatch => StatusCode::UNAUTHORIZED,
            AppError::InvalidContact => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DeliveryFailure(_) | AppError::UpstreamAiFailure(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let message = match self {
            AppError::ValidationError(msg) | AppError::AuthError(msg) => {
                log::warn!("{}: {msg}", self.code());
                msg.clone()
            }
            AppError::InvalidCredentials
            | AppError::InvalidContact
            | AppError::ChallengeNotFound
            | AppError::ChallengeExpired
            | AppError::ChallengeMismatch => {
                log::warn!("Two-factor rejection: {self}");
                self.to_string()
            }
            AppError::JwtError(err) => {
                log::warn!("Token rejected: {err}");
                "Invalid access token".to_string()
            }
            AppError::NotFound(msg) => msg.clone(),
            AppError::DeliveryFailure(msg) => {
                log::error!("Delivery failure: {msg}");
                "Could not deliver the verification code".to_string()
            }
            AppError::UpstreamAiFailure(msg) => {
                log::error!("Upstream AI failure: {msg}");
                msg.clone()
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                "Database error".to_string()
            }
            _ => {
                log::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
        };

        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": message
            }
        }))
    }
}

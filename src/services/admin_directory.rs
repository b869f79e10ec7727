use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::utils::verify_password;
use std::sync::Arc;

/// 配置中声明的管理员身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPrincipal {
    pub email: String,
    pub password_hash: String,
    pub phone_number: Option<String>,
    pub name: Option<String>,
}

/// 基于配置的管理员目录，邮箱大小写不敏感
#[derive(Debug, Clone)]
pub struct AdminDirectory {
    principals: Arc<Vec<AdminPrincipal>>,
    country_code: String,
}

impl AdminDirectory {
    pub fn new(principals: Vec<AdminPrincipal>, country_code: impl Into<String>) -> Self {
        Self {
            principals: Arc::new(principals),
            country_code: country_code.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        let principals = config
            .admins
            .iter()
            .map(|a| AdminPrincipal {
                email: a.email.trim().to_string(),
                password_hash: a.password_hash.clone(),
                phone_number: a.phone_number.clone().filter(|p| !p.trim().is_empty()),
                name: a.name.clone(),
            })
            .collect::<Vec<_>>();
        if principals.is_empty() {
            log::warn!("No admin principals configured, the admin API is unreachable");
        }
        Self::new(principals, config.country_code.clone())
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn find(&self, email: &str) -> Option<&AdminPrincipal> {
        let email = email.trim();
        self.principals
            .iter()
            .find(|p| p.email.eq_ignore_ascii_case(email))
    }

    /// 校验邮箱与密码；未知账号与密码错误返回同一个错误
    pub fn authenticate(&self, email: &str, password: &str) -> AppResult<&AdminPrincipal> {
        let principal = self.find(email).ok_or(AppError::InvalidCredentials)?;

        match verify_password(password, &principal.password_hash) {
            Ok(true) => Ok(principal),
            Ok(false) => Err(AppError::InvalidCredentials),
            Err(e) => {
                log::error!("Stored password hash for an admin is unusable: {e}");
                Err(AppError::InvalidCredentials)
            }
        }
    }
}

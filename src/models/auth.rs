use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 验证码投递方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    #[default]
    Whatsapp,
    Sms,
    Email,
}

impl DeliveryMethod {
    /// 是否需要请求方提交手机号
    pub fn requires_phone(&self) -> bool {
        matches!(self, DeliveryMethod::Whatsapp | DeliveryMethod::Sms)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Whatsapp => "whatsapp",
            DeliveryMethod::Sms => "sms",
            DeliveryMethod::Email => "email",
        }
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendTwoFactorRequest {
    #[schema(example = "admin@example.com")]
    pub email: String,
    #[schema(example = "Password123")]
    pub password: String,
    #[schema(example = "5512345678")]
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub method: DeliveryMethod,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendTwoFactorResponse {
    pub method: DeliveryMethod,
    /// 脱敏后的投递地址
    #[schema(example = "********5678")]
    pub destination: String,
    #[schema(example = 300)]
    pub expires_in: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTwoFactorRequest {
    #[schema(example = "admin@example.com")]
    pub email: String,
    #[schema(example = "012345")]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTwoFactorResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub admin: AdminProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_request_uses_camel_case() {
        let req: SendTwoFactorRequest = serde_json::from_str(
            r#"{"email":"a@b.c","password":"p","phoneNumber":"5512345678","method":"sms"}"#,
        )
        .unwrap();
        assert_eq!(req.phone_number.as_deref(), Some("5512345678"));
        assert_eq!(req.method, DeliveryMethod::Sms);
    }

    #[test]
    fn test_method_defaults_to_whatsapp() {
        let req: SendTwoFactorRequest =
            serde_json::from_str(r#"{"email":"a@b.c","password":"p"}"#).unwrap();
        assert_eq!(req.method, DeliveryMethod::Whatsapp);
        assert!(req.method.requires_phone());
        assert!(!DeliveryMethod::Email.requires_phone());
    }
}

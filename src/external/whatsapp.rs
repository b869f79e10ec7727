use crate::config::WhatsAppConfig;
use crate::error::{AppError, AppResult};
use crate::external::{MessageSender, truncate_chars};
use crate::utils::mask_phone;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

/// Cloud API 单条文本消息的长度上限（字符）
pub const MAX_TEXT_LENGTH: usize = 4096;

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

/// WhatsApp Business Cloud API 客户端
#[derive(Clone)]
pub struct WhatsAppService {
    client: Client,
    config: WhatsAppConfig,
}

impl WhatsAppService {
    pub fn new(client: Client, config: WhatsAppConfig) -> Self {
        Self { client, config }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.config.graph_base_url.trim_end_matches('/'),
            self.config.api_version,
            self.config.phone_number_id
        )
    }

    /// 校验 webhook 订阅请求携带的 token
    pub fn verify_token_matches(&self, token: &str) -> bool {
        !self.config.verify_token.is_empty() && self.config.verify_token == token
    }
}

#[async_trait]
impl MessageSender for WhatsAppService {
    fn channel(&self) -> &'static str {
        "whatsapp"
    }

    fn max_text_chars(&self) -> Option<usize> {
        Some(MAX_TEXT_LENGTH)
    }

    async fn send_text(&self, to: &str, body: &str) -> AppResult<()> {
        let request = SendMessageRequest {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: TextBody {
                // 超长文本会被 Cloud API 拒收
                body: truncate_chars(body, MAX_TEXT_LENGTH),
            },
        };

        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.config.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::DeliveryFailure(format!("WhatsApp request failed: {e}")))?;

        if response.status().is_success() {
            log::info!("WhatsApp message sent successfully: {}", mask_phone(to));
            Ok(())
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!(
                "WhatsApp API error for {}: Status: {status}, Error: {error_text}",
                mask_phone(to)
            );
            Err(AppError::DeliveryFailure(format!(
                "WhatsApp sending failed ({status}): {error_text}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(verify_token: &str) -> WhatsAppService {
        WhatsAppService::new(
            Client::new(),
            WhatsAppConfig {
                access_token: "EAAG".to_string(),
                phone_number_id: "10987654321".to_string(),
                verify_token: verify_token.to_string(),
                graph_base_url: "https://graph.facebook.com/".to_string(),
                api_version: "v18.0".to_string(),
            },
        )
    }

    #[test]
    fn test_messages_url() {
        assert_eq!(
            service("t").messages_url(),
            "https://graph.facebook.com/v18.0/10987654321/messages"
        );
    }

    #[test]
    fn test_verify_token() {
        let svc = service("hub-secret");
        assert!(svc.verify_token_matches("hub-secret"));
        assert!(!svc.verify_token_matches("other"));
        assert!(!service("").verify_token_matches(""));
    }

    #[test]
    fn test_request_shape() {
        let request = SendMessageRequest {
            messaging_product: "whatsapp",
            to: "525512345678",
            kind: "text",
            text: TextBody { body: "hola" },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messaging_product"], "whatsapp");
        assert_eq!(value["to"], "525512345678");
        assert_eq!(value["type"], "text");
        assert_eq!(value["text"]["body"], "hola");
    }

    #[test]
    fn test_truncate_to_text_limit() {
        let long = "ñ".repeat(MAX_TEXT_LENGTH + 10);
        assert_eq!(truncate_chars(&long, MAX_TEXT_LENGTH).chars().count(), MAX_TEXT_LENGTH);
        assert_eq!(truncate_chars("corto", MAX_TEXT_LENGTH), "corto");
        assert_eq!(service("t").max_text_chars(), Some(MAX_TEXT_LENGTH));
    }
}

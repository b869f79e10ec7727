use crate::config::TwilioConfig;
use crate::error::{AppError, AppResult};
use crate::external::MessageSender;
use crate::utils::mask_phone;
use async_trait::async_trait;
use reqwest::Client;

/// Twilio 短信通道，仅用于投递二次验证码
#[derive(Clone)]
pub struct TwilioService {
    client: Client,
    config: TwilioConfig,
}

impl TwilioService {
    pub fn new(client: Client, config: TwilioConfig) -> Self {
        Self { client, config }
    }

    fn messages_url(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.config.account_sid
        )
    }
}

/// Twilio 要求 E.164 格式
fn to_e164(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("+{digits}")
}

#[async_trait]
impl MessageSender for TwilioService {
    fn channel(&self) -> &'static str {
        "sms"
    }

    async fn send_text(&self, to: &str, body: &str) -> AppResult<()> {
        let to = to_e164(to);
        let params = [
            ("To", to.as_str()),
            ("From", self.config.from_phone.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::DeliveryFailure(format!("SMS request failed: {e}")))?;

        if response.status().is_success() {
            log::info!("SMS sent successfully: {}", mask_phone(&to));
            Ok(())
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!(
                "SMS failed to send: {}, Status: {status}, Error: {error_text}",
                mask_phone(&to)
            );
            Err(AppError::DeliveryFailure(format!(
                "SMS sending failed ({status}): {error_text}"
            )))
        }
    }
}

use crate::config::SmtpConfig;
use crate::error::{AppError, AppResult};
use crate::external::MessageSender;
use crate::utils::mask_email;
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// SMTP 邮件通道，用于二次验证码的邮件投递
#[derive(Clone)]
pub struct EmailService {
    config: SmtpConfig,
    subject: String,
}

impl EmailService {
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config,
            subject: "Código de verificación".to_string(),
        }
    }

    fn build_message(&self, to: &str, body: &str) -> AppResult<Message> {
        let from: Mailbox = self
            .config
            .from_address
            .parse()
            .map_err(|e| AppError::ConfigError(format!("Invalid from address: {e}")))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::DeliveryFailure(format!("Invalid to address: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.subject.clone())
            .body(body.to_string())
            .map_err(|e| AppError::DeliveryFailure(format!("Failed to build email: {e}")))
    }
}

#[async_trait]
impl MessageSender for EmailService {
    fn channel(&self) -> &'static str {
        "email"
    }

    async fn send_text(&self, to: &str, body: &str) -> AppResult<()> {
        let email = self.build_message(to, body)?;
        let config = self.config.clone();

        // lettre 的同步 transport 放到阻塞线程池里跑
        let result = tokio::task::spawn_blocking(move || {
            let creds = Credentials::new(config.username.clone(), config.password.clone());
            let transport = SmtpTransport::relay(&config.host)
                .map_err(|e| format!("SMTP relay error: {e}"))?
                .port(config.port)
                .credentials(creds)
                .build();
            transport
                .send(&email)
                .map(|_| ())
                .map_err(|e| format!("SMTP send failed: {e}"))
        })
        .await
        .map_err(|e| AppError::InternalError(format!("SMTP task panicked: {e}")))?;

        match result {
            Ok(()) => {
                log::info!("Email sent successfully: {}", mask_email(to));
                Ok(())
            }
            Err(reason) => {
                log::error!("Email failed to send: {}, Error: {reason}", mask_email(to));
                Err(AppError::DeliveryFailure(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(from: &str) -> EmailService {
        EmailService::new(SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "relay".to_string(),
            password: "secret".to_string(),
            from_address: from.to_string(),
        })
    }

    #[test]
    fn test_build_message() {
        let message = service("Relay <relay@example.com>")
            .build_message("admin@example.com", "Your code is 012345")
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: admin@example.com"));
        assert!(raw.contains("012345"));
    }

    #[test]
    fn test_invalid_recipient_is_delivery_failure() {
        let err = service("relay@example.com")
            .build_message("not an address", "x")
            .unwrap_err();
        assert!(matches!(err, AppError::DeliveryFailure(_)));
    }

    #[test]
    fn test_invalid_sender_is_config_error() {
        let err = service("???")
            .build_message("admin@example.com", "x")
            .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}

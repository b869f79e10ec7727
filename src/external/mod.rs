pub mod anthropic;
pub mod email;
pub mod twilio;
pub mod whatsapp;

pub use anthropic::*;
pub use email::*;
pub use twilio::*;
pub use whatsapp::*;

use crate::config::HttpClientConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::time::Duration;

/// 向某个地址投递一条纯文本消息（WhatsApp、短信、邮件）
#[async_trait]
pub trait MessageSender: Send + Sync {
    fn channel(&self) -> &'static str;

    /// 单条消息的字符上限，`None` 表示不限
    fn max_text_chars(&self) -> Option<usize> {
        None
    }

    async fn send_text(&self, to: &str, body: &str) -> AppResult<()>;
}

/// 单轮补全，不携带会话上下文
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> AppResult<String>;
}

/// 按字符（而非字节）截断
pub fn truncate_chars(body: &str, max_chars: usize) -> &str {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// 所有外部 HTTP 调用共用的客户端，带统一超时
pub fn build_http_client(config: &HttpClientConfig) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| AppError::ConfigError(format!("Cannot build HTTP client: {e}")))
}

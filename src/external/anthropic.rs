use crate::config::AnthropicConfig;
use crate::error::{AppError, AppResult};
use crate::external::CompletionClient;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ApiMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Messages API 客户端
#[derive(Clone)]
pub struct AnthropicService {
    client: Client,
    api_key: String,
    config: AnthropicConfig,
}

impl AnthropicService {
    /// 未配置 api_key 时返回 None，调用方直接使用关键词回复
    pub fn from_config(client: Client, config: &AnthropicConfig) -> Option<Self> {
        let api_key = config.api_key.as_deref()?.trim();
        if api_key.is_empty() {
            return None;
        }
        Some(Self {
            client,
            api_key: api_key.to_string(),
            config: config.clone(),
        })
    }
}

/// 取第一个文本块；缺失或为空都算上游异常
pub(crate) fn extract_text(payload: &str) -> AppResult<String> {
    let parsed: MessagesResponse = serde_json::from_str(payload)
        .map_err(|e| AppError::UpstreamAiFailure(format!("Malformed response: {e}")))?;

    parsed
        .content
        .into_iter()
        .find(|block| block.kind == "text" || block.kind.is_empty())
        .and_then(|block| block.text)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| AppError::UpstreamAiFailure("Empty completion".to_string()))
}

#[async_trait]
impl CompletionClient for AnthropicService {
    async fn complete(&self, prompt: &str) -> AppResult<String> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: [ApiMessage {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::UpstreamAiFailure(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::UpstreamAiFailure(format!("Cannot read body: {e}")))?;

        if !status.is_success() {
            return Err(AppError::UpstreamAiFailure(format!("{status}: {body}")));
        }

        extract_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text() {
        let body = r#"{"id":"msg_1","content":[{"type":"text","text":"¡Hola! ¿En qué te ayudo?"}]}"#;
        assert_eq!(extract_text(body).unwrap(), "¡Hola! ¿En qué te ayudo?");
    }

    #[test]
    fn test_extract_text_rejects_malformed() {
        assert!(matches!(
            extract_text("<html>bad gateway</html>"),
            Err(AppError::UpstreamAiFailure(_))
        ));
        assert!(matches!(
            extract_text(r#"{"content":[]}"#),
            Err(AppError::UpstreamAiFailure(_))
        ));
        assert!(matches!(
            extract_text(r#"{"content":[{"type":"text","text":"   "}]}"#),
            Err(AppError::UpstreamAiFailure(_))
        ));
        assert!(matches!(
            extract_text(r#"{"type":"error","error":{"type":"authentication_error"}}"#),
            Err(AppError::UpstreamAiFailure(_))
        ));
    }

    #[test]
    fn test_from_config_requires_key() {
        let mut config = AnthropicConfig::default();
        assert!(AnthropicService::from_config(Client::new(), &config).is_none());
        config.api_key = Some("  ".to_string());
        assert!(AnthropicService::from_config(Client::new(), &config).is_none());
        config.api_key = Some("sk-ant".to_string());
        assert!(AnthropicService::from_config(Client::new(), &config).is_some());
    }

    #[test]
    fn test_request_shape() {
        let request = MessagesRequest {
            model: "claude-3-5-sonnet-20241022",
            max_tokens: 1024,
            messages: [ApiMessage {
                role: "user",
                content: "hola",
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["max_tokens"], 1024);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hola");
    }
}

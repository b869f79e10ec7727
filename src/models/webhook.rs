//! WhatsApp Cloud API webhook 载荷

use serde::{Deserialize, Serialize};

/// WhatsApp Business 账号事件的 object 标识
pub const WHATSAPP_OBJECT: &str = "whatsapp_business_account";

/// 订阅校验参数，兼容 `hub.` 前缀和不带前缀两种写法
#[derive(Debug, Deserialize)]
pub struct WebhookVerifyQuery {
    #[serde(rename = "hub.mode", alias = "mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token", alias = "verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge", alias = "challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: Option<String>,
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeValue {
    /// 状态回执等事件没有 messages；逐条解码，见 `message_events`
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub from: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<TextContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub body: String,
}

/// 从载荷中拆出的一条待处理文本消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub from: String,
    pub body: String,
}

impl WebhookPayload {
    pub fn is_whatsapp(&self) -> bool {
        self.object == WHATSAPP_OBJECT
    }

    /// 按 entry → changes → messages 顺序展开所有文本消息
    ///
    /// 非文本消息和格式错误的消息各自跳过，不影响同批其他消息。
    pub fn message_events(&self) -> Vec<MessageEvent> {
        self.entry
            .iter()
            .flat_map(|entry| entry.changes.iter())
            .flat_map(|change| change.value.messages.iter())
            .filter_map(message_event)
            .collect()
    }
}

fn message_event(raw: &serde_json::Value) -> Option<MessageEvent> {
    let message = match IncomingMessage::deserialize(raw) {
        Ok(message) => message,
        Err(e) => {
            log::warn!("Skipping malformed webhook message: {e}");
            return None;
        }
    };

    match message.text {
        Some(text) => Some(MessageEvent {
            from: message.from,
            body: text.body,
        }),
        None => {
            log::info!(
                "Skipping non-text message of type {:?} from {}",
                message.kind,
                crate::utils::mask_phone(&message.from)
            );
            None
        }
    }
}

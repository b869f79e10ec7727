use crate::entities::conversations::Sender;
use crate::external::{MessageSender, truncate_chars};
use crate::models::{MessageEvent, WebhookPayload};
use crate::services::{ConversationStore, ReplyResolver};
use crate::utils::mask_phone;
use futures_util::future::join_all;
use std::sync::Arc;

/// 单条消息的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    pub from: String,
    pub inbound_saved: bool,
    pub reply_sent: bool,
    pub outbound_saved: bool,
}

impl EventOutcome {
    pub fn is_clean(&self) -> bool {
        self.inbound_saved && self.reply_sent && self.outbound_saved
    }
}

/// 入站消息流水线：落库 → 生成回复 → 发送 → 回复落库
///
/// 每条消息是独立的错误边界，一条失败不影响同批其他消息。
#[derive(Clone)]
pub struct MessagePipeline {
    store: Arc<dyn ConversationStore>,
    resolver: ReplyResolver,
    sender: Arc<dyn MessageSender>,
}

impl MessagePipeline {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        resolver: ReplyResolver,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self {
            store,
            resolver,
            sender,
        }
    }

    pub async fn handle_payload(&self, payload: &WebhookPayload) -> Vec<EventOutcome> {
        let events = payload.message_events();
        if events.is_empty() {
            return Vec::new();
        }

        let outcomes = join_all(events.into_iter().map(|e| self.process_event(e))).await;

        let failed = outcomes.iter().filter(|o| !o.is_clean()).count();
        if failed > 0 {
            log::warn!(
                "Webhook batch processed with {failed} of {} events degraded",
                outcomes.len()
            );
        } else {
            log::info!("Webhook batch processed: {} events", outcomes.len());
        }
        outcomes
    }

    pub async fn process_event(&self, event: MessageEvent) -> EventOutcome {
        let masked = mask_phone(&event.from);
        log::info!("Message from {masked}: {} chars", event.body.chars().count());

        // 持久化失败只记日志，不阻断回复
        let inbound_saved = match self
            .store
            .save_message(&event.from, &event.body, Sender::User)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to persist inbound message from {masked}: {e}");
                false
            }
        };

        let mut reply = self.resolver.resolve(&event.body).await;
        // 发送与落库使用同一份截断后的文本
        if let Some(max) = self.sender.max_text_chars() {
            reply = truncate_chars(&reply, max).to_string();
        }

        let reply_sent = match self.sender.send_text(&event.from, &reply).await {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "Failed to deliver reply to {masked} via {}: {e}",
                    self.sender.channel()
                );
                false
            }
        };

        let outbound_saved = match self.store.save_message(&event.from, &reply, Sender::Bot).await
        {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to persist outbound message to {masked}: {e}");
                false
            }
        };

        EventOutcome {
            from: event.from,
            inbound_saved,
            reply_sent,
            outbound_saved,
        }
    }
}

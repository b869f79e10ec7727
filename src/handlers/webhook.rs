use crate::external::WhatsAppService;
use crate::models::{WebhookPayload, WebhookVerifyQuery};
use crate::services::MessagePipeline;
use actix_web::{HttpResponse, Result, web};
use log::{error, info, warn};

/// WhatsApp webhook 订阅校验
///
/// `hub.mode` 存在且 `hub.verify_token` 与配置一致时原样返回 `hub.challenge`。
pub async fn verify_webhook(
    query: web::Query<WebhookVerifyQuery>,
    whatsapp: web::Data<WhatsAppService>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let token_ok = query
        .verify_token
        .as_deref()
        .is_some_and(|t| whatsapp.verify_token_matches(t));

    if query.mode.is_some() && token_ok {
        info!("Webhook verified");
        Ok(HttpResponse::Ok()
            .content_type("text/plain")
            .body(query.challenge.unwrap_or_default()))
    } else {
        warn!("Webhook verification rejected");
        Ok(HttpResponse::Forbidden().finish())
    }
}

/// WhatsApp webhook 事件接收
///
/// 非 WhatsApp Business 事件返回 404；载荷无法解析返回 500。
pub async fn receive_webhook(
    body: web::Bytes,
    pipeline: web::Data<MessagePipeline>,
) -> Result<HttpResponse> {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            // object 字段存在但不是 WhatsApp 时仍按 404 处理
            let object = serde_json::from_slice::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("object").and_then(|o| o.as_str()).map(str::to_string));
            if object
                .as_deref()
                .is_some_and(|o| o != crate::models::WHATSAPP_OBJECT)
            {
                warn!("Ignoring webhook for object {object:?}");
                return Ok(HttpResponse::NotFound().finish());
            }
            error!("Failed to decode webhook payload: {e}");
            return Ok(HttpResponse::InternalServerError().finish());
        }
    };

    if !payload.is_whatsapp() {
        warn!("Ignoring webhook for object {}", payload.object);
        return Ok(HttpResponse::NotFound().finish());
    }

    pipeline.handle_payload(&payload).await;
    Ok(HttpResponse::Ok().finish())
}

pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/webhook")
            .route(web::get().to(verify_webhook))
            .route(web::post().to(receive_webhook)),
    );
}

use crate::middlewares::current_admin;
use crate::models::*;
use crate::services::AdminService;
use crate::utils::mask_email;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

fn log_access(req: &HttpRequest, resource: &str) {
    if let Some(admin) = current_admin(req) {
        log::info!("Admin {} read {resource}", mask_email(&admin));
    }
}

#[utoipa::path(
    get,
    path = "/stats",
    tag = "admin",
    responses(
        (status = 200, description = "用户与消息统计", body = StatsResponse),
        (status = 401, description = "未认证", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_stats(
    req: HttpRequest,
    admin_service: web::Data<AdminService>,
) -> Result<HttpResponse> {
    log_access(&req, "stats");
    match admin_service.stats().await {
        Ok(stats) => Ok(HttpResponse::Ok().json(ApiResponse::success(stats))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/conversations",
    tag = "admin",
    params(LimitQuery),
    responses(
        (status = 200, description = "最近的消息，新的在前", body = [ConversationEntry]),
        (status = 401, description = "未认证", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_conversations(
    req: HttpRequest,
    admin_service: web::Data<AdminService>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse> {
    log_access(&req, "recent conversations");
    let limit = query.resolve(DEFAULT_CONVERSATION_LIMIT);
    match admin_service.recent_conversations(limit).await {
        Ok(list) => Ok(HttpResponse::Ok().json(ApiResponse::success(list))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "admin",
    responses(
        (status = 200, description = "联系人列表", body = [UserSummary]),
        (status = 401, description = "未认证", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_users(
    req: HttpRequest,
    admin_service: web::Data<AdminService>,
) -> Result<HttpResponse> {
    log_access(&req, "users");
    match admin_service.users().await {
        Ok(list) => Ok(HttpResponse::Ok().json(ApiResponse::success(list))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/conversations/{phoneNumber}",
    tag = "admin",
    params(
        ("phoneNumber" = String, Path, description = "联系人手机号"),
        LimitQuery
    ),
    responses(
        (status = 200, description = "单个联系人的消息记录，按时间正序", body = [ConversationEntry]),
        (status = 401, description = "未认证", body = ApiError),
        (status = 404, description = "联系人不存在", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_conversation_history(
    req: HttpRequest,
    admin_service: web::Data<AdminService>,
    path: web::Path<String>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse> {
    log_access(&req, "conversation history");
    let limit = query.resolve(DEFAULT_HISTORY_LIMIT);
    match admin_service
        .conversation_history(&path.into_inner(), limit)
        .await
    {
        Ok(list) => Ok(HttpResponse::Ok().json(ApiResponse::success(list))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/stats", web::get().to(get_stats))
        .route("/users", web::get().to(get_users))
        .route("/conversations", web::get().to(get_conversations))
        .route(
            "/conversations/{phoneNumber}",
            web::get().to(get_conversation_history),
        );
}

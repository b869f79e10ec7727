use crate::entities::{conversation_entity as conversations, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::normalize_phone;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use std::collections::HashMap;

/// 管理后台只读查询
#[derive(Clone)]
pub struct AdminService {
    pool: DatabaseConnection,
    country_code: String,
}

impl AdminService {
    pub fn new(pool: DatabaseConnection, country_code: impl Into<String>) -> Self {
        Self {
            pool,
            country_code: country_code.into(),
        }
    }

    pub async fn stats(&self) -> AppResult<StatsResponse> {
        self.stats_at(Utc::now()).await
    }

    /// 以 `now` 为基准统计："今天"按 UTC 自然日，活跃用户取最近 24 小时
    pub async fn stats_at(&self, now: DateTime<Utc>) -> AppResult<StatsResponse> {
        let total_users = users::Entity::find().count(&self.pool).await?;

        let start_of_day = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or(now);
        let messages_today = conversations::Entity::find()
            .filter(conversations::Column::CreatedAt.gte(start_of_day))
            .count(&self.pool)
            .await?;

        #[derive(Debug, sea_orm::FromQueryResult)]
        struct CountRow {
            count: i64,
        }
        let active_users_24h = conversations::Entity::find()
            .filter(conversations::Column::CreatedAt.gte(now - Duration::hours(24)))
            .select_only()
            .column_as(Expr::cust("COUNT(DISTINCT user_id)"), "count")
            .into_model::<CountRow>()
            .one(&self.pool)
            .await?
            .map(|r| r.count)
            .unwrap_or(0);

        Ok(StatsResponse {
            total_users,
            messages_today,
            active_users_24h: active_users_24h.max(0) as u64,
        })
    }

    /// 最近的消息，新的在前
    pub async fn recent_conversations(&self, limit: u64) -> AppResult<Vec<ConversationEntry>> {
        let rows = conversations::Entity::find()
            .find_also_related(users::Entity)
            .order_by_desc(conversations::Column::CreatedAt)
            .order_by_desc(conversations::Column::Id)
            .limit(limit)
            .all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(conv, user)| ConversationEntry {
                id: conv.id,
                phone_number: user.map(|u| u.phone_number).unwrap_or_default(),
                message: conv.message,
                sender: conv.sender,
                created_at: conv.created_at,
            })
            .collect())
    }

    /// 所有联系人及其消息数、最后消息时间
    pub async fn users(&self) -> AppResult<Vec<UserSummary>> {
        let list = users::Entity::find()
            .order_by_desc(users::Column::CreatedAt)
            .order_by_desc(users::Column::Id)
            .all(&self.pool)
            .await?;

        #[derive(Debug, sea_orm::FromQueryResult)]
        struct UserStatsRow {
            user_id: i64,
            message_count: i64,
            last_message_at: Option<DateTime<Utc>>,
        }
        let stats: HashMap<i64, UserStatsRow> = conversations::Entity::find()
            .select_only()
            .column(conversations::Column::UserId)
            .column_as(Expr::cust("COUNT(*)"), "message_count")
            .column_as(
                Expr::col(conversations::Column::CreatedAt).max(),
                "last_message_at",
            )
            .group_by(conversations::Column::UserId)
            .into_model::<UserStatsRow>()
            .all(&self.pool)
            .await?
            .into_iter()
            .map(|row| (row.user_id, row))
            .collect();

        Ok(list
            .into_iter()
            .map(|u| {
                let row = stats.get(&u.id);
                UserSummary {
                    id: u.id,
                    phone_number: u.phone_number,
                    created_at: u.created_at,
                    message_count: row.map(|r| r.message_count.max(0) as u64).unwrap_or(0),
                    last_message_at: row.and_then(|r| r.last_message_at),
                }
            })
            .collect())
    }

    /// 某个联系人的最近 `limit` 条消息，按时间正序返回
    ///
    /// 号码按入站时的规则归一化，10 位本地号码补国家码。
    pub async fn conversation_history(
        &self,
        phone_number: &str,
        limit: u64,
    ) -> AppResult<Vec<ConversationEntry>> {
        let normalized = normalize_phone(phone_number, &self.country_code);
        let user = users::Entity::find()
            .filter(users::Column::PhoneNumber.eq(normalized.as_str()))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

        let mut rows = conversations::Entity::find()
            .filter(conversations::Column::UserId.eq(user.id))
            .order_by_desc(conversations::Column::CreatedAt)
            .order_by_desc(conversations::Column::Id)
            .limit(limit)
            .all(&self.pool)
            .await?;
        rows.reverse();

        Ok(rows
            .into_iter()
            .map(|conv| ConversationEntry {
                id: conv.id,
                phone_number: user.phone_number.clone(),
                message: conv.message,
                sender: conv.sender,
                created_at: conv.created_at,
            })
            .collect())
    }
}

use crate::entities::conversations::Sender;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_CONVERSATION_LIMIT: u64 = 50;
pub const DEFAULT_HISTORY_LIMIT: u64 = 100;
pub const MAX_LIMIT: u64 = 500;

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitQuery {
    /// 返回条数，1-500
    pub limit: Option<u64>,
}

impl LimitQuery {
    pub fn resolve(&self, default: u64) -> u64 {
        self.limit.unwrap_or(default).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_users: u64,
    pub messages_today: u64,
    pub active_users_24h: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    pub id: i64,
    pub phone_number: String,
    pub message: String,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub message_count: u64,
    pub last_message_at: Option<DateTime<Utc>>,
}

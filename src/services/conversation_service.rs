use crate::entities::conversations::Sender;
use crate::entities::{conversation_entity as conversations, user_entity as users};
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

/// 会话日志的写入端，只追加
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn save_message(&self, phone_number: &str, message: &str, sender: Sender)
    -> AppResult<()>;
}

#[derive(Clone)]
pub struct ConversationService {
    pool: DatabaseConnection,
}

impl ConversationService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 按手机号查找联系人，不存在则创建
    pub async fn find_or_create_user(&self, phone_number: &str) -> AppResult<users::Model> {
        if let Some(user) = self.find_user(phone_number).await? {
            return Ok(user);
        }

        let model = users::ActiveModel {
            phone_number: Set(phone_number.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        match model.insert(&self.pool).await {
            Ok(user) => Ok(user),
            Err(e) => {
                // 并发插入撞上唯一索引时，另一方已经建好了
                match self.find_user(phone_number).await? {
                    Some(user) => Ok(user),
                    None => Err(e.into()),
                }
            }
        }
    }

    async fn find_user(&self, phone_number: &str) -> AppResult<Option<users::Model>> {
        let user = users::Entity::find()
            .filter(users::Column::PhoneNumber.eq(phone_number))
            .one(&self.pool)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl ConversationStore for ConversationService {
    async fn save_message(
        &self,
        phone_number: &str,
        message: &str,
        sender: Sender,
    ) -> AppResult<()> {
        let user = self.find_or_create_user(phone_number).await?;

        conversations::ActiveModel {
            user_id: Set(user.id),
            message: Set(message.to_string()),
            sender: Set(sender),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::debug!("Saved {sender} message for user {}", user.id);
        Ok(())
    }
}

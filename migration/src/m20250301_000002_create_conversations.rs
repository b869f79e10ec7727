use sea_orm_migration::prelude::*;

use crate::m20250301_000001_create_users::Users;

/// 会话日志，只追加不修改
#[derive(DeriveIden)]
enum Conversations {
    Table,
    Id,
    UserId,
    Message,
    Sender,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Conversations::Table)
                    .if_not_exists()
                    .col(&mut crate::id_column(manager, Conversations::Id))
                    .col(ColumnDef::new(Conversations::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Conversations::Message).text().not_null())
                    // "user" = 入站, "bot" = 出站
                    .col(ColumnDef::new(Conversations::Sender).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Conversations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_conversations_user_id")
                            .from(Conversations::Table, Conversations::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_conversations_user_created")
                    .table(Conversations::Table)
                    .col(Conversations::UserId)
                    .col(Conversations::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_conversations_created_at")
                    .table(Conversations::Table)
                    .col(Conversations::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(Conversations::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}

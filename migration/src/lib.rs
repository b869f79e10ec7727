pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_users;
mod m20250301_000002_create_conversations;

pub struct Migrator;

/// 自增主键：SQLite 只有 INTEGER PRIMARY KEY 才能 AUTOINCREMENT
pub(crate) fn id_column<T: IntoIden>(manager: &SchemaManager, iden: T) -> ColumnDef {
    let mut col = ColumnDef::new(iden);
    match manager.get_database_backend() {
        sea_orm::DatabaseBackend::Sqlite => col.integer(),
        _ => col.big_integer(),
    };
    col.not_null().auto_increment().primary_key().to_owned()
}

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_users::Migration),
            Box::new(m20250301_000002_create_conversations::Migration),
        ]
    }
}

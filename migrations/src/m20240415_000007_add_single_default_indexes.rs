use sea_orm_migration::prelude::*;

/// Partial unique indexes backing the "at most one default per user" rule for
/// payment methods and addresses. sea-query has no builder for partial indexes,
/// so the statements are issued as raw SQL understood by both Postgres and SQLite.
#[derive(DeriveMigrationName)]
pub struct Migration;

const UP: [&str; 2] = [
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_payment_methods_user_default \
     ON payment_methods (user_id) WHERE by_default",
    "CREATE UNIQUE INDEX IF NOT EXISTS ux_user_addresses_user_default \
     ON user_addresses (user_id) WHERE is_default",
];

const DOWN: [&str; 2] = [
    "DROP INDEX IF EXISTS ux_user_addresses_user_default",
    "DROP INDEX IF EXISTS ux_payment_methods_user_default",
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        for sql in UP {
            db.execute_unprepared(sql).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        for sql in DOWN {
            db.execute_unprepared(sql).await?;
        }
        Ok(())
    }
}

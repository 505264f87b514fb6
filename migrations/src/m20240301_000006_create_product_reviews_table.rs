use sea_orm_migration::prelude::*;

use super::m20240301_000001_create_users_table::Users;
use super::m20240301_000002_create_catalog_tables::Products;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProductReviews::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductReviews::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductReviews::ProductId).uuid().not_null())
                    .col(ColumnDef::new(ProductReviews::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(ProductReviews::Rating)
                            .decimal_len(16, 4)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductReviews::Comment).text().not_null())
                    .col(
                        ColumnDef::new(ProductReviews::ReviewDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_product_reviews_product_id")
                            .from(ProductReviews::Table, ProductReviews::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_product_reviews_user_id")
                            .from(ProductReviews::Table, ProductReviews::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One review per (user, product)
        manager
            .create_index(
                Index::create()
                    .name("ux_product_reviews_user_product")
                    .table(ProductReviews::Table)
                    .col(ProductReviews::UserId)
                    .col(ProductReviews::ProductId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProductReviews::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProductReviews {
    Table,
    Id,
    ProductId,
    UserId,
    Rating,
    Comment,
    ReviewDate,
}

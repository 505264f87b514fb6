use sea_orm_migration::prelude::*;

use super::m20240301_000001_create_users_table::Users;
use super::m20240301_000002_create_catalog_tables::Products;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Shopping carts: exactly one per user
        manager
            .create_table(
                Table::create()
                    .table(ShoppingCarts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ShoppingCarts::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShoppingCarts::UserId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shopping_carts_user_id")
                            .from(ShoppingCarts::Table, ShoppingCarts::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CartItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CartItems::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(CartItems::CartId).uuid().not_null())
                    .col(ColumnDef::new(CartItems::ProductId).uuid().not_null())
                    .col(ColumnDef::new(CartItems::Quantity).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cart_items_cart_id")
                            .from(CartItems::Table, CartItems::CartId)
                            .to(ShoppingCarts::Table, ShoppingCarts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cart_items_product_id")
                            .from(CartItems::Table, CartItems::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ux_cart_items_cart_product")
                    .table(CartItems::Table)
                    .col(CartItems::CartId)
                    .col(CartItems::ProductId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Wish lists: exactly one per user
        manager
            .create_table(
                Table::create()
                    .table(WishLists::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(WishLists::Id).uuid().primary_key().not_null())
                    .col(
                        ColumnDef::new(WishLists::UserId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wish_lists_user_id")
                            .from(WishLists::Table, WishLists::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WishListItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WishListItems::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WishListItems::WishListId).uuid().not_null())
                    .col(ColumnDef::new(WishListItems::ProductId).uuid().not_null())
                    .col(
                        ColumnDef::new(WishListItems::AddedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wish_list_items_wish_list_id")
                            .from(WishListItems::Table, WishListItems::WishListId)
                            .to(WishLists::Table, WishLists::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wish_list_items_product_id")
                            .from(WishListItems::Table, WishListItems::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ux_wish_list_items_list_product")
                    .table(WishListItems::Table)
                    .col(WishListItems::WishListId)
                    .col(WishListItems::ProductId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WishListItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WishLists::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CartItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ShoppingCarts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ShoppingCarts {
    Table,
    Id,
    UserId,
}

#[derive(DeriveIden)]
enum CartItems {
    Table,
    Id,
    CartId,
    ProductId,
    Quantity,
}

#[derive(DeriveIden)]
enum WishLists {
    Table,
    Id,
    UserId,
}

#[derive(DeriveIden)]
enum WishListItems {
    Table,
    Id,
    WishListId,
    ProductId,
    AddedAt,
}

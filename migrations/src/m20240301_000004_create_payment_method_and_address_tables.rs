use sea_orm_migration::prelude::*;

use super::m20240301_000001_create_users_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PaymentMethods::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentMethods::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentMethods::UserId).uuid().not_null())
                    .col(ColumnDef::new(PaymentMethods::StripeId).string().not_null())
                    .col(ColumnDef::new(PaymentMethods::Brand).string().not_null())
                    .col(ColumnDef::new(PaymentMethods::Country).string().not_null())
                    .col(ColumnDef::new(PaymentMethods::ExpMonth).integer().not_null())
                    .col(ColumnDef::new(PaymentMethods::ExpYear).integer().not_null())
                    .col(ColumnDef::new(PaymentMethods::Last4).string_len(4).not_null())
                    .col(ColumnDef::new(PaymentMethods::Funding).string().not_null())
                    .col(
                        ColumnDef::new(PaymentMethods::Fingerprint)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentMethods::ByDefault)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(PaymentMethods::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payment_methods_user_id")
                            .from(PaymentMethods::Table, PaymentMethods::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ux_payment_methods_user_fingerprint")
                    .table(PaymentMethods::Table)
                    .col(PaymentMethods::UserId)
                    .col(PaymentMethods::Fingerprint)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserAddresses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserAddresses::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserAddresses::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(UserAddresses::AddressLine1)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserAddresses::AddressLine2).string().null())
                    .col(ColumnDef::new(UserAddresses::City).string().not_null())
                    .col(ColumnDef::new(UserAddresses::State).string().not_null())
                    .col(ColumnDef::new(UserAddresses::PostalCode).string().not_null())
                    .col(ColumnDef::new(UserAddresses::Country).string().not_null())
                    .col(ColumnDef::new(UserAddresses::PhoneNumber).string().null())
                    .col(
                        ColumnDef::new(UserAddresses::IsDefault)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_addresses_user_id")
                            .from(UserAddresses::Table, UserAddresses::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserAddresses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PaymentMethods::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum PaymentMethods {
    Table,
    Id,
    UserId,
    StripeId,
    Brand,
    Country,
    ExpMonth,
    ExpYear,
    Last4,
    Funding,
    Fingerprint,
    ByDefault,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum UserAddresses {
    Table,
    Id,
    UserId,
    AddressLine1,
    AddressLine2,
    City,
    State,
    PostalCode,
    Country,
    PhoneNumber,
    IsDefault,
}

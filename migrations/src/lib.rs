pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_users_table;
mod m20240301_000002_create_catalog_tables;
mod m20240301_000003_create_cart_tables;
mod m20240301_000004_create_payment_method_and_address_tables;
mod m20240301_000005_create_orders_tables;
mod m20240301_000006_create_product_reviews_table;
mod m20240415_000007_add_single_default_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_users_table::Migration),
            Box::new(m20240301_000002_create_catalog_tables::Migration),
            Box::new(m20240301_000003_create_cart_tables::Migration),
            Box::new(m20240301_000004_create_payment_method_and_address_tables::Migration),
            Box::new(m20240301_000005_create_orders_tables::Migration),
            Box::new(m20240301_000006_create_product_reviews_table::Migration),
            Box::new(m20240415_000007_add_single_default_indexes::Migration),
        ]
    }
}

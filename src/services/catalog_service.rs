use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, QueryOrder};
use tracing::instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::{ProductSearch, QueryBuilder};
use crate::entities::{product, shipping_method};
use crate::errors::ServiceError;
use crate::models::Page;

/// Read-only access to the parts of the catalog the commerce core consumes.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    /// Visible products matching every clause of `search`, ordered by name.
    #[instrument(skip(self))]
    pub async fn find_products(
        &self,
        search: ProductSearch,
        page: u64,
        size: Option<u64>,
    ) -> Result<Page<product::Model>, ServiceError> {
        let limit = self.config.page_size(size);
        let page = QueryBuilder::<product::Entity>::new()
            .filter(search.to_condition())
            .order_by(product::Column::Name, false)
            .order_by(product::Column::Id, false)
            .paginate(page, limit)
            .execute(&*self.db)
            .await?;
        Ok(page)
    }

    #[instrument(skip(self))]
    pub async fn find_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        find_product(&*self.db, product_id).await
    }

    /// Every shipping method, sorted by name.
    #[instrument(skip(self))]
    pub async fn find_all_shipping_methods(
        &self,
    ) -> Result<Vec<shipping_method::Model>, ServiceError> {
        Ok(shipping_method::Entity::find()
            .order_by_asc(shipping_method::Column::Name)
            .all(&*self.db)
            .await?)
    }
}

pub(crate) async fn find_product<C>(db: &C, product_id: Uuid) -> Result<product::Model, ServiceError>
where
    C: ConnectionTrait,
{
    product::Entity::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}

/// Hidden products are reported as missing.
pub(crate) async fn find_visible_product<C>(
    db: &C,
    product_id: Uuid,
) -> Result<product::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let product = find_product(db, product_id).await?;
    if !product.is_visible {
        return Err(ServiceError::NotFound(format!(
            "Product {} not found",
            product_id
        )));
    }
    Ok(product)
}

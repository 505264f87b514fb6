use crate::{
    entities::{wish_list, wish_list_item},
    errors::ServiceError,
    events::{Event, EventSender},
    models::WishList,
    services::{catalog_service::find_visible_product, permission_checker::PermissionChecker},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Wish list service. Mirrors the cart operations with a 50 item bound and
/// idempotent adds.
#[derive(Clone)]
pub struct WishListService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    permissions: PermissionChecker,
}

impl WishListService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            event_sender,
            permissions: PermissionChecker::new(),
        }
    }

    #[instrument(skip(self))]
    pub async fn find_wish_list(&self, user_id: Uuid) -> Result<WishList, ServiceError> {
        self.permissions.check_user(&*self.db, user_id).await?;

        let list = wish_list::Entity::find()
            .filter(wish_list::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Wish list for user {} not found", user_id))
            })?;

        Ok(load_wish_list(&*self.db, list).await?)
    }

    /// Adds a product. Adding a product that is already listed changes nothing.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        wish_list_id: Uuid,
        product_id: Uuid,
    ) -> Result<WishList, ServiceError> {
        let txn = self.db.begin().await?;

        let list = self
            .permissions
            .check_wish_list(&txn, wish_list_id, user_id)
            .await?;
        find_visible_product(&txn, product_id).await?;

        let mut list = load_wish_list(&txn, list).await?;
        let Some(item) = list.add(product_id, Utc::now())? else {
            debug!(%wish_list_id, %product_id, "Product already in wish list");
            return Ok(list);
        };

        wish_list_item::ActiveModel {
            id: Set(item.id),
            wish_list_id: Set(item.wish_list_id),
            product_id: Set(item.product_id),
            added_at: Set(item.added_at),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            ServiceError::from_db_unique(e, || {
                ServiceError::Conflict(format!(
                    "Product {} was added to wish list {} concurrently",
                    product_id, wish_list_id
                ))
            })
        })?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::WishListItemAdded {
                wish_list_id,
                product_id,
            })
            .await;

        info!(%wish_list_id, %product_id, "Added item to wish list");
        Ok(list)
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        wish_list_id: Uuid,
        product_id: Uuid,
    ) -> Result<WishList, ServiceError> {
        let txn = self.db.begin().await?;

        let list = self
            .permissions
            .check_wish_list(&txn, wish_list_id, user_id)
            .await?;
        let mut list = load_wish_list(&txn, list).await?;
        let item = list.remove(product_id)?;
        item.delete(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::WishListItemRemoved {
                wish_list_id,
                product_id,
            })
            .await;

        info!(%wish_list_id, %product_id, "Removed item from wish list");
        Ok(list)
    }
}

async fn load_wish_list<C>(db: &C, list: wish_list::Model) -> Result<WishList, sea_orm::DbErr>
where
    C: ConnectionTrait,
{
    let items = list.find_related(wish_list_item::Entity).all(db).await?;
    Ok(WishList::new(list, items))
}

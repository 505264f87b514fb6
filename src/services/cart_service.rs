use crate::{
    entities::{cart_item, shopping_cart},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{Cart, LineChange},
    services::{catalog_service::find_visible_product, permission_checker::PermissionChecker},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Shopping cart service.
///
/// The `CartService` manages the lines of a user's cart:
/// - Adding products (incrementing an existing line or inserting a new one)
/// - Overwriting a line's quantity
/// - Removing lines
///
/// Every operation checks cart ownership first and runs in a single transaction.
/// Bounds (20 distinct products, 100 per line) are enforced by [`Cart`] before
/// anything is written.
///
/// # Examples
///
/// ```ignore
/// use commerce_core::services::CartService;
///
/// let cart_service = CartService::new(db, event_sender);
/// let cart = cart_service.add_item(user_id, cart_id, product_id, 2).await?;
/// assert_eq!(cart.line(product_id).map(|l| l.quantity), Some(2));
/// ```
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    permissions: PermissionChecker,
}

impl CartService {
    /// Creates a new `CartService` instance.
    ///
    /// # Arguments
    ///
    /// * `db` - Database connection pool
    /// * `event_sender` - Event sender for publishing cart events
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            event_sender,
            permissions: PermissionChecker::new(),
        }
    }

    /// Returns the cart owned by `user_id` with all of its lines.
    #[instrument(skip(self))]
    pub async fn find_shopping_cart(&self, user_id: Uuid) -> Result<Cart, ServiceError> {
        self.permissions.check_user(&*self.db, user_id).await?;

        let cart = shopping_cart::Entity::find()
            .filter(shopping_cart::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Shopping cart for user {} not found", user_id))
            })?;

        Ok(load_cart(&*self.db, cart).await?)
    }

    /// Adds a product to the cart or increments its quantity if already present.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Acting user, must own the cart
    /// * `cart_id` - UUID of the target cart
    /// * `product_id` - Product to add; must exist and be visible
    /// * `quantity` - Units to add, at least 1
    ///
    /// # Returns
    ///
    /// * `Ok(Cart)` - The updated cart
    /// * `Err(ServiceError::NotFound)` - User, cart or product not found
    /// * `Err(ServiceError::Forbidden)` - Cart belongs to another user
    /// * `Err(ServiceError::CapacityExceeded)` - Cart is full or the line would exceed 100
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Cart, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self
            .permissions
            .check_shopping_cart(&txn, cart_id, user_id)
            .await?;
        find_visible_product(&txn, product_id).await?;

        let mut cart = load_cart(&txn, cart).await?;
        let change = cart.add(product_id, quantity)?;

        match &change {
            LineChange::Inserted(line) => {
                cart_item::ActiveModel {
                    id: Set(line.id),
                    cart_id: Set(line.cart_id),
                    product_id: Set(line.product_id),
                    quantity: Set(line.quantity),
                }
                .insert(&txn)
                .await
                .map_err(|e| {
                    ServiceError::from_db_unique(e, || {
                        ServiceError::Conflict(format!(
                            "Product {} was added to cart {} concurrently",
                            product_id, cart_id
                        ))
                    })
                })?;
            }
            LineChange::Updated(line) => {
                save_quantity(&txn, line).await?;
            }
        }

        txn.commit().await?;

        let new_quantity = change.line().quantity;
        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id,
                product_id,
                quantity: new_quantity,
            })
            .await;

        info!(%cart_id, %product_id, quantity, new_quantity, "Added item to cart");
        Ok(cart)
    }

    /// Overwrites the quantity of a product already in the cart.
    ///
    /// # Returns
    ///
    /// * `Ok(Cart)` - The updated cart
    /// * `Err(ServiceError::NotFound)` - The product is not in the cart
    /// * `Err(ServiceError::CapacityExceeded)` - `quantity` is above 100
    /// * `Err(ServiceError::ValidationError)` - `quantity` is below 1
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        user_id: Uuid,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Cart, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self
            .permissions
            .check_shopping_cart(&txn, cart_id, user_id)
            .await?;
        let mut cart = load_cart(&txn, cart).await?;
        let line = cart.update_quantity(product_id, quantity)?;
        save_quantity(&txn, &line).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id,
                product_id,
                quantity,
            })
            .await;

        info!(%cart_id, %product_id, quantity, "Updated cart item quantity");
        Ok(cart)
    }

    /// Removes a product from the cart.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        cart_id: Uuid,
        product_id: Uuid,
    ) -> Result<Cart, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self
            .permissions
            .check_shopping_cart(&txn, cart_id, user_id)
            .await?;
        let mut cart = load_cart(&txn, cart).await?;
        let line = cart.remove(product_id)?;
        line.delete(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id,
                product_id,
            })
            .await;

        info!(%cart_id, %product_id, "Removed item from cart");
        Ok(cart)
    }
}

pub(crate) async fn load_cart<C>(db: &C, cart: shopping_cart::Model) -> Result<Cart, sea_orm::DbErr>
where
    C: ConnectionTrait,
{
    let items = cart.find_related(cart_item::Entity).all(db).await?;
    Ok(Cart::new(cart, items))
}

async fn save_quantity<C>(db: &C, line: &cart_item::Model) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let mut active: cart_item::ActiveModel = line.clone().into();
    active.quantity = Set(line.quantity);
    active.update(db).await?;
    Ok(())
}

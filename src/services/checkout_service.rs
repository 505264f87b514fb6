use crate::{
    entities::{
        cart_item, order, order_item, payment_method, product, shipping_method, user_address,
        OrderState,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        order::{check_order_capacity, line_total},
        OrderView, StockChange,
    },
    services::{cart_service::load_cart, permission_checker::PermissionChecker},
};
use chrono::Utc;
use metrics::{counter, histogram};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// What the buyer chose at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyInput {
    pub cart_id: Uuid,
    pub payment_method_id: Uuid,
    pub user_address_id: Uuid,
    pub shipping_method_id: Uuid,
}

/// Checkout service for converting carts to orders.
///
/// `buy` is all-or-nothing: the order, its items, the stock decrements and the
/// emptied cart are committed together or not at all.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    permissions: PermissionChecker,
}

impl CheckoutService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            event_sender,
            permissions: PermissionChecker::new(),
        }
    }

    /// Converts the user's cart into a new `PreOrder` order.
    ///
    /// Each cart line becomes an order item carrying the product's current price,
    /// the product's stock is decremented, and the cart is emptied.
    ///
    /// # Returns
    ///
    /// * `Ok(OrderView)` - The created order with its items and total
    /// * `Err(ServiceError::EmptyCart)` - The cart has no lines
    /// * `Err(ServiceError::NotFound)` - Payment method, address or shipping method not found
    /// * `Err(ServiceError::Forbidden)` - The cart belongs to another user
    /// * `Err(ServiceError::Conflict)` - A product's stock changed during checkout
    #[instrument(skip(self))]
    pub async fn buy(&self, user_id: Uuid, input: BuyInput) -> Result<OrderView, ServiceError> {
        let start = std::time::Instant::now();

        let result = self.buy_in_transaction(user_id, input).await;

        histogram!("commerce_checkout.duration", start.elapsed());
        match &result {
            Ok(view) => {
                counter!("commerce_checkout.completed", 1);
                self.event_sender
                    .send_or_log(Event::OrderCreated {
                        order_id: view.order.id,
                        user_id,
                        item_count: view.items.len(),
                        total: view.total,
                    })
                    .await;
                info!(
                    order_id = %view.order.id,
                    cart_id = %input.cart_id,
                    items = view.items.len(),
                    total = %view.total,
                    "Checkout completed"
                );
            }
            Err(e) => {
                counter!("commerce_checkout.rolled_back", 1);
                warn!(cart_id = %input.cart_id, error = %e, "Checkout rolled back");
            }
        }

        result
    }

    async fn buy_in_transaction(
        &self,
        user_id: Uuid,
        input: BuyInput,
    ) -> Result<OrderView, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self
            .permissions
            .check_shopping_cart(&txn, input.cart_id, user_id)
            .await?;
        let mut cart = load_cart(&txn, cart).await?;
        if cart.is_empty() {
            return Err(ServiceError::EmptyCart(input.cart_id));
        }

        let payment_method = find_user_payment_method(&txn, user_id, input.payment_method_id).await?;
        let address = find_user_address(&txn, user_id, input.user_address_id).await?;
        let shipping = shipping_method::Entity::find_by_id(input.shipping_method_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Shipping method {} not found",
                    input.shipping_method_id
                ))
            })?;

        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            payment_method_id: Set(payment_method.id),
            shipping_method_id: Set(shipping.id),
            user_address_id: Set(address.id),
            date: Set(Utc::now()),
            state: Set(OrderState::PreOrder),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(cart.len());
        for line in cart.drain() {
            check_order_capacity(items.len())?;
            items.push(convert_line(&txn, order.id, &line).await?);
        }

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(input.cart_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        Ok(OrderView::new(order, items))
    }
}

/// Snapshots the line into an order item and decrements the product's stock.
async fn convert_line<C>(
    db: &C,
    order_id: Uuid,
    line: &cart_item::Model,
) -> Result<order_item::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let product = product::Entity::find_by_id(line.product_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", line.product_id)))?;

    let item = order_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        product_id: Set(product.id),
        product_price: Set(product.price),
        quantity: Set(line.quantity),
    }
    .insert(db)
    .await?;

    let change = StockChange::for_purchase(product.stock, line.quantity);
    if change.shortfall > 0 {
        warn!(
            product_id = %product.id,
            stock = product.stock,
            quantity = line.quantity,
            shortfall = change.shortfall,
            "Product oversold"
        );
    }
    if change.is_changed(product.stock) {
        // Compare-and-set against the stock that was read above.
        let result = product::Entity::update_many()
            .col_expr(product::Column::Stock, Expr::value(change.new_stock))
            .filter(product::Column::Id.eq(product.id))
            .filter(product::Column::Stock.eq(product.stock))
            .exec(db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "Stock of product {} changed during checkout",
                product.id
            )));
        }
    }

    info!(
        %order_id,
        product_id = %product.id,
        quantity = line.quantity,
        line_total = %line_total(item.product_price, item.quantity),
        "Converted cart line"
    );
    Ok(item)
}

async fn find_user_payment_method<C>(
    db: &C,
    user_id: Uuid,
    payment_method_id: Uuid,
) -> Result<payment_method::Model, ServiceError>
where
    C: ConnectionTrait,
{
    payment_method::Entity::find_by_id(payment_method_id)
        .filter(payment_method::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Payment method {} not found", payment_method_id))
        })
}

async fn find_user_address<C>(
    db: &C,
    user_id: Uuid,
    address_id: Uuid,
) -> Result<user_address::Model, ServiceError>
where
    C: ConnectionTrait,
{
    user_address::Entity::find_by_id(address_id)
        .filter(user_address::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))
}

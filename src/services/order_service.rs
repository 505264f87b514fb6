use crate::{
    config::AppConfig,
    db::QueryBuilder,
    entities::{order, order_item, OrderState, UserRole},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{OrderView, Page},
    services::permission_checker::PermissionChecker,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    LoaderTrait, ModelTrait, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Order queries and the order lifecycle.
///
/// Admins see every order; everyone else only their own. State changes are
/// admin-only and follow the transition table on [`OrderState`].
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
    permissions: PermissionChecker,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
            permissions: PermissionChecker::new(),
        }
    }

    #[instrument(skip(self))]
    pub async fn find_order(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderView, ServiceError> {
        let db = &*self.db;
        let user = self.permissions.check_user(db, user_id).await?;

        let order = if user.is_admin() {
            order::Entity::find_by_id(order_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?
        } else {
            self.permissions.check_order(db, order_id, user_id).await?
        };

        load_view(db, order).await
    }

    /// The user's own orders, newest first.
    #[instrument(skip(self))]
    pub async fn find_orders(
        &self,
        user_id: Uuid,
        page: u64,
        size: Option<u64>,
    ) -> Result<Page<OrderView>, ServiceError> {
        self.permissions.check_user(&*self.db, user_id).await?;
        self.page_of_orders(Condition::all().add(order::Column::UserId.eq(user_id)), page, size)
            .await
    }

    /// Orders in `state`: every such order for admins, otherwise the user's own.
    #[instrument(skip(self))]
    pub async fn find_orders_by_state(
        &self,
        user_id: Uuid,
        state: OrderState,
        page: u64,
        size: Option<u64>,
    ) -> Result<Page<OrderView>, ServiceError> {
        let user = self.permissions.check_user(&*self.db, user_id).await?;
        let mut condition = Condition::all().add(order::Column::State.eq(state));
        if !user.is_admin() {
            condition = condition.add(order::Column::UserId.eq(user_id));
        }
        self.page_of_orders(condition, page, size).await
    }

    /// Every order in the system. Admin only.
    #[instrument(skip(self))]
    pub async fn find_all_orders(
        &self,
        admin_id: Uuid,
        page: u64,
        size: Option<u64>,
    ) -> Result<Page<OrderView>, ServiceError> {
        self.permissions
            .check_user_permission(&*self.db, admin_id, UserRole::Admin)
            .await?;
        self.page_of_orders(Condition::all(), page, size).await
    }

    /// Moves an order to `new_state`. Admin only.
    ///
    /// # Returns
    ///
    /// * `Err(ServiceError::Forbidden)` - The acting user is not an admin
    /// * `Err(ServiceError::NotFound)` - The order does not exist
    /// * `Err(ServiceError::InvalidTransition)` - The move is not in the transition table
    #[instrument(skip(self))]
    pub async fn change_order_state(
        &self,
        admin_id: Uuid,
        order_id: Uuid,
        new_state: OrderState,
    ) -> Result<OrderView, ServiceError> {
        let txn = self.db.begin().await?;

        self.permissions
            .check_user_permission(&txn, admin_id, UserRole::Admin)
            .await?;
        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let from = order.state;
        let to = from.transition_to(new_state)?;

        let mut active: order::ActiveModel = order.into();
        active.state = Set(to);
        let order = active.update(&txn).await?;
        let view = load_view(&txn, order).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderStateChanged { order_id, from, to })
            .await;

        info!(%order_id, %from, %to, "Order state changed");
        Ok(view)
    }

    async fn page_of_orders(
        &self,
        condition: Condition,
        page: u64,
        size: Option<u64>,
    ) -> Result<Page<OrderView>, ServiceError> {
        let db = &*self.db;
        let page = QueryBuilder::<order::Entity>::new()
            .filter(condition)
            .order_by(order::Column::Date, true)
            .order_by(order::Column::Id, true)
            .paginate(page, self.config.page_size(size))
            .execute(db)
            .await?;

        let mut item_lists = page
            .items
            .load_many(order_item::Entity, db)
            .await?
            .into_iter();
        Ok(page.map(|order| OrderView::new(order, item_lists.next().unwrap_or_default())))
    }
}

async fn load_view<C>(db: &C, order: order::Model) -> Result<OrderView, ServiceError>
where
    C: ConnectionTrait,
{
    let items = order.find_related(order_item::Entity).all(db).await?;
    Ok(OrderView::new(order, items))
}

use crate::{
    entities::{order, order_item, product, product_review, UserRole},
    errors::ServiceError,
    events::{Event, EventSender},
    models::review::average_rating,
    services::{
        catalog_service::{find_product, find_visible_product},
        permission_checker::PermissionChecker,
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, JoinType,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddReviewInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(min = 1, max = 2000))]
    pub comment: String,
}

/// A stored review together with the product's recomputed rating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewOutcome {
    pub review: product_review::Model,
    pub product_rating: Decimal,
}

/// Review gate: only clients who bought a product may review it, once.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    permissions: PermissionChecker,
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            event_sender,
            permissions: PermissionChecker::new(),
        }
    }

    /// Records a review and recomputes the product's average rating.
    ///
    /// # Returns
    ///
    /// * `Err(ServiceError::Forbidden)` - The user is not a client or never bought the product
    /// * `Err(ServiceError::NotFound)` - The product does not exist or is hidden
    /// * `Err(ServiceError::DuplicateResource)` - The user already reviewed the product
    /// * `Err(ServiceError::ValidationError)` - Rating outside `[1, 5]` or empty comment
    #[instrument(skip(self))]
    pub async fn add_review(
        &self,
        user_id: Uuid,
        input: AddReviewInput,
    ) -> Result<ReviewOutcome, ServiceError> {
        input.validate()?;
        let product_id = input.product_id;

        let txn = self.db.begin().await?;

        self.permissions
            .check_user_permission(&txn, user_id, UserRole::Client)
            .await?;
        let product = find_visible_product(&txn, product_id).await?;

        if !has_purchased(&txn, user_id, product_id).await? {
            return Err(ServiceError::Forbidden(format!(
                "User {} must purchase product {} before reviewing it",
                user_id, product_id
            )));
        }
        if has_reviewed(&txn, user_id, product_id).await? {
            return Err(duplicate_review(user_id, product_id));
        }

        let review = product_review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            user_id: Set(user_id),
            rating: Set(Decimal::from(input.rating)),
            comment: Set(input.comment),
            review_date: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(|e| ServiceError::from_db_unique(e, || duplicate_review(user_id, product_id)))?;

        let product_rating = recompute_rating(&txn, product).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductReviewed {
                product_id,
                review_id: review.id,
                rating: product_rating,
            })
            .await;

        info!(%user_id, %product_id, review_id = %review.id, %product_rating, "Added product review");
        Ok(ReviewOutcome {
            review,
            product_rating,
        })
    }

    /// Deletes the user's own review and recomputes the product's rating.
    #[instrument(skip(self))]
    pub async fn remove_review(
        &self,
        user_id: Uuid,
        review_id: Uuid,
    ) -> Result<Decimal, ServiceError> {
        let txn = self.db.begin().await?;

        let review = self
            .permissions
            .check_review(&txn, review_id, user_id)
            .await?;
        let product = find_product(&txn, review.product_id).await?;
        review.delete(&txn).await?;
        let product_rating = recompute_rating(&txn, product.clone()).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductReviewRemoved {
                product_id: product.id,
                review_id,
                rating: product_rating,
            })
            .await;

        info!(%user_id, %review_id, product_id = %product.id, %product_rating, "Removed product review");
        Ok(product_rating)
    }

    /// Reviews of a product, newest first.
    #[instrument(skip(self))]
    pub async fn get_product_reviews(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<product_review::Model>, ServiceError> {
        let product = find_product(&*self.db, product_id).await?;
        Ok(product
            .find_related(product_review::Entity)
            .order_by_desc(product_review::Column::ReviewDate)
            .all(&*self.db)
            .await?)
    }

    /// Whether the user already reviewed the product.
    ///
    /// Unknown users and products are reported as `NotFound` rather than `false`.
    #[instrument(skip(self))]
    pub async fn is_reviewed(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, ServiceError> {
        self.permissions.check_user(&*self.db, user_id).await?;
        find_product(&*self.db, product_id).await?;
        has_reviewed(&*self.db, user_id, product_id).await
    }

    /// Whether any order contains the product.
    pub async fn is_product_purchased(&self, product_id: Uuid) -> Result<bool, ServiceError> {
        let count = order_item::Entity::find()
            .filter(order_item::Column::ProductId.eq(product_id))
            .count(&*self.db)
            .await?;
        Ok(count > 0)
    }
}

/// Whether an order owned by `user_id` contains `product_id`.
async fn has_purchased<C>(db: &C, user_id: Uuid, product_id: Uuid) -> Result<bool, ServiceError>
where
    C: ConnectionTrait,
{
    let count = order_item::Entity::find()
        .join(JoinType::InnerJoin, order_item::Relation::Order.def())
        .filter(order::Column::UserId.eq(user_id))
        .filter(order_item::Column::ProductId.eq(product_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

async fn has_reviewed<C>(db: &C, user_id: Uuid, product_id: Uuid) -> Result<bool, ServiceError>
where
    C: ConnectionTrait,
{
    let count = product_review::Entity::find()
        .filter(product_review::Column::UserId.eq(user_id))
        .filter(product_review::Column::ProductId.eq(product_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Stores the rounded mean of the product's ratings (zero without reviews).
async fn recompute_rating<C>(db: &C, product: product::Model) -> Result<Decimal, ServiceError>
where
    C: ConnectionTrait,
{
    let ratings: Vec<Decimal> = product
        .find_related(product_review::Entity)
        .all(db)
        .await?
        .into_iter()
        .map(|review| review.rating)
        .collect();
    let rating = average_rating(&ratings);

    let mut active: product::ActiveModel = product.into();
    active.rating = Set(rating);
    active.update(db).await?;
    Ok(rating)
}

fn duplicate_review(user_id: Uuid, product_id: Uuid) -> ServiceError {
    ServiceError::DuplicateResource(format!(
        "User {} has already reviewed product {}",
        user_id, product_id
    ))
}

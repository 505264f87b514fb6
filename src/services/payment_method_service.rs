use crate::{
    entities::payment_method,
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        default_selection::{clear_default, current_default, set_default},
        permission_checker::PermissionChecker,
    },
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// A tokenized card as returned by the payment processor.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddPaymentMethodInput {
    #[validate(length(min = 1, max = 255))]
    pub stripe_id: String,
    #[validate(length(min = 1, max = 50))]
    pub brand: String,
    #[validate(length(min = 2, max = 2, message = "Country must be an ISO 3166-1 alpha-2 code"))]
    pub country: String,
    #[validate(range(min = 1, max = 12))]
    pub exp_month: i32,
    #[validate(range(min = 2000, max = 9999))]
    pub exp_year: i32,
    #[validate(length(equal = 4, message = "last4 must be exactly 4 characters"))]
    pub last4: String,
    #[validate(length(min = 1, max = 20))]
    pub funding: String,
    #[validate(length(min = 1, max = 255, message = "Fingerprint must not be empty"))]
    pub fingerprint: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdatePaymentMethodInput {
    #[validate(range(min = 1, max = 12))]
    pub exp_month: i32,
    #[validate(range(min = 2000, max = 9999))]
    pub exp_year: i32,
    pub is_default: bool,
}

/// Stores a user's payment methods and keeps at most one of them as default.
#[derive(Clone)]
pub struct PaymentMethodService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    permissions: PermissionChecker,
}

impl PaymentMethodService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            event_sender,
            permissions: PermissionChecker::new(),
        }
    }

    /// Adds a card. A card whose fingerprint the user already has is rejected.
    #[instrument(skip(self))]
    pub async fn add_payment_method(
        &self,
        user_id: Uuid,
        input: AddPaymentMethodInput,
    ) -> Result<payment_method::Model, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;
        self.permissions.check_user(&txn, user_id).await?;

        let duplicate = payment_method::Entity::find()
            .filter(payment_method::Column::UserId.eq(user_id))
            .filter(payment_method::Column::Fingerprint.eq(input.fingerprint.as_str()))
            .count(&txn)
            .await?
            > 0;
        if duplicate {
            return Err(duplicate_fingerprint(user_id));
        }

        let method = payment_method::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            stripe_id: Set(input.stripe_id),
            brand: Set(input.brand),
            country: Set(input.country),
            exp_month: Set(input.exp_month),
            exp_year: Set(input.exp_year),
            last4: Set(input.last4),
            funding: Set(input.funding),
            fingerprint: Set(input.fingerprint),
            by_default: Set(false),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(|e| ServiceError::from_db_unique(e, || duplicate_fingerprint(user_id)))?;

        let default_changed = if input.is_default {
            set_default::<payment_method::Entity, _>(&txn, user_id, method.id).await?
        } else {
            false
        };
        let method = reload(&txn, method.id).await?;

        txn.commit().await?;

        if default_changed {
            self.publish_default_changed(user_id, method.id).await;
        }
        info!(%user_id, payment_method_id = %method.id, by_default = method.by_default, "Added payment method");
        Ok(method)
    }

    /// Updates the expiry and default flag of a card.
    #[instrument(skip(self))]
    pub async fn update_payment_method(
        &self,
        user_id: Uuid,
        payment_method_id: Uuid,
        input: UpdatePaymentMethodInput,
    ) -> Result<payment_method::Model, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;
        let method = self
            .permissions
            .check_payment_method(&txn, payment_method_id, user_id)
            .await?;

        let was_default = method.by_default;
        let mut active: payment_method::ActiveModel = method.into();
        active.exp_month = Set(input.exp_month);
        active.exp_year = Set(input.exp_year);
        active.update(&txn).await?;

        let default_changed = match (input.is_default, was_default) {
            (true, false) => {
                set_default::<payment_method::Entity, _>(&txn, user_id, payment_method_id).await?
            }
            (false, true) => {
                clear_default::<payment_method::Entity, _>(&txn, user_id, payment_method_id)
                    .await?;
                false
            }
            _ => false,
        };
        let method = reload(&txn, payment_method_id).await?;

        txn.commit().await?;

        if default_changed {
            self.publish_default_changed(user_id, payment_method_id).await;
        }
        info!(%user_id, %payment_method_id, by_default = method.by_default, "Updated payment method");
        Ok(method)
    }

    /// Makes the card the user's default.
    #[instrument(skip(self))]
    pub async fn set_default_payment_method(
        &self,
        user_id: Uuid,
        payment_method_id: Uuid,
    ) -> Result<payment_method::Model, ServiceError> {
        let txn = self.db.begin().await?;
        self.permissions
            .check_payment_method(&txn, payment_method_id, user_id)
            .await?;

        let changed =
            set_default::<payment_method::Entity, _>(&txn, user_id, payment_method_id).await?;
        let method = reload(&txn, payment_method_id).await?;

        txn.commit().await?;

        if changed {
            self.publish_default_changed(user_id, payment_method_id).await;
        }
        Ok(method)
    }

    /// Deletes a card and returns the user's remaining cards.
    #[instrument(skip(self))]
    pub async fn remove_payment_method(
        &self,
        user_id: Uuid,
        payment_method_id: Uuid,
    ) -> Result<Vec<payment_method::Model>, ServiceError> {
        let txn = self.db.begin().await?;
        let method = self
            .permissions
            .check_payment_method(&txn, payment_method_id, user_id)
            .await?;
        method.delete(&txn).await?;
        let remaining = list_for_user(&txn, user_id).await?;
        txn.commit().await?;

        info!(%user_id, %payment_method_id, remaining = remaining.len(), "Removed payment method");
        Ok(remaining)
    }

    pub async fn find_payment_method(
        &self,
        user_id: Uuid,
        payment_method_id: Uuid,
    ) -> Result<payment_method::Model, ServiceError> {
        self.permissions
            .check_payment_method(&*self.db, payment_method_id, user_id)
            .await
    }

    pub async fn find_payment_methods(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<payment_method::Model>, ServiceError> {
        self.permissions.check_user(&*self.db, user_id).await?;
        list_for_user(&*self.db, user_id).await
    }

    pub async fn find_default_payment_method(
        &self,
        user_id: Uuid,
    ) -> Result<Option<payment_method::Model>, ServiceError> {
        self.permissions.check_user(&*self.db, user_id).await?;
        current_default::<payment_method::Entity, _>(&*self.db, user_id).await
    }

    async fn publish_default_changed(&self, user_id: Uuid, payment_method_id: Uuid) {
        self.event_sender
            .send_or_log(Event::DefaultPaymentMethodChanged {
                user_id,
                payment_method_id,
            })
            .await;
    }
}

fn duplicate_fingerprint(user_id: Uuid) -> ServiceError {
    ServiceError::DuplicateResource(format!(
        "User {} already has a payment method with this fingerprint",
        user_id
    ))
}

async fn reload<C>(db: &C, payment_method_id: Uuid) -> Result<payment_method::Model, ServiceError>
where
    C: ConnectionTrait,
{
    payment_method::Entity::find_by_id(payment_method_id)
        .one(db)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Payment method {} not found", payment_method_id))
        })
}

async fn list_for_user<C>(db: &C, user_id: Uuid) -> Result<Vec<payment_method::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(payment_method::Entity::find()
        .filter(payment_method::Column::UserId.eq(user_id))
        .order_by_asc(payment_method::Column::CreatedAt)
        .order_by_asc(payment_method::Column::Id)
        .all(db)
        .await?)
}

use crate::{
    entities::user_address,
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        default_selection::{clear_default, current_default, set_default},
        permission_checker::PermissionChecker,
    },
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Address fields supplied on add and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UserAddressInput {
    #[validate(length(min = 1, max = 255))]
    pub address_line1: String,
    #[validate(length(max = 255))]
    pub address_line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 100))]
    pub country: String,
    #[validate(length(max = 30))]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl UserAddressInput {
    /// Same address, ignoring the default flag.
    fn same_address_as(&self, address: &user_address::Model) -> bool {
        self.address_line1 == address.address_line1
            && self.address_line2 == address.address_line2
            && self.city == address.city
            && self.state == address.state
            && self.postal_code == address.postal_code
            && self.country == address.country
            && self.phone_number == address.phone_number
    }
}

/// Stores a user's addresses and keeps at most one of them as default.
#[derive(Clone)]
pub struct UserAddressService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    permissions: PermissionChecker,
}

impl UserAddressService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            event_sender,
            permissions: PermissionChecker::new(),
        }
    }

    #[instrument(skip(self))]
    pub async fn add_user_address(
        &self,
        user_id: Uuid,
        input: UserAddressInput,
    ) -> Result<user_address::Model, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;
        self.permissions.check_user(&txn, user_id).await?;
        ensure_unique(&txn, user_id, &input, None).await?;

        let is_default = input.is_default;
        let address = user_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            address_line1: Set(input.address_line1),
            address_line2: Set(input.address_line2),
            city: Set(input.city),
            state: Set(input.state),
            postal_code: Set(input.postal_code),
            country: Set(input.country),
            phone_number: Set(input.phone_number),
            is_default: Set(false),
        }
        .insert(&txn)
        .await?;

        let default_changed = if is_default {
            set_default::<user_address::Entity, _>(&txn, user_id, address.id).await?
        } else {
            false
        };
        let address = reload(&txn, address.id).await?;

        txn.commit().await?;

        if default_changed {
            self.publish_default_changed(user_id, address.id).await;
        }
        info!(%user_id, address_id = %address.id, is_default = address.is_default, "Added address");
        Ok(address)
    }

    /// Replaces the address fields. Updating into a copy of another of the user's
    /// addresses is rejected.
    #[instrument(skip(self))]
    pub async fn update_user_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        input: UserAddressInput,
    ) -> Result<user_address::Model, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;
        let address = self
            .permissions
            .check_user_address(&txn, address_id, user_id)
            .await?;
        ensure_unique(&txn, user_id, &input, Some(address_id)).await?;

        let was_default = address.is_default;
        let is_default = input.is_default;
        let mut active: user_address::ActiveModel = address.into();
        active.address_line1 = Set(input.address_line1);
        active.address_line2 = Set(input.address_line2);
        active.city = Set(input.city);
        active.state = Set(input.state);
        active.postal_code = Set(input.postal_code);
        active.country = Set(input.country);
        active.phone_number = Set(input.phone_number);
        active.update(&txn).await?;

        let default_changed = match (is_default, was_default) {
            (true, false) => set_default::<user_address::Entity, _>(&txn, user_id, address_id).await?,
            (false, true) => {
                clear_default::<user_address::Entity, _>(&txn, user_id, address_id).await?;
                false
            }
            _ => false,
        };
        let address = reload(&txn, address_id).await?;

        txn.commit().await?;

        if default_changed {
            self.publish_default_changed(user_id, address_id).await;
        }
        info!(%user_id, %address_id, is_default = address.is_default, "Updated address");
        Ok(address)
    }

    #[instrument(skip(self))]
    pub async fn set_default_user_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<user_address::Model, ServiceError> {
        let txn = self.db.begin().await?;
        self.permissions
            .check_user_address(&txn, address_id, user_id)
            .await?;

        let changed = set_default::<user_address::Entity, _>(&txn, user_id, address_id).await?;
        let address = reload(&txn, address_id).await?;

        txn.commit().await?;

        if changed {
            self.publish_default_changed(user_id, address_id).await;
        }
        Ok(address)
    }

    /// Deletes an address and returns the user's remaining addresses.
    #[instrument(skip(self))]
    pub async fn remove_user_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<Vec<user_address::Model>, ServiceError> {
        let txn = self.db.begin().await?;
        let address = self
            .permissions
            .check_user_address(&txn, address_id, user_id)
            .await?;
        address.delete(&txn).await?;
        let remaining = list_for_user(&txn, user_id).await?;
        txn.commit().await?;

        info!(%user_id, %address_id, remaining = remaining.len(), "Removed address");
        Ok(remaining)
    }

    pub async fn find_user_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<user_address::Model, ServiceError> {
        self.permissions
            .check_user_address(&*self.db, address_id, user_id)
            .await
    }

    pub async fn find_user_addresses(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<user_address::Model>, ServiceError> {
        self.permissions.check_user(&*self.db, user_id).await?;
        list_for_user(&*self.db, user_id).await
    }

    pub async fn find_default_user_address(
        &self,
        user_id: Uuid,
    ) -> Result<Option<user_address::Model>, ServiceError> {
        self.permissions.check_user(&*self.db, user_id).await?;
        current_default::<user_address::Entity, _>(&*self.db, user_id).await
    }

    async fn publish_default_changed(&self, user_id: Uuid, address_id: Uuid) {
        self.event_sender
            .send_or_log(Event::DefaultAddressChanged {
                user_id,
                address_id,
            })
            .await;
    }
}

/// Rejects `input` if it duplicates one of the user's addresses other than `except`.
async fn ensure_unique<C>(
    db: &C,
    user_id: Uuid,
    input: &UserAddressInput,
    except: Option<Uuid>,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let duplicate = list_for_user(db, user_id)
        .await?
        .iter()
        .filter(|existing| Some(existing.id) != except)
        .any(|existing| input.same_address_as(existing));
    if duplicate {
        return Err(ServiceError::DuplicateResource(format!(
            "User {} already has this address",
            user_id
        )));
    }
    Ok(())
}

async fn reload<C>(db: &C, address_id: Uuid) -> Result<user_address::Model, ServiceError>
where
    C: ConnectionTrait,
{
    user_address::Entity::find_by_id(address_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))
}

async fn list_for_user<C>(db: &C, user_id: Uuid) -> Result<Vec<user_address::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(user_address::Entity::find()
        .filter(user_address::Column::UserId.eq(user_id))
        .order_by_asc(user_address::Column::Id)
        .all(db)
        .await?)
}

use crate::{
    entities::{shopping_cart, user, wish_list, UserRole, UserStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::permission_checker::PermissionChecker,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProvisionUserInput {
    #[validate(length(min = 3, max = 50))]
    pub user_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    pub role: UserRole,
}

/// Signup side effects (a user row plus its cart and wish list) and admin moderation.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    permissions: PermissionChecker,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            event_sender,
            permissions: PermissionChecker::new(),
        }
    }

    /// Creates an active user together with an empty cart and wish list.
    #[instrument(skip(self))]
    pub async fn provision_user(
        &self,
        input: ProvisionUserInput,
    ) -> Result<user::Model, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let taken = user::Entity::find()
            .filter(user::Column::UserName.eq(input.user_name.as_str()))
            .count(&txn)
            .await?
            > 0;
        if taken {
            return Err(duplicate_user_name(&input.user_name));
        }

        let user_name = input.user_name.clone();
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_name: Set(input.user_name),
            email: Set(input.email),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            role: Set(input.role),
            status: Set(UserStatus::Active),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(|e| ServiceError::from_db_unique(e, || duplicate_user_name(&user_name)))?;

        let cart = shopping_cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
        }
        .insert(&txn)
        .await?;

        let wish_list = wish_list::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::UserProvisioned {
                user_id: user.id,
                cart_id: cart.id,
                wish_list_id: wish_list.id,
            })
            .await;

        info!(user_id = %user.id, role = %user.role, "Provisioned user");
        Ok(user)
    }

    /// Looks a user up regardless of status.
    #[instrument(skip(self))]
    pub async fn find_user(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        load_user(&*self.db, user_id).await
    }

    /// Bans `user_id`, after which every permission check on that user fails.
    ///
    /// Banning an already banned user is a no-op and publishes nothing.
    ///
    /// # Returns
    ///
    /// * `Err(ServiceError::Forbidden)` - The caller is not an active admin or the target is one
    /// * `Err(ServiceError::NotFound)` - The target user does not exist
    #[instrument(skip(self))]
    pub async fn ban_user(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
    ) -> Result<user::Model, ServiceError> {
        self.set_status(admin_id, user_id, UserStatus::Banned).await
    }

    /// Lifts a ban. Unbanning an active user is a no-op and publishes nothing.
    #[instrument(skip(self))]
    pub async fn unban_user(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
    ) -> Result<user::Model, ServiceError> {
        self.set_status(admin_id, user_id, UserStatus::Active).await
    }

    /// Banned users ordered by user name.
    #[instrument(skip(self))]
    pub async fn find_banned_users(
        &self,
        admin_id: Uuid,
    ) -> Result<Vec<user::Model>, ServiceError> {
        self.permissions
            .check_user_permission(&*self.db, admin_id, UserRole::Admin)
            .await?;

        Ok(user::Entity::find()
            .filter(user::Column::Status.eq(UserStatus::Banned))
            .order_by_asc(user::Column::UserName)
            .all(&*self.db)
            .await?)
    }

    async fn set_status(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        status: UserStatus,
    ) -> Result<user::Model, ServiceError> {
        let txn = self.db.begin().await?;

        self.permissions
            .check_user_permission(&txn, admin_id, UserRole::Admin)
            .await?;
        let target = load_user(&txn, user_id).await?;
        if target.is_admin() {
            return Err(ServiceError::Forbidden(format!(
                "User {} is an admin and cannot be moderated",
                user_id
            )));
        }
        if target.status == status {
            return Ok(target);
        }

        let mut active: user::ActiveModel = target.into();
        active.status = Set(status);
        let user = active.update(&txn).await?;

        txn.commit().await?;

        let event = match status {
            UserStatus::Banned => Event::UserBanned { user_id },
            UserStatus::Active => Event::UserUnbanned { user_id },
        };
        self.event_sender.send_or_log(event).await;

        info!(%admin_id, %user_id, %status, "Changed user status");
        Ok(user)
    }
}

async fn load_user<C>(db: &C, user_id: Uuid) -> Result<user::Model, ServiceError>
where
    C: ConnectionTrait,
{
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
}

fn duplicate_user_name(user_name: &str) -> ServiceError {
    ServiceError::DuplicateResource(format!("User name {} is already taken", user_name))
}

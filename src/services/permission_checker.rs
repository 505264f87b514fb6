use sea_orm::{ConnectionTrait, EntityTrait, PrimaryKeyTrait};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{
    order, payment_method, product, product_review, shopping_cart, user, user_address, wish_list,
    UserRole, UserStatus,
};
use crate::errors::ServiceError;

/// A record that belongs to exactly one user.
pub trait Owned {
    /// Human readable resource name used in error messages.
    const RESOURCE: &'static str;

    fn owner_id(&self) -> Uuid;
}

impl Owned for shopping_cart::Model {
    const RESOURCE: &'static str = "Shopping cart";

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Owned for wish_list::Model {
    const RESOURCE: &'static str = "Wish list";

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Owned for order::Model {
    const RESOURCE: &'static str = "Order";

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Owned for payment_method::Model {
    const RESOURCE: &'static str = "Payment method";

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Owned for user_address::Model {
    const RESOURCE: &'static str = "Address";

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Owned for product::Model {
    const RESOURCE: &'static str = "Product";

    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

impl Owned for product_review::Model {
    const RESOURCE: &'static str = "Review";

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

/// Resolves resources on behalf of an acting user and authorizes access to them.
///
/// Every lookup is generic over the connection so it runs on the caller's open
/// transaction. Missing users or resources fail with `NotFound`; a resource owned
/// by someone else, a role mismatch or a banned user fails with `Forbidden`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionChecker;

impl PermissionChecker {
    pub fn new() -> Self {
        Self
    }

    /// Loads an active user.
    pub async fn check_user<C>(&self, db: &C, user_id: Uuid) -> Result<user::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let user = user::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        if user.status == UserStatus::Banned {
            return Err(ServiceError::Forbidden(format!(
                "User {} is banned",
                user_id
            )));
        }
        Ok(user)
    }

    /// Loads an active user and requires `role`.
    pub async fn check_user_permission<C>(
        &self,
        db: &C,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<user::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let user = self.check_user(db, user_id).await?;
        if user.role != role {
            debug!(%user_id, required = %role, actual = %user.role, "Role check failed");
            return Err(ServiceError::Forbidden(format!(
                "User {} does not have the {} role",
                user_id, role
            )));
        }
        Ok(user)
    }

    /// Loads resource `id` of entity `E` and requires that it belongs to `user_id`.
    pub async fn check_owned<E, C>(
        &self,
        db: &C,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<E::Model, ServiceError>
    where
        E: EntityTrait,
        E::Model: Owned,
        C: ConnectionTrait,
        Uuid: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
    {
        self.check_user(db, user_id).await?;

        let resource = E::find_by_id(id).one(db).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("{} {} not found", <E::Model as Owned>::RESOURCE, id))
        })?;

        if resource.owner_id() != user_id {
            return Err(ServiceError::Forbidden(format!(
                "{} {} does not belong to user {}",
                <E::Model as Owned>::RESOURCE,
                id,
                user_id
            )));
        }
        Ok(resource)
    }

    pub async fn check_shopping_cart<C>(
        &self,
        db: &C,
        cart_id: Uuid,
        user_id: Uuid,
    ) -> Result<shopping_cart::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        self.check_owned::<shopping_cart::Entity, C>(db, cart_id, user_id)
            .await
    }

    pub async fn check_wish_list<C>(
        &self,
        db: &C,
        wish_list_id: Uuid,
        user_id: Uuid,
    ) -> Result<wish_list::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        self.check_owned::<wish_list::Entity, C>(db, wish_list_id, user_id)
            .await
    }

    pub async fn check_order<C>(
        &self,
        db: &C,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<order::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        self.check_owned::<order::Entity, C>(db, order_id, user_id)
            .await
    }

    pub async fn check_payment_method<C>(
        &self,
        db: &C,
        payment_method_id: Uuid,
        user_id: Uuid,
    ) -> Result<payment_method::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        self.check_owned::<payment_method::Entity, C>(db, payment_method_id, user_id)
            .await
    }

    pub async fn check_user_address<C>(
        &self,
        db: &C,
        address_id: Uuid,
        user_id: Uuid,
    ) -> Result<user_address::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        self.check_owned::<user_address::Entity, C>(db, address_id, user_id)
            .await
    }

    /// Requires that `user_id` is the provider who listed the product.
    pub async fn check_product<C>(
        &self,
        db: &C,
        product_id: Uuid,
        user_id: Uuid,
    ) -> Result<product::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        self.check_owned::<product::Entity, C>(db, product_id, user_id)
            .await
    }

    pub async fn check_review<C>(
        &self,
        db: &C,
        review_id: Uuid,
        user_id: Uuid,
    ) -> Result<product_review::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        self.check_owned::<product_review::Entity, C>(db, review_id, user_id)
            .await
    }
}

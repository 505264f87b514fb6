use sea_orm::{sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{payment_method, user_address};
use crate::errors::ServiceError;

/// A per-user collection in which at most one record carries a default flag.
pub trait DefaultFlag: EntityTrait {
    /// Human readable kind used in error messages.
    const KIND: &'static str;

    fn id_column() -> Self::Column;
    fn user_id_column() -> Self::Column;
    fn flag_column() -> Self::Column;
    fn record_id(model: &Self::Model) -> Uuid;
}

impl DefaultFlag for payment_method::Entity {
    const KIND: &'static str = "payment method";

    fn id_column() -> Self::Column {
        payment_method::Column::Id
    }

    fn user_id_column() -> Self::Column {
        payment_method::Column::UserId
    }

    fn flag_column() -> Self::Column {
        payment_method::Column::ByDefault
    }

    fn record_id(model: &Self::Model) -> Uuid {
        model.id
    }
}

impl DefaultFlag for user_address::Entity {
    const KIND: &'static str = "address";

    fn id_column() -> Self::Column {
        user_address::Column::Id
    }

    fn user_id_column() -> Self::Column {
        user_address::Column::UserId
    }

    fn flag_column() -> Self::Column {
        user_address::Column::IsDefault
    }

    fn record_id(model: &Self::Model) -> Uuid {
        model.id
    }
}

/// The user's current default record of kind `E`, if any.
pub async fn current_default<E, C>(db: &C, user_id: Uuid) -> Result<Option<E::Model>, ServiceError>
where
    E: DefaultFlag,
    C: ConnectionTrait,
{
    Ok(E::find()
        .filter(E::user_id_column().eq(user_id))
        .filter(E::flag_column().eq(true))
        .one(db)
        .await?)
}

/// Makes `record_id` the user's only default of kind `E`.
///
/// The previous default, if it is a different record, is cleared first and then
/// the target is flagged, both on the caller's transaction. The partial unique
/// index on the flag turns a concurrent writer that slipped in between into a
/// `Conflict`. Returns `false` when the record already was the default.
pub async fn set_default<E, C>(
    db: &C,
    user_id: Uuid,
    record_id: Uuid,
) -> Result<bool, ServiceError>
where
    E: DefaultFlag,
    C: ConnectionTrait,
{
    let previous = current_default::<E, C>(db, user_id)
        .await?
        .map(|model| E::record_id(&model));

    if previous == Some(record_id) {
        debug!(kind = E::KIND, %user_id, %record_id, "Record is already the default");
        return Ok(false);
    }

    E::update_many()
        .col_expr(E::flag_column(), Expr::value(false))
        .filter(E::user_id_column().eq(user_id))
        .filter(E::flag_column().eq(true))
        .filter(E::id_column().ne(record_id))
        .exec(db)
        .await?;

    let result = E::update_many()
        .col_expr(E::flag_column(), Expr::value(true))
        .filter(E::id_column().eq(record_id))
        .filter(E::user_id_column().eq(user_id))
        .exec(db)
        .await
        .map_err(|e| {
            ServiceError::from_db_unique(e, || {
                ServiceError::Conflict(format!(
                    "Another default {} was set concurrently for user {}",
                    E::KIND,
                    user_id
                ))
            })
        })?;

    if result.rows_affected == 0 {
        return Err(ServiceError::NotFound(format!(
            "{} {} not found for user {}",
            E::KIND,
            record_id,
            user_id
        )));
    }

    debug!(kind = E::KIND, %user_id, %record_id, ?previous, "Default changed");
    Ok(true)
}

/// Clears the flag on `record_id` if it is set.
pub async fn clear_default<E, C>(db: &C, user_id: Uuid, record_id: Uuid) -> Result<(), ServiceError>
where
    E: DefaultFlag,
    C: ConnectionTrait,
{
    E::update_many()
        .col_expr(E::flag_column(), Expr::value(false))
        .filter(E::id_column().eq(record_id))
        .filter(E::user_id_column().eq(user_id))
        .exec(db)
        .await?;
    Ok(())
}

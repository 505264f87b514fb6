use http::StatusCode;
use sea_orm::error::DbErr;
use sea_orm::SqlErr;
use serde::Serialize;
use uuid::Uuid;

use crate::entities::OrderState;

/// Which bounded collection a [`ServiceError::CapacityExceeded`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum CapacityKind {
    /// Distinct products in a shopping cart
    CartItems,
    /// Quantity of a single cart line
    ItemQuantity,
    /// Lines in a single order
    OrderItems,
    /// Products in a wish list
    WishListItems,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Capacity exceeded: {kind} is limited to {max}")]
    CapacityExceeded { kind: CapacityKind, max: u32 },

    #[error("Shopping cart {0} is empty")]
    EmptyCart(Uuid),

    #[error("Duplicate resource: {0}")]
    DuplicateResource(String),

    #[error("Invalid order state transition from {from} to {to}")]
    InvalidTransition { from: OrderState, to: OrderState },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Maps a store-level unique violation to `on_unique`, keeping every other
    /// database failure as [`ServiceError::DatabaseError`].
    pub fn from_db_unique(err: DbErr, on_unique: impl FnOnce() -> ServiceError) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => on_unique(),
            _ => ServiceError::DatabaseError(err),
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::CapacityExceeded { .. } | Self::EmptyCart(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::DuplicateResource(_) | Self::Conflict(_) | Self::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Returns the error message suitable for client responses.
    /// Database errors return a generic message to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::CapacityExceeded {
                kind: CapacityKind::CartItems,
                max: 20
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::EmptyCart(Uuid::nil()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::DuplicateResource("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::InvalidTransition {
                from: OrderState::Confirmed,
                to: OrderState::PreOrder
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn database_errors_are_masked() {
        let err = ServiceError::DatabaseError(DbErr::Custom("password=hunter2".into()));
        assert_eq!(err.response_message(), "Database error");
    }

    #[test]
    fn capacity_message_names_the_limit() {
        let err = ServiceError::CapacityExceeded {
            kind: CapacityKind::ItemQuantity,
            max: 100,
        };
        assert_eq!(
            err.response_message(),
            "Capacity exceeded: ItemQuantity is limited to 100"
        );
    }

    #[test]
    fn non_unique_db_errors_stay_database_errors() {
        let err = ServiceError::from_db_unique(DbErr::Custom("other".into()), || {
            ServiceError::Conflict("dup".into())
        });
        assert!(matches!(err, ServiceError::DatabaseError(_)));
    }
}

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::entities::{cart_item, shopping_cart};
use crate::errors::{CapacityKind, ServiceError};

/// Maximum number of distinct products a cart may hold.
pub const MAX_CART_ITEMS: usize = 20;
/// Maximum quantity of a single cart line.
pub const MAX_ITEM_QUANTITY: i32 = 100;

/// Row-level effect of a cart mutation, to be persisted by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineChange {
    Inserted(cart_item::Model),
    Updated(cart_item::Model),
}

impl LineChange {
    pub fn line(&self) -> &cart_item::Model {
        match self {
            LineChange::Inserted(line) | LineChange::Updated(line) => line,
        }
    }
}

/// A shopping cart together with its lines, keyed by product.
///
/// Lines only reference their cart by id. Every mutator checks its bounds before
/// touching `lines`, so a failed call leaves the aggregate exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    pub cart: shopping_cart::Model,
    lines: BTreeMap<Uuid, cart_item::Model>,
}

impl Cart {
    pub fn new(cart: shopping_cart::Model, items: Vec<cart_item::Model>) -> Self {
        let lines = items
            .into_iter()
            .map(|item| (item.product_id, item))
            .collect();
        Self { cart, lines }
    }

    pub fn id(&self) -> Uuid {
        self.cart.id
    }

    pub fn user_id(&self) -> Uuid {
        self.cart.user_id
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, product_id: Uuid) -> Option<&cart_item::Model> {
        self.lines.get(&product_id)
    }

    pub fn lines(&self) -> impl Iterator<Item = &cart_item::Model> {
        self.lines.values()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.values().map(|line| i64::from(line.quantity)).sum()
    }

    /// Adds `quantity` of a product. An existing line is incremented; otherwise a
    /// new line is created if the cart still has room.
    pub fn add(&mut self, product_id: Uuid, quantity: i32) -> Result<LineChange, ServiceError> {
        validate_quantity(quantity)?;

        if let Some(existing) = self.lines.get_mut(&product_id) {
            let new_quantity = existing
                .quantity
                .checked_add(quantity)
                .filter(|q| *q <= MAX_ITEM_QUANTITY)
                .ok_or(ServiceError::CapacityExceeded {
                    kind: CapacityKind::ItemQuantity,
                    max: MAX_ITEM_QUANTITY as u32,
                })?;
            existing.quantity = new_quantity;
            return Ok(LineChange::Updated(existing.clone()));
        }

        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(ServiceError::CapacityExceeded {
                kind: CapacityKind::CartItems,
                max: MAX_CART_ITEMS as u32,
            });
        }
        if quantity > MAX_ITEM_QUANTITY {
            return Err(ServiceError::CapacityExceeded {
                kind: CapacityKind::ItemQuantity,
                max: MAX_ITEM_QUANTITY as u32,
            });
        }

        let line = cart_item::Model {
            id: Uuid::new_v4(),
            cart_id: self.cart.id,
            product_id,
            quantity,
        };
        self.lines.insert(product_id, line.clone());
        Ok(LineChange::Inserted(line))
    }

    /// Overwrites the quantity of a product already in the cart.
    pub fn update_quantity(
        &mut self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        validate_quantity(quantity)?;

        let line = self.lines.get_mut(&product_id).ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Product {} is not in cart {}",
                product_id, self.cart.id
            ))
        })?;
        if quantity > MAX_ITEM_QUANTITY {
            return Err(ServiceError::CapacityExceeded {
                kind: CapacityKind::ItemQuantity,
                max: MAX_ITEM_QUANTITY as u32,
            });
        }

        line.quantity = quantity;
        Ok(line.clone())
    }

    pub fn remove(&mut self, product_id: Uuid) -> Result<cart_item::Model, ServiceError> {
        self.lines.remove(&product_id).ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Product {} is not in cart {}",
                product_id, self.cart.id
            ))
        })
    }

    /// Empties the cart, returning the removed lines in product order.
    pub fn drain(&mut self) -> Vec<cart_item::Model> {
        std::mem::take(&mut self.lines).into_values().collect()
    }
}

/// Quantities below one are rejected; zero is not a way to remove a line.
pub fn validate_quantity(quantity: i32) -> Result<(), ServiceError> {
    if quantity < 1 {
        return Err(ServiceError::ValidationError(format!(
            "Quantity must be at least 1, got {}",
            quantity
        )));
    }
    Ok(())
}

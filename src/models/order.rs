use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::entities::{order, order_item, OrderState};
use crate::errors::{CapacityKind, ServiceError};

/// Maximum number of lines in one order.
pub const MAX_ORDER_ITEMS: usize = 20;

/// `price * quantity`, rounded half-even to 2 decimal places.
pub fn line_total(price: Decimal, quantity: i32) -> Decimal {
    (price * Decimal::from(quantity)).round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

pub fn order_total<'a>(items: impl IntoIterator<Item = &'a order_item::Model>) -> Decimal {
    items
        .into_iter()
        .map(|item| line_total(item.product_price, item.quantity))
        .sum()
}

pub fn check_order_capacity(current_items: usize) -> Result<(), ServiceError> {
    if current_items >= MAX_ORDER_ITEMS {
        return Err(ServiceError::CapacityExceeded {
            kind: CapacityKind::OrderItems,
            max: MAX_ORDER_ITEMS as u32,
        });
    }
    Ok(())
}

impl OrderState {
    /// Allowed lifecycle moves: pre-order ships or is cancelled, in-transit is confirmed.
    pub fn can_transition_to(self, next: OrderState) -> bool {
        matches!(
            (self, next),
            (OrderState::PreOrder, OrderState::InTransit)
                | (OrderState::PreOrder, OrderState::Cancelled)
                | (OrderState::InTransit, OrderState::Confirmed)
        )
    }

    pub fn transition_to(self, next: OrderState) -> Result<OrderState, ServiceError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ServiceError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderState::Confirmed | OrderState::Cancelled)
    }
}

/// Outcome of decrementing stock for a purchased line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub new_stock: i32,
    /// Units sold beyond what was on hand.
    pub shortfall: i32,
}

impl StockChange {
    /// Stock is only decremented while positive and never drops below zero.
    pub fn for_purchase(current: i32, quantity: i32) -> Self {
        if current <= 0 {
            return Self {
                new_stock: current,
                shortfall: quantity,
            };
        }
        let new_stock = current.saturating_sub(quantity).max(0);
        Self {
            new_stock,
            shortfall: quantity.saturating_sub(current).max(0),
        }
    }

    pub fn is_changed(&self, current: i32) -> bool {
        self.new_stock != current
    }
}

/// An order with its items and derived total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub total: Decimal,
}

impl OrderView {
    pub fn new(order: order::Model, items: Vec<order_item::Model>) -> Self {
        let total = order_total(&items);
        Self {
            order,
            items,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sea_orm::Iterable;
    use test_case::test_case;

    #[test]
    fn line_total_uses_bankers_rounding() {
        assert_eq!(line_total(dec!(0.125), 1), dec!(0.12));
        assert_eq!(line_total(dec!(0.135), 1), dec!(0.14));
        assert_eq!(line_total(dec!(19.99), 3), dec!(59.97));
    }

    #[test]
    fn order_total_sums_rounded_lines() {
        let order_id = uuid::Uuid::new_v4();
        let items = vec![
            order_item::Model {
                id: uuid::Uuid::new_v4(),
                order_id,
                product_id: uuid::Uuid::new_v4(),
                product_price: dec!(12.50),
                quantity: 2,
            },
            order_item::Model {
                id: uuid::Uuid::new_v4(),
                order_id,
                product_id: uuid::Uuid::new_v4(),
                product_price: dec!(7.25),
                quantity: 4,
            },
        ];
        assert_eq!(order_total(&items), dec!(54.00));
    }

    #[test]
    fn order_capacity_is_twenty() {
        assert!(check_order_capacity(19).is_ok());
        assert!(matches!(
            check_order_capacity(20),
            Err(ServiceError::CapacityExceeded {
                kind: CapacityKind::OrderItems,
                max: 20
            })
        ));
    }

    #[test_case(OrderState::PreOrder, OrderState::InTransit, true ; "ship")]
    #[test_case(OrderState::PreOrder, OrderState::Cancelled, true ; "cancel")]
    #[test_case(OrderState::InTransit, OrderState::Confirmed, true ; "confirm")]
    #[test_case(OrderState::Confirmed, OrderState::PreOrder, false ; "confirmed is final")]
    #[test_case(OrderState::InTransit, OrderState::Cancelled, false ; "no cancel in transit")]
    #[test_case(OrderState::PreOrder, OrderState::Confirmed, false ; "no skipping transit")]
    #[test_case(OrderState::Cancelled, OrderState::InTransit, false ; "cancelled is final")]
    #[test_case(OrderState::PreOrder, OrderState::PreOrder, false ; "no self transition")]
    fn transition_table(from: OrderState, to: OrderState, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
        assert_eq!(from.transition_to(to).is_ok(), allowed);
    }

    #[test_case(OrderState::PreOrder, false)]
    #[test_case(OrderState::InTransit, false)]
    #[test_case(OrderState::Confirmed, true)]
    #[test_case(OrderState::Cancelled, true)]
    fn terminal_states_have_no_way_out(state: OrderState, terminal: bool) {
        assert_eq!(state.is_terminal(), terminal);
        let any_exit = OrderState::iter().any(|next| state.can_transition_to(next));
        assert_eq!(any_exit, !terminal);
    }

    #[test]
    fn stock_is_decremented_while_positive() {
        assert_eq!(
            StockChange::for_purchase(10, 3),
            StockChange {
                new_stock: 7,
                shortfall: 0
            }
        );
    }

    #[test]
    fn stock_floors_at_zero_and_reports_shortfall() {
        assert_eq!(
            StockChange::for_purchase(2, 5),
            StockChange {
                new_stock: 0,
                shortfall: 3
            }
        );
    }

    #[test]
    fn stock_at_zero_is_left_alone() {
        let change = StockChange::for_purchase(0, 4);
        assert_eq!(change.new_stock, 0);
        assert_eq!(change.shortfall, 4);
        assert!(!change.is_changed(0));
    }
}

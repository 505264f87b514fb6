use chrono::{Duration, TimeZone, Utc};
use commerce_core::{
    entities::{shopping_cart, wish_list},
    errors::{CapacityKind, ServiceError},
    models::{Cart, WishList, MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_WISH_LIST_ITEMS},
};
use proptest::prelude::*;
use uuid::Uuid;

fn empty_cart() -> Cart {
    Cart::new(
        shopping_cart::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        },
        Vec::new(),
    )
}

fn empty_wish_list() -> WishList {
    WishList::new(
        wish_list::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        },
        Vec::new(),
    )
}

/// Products drawn from a small pool so that sequences mix new lines and increments.
fn product_pool(size: usize) -> Vec<Uuid> {
    (0..size).map(|_| Uuid::new_v4()).collect()
}

proptest! {
    #[test]
    fn cart_never_exceeds_its_bounds(
        adds in prop::collection::vec((0usize..30, 1i32..=60), 1..120)
    ) {
        let pool = product_pool(30);
        let mut cart = empty_cart();

        for (index, quantity) in adds {
            let product_id = pool[index];
            let before = cart.clone();
            match cart.add(product_id, quantity) {
                Ok(_) => {}
                Err(ServiceError::CapacityExceeded { kind, .. }) => {
                    prop_assert!(matches!(kind, CapacityKind::CartItems | CapacityKind::ItemQuantity));
                    prop_assert_eq!(&cart, &before);
                }
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }

            prop_assert!(cart.len() <= MAX_CART_ITEMS);
            for line in cart.lines() {
                prop_assert!(line.quantity >= 1 && line.quantity <= MAX_ITEM_QUANTITY);
            }
        }
    }

    #[test]
    fn rejected_increment_keeps_prior_quantity(
        start in 1i32..=MAX_ITEM_QUANTITY,
        extra in 1i32..=200,
    ) {
        let product_id = Uuid::new_v4();
        let mut cart = empty_cart();
        cart.add(product_id, start).unwrap();

        let result = cart.add(product_id, extra);
        let quantity = cart.line(product_id).map(|l| l.quantity);
        if start + extra > MAX_ITEM_QUANTITY {
            prop_assert!(result.is_err());
            prop_assert_eq!(quantity, Some(start));
        } else {
            prop_assert!(result.is_ok());
            prop_assert_eq!(quantity, Some(start + extra));
        }
    }

    #[test]
    fn wish_list_is_a_bounded_set(
        picks in prop::collection::vec(0usize..80, 1..200)
    ) {
        let pool = product_pool(80);
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut list = empty_wish_list();

        for (step, index) in picks.into_iter().enumerate() {
            let product_id = pool[index];
            let was_present = list.contains(product_id);
            let len_before = list.len();

            match list.add(product_id, base + Duration::seconds(step as i64)) {
                Ok(Some(_)) => prop_assert_eq!(list.len(), len_before + 1),
                Ok(None) => {
                    prop_assert!(was_present);
                    prop_assert_eq!(list.len(), len_before);
                }
                Err(_) => {
                    prop_assert_eq!(len_before, MAX_WISH_LIST_ITEMS);
                    prop_assert!(!list.contains(product_id));
                }
            }
            prop_assert!(list.len() <= MAX_WISH_LIST_ITEMS);
        }
    }
}

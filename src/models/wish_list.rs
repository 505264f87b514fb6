use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{wish_list, wish_list_item};
use crate::errors::{CapacityKind, ServiceError};

/// Maximum number of products a wish list may hold.
pub const MAX_WISH_LIST_ITEMS: usize = 50;

/// A wish list and its items, keyed by product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WishList {
    pub wish_list: wish_list::Model,
    items: BTreeMap<Uuid, wish_list_item::Model>,
}

impl WishList {
    pub fn new(wish_list: wish_list::Model, items: Vec<wish_list_item::Model>) -> Self {
        let items = items
            .into_iter()
            .map(|item| (item.product_id, item))
            .collect();
        Self { wish_list, items }
    }

    pub fn id(&self) -> Uuid {
        self.wish_list.id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, product_id: Uuid) -> bool {
        self.items.contains_key(&product_id)
    }

    /// Items, most recently added first.
    pub fn items(&self) -> Vec<&wish_list_item::Model> {
        let mut items: Vec<_> = self.items.values().collect();
        items.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        items
    }

    /// Adds a product. Returns `None` when it is already present.
    pub fn add(
        &mut self,
        product_id: Uuid,
        added_at: DateTime<Utc>,
    ) -> Result<Option<wish_list_item::Model>, ServiceError> {
        if self.items.contains_key(&product_id) {
            return Ok(None);
        }
        if self.items.len() >= MAX_WISH_LIST_ITEMS {
            return Err(ServiceError::CapacityExceeded {
                kind: CapacityKind::WishListItems,
                max: MAX_WISH_LIST_ITEMS as u32,
            });
        }

        let item = wish_list_item::Model {
            id: Uuid::new_v4(),
            wish_list_id: self.wish_list.id,
            product_id,
            added_at,
        };
        self.items.insert(product_id, item.clone());
        Ok(Some(item))
    }

    pub fn remove(&mut self, product_id: Uuid) -> Result<wish_list_item::Model, ServiceError> {
        self.items.remove(&product_id).ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Product {} is not in wish list {}",
                product_id, self.wish_list.id
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn empty_list() -> WishList {
        WishList::new(
            wish_list::Model {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
            },
            vec![],
        )
    }

    #[test]
    fn re_adding_is_a_no_op() {
        let mut list = empty_list();
        let product = Uuid::new_v4();
        let now = Utc::now();

        assert!(list.add(product, now).unwrap().is_some());
        assert!(list.add(product, now + Duration::seconds(5)).unwrap().is_none());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn fifty_first_item_is_rejected() {
        let mut list = empty_list();
        let now = Utc::now();
        for _ in 0..MAX_WISH_LIST_ITEMS {
            list.add(Uuid::new_v4(), now).unwrap();
        }

        assert_matches!(
            list.add(Uuid::new_v4(), now),
            Err(ServiceError::CapacityExceeded {
                kind: CapacityKind::WishListItems,
                max: 50
            })
        );
        assert_eq!(list.len(), MAX_WISH_LIST_ITEMS);
    }

    #[test]
    fn re_adding_into_full_list_is_still_a_no_op() {
        let mut list = empty_list();
        let now = Utc::now();
        let first = Uuid::new_v4();
        list.add(first, now).unwrap();
        for _ in 1..MAX_WISH_LIST_ITEMS {
            list.add(Uuid::new_v4(), now).unwrap();
        }

        assert_matches!(list.add(first, now), Ok(None));
    }

    #[test]
    fn items_are_newest_first() {
        let mut list = empty_list();
        let now = Utc::now();
        let older = Uuid::new_v4();
        let newer = Uuid::new_v4();
        list.add(older, now - Duration::minutes(1)).unwrap();
        list.add(newer, now).unwrap();

        let order: Vec<Uuid> = list.items().iter().map(|i| i.product_id).collect();
        assert_eq!(order, vec![newer, older]);
    }

    #[test]
    fn removing_missing_product_fails() {
        let mut list = empty_list();
        assert_matches!(list.remove(Uuid::new_v4()), Err(ServiceError::NotFound(_)));
    }
}

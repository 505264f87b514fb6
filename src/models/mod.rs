//! Aggregate rules for the commerce core. Nothing in here touches the database;
//! services load rows, apply these rules, then persist the resulting changes.

pub mod cart;
pub mod order;
pub mod page;
pub mod review;
pub mod wish_list;

pub use cart::{Cart, LineChange, MAX_CART_ITEMS, MAX_ITEM_QUANTITY};
pub use order::{OrderView, StockChange, MAX_ORDER_ITEMS};
pub use page::Page;
pub use wish_list::{WishList, MAX_WISH_LIST_ITEMS};

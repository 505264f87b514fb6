//! sea-orm entities for the commerce schema created by the `migrations` crate.

pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod payment_method;
pub mod product;
pub mod product_review;
pub mod shipping_method;
pub mod shopping_cart;
pub mod user;
pub mod user_address;
pub mod wish_list;
pub mod wish_list_item;

pub use order::OrderState;
pub use user::{UserRole, UserStatus};

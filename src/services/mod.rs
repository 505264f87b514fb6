//! Business services of the commerce core. Each service owns a handle to the
//! connection pool and the event sender; every mutating operation runs in one
//! database transaction and publishes its event only after commit.

pub mod cart_service;
pub mod catalog_service;
pub mod checkout_service;
pub mod default_selection;
pub mod order_service;
pub mod payment_method_service;
pub mod permission_checker;
pub mod review_service;
pub mod user_address_service;
pub mod user_service;
pub mod wish_list_service;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::events::EventSender;

pub use cart_service::CartService;
pub use catalog_service::CatalogService;
pub use checkout_service::{BuyInput, CheckoutService};
pub use order_service::OrderService;
pub use payment_method_service::{
    AddPaymentMethodInput, PaymentMethodService, UpdatePaymentMethodInput,
};
pub use permission_checker::{Owned, PermissionChecker};
pub use review_service::{AddReviewInput, ReviewOutcome, ReviewService};
pub use user_address_service::{UserAddressInput, UserAddressService};
pub use user_service::{ProvisionUserInput, UserService};
pub use wish_list_service::WishListService;

/// Every service of the commerce core, sharing one pool and one event channel.
#[derive(Clone)]
pub struct CommerceServices {
    pub users: Arc<UserService>,
    pub catalog: Arc<CatalogService>,
    pub carts: Arc<CartService>,
    pub wish_lists: Arc<WishListService>,
    pub checkout: Arc<CheckoutService>,
    pub payment_methods: Arc<PaymentMethodService>,
    pub addresses: Arc<UserAddressService>,
    pub reviews: Arc<ReviewService>,
    pub orders: Arc<OrderService>,
}

impl CommerceServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            users: Arc::new(UserService::new(db.clone(), event_sender.clone())),
            catalog: Arc::new(CatalogService::new(db.clone(), config.clone())),
            carts: Arc::new(CartService::new(db.clone(), event_sender.clone())),
            wish_lists: Arc::new(WishListService::new(db.clone(), event_sender.clone())),
            checkout: Arc::new(CheckoutService::new(db.clone(), event_sender.clone())),
            payment_methods: Arc::new(PaymentMethodService::new(
                db.clone(),
                event_sender.clone(),
            )),
            addresses: Arc::new(UserAddressService::new(db.clone(), event_sender.clone())),
            reviews: Arc::new(ReviewService::new(db.clone(), event_sender.clone())),
            orders: Arc::new(OrderService::new(db, event_sender, config)),
        }
    }
}

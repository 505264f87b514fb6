#![allow(dead_code)]

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseBackend, EntityTrait, Set, Statement};
use tokio::sync::mpsc;
use uuid::Uuid;

use commerce_core::{
    config::AppConfig,
    db::{self, DbConfig},
    entities::{product, shipping_method, UserRole},
    events::Event,
    services::{AddPaymentMethodInput, ProvisionUserInput, UserAddressInput},
    AppState,
};

/// Application state over a private, single-connection in-memory SQLite database.
pub struct TestApp {
    pub state: AppState,
    pub events: mpsc::Receiver<Event>,
    /// Provider that lists every product created through the helpers.
    pub provider: Uuid,
}

/// A provisioned user with the ids of the cart and wish list created alongside.
#[derive(Debug, Clone, Copy)]
pub struct TestUser {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub wish_list_id: Uuid,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = db::establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .expect("failed to open in-memory database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        let (state, events) = AppState::new(pool, cfg);
        let mut app = Self {
            state,
            events,
            provider: Uuid::nil(),
        };
        app.provider = app.user(UserRole::Provider).await.id;
        app.drain_events();
        app
    }

    pub async fn execute_sql(&self, sql: &str) {
        self.state
            .db
            .execute(Statement::from_string(DatabaseBackend::Sqlite, sql.to_string()))
            .await
            .expect("failed to execute raw SQL");
    }

    /// Provisions a user and returns its cart and wish list ids.
    pub async fn user(&self, role: UserRole) -> TestUser {
        let suffix = &Uuid::new_v4().simple().to_string()[..12];
        let user = self
            .state
            .services
            .users
            .provision_user(ProvisionUserInput {
                user_name: format!("user_{}", suffix),
                email: format!("{}@example.com", suffix),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                role,
            })
            .await
            .expect("failed to provision user");

        let cart = self
            .state
            .services
            .carts
            .find_shopping_cart(user.id)
            .await
            .expect("provisioned user has a cart");
        let wish_list = self
            .state
            .services
            .wish_lists
            .find_wish_list(user.id)
            .await
            .expect("provisioned user has a wish list");

        TestUser {
            id: user.id,
            cart_id: cart.id(),
            wish_list_id: wish_list.id(),
        }
    }

    pub async fn client(&self) -> TestUser {
        self.user(UserRole::Client).await
    }

    pub async fn admin(&self) -> TestUser {
        self.user(UserRole::Admin).await
    }

    /// Bans `user_id` on behalf of a freshly provisioned admin.
    pub async fn ban(&self, user_id: Uuid) {
        let admin = self.admin().await;
        self.state
            .services
            .users
            .ban_user(admin.id, user_id)
            .await
            .expect("ban user");
    }

    /// Inserts a visible product listed by the shared provider.
    pub async fn product(&self, name: &str, price: Decimal, stock: i32) -> product::Model {
        self.product_owned_by(self.provider, name, price, stock, true)
            .await
    }

    pub async fn hidden_product(&self, name: &str, price: Decimal, stock: i32) -> product::Model {
        self.product_owned_by(self.provider, name, price, stock, false)
            .await
    }

    pub async fn product_owned_by(
        &self,
        owner_id: Uuid,
        name: &str,
        price: Decimal,
        stock: i32,
        is_visible: bool,
    ) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            category_id: Set(None),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            stock: Set(stock),
            rating: Set(Decimal::ZERO),
            is_visible: Set(is_visible),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to insert product")
    }

    pub async fn reload_product(&self, product_id: Uuid) -> product::Model {
        product::Entity::find_by_id(product_id)
            .one(&*self.state.db)
            .await
            .expect("query product")
            .expect("product exists")
    }

    pub async fn shipping_method(&self, name: &str, cost: Decimal) -> shipping_method::Model {
        shipping_method::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            shipping_cost: Set(cost),
            estimated_delivery_time: Set("3-5 business days".to_string()),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to insert shipping method")
    }

    /// Everything `buy` needs besides a filled cart.
    pub async fn checkout_fixtures(&self, user: &TestUser) -> CheckoutFixtures {
        let payment_method = self
            .state
            .services
            .payment_methods
            .add_payment_method(user.id, card("fp_checkout", true))
            .await
            .expect("add payment method");
        let address = self
            .state
            .services
            .addresses
            .add_user_address(user.id, address("1 Main St", true))
            .await
            .expect("add address");
        let shipping = self.shipping_method("Standard", Decimal::new(500, 2)).await;

        CheckoutFixtures {
            payment_method_id: payment_method.id,
            user_address_id: address.id,
            shipping_method_id: shipping.id,
        }
    }

    /// Takes every event published so far.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CheckoutFixtures {
    pub payment_method_id: Uuid,
    pub user_address_id: Uuid,
    pub shipping_method_id: Uuid,
}

pub fn card(fingerprint: &str, is_default: bool) -> AddPaymentMethodInput {
    AddPaymentMethodInput {
        stripe_id: format!("pm_{}", fingerprint),
        brand: "visa".to_string(),
        country: "US".to_string(),
        exp_month: 12,
        exp_year: 2030,
        last4: "4242".to_string(),
        funding: "credit".to_string(),
        fingerprint: fingerprint.to_string(),
        is_default,
    }
}

pub fn address(line1: &str, is_default: bool) -> UserAddressInput {
    UserAddressInput {
        address_line1: line1.to_string(),
        address_line2: None,
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        postal_code: "62701".to_string(),
        country: "US".to_string(),
        phone_number: Some("555-0100".to_string()),
        is_default,
    }
}

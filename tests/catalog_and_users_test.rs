mod common;

use assert_matches::assert_matches;
use common::TestApp;
use commerce_core::{
    db::ProductSearch,
    entities::{UserRole, UserStatus},
    errors::ServiceError,
    events::Event,
    services::{PermissionChecker, ProvisionUserInput},
};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn signup(user_name: &str) -> ProvisionUserInput {
    ProvisionUserInput {
        user_name: user_name.to_string(),
        email: format!("{}@example.com", user_name),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        role: UserRole::Client,
    }
}

#[tokio::test]
async fn provisioning_creates_cart_and_wish_list() {
    let mut app = TestApp::new().await;
    let users = app.state.services.users.clone();

    let user = users.provision_user(signup("ada")).await.unwrap();
    assert_eq!(user.status, UserStatus::Active);
    assert_eq!(user.role, UserRole::Client);

    let cart = app
        .state
        .services
        .carts
        .find_shopping_cart(user.id)
        .await
        .unwrap();
    let wish_list = app
        .state
        .services
        .wish_lists
        .find_wish_list(user.id)
        .await
        .unwrap();
    assert!(cart.is_empty());
    assert!(wish_list.is_empty());

    assert_eq!(
        app.drain_events(),
        vec![Event::UserProvisioned {
            user_id: user.id,
            cart_id: cart.id(),
            wish_list_id: wish_list.id(),
        }]
    );
}

#[tokio::test]
async fn user_names_are_unique() {
    let app = TestApp::new().await;
    let users = app.state.services.users.clone();

    users.provision_user(signup("grace")).await.unwrap();
    let err = users.provision_user(signup("grace")).await.unwrap_err();
    assert_matches!(err, ServiceError::DuplicateResource(_));

    let err = users.provision_user(signup("x")).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn find_user_ignores_status_but_checks_existence() {
    let app = TestApp::new().await;
    let user = app.client().await;
    app.ban(user.id).await;

    let found = app.state.services.users.find_user(user.id).await.unwrap();
    assert_eq!(found.status, UserStatus::Banned);

    let err = app
        .state
        .services
        .users
        .find_user(Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn banned_user_is_locked_out_until_unbanned() {
    let mut app = TestApp::new().await;
    let admin = app.admin().await;
    let user = app.client().await;
    let product = app.product("Lamp", dec!(15.00), 5).await;
    let users = app.state.services.users.clone();
    app.drain_events();

    let banned = users.ban_user(admin.id, user.id).await.unwrap();
    assert_eq!(banned.status, UserStatus::Banned);
    assert_eq!(
        app.drain_events(),
        vec![Event::UserBanned { user_id: user.id }]
    );

    let err = app
        .state
        .services
        .carts
        .add_item(user.id, user.cart_id, product.id, 1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    // Repeating the ban changes nothing.
    users.ban_user(admin.id, user.id).await.unwrap();
    assert!(app.drain_events().is_empty());

    let active = users.unban_user(admin.id, user.id).await.unwrap();
    assert_eq!(active.status, UserStatus::Active);
    assert_eq!(
        app.drain_events(),
        vec![Event::UserUnbanned { user_id: user.id }]
    );

    app.state
        .services
        .carts
        .add_item(user.id, user.cart_id, product.id, 1)
        .await
        .unwrap();
}

#[tokio::test]
async fn only_admins_moderate_users() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let other_admin = app.admin().await;
    let client = app.client().await;
    let target = app.client().await;
    let users = app.state.services.users.clone();

    let err = users.ban_user(client.id, target.id).await.unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));
    let err = users.find_banned_users(client.id).await.unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let err = users.ban_user(admin.id, other_admin.id).await.unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let err = users.ban_user(admin.id, Uuid::new_v4()).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    assert_eq!(
        users.find_user(target.id).await.unwrap().status,
        UserStatus::Active
    );
}

#[tokio::test]
async fn banned_users_are_listed_by_name() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let users = app.state.services.users.clone();

    let zed = users.provision_user(signup("zed")).await.unwrap();
    let amy = users.provision_user(signup("amy")).await.unwrap();
    let bob = users.provision_user(signup("bob")).await.unwrap();

    users.ban_user(admin.id, zed.id).await.unwrap();
    users.ban_user(admin.id, amy.id).await.unwrap();

    let names: Vec<String> = users
        .find_banned_users(admin.id)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.user_name)
        .collect();
    assert_eq!(names, vec!["amy".to_string(), "zed".to_string()]);

    users.unban_user(admin.id, amy.id).await.unwrap();
    let banned = users.find_banned_users(admin.id).await.unwrap();
    assert_eq!(banned.len(), 1);
    assert_eq!(banned[0].id, zed.id);
    assert!(banned.iter().all(|u| u.id != bob.id));
}

#[tokio::test]
async fn product_search_skips_hidden_products_and_matches_any_keyword() {
    let app = TestApp::new().await;
    app.product("Red mug", dec!(7.25), 5).await;
    app.product("Blue mug", dec!(7.25), 5).await;
    app.product("Green lamp", dec!(12.50), 5).await;
    app.hidden_product("Red lamp", dec!(12.50), 5).await;
    let catalog = app.state.services.catalog.clone();

    let page = catalog
        .find_products(ProductSearch::new().keywords("red lamp"), 1, None)
        .await
        .unwrap();
    let names: Vec<_> = page.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Green lamp", "Red mug"]);
    assert_eq!(page.total, 2);

    let everything = catalog
        .find_products(ProductSearch::new(), 1, Some(2))
        .await
        .unwrap();
    assert_eq!(everything.total, 3);
    assert_eq!(everything.items.len(), 2);
    assert!(everything.has_more);

    let none = catalog
        .find_products(ProductSearch::new().category(Uuid::new_v4()), 1, None)
        .await
        .unwrap();
    assert!(none.items.is_empty());
    assert_eq!(none.total_pages, 0);
}

#[tokio::test]
async fn keyword_wildcards_are_matched_literally() {
    let app = TestApp::new().await;
    app.product("50% off bundle", dec!(9.99), 5).await;
    app.product("500 piece puzzle", dec!(14.99), 5).await;
    app.product("usb_c cable", dec!(4.99), 5).await;
    app.product("usbxc adapter", dec!(6.99), 5).await;
    let catalog = app.state.services.catalog.clone();

    let page = catalog
        .find_products(ProductSearch::new().keywords("50%"), 1, None)
        .await
        .unwrap();
    let names: Vec<_> = page.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["50% off bundle"]);

    let page = catalog
        .find_products(ProductSearch::new().keywords("usb_c"), 1, None)
        .await
        .unwrap();
    let names: Vec<_> = page.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["usb_c cable"]);
}

#[tokio::test]
async fn shipping_methods_are_listed_by_name() {
    let app = TestApp::new().await;
    app.shipping_method("Overnight", dec!(25.00)).await;
    app.shipping_method("Economy", dec!(2.50)).await;

    let methods = app
        .state
        .services
        .catalog
        .find_all_shipping_methods()
        .await
        .unwrap();
    let names: Vec<_> = methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Economy", "Overnight"]);
}

#[tokio::test]
async fn product_checks_require_the_listing_provider() {
    let app = TestApp::new().await;
    let product = app.product("Lamp", dec!(15.00), 5).await;
    let other_provider = app.user(UserRole::Provider).await;
    let checker = PermissionChecker::new();
    let db = &*app.state.db;

    let owned = checker
        .check_product(db, product.id, app.provider)
        .await
        .unwrap();
    assert_eq!(owned.id, product.id);

    let err = checker
        .check_product(db, product.id, other_provider.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let err = checker
        .check_product(db, Uuid::new_v4(), app.provider)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

mod common;

use assert_matches::assert_matches;
use common::{TestApp, TestUser};
use commerce_core::{
    entities::{product, UserRole},
    errors::ServiceError,
    services::{AddReviewInput, BuyInput},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Provisions a user of `role` who has bought one unit of `product`.
async fn buyer(app: &TestApp, role: UserRole, product: &product::Model) -> TestUser {
    let user = app.user(role).await;
    let fixtures = app.checkout_fixtures(&user).await;
    app.state
        .services
        .carts
        .add_item(user.id, user.cart_id, product.id, 1)
        .await
        .unwrap();
    app.state
        .services
        .checkout
        .buy(
            user.id,
            BuyInput {
                cart_id: user.cart_id,
                payment_method_id: fixtures.payment_method_id,
                user_address_id: fixtures.user_address_id,
                shipping_method_id: fixtures.shipping_method_id,
            },
        )
        .await
        .unwrap();
    user
}

fn review(product: &product::Model, rating: i32) -> AddReviewInput {
    AddReviewInput {
        product_id: product.id,
        rating,
        comment: "Does what it says".to_string(),
    }
}

#[tokio::test]
async fn review_without_purchase_is_forbidden() {
    let app = TestApp::new().await;
    let product = app.product("Kettle", dec!(20.00), 10).await;
    let user = app.client().await;

    let err = app
        .state
        .services
        .reviews
        .add_review(user.id, review(&product, 4))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    assert!(!app
        .state
        .services
        .reviews
        .is_product_purchased(product.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn purchase_of_another_product_does_not_count() {
    let app = TestApp::new().await;
    let kettle = app.product("Kettle", dec!(20.00), 10).await;
    let toaster = app.product("Toaster", dec!(25.00), 10).await;
    let user = buyer(&app, UserRole::Client, &toaster).await;

    let err = app
        .state
        .services
        .reviews
        .add_review(user.id, review(&kettle, 5))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));
}

#[tokio::test]
async fn ratings_are_averaged_and_reset_when_reviews_are_removed() {
    let app = TestApp::new().await;
    let product = app.product("Kettle", dec!(20.00), 10).await;
    let reviews = app.state.services.reviews.clone();

    let mut outcomes = Vec::new();
    for rating in [4, 5, 3] {
        let user = buyer(&app, UserRole::Client, &product).await;
        let outcome = reviews
            .add_review(user.id, review(&product, rating))
            .await
            .unwrap();
        outcomes.push((user, outcome));
    }

    assert_eq!(outcomes[0].1.review.rating, dec!(4));
    assert_eq!(outcomes[0].1.product_rating, dec!(4.00));
    assert_eq!(outcomes[1].1.product_rating, dec!(4.50));
    assert_eq!(outcomes[2].1.product_rating, dec!(4.00));
    assert_eq!(app.reload_product(product.id).await.rating, dec!(4.00));
    assert_eq!(reviews.get_product_reviews(product.id).await.unwrap().len(), 3);

    let mut last = Decimal::ONE;
    for (user, outcome) in &outcomes {
        last = reviews
            .remove_review(user.id, outcome.review.id)
            .await
            .unwrap();
    }
    assert_eq!(last, Decimal::ZERO);
    assert_eq!(app.reload_product(product.id).await.rating, Decimal::ZERO);
}

#[tokio::test]
async fn second_review_is_a_duplicate() {
    let app = TestApp::new().await;
    let product = app.product("Kettle", dec!(20.00), 10).await;
    let user = buyer(&app, UserRole::Client, &product).await;
    let reviews = app.state.services.reviews.clone();

    reviews
        .add_review(user.id, review(&product, 5))
        .await
        .unwrap();
    assert!(reviews.is_reviewed(user.id, product.id).await.unwrap());

    let err = reviews
        .add_review(user.id, review(&product, 1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::DuplicateResource(_));
    assert_eq!(app.reload_product(product.id).await.rating, dec!(5.00));
}

#[tokio::test]
async fn only_clients_may_review() {
    let app = TestApp::new().await;
    let product = app.product("Kettle", dec!(20.00), 10).await;
    let admin = buyer(&app, UserRole::Admin, &product).await;

    let err = app
        .state
        .services
        .reviews
        .add_review(admin.id, review(&product, 4))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));
}

#[tokio::test]
async fn rating_outside_range_is_invalid() {
    let app = TestApp::new().await;
    let product = app.product("Kettle", dec!(20.00), 10).await;
    let user = buyer(&app, UserRole::Client, &product).await;
    let reviews = app.state.services.reviews.clone();

    for rating in [0, 6, -1] {
        let err = reviews
            .add_review(user.id, review(&product, rating))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }
    assert!(!reviews.is_reviewed(user.id, product.id).await.unwrap());
}

#[tokio::test]
async fn only_the_author_can_remove_a_review() {
    let app = TestApp::new().await;
    let product = app.product("Kettle", dec!(20.00), 10).await;
    let author = buyer(&app, UserRole::Client, &product).await;
    let stranger = app.client().await;
    let reviews = app.state.services.reviews.clone();

    let outcome = reviews
        .add_review(author.id, review(&product, 4))
        .await
        .unwrap();
    let err = reviews
        .remove_review(stranger.id, outcome.review.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));
}

#[tokio::test]
async fn is_reviewed_rejects_unknown_user_and_product() {
    let app = TestApp::new().await;
    let product = app.product("Kettle", dec!(20.00), 10).await;
    let user = app.client().await;
    let reviews = app.state.services.reviews.clone();

    assert!(!reviews.is_reviewed(user.id, product.id).await.unwrap());

    let err = reviews
        .is_reviewed(Uuid::new_v4(), product.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let err = reviews
        .is_reviewed(user.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

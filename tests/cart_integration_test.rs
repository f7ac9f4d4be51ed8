//! Cart store behaviour over HTTP.

mod common;

use axum::http::Method;
use common::{coupon, money, response_json, TestApp};
use moviestore_api::services::coupons::CouponInput;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn cart_requires_authentication() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/cart", None, None).await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn adding_the_same_movie_merges_lines() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;
    let movie = app.seed_movie("Heat", dec!(20), None).await;

    app.add_to_cart(&token, movie.id, 1).await;
    app.add_to_cart(&token, movie.id, 2).await;

    let cart = response_json(app.request(Method::GET, "/api/v1/cart", None, Some(&token)).await)
        .await["data"]
        .clone();
    let items = cart["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 3);
    assert_eq!(items[0]["movie"]["title"], "Heat");
    assert_eq!(money(&cart["totals"]["subtotal"]), dec!(60));
    assert_eq!(cart["totals"]["total_quantity"], 3);
    assert_eq!(cart["version"], 2);
}

#[tokio::test]
async fn quantity_below_one_is_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;
    let movie = app.seed_movie("Heat", dec!(20), None).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(json!({ "movie_id": movie.id, "quantity": 0 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn unknown_movie_cannot_be_added() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(json!({ "movie_id": Uuid::new_v4() })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn update_remove_and_clear() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;
    let a = app.seed_movie("Alien", dec!(10), None).await;
    let b = app.seed_movie("Arrival", dec!(15), None).await;
    app.add_to_cart(&token, a.id, 1).await;
    app.add_to_cart(&token, b.id, 1).await;

    let response = app
        .request(
            Method::PATCH,
            "/api/v1/cart",
            Some(json!({ "movie_id": a.id, "quantity": 4 })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let cart = response_json(response).await["data"].clone();
    assert_eq!(money(&cart["totals"]["subtotal"]), dec!(55));

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/cart/items/{}", b.id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
    let cart = response_json(response).await["data"].clone();
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));

    // removing it again reports the missing line
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/cart/items/{}", b.id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 404);

    let response = app
        .request(Method::DELETE, "/api/v1/cart", None, Some(&token))
        .await;
    assert_eq!(response.status(), 204);

    // clearing an empty cart is fine
    let response = app
        .request(Method::DELETE, "/api/v1/cart", None, Some(&token))
        .await;
    assert_eq!(response.status(), 204);
}

#[tokio::test]
async fn preview_applies_eligible_coupon_and_ignores_others() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;
    let movie = app.seed_movie("Heat", dec!(20), None).await;
    app.seed_coupon(CouponInput {
        min_quantity: 3,
        ..coupon("HALFOFF", dec!(50), true)
    })
    .await;
    app.add_to_cart(&token, movie.id, 2).await;

    let preview = response_json(
        app.request(
            Method::GET,
            "/api/v1/cart/current?coupon=HALFOFF",
            None,
            Some(&token),
        )
        .await,
    )
    .await["data"]
        .clone();
    assert!(preview["applied_coupon"].is_null());
    assert_eq!(money(&preview["total"]), dec!(43.20));

    app.add_to_cart(&token, movie.id, 1).await;
    let preview = response_json(
        app.request(
            Method::GET,
            "/api/v1/cart/current?coupon=halfoff",
            None,
            Some(&token),
        )
        .await,
    )
    .await["data"]
        .clone();
    assert_eq!(preview["applied_coupon"]["code"], "HALFOFF");
    assert_eq!(money(&preview["discount_amount"]), dec!(30));
    assert_eq!(money(&preview["tax"]), dec!(2.40));
    assert_eq!(money(&preview["total"]), dec!(32.40));
}

#[tokio::test]
async fn coupon_check_explains_rejection() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;
    let movie = app.seed_movie("Heat", dec!(20), None).await;
    app.seed_coupon(CouponInput {
        min_quantity: 3,
        ..coupon("HALFOFF", dec!(50), true)
    })
    .await;

    // nothing in the cart yet
    let response = app
        .request(
            Method::GET,
            "/api/v1/coupons/apply?code=HALFOFF",
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 400);

    app.add_to_cart(&token, movie.id, 1).await;
    let check = response_json(
        app.request(
            Method::GET,
            "/api/v1/coupons/apply?code=HALFOFF",
            None,
            Some(&token),
        )
        .await,
    )
    .await["data"]
        .clone();
    assert_eq!(check["valid"], false);
    assert_eq!(check["rejection"]["reason"], "below_min_quantity");
    assert_eq!(check["rejection"]["required"], 3);
    assert_eq!(
        check["message"],
        "Coupon conditions not met: Requires at least 3 items in cart"
    );
}

#[tokio::test]
async fn expired_and_inactive_coupons_are_not_found() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;
    app.seed_coupon(CouponInput {
        expires_at: Some(chrono::Utc::now() - chrono::Duration::days(1)),
        ..coupon("EXPIRED20", dec!(20), true)
    })
    .await;
    app.seed_coupon(CouponInput {
        active: false,
        ..coupon("PAUSED", dec!(5), false)
    })
    .await;
    app.seed_coupon(coupon("SPRING25", dec!(25), true)).await;

    for code in ["EXPIRED20", "PAUSED", "MISSING"] {
        let response = app
            .request(
                Method::GET,
                &format!("/api/v1/coupons/code/{code}"),
                None,
                Some(&token),
            )
            .await;
        assert_eq!(response.status(), 400, "{code}");
        assert_eq!(response_json(response).await["code"], "invalid_coupon");
    }

    let response = app
        .request(Method::GET, "/api/v1/coupons/code/spring25", None, Some(&token))
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await["data"]["code"], "SPRING25");
}

#[tokio::test]
async fn catalog_is_public_and_searchable() {
    let app = TestApp::new().await;
    let heat = app.seed_movie("Heat", dec!(20), None).await;
    app.seed_movie("Alien", dec!(10), None).await;

    let page = response_json(
        app.request(Method::GET, "/api/v1/movies?search=Hea&per_page=5", None, None)
            .await,
    )
    .await["data"]
        .clone();
    assert_eq!(page["total"], 1);
    assert_eq!(page["per_page"], 5);
    assert_eq!(page["items"][0]["title"], "Heat");

    let multi = response_json(
        app.request(
            Method::POST,
            "/api/v1/movies/multi",
            Some(json!({ "ids": [heat.id, Uuid::new_v4()] })),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(multi["data"].as_array().map(Vec::len), Some(1));

    let missing = app
        .request(
            Method::GET,
            &format!("/api/v1/movies/{}", Uuid::new_v4()),
            None,
            None,
        )
        .await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn unknown_coupon_check_reports_not_found() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;
    let movie = app.seed_movie("Heat", dec!(20), None).await;
    app.add_to_cart(&token, movie.id, 1).await;

    let check = response_json(
        app.request(
            Method::GET,
            "/api/v1/coupons/apply?code=nosuchcode",
            None,
            Some(&token),
        )
        .await,
    )
    .await["data"]
        .clone();
    assert_eq!(check["code"], "NOSUCHCODE");
    assert_eq!(check["valid"], false);
    assert_eq!(check["rejection"]["reason"], "not_found");
    assert_eq!(check["message"], "Invalid or expired coupon");
    assert!(check["totals"]["applied_coupon"].is_null());
    assert_eq!(money(&check["totals"]["subtotal"]), dec!(20));
}

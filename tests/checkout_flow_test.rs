//! Order placement end to end: cart, coupon eligibility, snapshots and the
//! guarantees around failed checkouts.

mod common;

use axum::http::Method;
use common::{coupon, money, response_json, TestApp};
use moviestore_api::services::coupons::CouponInput;
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn order_without_coupon_charges_subtotal_plus_tax() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;
    let movie = app.seed_movie("Heat", dec!(20), None).await;
    app.add_to_cart(&token, movie.id, 2).await;

    let response = app
        .request(Method::POST, "/api/v1/orders", Some(json!({})), Some(&token))
        .await;
    assert_eq!(response.status(), 201);

    let order = response_json(response).await["data"].clone();
    assert_eq!(money(&order["subtotal"]), dec!(40));
    assert_eq!(money(&order["discount"]), dec!(0));
    assert_eq!(money(&order["tax"]), dec!(3.20));
    assert_eq!(money(&order["total"]), dec!(43.20));
    assert_eq!(order["status"], "pending");
    assert!(order["coupon_snapshot"].is_null());
}

#[tokio::test]
async fn first_order_coupon_applies_once() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;
    let movie = app.seed_movie("The Godfather", dec!(100), None).await;
    app.seed_coupon(CouponInput {
        specific_order_count: Some(0),
        ..coupon("WELCOME15", dec!(15), true)
    })
    .await;

    app.add_to_cart(&token, movie.id, 1).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "coupon_code": "welcome15" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 201);

    let order = response_json(response).await["data"].clone();
    assert_eq!(money(&order["subtotal"]), dec!(100));
    assert_eq!(money(&order["discount"]), dec!(15));
    assert_eq!(money(&order["tax"]), dec!(6.80));
    assert_eq!(money(&order["total"]), dec!(91.80));
    assert_eq!(order["coupon_snapshot"]["code"], "WELCOME15");
    assert_eq!(money(&order["coupon_snapshot"]["discountAmount"]), dec!(15));

    // second purchase: one prior order now exists
    app.add_to_cart(&token, movie.id, 1).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "coupon_code": "WELCOME15" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["code"], "invalid_coupon");

    // the rejected checkout left the cart intact
    let cart = response_json(
        app.request(Method::GET, "/api/v1/cart", None, Some(&token))
            .await,
    )
    .await;
    assert_eq!(cart["data"]["items"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn unmet_subtotal_threshold_rejects_checkout_but_not_preview() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;
    let movie = app.seed_movie("Spirited Away", dec!(20), Some(dec!(15))).await;
    app.seed_coupon(CouponInput {
        min_subtotal: dec!(50),
        ..coupon("MOVIE10", dec!(10), false)
    })
    .await;
    app.add_to_cart(&token, movie.id, 2).await;

    let preview = response_json(
        app.request(
            Method::GET,
            "/api/v1/cart/current?coupon=MOVIE10",
            None,
            Some(&token),
        )
        .await,
    )
    .await["data"]
        .clone();
    assert_eq!(money(&preview["subtotal"]), dec!(30));
    assert_eq!(money(&preview["discount_amount"]), dec!(0));
    assert_eq!(money(&preview["tax"]), dec!(2.40));
    assert_eq!(money(&preview["total"]), dec!(32.40));
    assert!(preview["applied_coupon"].is_null());

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "coupon_code": "MOVIE10" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("Requires minimum subtotal of $50"));
}

#[tokio::test]
async fn empty_cart_is_rejected_without_creating_an_order() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;

    let response = app
        .request(Method::POST, "/api/v1/orders", None, Some(&token))
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(response_json(response).await["code"], "cart_empty");

    let orders = response_json(
        app.request(Method::GET, "/api/v1/orders/mine", None, Some(&token))
            .await,
    )
    .await;
    assert_eq!(orders["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn unknown_coupon_code_fails_the_order() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;
    let movie = app.seed_movie("Alien", dec!(12), None).await;
    app.add_to_cart(&token, movie.id, 1).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "coupon_code": "NOPE" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(
        response_json(response).await["message"],
        "Invalid or expired coupon"
    );
}

#[tokio::test]
async fn deleted_movie_makes_cart_unpurchasable() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;
    let (_, admin_token) = app.admin().await;
    let kept = app.seed_movie("Arrival", dec!(10), None).await;
    let removed = app.seed_movie("Paris, Texas", dec!(10), None).await;
    app.add_to_cart(&token, kept.id, 1).await;
    app.add_to_cart(&token, removed.id, 1).await;

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/admin/movies/{}", removed.id),
            None,
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), 204);

    // preview skips the missing line
    let preview = response_json(
        app.request(Method::GET, "/api/v1/cart/current", None, Some(&token))
            .await,
    )
    .await;
    assert_eq!(money(&preview["data"]["subtotal"]), dec!(10));

    let response = app
        .request(Method::POST, "/api/v1/orders", None, Some(&token))
        .await;
    assert_eq!(response.status(), 409);
    assert_eq!(response_json(response).await["code"], "item_unavailable");
}

#[tokio::test]
async fn order_snapshot_survives_catalog_changes() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;
    let (_, admin_token) = app.admin().await;
    let movie = app.seed_movie("Mad Max", dec!(18), Some(dec!(12))).await;
    app.add_to_cart(&token, movie.id, 3).await;

    let placed = response_json(
        app.request(Method::POST, "/api/v1/orders", None, Some(&token))
            .await,
    )
    .await["data"]
        .clone();
    let order_id = placed["id"].as_str().expect("order id").to_string();

    let response = app
        .request(
            Method::PATCH,
            &format!("/api/v1/admin/movies/{}", movie.id),
            Some(json!({ "title": "Mad Max: Fury Road", "price": "30" , "clear_discount_price": true })),
            Some(&admin_token),
        )
        .await;
    assert_eq!(response.status(), 200);

    let fetched = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            None,
            Some(&token),
        )
        .await,
    )
    .await["data"]
        .clone();

    let line = &fetched["movies"][0];
    assert_eq!(line["movieSnapshot"]["title"], "Mad Max");
    assert_eq!(money(&line["purchasePrice"]), dec!(12));
    assert_eq!(line["quantity"], 3);
    assert_eq!(money(&fetched["subtotal"]), dec!(36));
}

#[tokio::test]
async fn checkout_empties_the_cart_and_records_history() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;
    let movie = app.seed_movie("Amelie", dec!(11), None).await;
    app.add_to_cart(&token, movie.id, 1).await;

    let response = app
        .request(Method::POST, "/api/v1/orders", None, Some(&token))
        .await;
    assert_eq!(response.status(), 201);

    let cart = response_json(
        app.request(Method::GET, "/api/v1/cart", None, Some(&token))
            .await,
    )
    .await;
    assert_eq!(cart["data"]["items"].as_array().map(Vec::len), Some(0));
    assert!(cart["data"]["totals"].is_null());

    let orders = response_json(
        app.request(Method::GET, "/api/v1/orders/mine", None, Some(&token))
            .await,
    )
    .await;
    assert_eq!(orders["data"].as_array().map(Vec::len), Some(1));

    // stock is left as is
    let stored = app
        .state
        .services
        .catalog
        .get_movie(movie.id)
        .await
        .expect("movie");
    assert_eq!(stored.quantity, 10);
}

#[tokio::test]
async fn loyalty_coupon_counts_prior_orders() {
    let app = TestApp::new().await;
    let (user, token) = app.customer().await;
    let movie = app.seed_movie("Heat", dec!(50), None).await;
    app.seed_coupon(CouponInput {
        min_order_count: 5,
        ..coupon("LOYAL20", dec!(20), true)
    })
    .await;
    app.add_to_cart(&token, movie.id, 1).await;

    let check = response_json(
        app.request(
            Method::GET,
            "/api/v1/coupons/apply?code=LOYAL20",
            None,
            Some(&token),
        )
        .await,
    )
    .await["data"]
        .clone();
    assert_eq!(check["valid"], false);
    assert_eq!(check["rejection"]["reason"], "below_min_order_count");

    app.seed_prior_orders(user.id, 5).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "coupon_code": "LOYAL20" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 201);
    let order = response_json(response).await["data"].clone();
    assert_eq!(money(&order["discount"]), dec!(10));
    assert_eq!(money(&order["total"]), dec!(43.20));
}

#[tokio::test]
async fn other_users_orders_are_hidden() {
    let app = TestApp::new().await;
    let (_, owner) = app.customer().await;
    let (_, stranger) = app.customer().await;
    let (_, admin) = app.admin().await;
    let movie = app.seed_movie("Heat", dec!(10), None).await;
    app.add_to_cart(&owner, movie.id, 1).await;

    let placed = response_json(
        app.request(Method::POST, "/api/v1/orders", None, Some(&owner))
            .await,
    )
    .await;
    let uri = format!("/api/v1/orders/{}", placed["data"]["id"].as_str().unwrap());

    assert_eq!(
        app.request(Method::GET, &uri, None, Some(&stranger))
            .await
            .status(),
        404
    );
    assert_eq!(
        app.request(Method::GET, &uri, None, Some(&admin))
            .await
            .status(),
        200
    );
}

#[tokio::test]
async fn malformed_coupon_input_is_rejected_without_an_order() {
    let app = TestApp::new().await;
    let (_, token) = app.customer().await;
    let movie = app.seed_movie("Heat", dec!(20), None).await;
    app.add_to_cart(&token, movie.id, 1).await;

    for body in [
        json!({ "coupon_code": "" }),
        json!({ "coupon_code": "   " }),
        json!({ "coupon_code": 5 }),
        json!({ "coupon": "NOPE" }),
        json!({ "coupon_code": null, "total": "0.01" }),
    ] {
        let response = app
            .request(Method::POST, "/api/v1/orders", Some(body.clone()), Some(&token))
            .await;
        assert_eq!(response.status(), 400, "{body}");
    }

    let history = response_json(
        app.request(Method::GET, "/api/v1/orders/mine", None, Some(&token))
            .await,
    )
    .await;
    assert_eq!(history["data"].as_array().map(Vec::len), Some(0));

    let cart = response_json(app.request(Method::GET, "/api/v1/cart", None, Some(&token)).await)
        .await;
    assert_eq!(cart["data"]["items"].as_array().map(Vec::len), Some(1));
}

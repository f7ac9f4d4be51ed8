#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Method, Request, Response},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use moviestore_api::{
    build_router,
    config::AppConfig,
    db::{self, DbConfig},
    entities::{movie, order, user, CouponModel, MovieModel, OrderStatus, UserModel, UserRole},
    events::{self, EventSender},
    services::coupons::CouponInput,
    AppState,
};

pub const TEST_SECRET: &str =
    "integration-test-signing-key-Hq3Zr8Lw5Nv2Xy7Kp4Jm9Tc6Bd1Gf0Sx-moviestore-only";

/// Application backed by a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "development".to_string(),
        );

        let pool = db::establish_connection_with_config(&DbConfig::sqlite_memory())
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));
        let event_sender = Arc::new(EventSender::new(event_tx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        let router = build_router(state.clone()).expect("router builds");

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router responds")
    }

    /// Inserts an account directly, skipping password hashing, and returns
    /// it with a signed token.
    pub async fn create_user(&self, email: &str, role: UserRole) -> (UserModel, String) {
        let now = Utc::now();
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(email.split('@').next().unwrap_or("user").to_string()),
            email: Set(email.to_string()),
            password_hash: Set(String::new()),
            role: Set(role),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("insert user");

        let token = self
            .state
            .auth
            .generate_token(&user)
            .expect("token")
            .access_token;
        (user, token)
    }

    pub async fn customer(&self) -> (UserModel, String) {
        self.create_user(&format!("{}@example.com", Uuid::new_v4()), UserRole::User)
            .await
    }

    pub async fn admin(&self) -> (UserModel, String) {
        self.create_user(&format!("admin-{}@example.com", Uuid::new_v4()), UserRole::Admin)
            .await
    }

    pub async fn seed_movie(
        &self,
        title: &str,
        price: Decimal,
        discount_price: Option<Decimal>,
    ) -> MovieModel {
        let now = Utc::now();
        movie::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            description: Set(None),
            genre: Set(Some("Drama".to_string())),
            cover_image: Set(None),
            price: Set(price),
            discount_price: Set(discount_price),
            quantity: Set(10),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("insert movie")
    }

    pub async fn seed_coupon(&self, input: CouponInput) -> CouponModel {
        self.state
            .services
            .coupons
            .create_coupon(input)
            .await
            .expect("create coupon")
    }

    /// Gives the user `count` historical orders.
    pub async fn seed_prior_orders(&self, user_id: Uuid, count: usize) {
        for _ in 0..count {
            order::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                movies: Set(serde_json::json!([])),
                coupon_snapshot: Set(None),
                subtotal: Set(Decimal::ONE),
                discount: Set(Decimal::ZERO),
                tax: Set(Decimal::ZERO),
                total: Set(Decimal::ONE),
                status: Set(OrderStatus::Pending),
                created_at: Set(Utc::now()),
            }
            .insert(&*self.state.db)
            .await
            .expect("insert order");
        }
    }

    pub async fn add_to_cart(&self, token: &str, movie_id: Uuid, quantity: i32) {
        let response = self
            .request(
                Method::POST,
                "/api/v1/cart",
                Some(serde_json::json!({ "movie_id": movie_id, "quantity": quantity })),
                Some(token),
            )
            .await;
        assert_eq!(response.status(), 200, "add to cart");
    }
}

/// Coupon input with permissive thresholds.
pub fn coupon(code: &str, value: Decimal, is_percentage: bool) -> CouponInput {
    CouponInput {
        code: code.to_string(),
        description: format!("{code} test coupon"),
        discount_value: value,
        is_percentage,
        min_quantity: 1,
        min_subtotal: Decimal::ZERO,
        min_order_count: 0,
        max_order_count: None,
        specific_order_count: None,
        expires_at: None,
        active: true,
    }
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Reads a money field, tolerating the float round-trip of SQLite storage.
pub fn money(value: &Value) -> Decimal {
    let parsed = match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a money value: {other}"),
    };
    parsed.round_dp(2)
}

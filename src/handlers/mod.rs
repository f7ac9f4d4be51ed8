pub mod admin;
pub mod auth;
pub mod cart;
pub mod common;
pub mod coupons;
pub mod movies;
pub mod orders;

use crate::{
    auth::AuthService,
    db::DbPool,
    events::EventSender,
    services::{
        cart::CartService, catalog::CatalogService, checkout::CheckoutService,
        coupons::CouponService, orders::OrderService, pricing::PricingEngine, users::UserService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub coupons: Arc<CouponService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        auth_service: Arc<AuthService>,
        pricing: PricingEngine,
    ) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(db_pool.clone(), event_sender.clone())),
            cart: Arc::new(CartService::new(
                db_pool.clone(),
                event_sender.clone(),
                pricing,
            )),
            coupons: Arc::new(CouponService::new(
                db_pool.clone(),
                event_sender.clone(),
                pricing,
            )),
            checkout: Arc::new(CheckoutService::new(
                db_pool.clone(),
                event_sender.clone(),
                pricing,
            )),
            orders: Arc::new(OrderService::new(db_pool.clone())),
            users: Arc::new(UserService::new(db_pool, event_sender, auth_service)),
        }
    }
}

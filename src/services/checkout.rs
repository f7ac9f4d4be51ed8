//! Order placement.
//!
//! Turns the caller's cart into an immutable order. Prices, the coupon and
//! the prior-order count are all re-read inside one transaction; nothing the
//! client computed is trusted. The cart's `version` is compared-and-swapped
//! before the cart is emptied so two concurrent checkouts of the same cart
//! cannot both succeed.

use crate::{
    entities::{
        cart, cart_item, coupon::normalize_code, order, Cart, CartItem, CartModel, CouponModel,
        CouponSnapshot, LineSnapshot, MovieSnapshot, OrderModel, OrderStatus, User,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        cart::{cart_items, find_cart},
        catalog::find_movies_by_ids,
        coupons::find_active_coupon,
        orders::count_prior_orders,
        pricing::{LineInput, PricedLine, PricingEngine},
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Checkout request. Carries no prices or quantities: those come from the
/// stored cart and the live catalog.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PlaceOrderInput {
    #[validate(length(min = 1, max = 64))]
    pub coupon_code: Option<String>,
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    pricing: PricingEngine,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        pricing: PricingEngine,
    ) -> Self {
        Self {
            db,
            event_sender,
            pricing,
        }
    }

    /// Places an order for everything in the caller's cart.
    ///
    /// Nothing is written unless every step succeeds: a blank coupon code,
    /// an empty cart, a line whose movie was deleted, a coupon that cannot be
    /// applied, or a cart that changed concurrently all fail without a write.
    #[instrument(skip(self))]
    pub async fn place_order(
        &self,
        user_id: Uuid,
        coupon_code: Option<&str>,
    ) -> Result<OrderModel, ServiceError> {
        let requested_code = match coupon_code.map(normalize_code) {
            Some(code) if code.is_empty() => {
                return Err(ServiceError::ValidationError(
                    "coupon_code must not be blank".to_string(),
                ))
            }
            other => other,
        };
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let user = User::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;
        if !user.active {
            return Err(ServiceError::Forbidden("Account is deactivated".to_string()));
        }

        let cart = find_cart(&txn, user_id).await?.ok_or(ServiceError::EmptyCart)?;
        let placed = self
            .order_from_cart(&txn, &cart, requested_code.as_deref(), now)
            .await?;
        txn.commit().await?;

        let PlacedOrder { order, coupon_code, lines } = placed;
        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id: order.id,
                user_id,
                total: order.total,
                coupon_code,
                placed_at: order.created_at,
            })
            .await;

        info!(
            order_id = %order.id,
            %user_id,
            total = %order.total,
            lines,
            "Placed order"
        );
        Ok(order)
    }

    /// Prices `cart` as read at the start of the transaction, writes the
    /// order and empties the cart. Fails with `ConcurrentModification` when
    /// the stored cart version no longer matches `cart.version`.
    async fn order_from_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart: &CartModel,
        requested_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PlacedOrder, ServiceError> {
        let items = cart_items(conn, cart.id).await?;
        if items.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let ids: Vec<Uuid> = items.iter().map(|i| i.movie_id).collect();
        let movies = find_movies_by_ids(conn, &ids).await?;
        let lines: Vec<LineInput<'_>> = items
            .iter()
            .map(|item| LineInput {
                movie_id: item.movie_id,
                movie: movies.get(&item.movie_id),
                quantity: item.quantity,
            })
            .collect();

        let coupon = match requested_code {
            Some(code) => find_active_coupon(conn, code, now).await?,
            None => None,
        };
        let prior_orders = count_prior_orders(conn, cart.user_id).await?;

        let committed =
            self.pricing
                .commit(&lines, requested_code, coupon.as_ref(), prior_orders, now)?;

        let line_snapshots = snapshot_lines(&committed.lines);
        let coupon_snapshot = committed
            .coupon
            .as_ref()
            .map(|c| snapshot_coupon(c, committed.totals.discount_amount));

        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(cart.user_id),
            movies: Set(serde_json::to_value(&line_snapshots)?),
            coupon_snapshot: Set(coupon_snapshot
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?),
            subtotal: Set(committed.totals.subtotal),
            discount: Set(committed.totals.discount_amount),
            tax: Set(committed.totals.tax),
            total: Set(committed.totals.total),
            status: Set(OrderStatus::Pending),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;

        swap_cart_version(conn, cart, now).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(conn)
            .await?;

        Ok(PlacedOrder {
            order,
            coupon_code: coupon_snapshot.map(|c| c.code),
            lines: line_snapshots.len(),
        })
    }
}

#[derive(Debug)]
struct PlacedOrder {
    order: OrderModel,
    coupon_code: Option<String>,
    lines: usize,
}

/// Bumps the cart version only if it still equals the version read at the
/// start of checkout.
async fn swap_cart_version<C: ConnectionTrait>(
    conn: &C,
    cart: &CartModel,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let swapped = Cart::update_many()
        .col_expr(
            cart::Column::Version,
            Expr::col(cart::Column::Version).add(1),
        )
        .col_expr(cart::Column::UpdatedAt, Expr::value(now))
        .filter(cart::Column::Id.eq(cart.id))
        .filter(cart::Column::Version.eq(cart.version))
        .exec(conn)
        .await?;
    if swapped.rows_affected == 0 {
        warn!(cart_id = %cart.id, version = cart.version, "cart changed during checkout");
        return Err(ServiceError::ConcurrentModification(cart.id));
    }
    Ok(())
}

fn snapshot_lines(lines: &[PricedLine]) -> Vec<LineSnapshot> {
    lines
        .iter()
        .map(|line| LineSnapshot {
            movie_snapshot: MovieSnapshot {
                id: line.movie.id,
                title: line.movie.title.clone(),
                cover_image: line.movie.cover_image.clone(),
                price: line.movie.price,
                discount_price: line.movie.discount_price,
                description: line.movie.description.clone(),
                genre: line.movie.genre.clone(),
            },
            quantity: line.quantity,
            purchase_price: line.unit_price,
        })
        .collect()
}

fn snapshot_coupon(coupon: &CouponModel, discount_amount: Decimal) -> CouponSnapshot {
    CouponSnapshot {
        code: coupon.code.clone(),
        description: coupon.description.clone(),
        discount_amount,
        is_percentage: coupon.is_percentage,
        original_discount_value: coupon.discount_value,
        min_quantity: coupon.min_quantity,
        min_subtotal: coupon.min_subtotal,
        min_order_count: coupon.min_order_count,
        max_order_count: coupon.max_order_count,
        specific_order_count: coupon.specific_order_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::MovieModel;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn movie() -> MovieModel {
        let now = Utc::now();
        MovieModel {
            id: Uuid::new_v4(),
            title: "Heat".into(),
            description: Some("LA crime saga".into()),
            genre: Some("Crime".into()),
            cover_image: Some("heat.jpg".into()),
            price: dec!(20),
            discount_price: Some(dec!(15)),
            quantity: 4,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn line_snapshot_freezes_charged_unit_price() {
        let m = movie();
        let snapshots = snapshot_lines(&[PricedLine {
            movie: m.clone(),
            quantity: 2,
            unit_price: dec!(15),
            line_total: dec!(30),
        }]);

        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].purchase_price, dec!(15));
        assert_eq!(snapshots[0].quantity, 2);
        assert_eq!(snapshots[0].movie_snapshot.id, m.id);
        assert_eq!(snapshots[0].movie_snapshot.price, dec!(20));
        assert_eq!(snapshots[0].movie_snapshot.discount_price, Some(dec!(15)));
    }

    #[test]
    fn line_snapshot_serializes_with_camel_case_keys() {
        let value = serde_json::to_value(snapshot_lines(&[PricedLine {
            movie: movie(),
            quantity: 1,
            unit_price: dec!(15),
            line_total: dec!(15),
        }]))
        .unwrap();

        let line = &value[0];
        assert!(line.get("movieSnapshot").is_some());
        assert!(line.get("purchasePrice").is_some());
        assert!(line["movieSnapshot"].get("coverImage").is_some());
    }

    #[test]
    fn coupon_snapshot_keeps_thresholds_and_original_value() {
        let now = Utc::now();
        let coupon = CouponModel {
            id: Uuid::new_v4(),
            code: "WELCOME15".into(),
            description: "First order".into(),
            discount_value: dec!(15),
            is_percentage: true,
            min_quantity: 1,
            min_subtotal: Decimal::ZERO,
            min_order_count: 0,
            max_order_count: None,
            specific_order_count: Some(0),
            expires_at: None,
            active: true,
            created_at: now,
            updated_at: now,
        };

        let snapshot = snapshot_coupon(&coupon, dec!(15));
        assert_eq!(snapshot.code, "WELCOME15");
        assert_eq!(snapshot.discount_amount, dec!(15));
        assert_eq!(snapshot.original_discount_value, dec!(15));
        assert!(snapshot.is_percentage);
        assert_eq!(snapshot.specific_order_count, Some(0));
    }

    mod store {
        use super::*;
        use crate::{
            db::{establish_connection_with_config, run_migrations, DbConfig},
            entities::{movie, user, Order, UserRole},
            services::cart::{AddCartItemInput, CartService},
        };
        use sea_orm::{PaginatorTrait, TransactionTrait};
        use tokio::sync::mpsc;

        struct Fixture {
            db: Arc<DatabaseConnection>,
            checkout: CheckoutService,
            cart: CartService,
            user_id: Uuid,
            movie_id: Uuid,
            _events: mpsc::Receiver<Event>,
        }

        async fn fixture() -> Fixture {
            let pool = establish_connection_with_config(&DbConfig::sqlite_memory())
                .await
                .expect("connect");
            run_migrations(&pool).await.expect("migrate");
            let db = Arc::new(pool);
            let (tx, rx) = mpsc::channel(64);
            let events = Arc::new(EventSender::new(tx));
            let pricing = PricingEngine::default();

            let now = Utc::now();
            let buyer = user::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set("Ada".into()),
                email: Set("ada@example.com".into()),
                password_hash: Set(String::new()),
                role: Set(UserRole::User),
                active: Set(true),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&*db)
            .await
            .expect("user");
            let film = movie::ActiveModel {
                id: Set(Uuid::new_v4()),
                title: Set("Heat".into()),
                description: Set(None),
                genre: Set(None),
                cover_image: Set(None),
                price: Set(dec!(20)),
                discount_price: Set(None),
                quantity: Set(5),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&*db)
            .await
            .expect("movie");

            Fixture {
                checkout: CheckoutService::new(db.clone(), events.clone(), pricing),
                cart: CartService::new(db.clone(), events, pricing),
                db,
                user_id: buyer.id,
                movie_id: film.id,
                _events: rx,
            }
        }

        impl Fixture {
            async fn add(&self, quantity: i32) {
                self.cart
                    .add_item(
                        self.user_id,
                        AddCartItemInput {
                            movie_id: self.movie_id,
                            quantity,
                        },
                    )
                    .await
                    .expect("add to cart");
            }
        }

        #[tokio::test]
        async fn stale_cart_version_aborts_checkout_without_an_order() {
            let f = fixture().await;
            f.add(1).await;
            let stale = find_cart(&*f.db, f.user_id)
                .await
                .expect("query")
                .expect("cart");
            // another request changes the cart after checkout read it
            f.add(1).await;

            let txn = f.db.begin().await.expect("begin");
            let err = f
                .checkout
                .order_from_cart(&txn, &stale, None, Utc::now())
                .await
                .expect_err("stale version must not commit");
            txn.rollback().await.expect("rollback");

            assert_matches!(err, ServiceError::ConcurrentModification(id) if id == stale.id);
            assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
            assert_eq!(err.error_code(), Some("concurrent_modification"));

            let orders = Order::find().count(&*f.db).await.expect("count");
            assert_eq!(orders, 0);
            let items = cart_items(&*f.db, stale.id).await.expect("items");
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].quantity, 2);
        }

        #[tokio::test]
        async fn current_cart_version_places_order() {
            let f = fixture().await;
            f.add(2).await;

            let order = f.checkout.place_order(f.user_id, None).await.expect("order");
            assert_eq!(order.subtotal, dec!(40));

            let cart = find_cart(&*f.db, f.user_id)
                .await
                .expect("query")
                .expect("cart");
            assert_eq!(cart.version, 2);
            assert!(cart_items(&*f.db, cart.id).await.expect("items").is_empty());
        }

        #[tokio::test]
        async fn blank_coupon_code_is_rejected_before_storage() {
            let f = fixture().await;
            f.add(1).await;

            for code in ["", "   "] {
                assert_matches!(
                    f.checkout.place_order(f.user_id, Some(code)).await,
                    Err(ServiceError::ValidationError(_))
                );
            }
            assert_eq!(Order::find().count(&*f.db).await.expect("count"), 0);
        }
    }
}

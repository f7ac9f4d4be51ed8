use crate::{
    entities::{cart, cart_item, coupon::normalize_code, Cart, CartItem, CartModel, MovieModel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        catalog::find_movies_by_ids,
        coupons::find_active_coupon,
        orders::count_prior_orders,
        pricing::{CartTotals, CouponRejection, LineInput, PreviewResult, PricingEngine},
    },
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct AddCartItemInput {
    pub movie_id: Uuid,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateCartItemInput {
    pub movie_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// A cart line joined with its live catalog row. `movie` is `None` once the
/// movie has been deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CartLineView {
    pub movie_id: Uuid,
    pub quantity: i32,
    pub movie: Option<MovieModel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    /// Absent for an empty cart
    pub totals: Option<CartTotals>,
    pub version: i32,
}

/// Everything a cart-priced view needs, loaded in one pass.
#[derive(Debug, Clone)]
pub(crate) struct CartPreview {
    pub lines: Vec<CartLineView>,
    pub pricing: Option<PreviewResult>,
    pub version: i32,
}

pub(crate) async fn find_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<Option<CartModel>, ServiceError> {
    Ok(Cart::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(conn)
        .await?)
}

pub(crate) async fn cart_items<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> Result<Vec<cart_item::Model>, ServiceError> {
    Ok(CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .order_by_asc(cart_item::Column::CreatedAt)
        .all(conn)
        .await?)
}

async fn get_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<CartModel, ServiceError> {
    if let Some(existing) = find_cart(conn, user_id).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let created = cart::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        version: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    debug!(cart_id = %created.id, %user_id, "Created cart");
    Ok(created)
}

async fn bump_version<C: ConnectionTrait>(conn: &C, cart: CartModel) -> Result<(), ServiceError> {
    let next = cart.version + 1;
    let mut active: cart::ActiveModel = cart.into();
    active.version = Set(next);
    active.updated_at = Set(Utc::now());
    active.update(conn).await?;
    Ok(())
}

/// Loads the caller's cart, enriches each line with its movie and prices the
/// result leniently. A coupon code that resolves to nothing usable is passed
/// to the engine as a rejected coupon so the reason is available.
pub(crate) async fn preview_cart<C: ConnectionTrait>(
    conn: &C,
    engine: &PricingEngine,
    user_id: Uuid,
    coupon_code: Option<&str>,
    now: DateTime<Utc>,
) -> Result<CartPreview, ServiceError> {
    let Some(cart) = find_cart(conn, user_id).await? else {
        return Ok(CartPreview {
            lines: Vec::new(),
            pricing: None,
            version: 0,
        });
    };

    let items = cart_items(conn, cart.id).await?;
    if items.is_empty() {
        return Ok(CartPreview {
            lines: Vec::new(),
            pricing: None,
            version: cart.version,
        });
    }

    let ids: Vec<Uuid> = items.iter().map(|i| i.movie_id).collect();
    let movies = find_movies_by_ids(conn, &ids).await?;

    let lines: Vec<CartLineView> = items
        .iter()
        .map(|item| CartLineView {
            movie_id: item.movie_id,
            quantity: item.quantity,
            movie: movies.get(&item.movie_id).cloned(),
        })
        .collect();

    let inputs: Vec<LineInput<'_>> = lines
        .iter()
        .map(|line| LineInput {
            movie_id: line.movie_id,
            movie: line.movie.as_ref(),
            quantity: line.quantity,
        })
        .collect();

    let code = coupon_code.map(normalize_code).filter(|c| !c.is_empty());
    let pricing = match code {
        None => engine.preview(&inputs, None, 0, now),
        Some(code) => {
            let coupon = find_active_coupon(conn, &code, now).await?;
            let prior = count_prior_orders(conn, user_id).await?;
            let mut result = engine.preview(&inputs, coupon.as_ref(), prior, now);
            if coupon.is_none() {
                result.rejection = Some(CouponRejection::NotFound);
            }
            result
        }
    };

    Ok(CartPreview {
        lines,
        pricing: Some(pricing),
        version: cart.version,
    })
}

/// Per-user cart storage.
///
/// Every mutation bumps the cart's `version`, which order placement uses to
/// detect that the cart changed underneath it.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    pricing: PricingEngine,
}

impl CartService {
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

    /// Returns the caller's cart with live movie data and preview totals.
    /// A coupon that cannot be applied is silently ignored.
    #[instrument(skip(self))]
    pub async fn get_cart(
        &self,
        user_id: Uuid,
        coupon_code: Option<&str>,
    ) -> Result<CartView, ServiceError> {
        let preview = preview_cart(&*self.db, &self.pricing, user_id, coupon_code, Utc::now())
            .await?;

        Ok(CartView {
            items: preview.lines,
            totals: preview.pricing.map(|p| p.totals),
            version: preview.version,
        })
    }

    /// Preview totals for the caller's cart; `None` when the cart is empty.
    #[instrument(skip(self))]
    pub async fn compute_cart_totals(
        &self,
        user_id: Uuid,
        coupon_code: Option<&str>,
    ) -> Result<Option<CartTotals>, ServiceError> {
        Ok(self.get_cart(user_id, coupon_code).await?.totals)
    }

    /// Adds `quantity` units of a movie, merging with an existing line.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddCartItemInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;
        let txn = self.db.begin().await?;

        if find_movies_by_ids(&txn, &[input.movie_id]).await?.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "Movie {} not found",
                input.movie_id
            )));
        }

        let cart = get_or_create_cart(&txn, user_id).await?;
        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::MovieId.eq(input.movie_id))
            .one(&txn)
            .await?;

        let now = Utc::now();
        let quantity = match existing {
            Some(item) => {
                let quantity = item.quantity.saturating_add(input.quantity);
                let mut item: cart_item::ActiveModel = item.into();
                item.quantity = Set(quantity);
                item.updated_at = Set(now);
                item.update(&txn).await?;
                quantity
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    movie_id: Set(input.movie_id),
                    quantity: Set(input.quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
                input.quantity
            }
        };

        bump_version(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                user_id,
                movie_id: input.movie_id,
                quantity,
            })
            .await;

        info!(%user_id, movie_id = %input.movie_id, quantity, "Added to cart");
        self.get_cart(user_id, None).await
    }

    /// Sets the quantity of an existing line.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: Uuid,
        input: UpdateCartItemInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;
        let txn = self.db.begin().await?;

        let cart = find_cart(&txn, user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))?;

        let item = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::MovieId.eq(input.movie_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Movie {} is not in the cart", input.movie_id))
            })?;

        let mut item: cart_item::ActiveModel = item.into();
        item.quantity = Set(input.quantity);
        item.updated_at = Set(Utc::now());
        item.update(&txn).await?;

        bump_version(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                user_id,
                movie_id: input.movie_id,
                quantity: input.quantity,
            })
            .await;

        self.get_cart(user_id, None).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: Uuid, movie_id: Uuid) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = find_cart(&txn, user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))?;

        let result = CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::MovieId.eq(movie_id))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Movie {} is not in the cart",
                movie_id
            )));
        }

        bump_version(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved { user_id, movie_id })
            .await;

        self.get_cart(user_id, None).await
    }

    /// Empties the cart. Clearing a missing or empty cart is a no-op.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let Some(cart) = find_cart(&txn, user_id).await? else {
            return Ok(());
        };

        let result = CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        if result.rows_affected > 0 {
            bump_version(&txn, cart).await?;
        }
        txn.commit().await?;

        if result.rows_affected > 0 {
            self.event_sender.send_or_log(Event::CartCleared(user_id)).await;
        }
        Ok(())
    }
}

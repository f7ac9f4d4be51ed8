use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Moviestore API",
        version = "1.0.0",
        description = r#"
# Moviestore API

Storefront backend for selling movies.

## Features

- **Catalog**: browse and search movies
- **Cart**: per-user cart with live prices and coupon previews
- **Coupons**: quantity, subtotal and order-history conditions
- **Orders**: placed from the cart with immutable price snapshots
- **Back office**: catalog, coupon, order and user management

## Authentication

Customer and admin routes take a JWT from `/api/v1/auth/login`:

```
Authorization: Bearer <your-jwt-token>
```

## Money

Amounts are decimal strings with two places, e.g. `"86.40"`.

## Error Handling

```json
{
  "error": "Bad Request",
  "code": "invalid_coupon",
  "message": "Coupon conditions not met: Requires at least 3 items in cart",
  "timestamp": "2025-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "auth", description = "Registration, login and the current user"),
        (name = "movies", description = "Public catalog"),
        (name = "cart", description = "The caller's cart and preview totals"),
        (name = "coupons", description = "Coupon lookup and eligibility"),
        (name = "orders", description = "Order placement and history"),
        (name = "admin", description = "Back office")
    ),
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::current_user,
        crate::handlers::auth::check_email,

        crate::handlers::movies::list_movies,
        crate::handlers::movies::get_movie,
        crate::handlers::movies::get_movies,

        crate::handlers::cart::get_cart,
        crate::handlers::cart::current_totals,
        crate::handlers::cart::add_item,
        crate::handlers::cart::update_item,
        crate::handlers::cart::remove_item,
        crate::handlers::cart::clear_cart,

        crate::handlers::coupons::apply_coupon,
        crate::handlers::coupons::get_coupon_by_code,

        crate::handlers::orders::place_order,
        crate::handlers::orders::my_orders,
        crate::handlers::orders::get_order,

        crate::handlers::admin::list_movies,
        crate::handlers::admin::get_movie,
        crate::handlers::admin::create_movie,
        crate::handlers::admin::update_movie,
        crate::handlers::admin::delete_movie,
        crate::handlers::admin::delete_movies,
        crate::handlers::admin::movie_statistics,
        crate::handlers::admin::list_coupons,
        crate::handlers::admin::get_coupon,
        crate::handlers::admin::create_coupon,
        crate::handlers::admin::update_coupon,
        crate::handlers::admin::delete_coupon,
        crate::handlers::admin::list_orders,
        crate::handlers::admin::get_order,
        crate::handlers::admin::order_stats,
        crate::handlers::admin::list_users,
        crate::handlers::admin::create_user,
        crate::handlers::admin::user_statistics,
        crate::handlers::admin::get_user,
        crate::handlers::admin::update_user,
        crate::handlers::admin::toggle_active,
        crate::handlers::admin::delete_user,
        crate::handlers::admin::bulk_action,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::services::pricing::CouponRejection,
            crate::services::pricing::CartTotals,
            crate::services::pricing::AppliedCoupon,
            crate::entities::LineSnapshot,
            crate::entities::MovieSnapshot,
            crate::entities::CouponSnapshot,
            crate::entities::OrderStatus,
            crate::entities::UserRole,
            crate::services::users::BulkAction,
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

//! Seed data script - populates the database with demo catalog, coupons and an admin
//!
//! Run with: cargo run --bin seed-data -- --admin-password <password>
//!
//! This creates:
//! - 8 movies, some discounted and one out of stock
//! - the demo coupon set (first-order, threshold, loyalty and an expired one)
//! - one admin account
//!
//! Rows that already exist (same coupon code or email) are left alone.

use chrono::{Duration, Utc};
use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tracing::info;
use uuid::Uuid;

use moviestore_api::{
    auth::hash_password,
    db::{establish_connection_with_config, run_migrations, DbConfig},
    entities::{coupon, movie, user, Coupon, Movie, User, UserRole},
};

#[derive(Debug, Parser)]
#[command(name = "seed-data", about = "Populate the moviestore database with demo data")]
struct Args {
    /// Database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://moviestore.db?mode=rwc")]
    database_url: String,

    /// Email of the admin account to create
    #[arg(long, default_value = "admin@moviestore.local")]
    admin_email: String,

    /// Password of the admin account
    #[arg(long, env = "SEED_ADMIN_PASSWORD")]
    admin_password: String,

    /// Only seed coupons and the admin account
    #[arg(long)]
    skip_movies: bool,
}

struct CouponSeed {
    code: &'static str,
    description: &'static str,
    discount_value: Decimal,
    is_percentage: bool,
    min_quantity: i32,
    min_subtotal: Decimal,
    min_order_count: i32,
    max_order_count: Option<i32>,
    specific_order_count: Option<i32>,
    expires_in_days: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    info!("=== Moviestore Seed Data ===");
    let db = establish_connection_with_config(&DbConfig {
        url: args.database_url.clone(),
        ..DbConfig::default()
    })
    .await?;
    run_migrations(&db).await?;

    if !args.skip_movies {
        let created = create_movies(&db).await?;
        info!("  Created {} movies", created);
    }

    let created = create_coupons(&db).await?;
    info!("  Created {} coupons", created);

    create_admin(&db, &args.admin_email, &args.admin_password).await?;

    info!("=== Seed Data Complete ===");
    info!("Try these API calls:");
    info!("  curl http://localhost:8080/api/v1/movies");
    info!("  curl -X POST http://localhost:8080/api/v1/auth/login -d '{{\"email\":...}}'");
    info!("Or explore interactively at: http://localhost:8080/swagger-ui");

    Ok(())
}

async fn create_movies(db: &DatabaseConnection) -> anyhow::Result<usize> {
    if Movie::find().one(db).await?.is_some() {
        info!("Catalog already populated; skipping movies");
        return Ok(0);
    }

    let movies = [
        ("Heat", "Crime", dec!(14.99), None, 12, "A career thief and a driven detective circle each other across Los Angeles."),
        ("Spirited Away", "Animation", dec!(19.99), Some(dec!(15.99)), 20, "A girl wanders into a world of spirits and must free her parents."),
        ("Alien", "Science Fiction", dec!(12.99), None, 8, "The crew of a commercial towing ship answers a distress call."),
        ("The Godfather", "Crime", dec!(24.99), Some(dec!(19.99)), 15, "The aging patriarch of a crime dynasty hands control to his reluctant son."),
        ("Amélie", "Comedy", dec!(11.99), None, 6, "A shy waitress decides to change the lives of those around her."),
        ("Mad Max: Fury Road", "Action", dec!(17.99), Some(dec!(13.49)), 25, "A drifter and a rebel flee across the desert in a war rig."),
        ("Paris, Texas", "Drama", dec!(9.99), None, 0, "A man wanders out of the desert after four years and tries to reunite his family."),
        ("Arrival", "Science Fiction", dec!(16.99), None, 10, "A linguist is recruited to communicate with visitors from space."),
    ];

    let now = Utc::now();
    for (title, genre, price, discount_price, quantity, description) in movies {
        movie::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            description: Set(Some(description.to_string())),
            genre: Set(Some(genre.to_string())),
            cover_image: Set(None),
            price: Set(price),
            discount_price: Set(discount_price),
            quantity: Set(quantity),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;
    }

    Ok(movies.len())
}

async fn create_coupons(db: &DatabaseConnection) -> anyhow::Result<usize> {
    let seeds = [
        CouponSeed {
            code: "WELCOME15",
            description: "15% off your first order",
            discount_value: dec!(15),
            is_percentage: true,
            min_quantity: 1,
            min_subtotal: Decimal::ZERO,
            min_order_count: 0,
            max_order_count: None,
            specific_order_count: Some(0),
            expires_in_days: None,
        },
        CouponSeed {
            code: "MOVIE10",
            description: "$10 off orders of $50 or more",
            discount_value: dec!(10),
            is_percentage: false,
            min_quantity: 1,
            min_subtotal: dec!(50),
            min_order_count: 0,
            max_order_count: None,
            specific_order_count: None,
            expires_in_days: None,
        },
        CouponSeed {
            code: "HALFOFF",
            description: "50% off when buying 3 or more movies",
            discount_value: dec!(50),
            is_percentage: true,
            min_quantity: 3,
            min_subtotal: Decimal::ZERO,
            min_order_count: 0,
            max_order_count: None,
            specific_order_count: None,
            expires_in_days: Some(30),
        },
        CouponSeed {
            code: "LOYAL20",
            description: "20% off for customers with 5 or more orders",
            discount_value: dec!(20),
            is_percentage: true,
            min_quantity: 1,
            min_subtotal: Decimal::ZERO,
            min_order_count: 5,
            max_order_count: None,
            specific_order_count: None,
            expires_in_days: None,
        },
        CouponSeed {
            code: "SPRING25",
            description: "25% off for early customers",
            discount_value: dec!(25),
            is_percentage: true,
            min_quantity: 1,
            min_subtotal: dec!(20),
            min_order_count: 0,
            max_order_count: Some(2),
            specific_order_count: None,
            expires_in_days: Some(90),
        },
        CouponSeed {
            code: "EXPIRED20",
            description: "Expired promotion",
            discount_value: dec!(20),
            is_percentage: true,
            min_quantity: 1,
            min_subtotal: Decimal::ZERO,
            min_order_count: 0,
            max_order_count: None,
            specific_order_count: None,
            expires_in_days: Some(-1),
        },
    ];

    let now = Utc::now();
    let mut created = 0;
    for seed in seeds {
        let exists = Coupon::find()
            .filter(coupon::Column::Code.eq(seed.code))
            .one(db)
            .await?
            .is_some();
        if exists {
            info!(code = seed.code, "Coupon exists; skipping");
            continue;
        }

        coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(seed.code.to_string()),
            description: Set(seed.description.to_string()),
            discount_value: Set(seed.discount_value),
            is_percentage: Set(seed.is_percentage),
            min_quantity: Set(seed.min_quantity),
            min_subtotal: Set(seed.min_subtotal),
            min_order_count: Set(seed.min_order_count),
            max_order_count: Set(seed.max_order_count),
            specific_order_count: Set(seed.specific_order_count),
            expires_at: Set(seed.expires_in_days.map(|days| now + Duration::days(days))),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;
        created += 1;
    }

    Ok(created)
}

async fn create_admin(db: &DatabaseConnection, email: &str, password: &str) -> anyhow::Result<()> {
    let email = email.trim().to_lowercase();
    if User::find()
        .filter(user::Column::Email.eq(email.clone()))
        .one(db)
        .await?
        .is_some()
    {
        info!(%email, "Admin account exists; skipping");
        return Ok(());
    }

    let now = Utc::now();
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Store Admin".to_string()),
        email: Set(email.clone()),
        password_hash: Set(hash_password(password)?),
        role: Set(UserRole::Admin),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!(%email, "Created admin account");
    Ok(())
}

use crate::{
    entities::{movie, Movie, MovieModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateMovieInput {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub genre: Option<String>,
    #[validate(length(max = 1024))]
    pub cover_image: Option<String>,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub quantity: i32,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateMovieInput {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub genre: Option<String>,
    #[validate(length(max = 1024))]
    pub cover_image: Option<String>,
    pub price: Option<Decimal>,
    pub discount_price: Option<Decimal>,
    /// Removes the discount price
    #[serde(default)]
    pub clear_discount_price: bool,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MovieStatistics {
    pub total_movies: u64,
    pub total_stock: i64,
    pub out_of_stock: u64,
    pub discounted: u64,
    pub average_price: Decimal,
}

/// Rejects non-positive prices and discount prices that do not undercut the price.
pub fn check_prices(price: Decimal, discount_price: Option<Decimal>) -> Result<(), ServiceError> {
    if price <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "price must be greater than 0".to_string(),
        ));
    }
    if let Some(discount) = discount_price {
        if discount < Decimal::ZERO || discount >= price {
            return Err(ServiceError::ValidationError(
                "discount_price must be non-negative and lower than price".to_string(),
            ));
        }
    }
    Ok(())
}

/// Loads the movies with the given ids. Ids with no row are simply absent
/// from the map.
pub async fn find_movies_by_ids<C: ConnectionTrait>(
    conn: &C,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, MovieModel>, ServiceError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let movies = Movie::find()
        .filter(movie::Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await?;

    Ok(movies.into_iter().map(|m| (m.id, m)).collect())
}

/// Catalog reads for shoppers and catalog management for admins.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Lists movies ordered by title, optionally filtered by a title or genre
    /// substring. Returns the page and the total number of matches.
    #[instrument(skip(self))]
    pub async fn list_movies(
        &self,
        page: u64,
        per_page: u64,
        search: Option<&str>,
    ) -> Result<(Vec<MovieModel>, u64), ServiceError> {
        let mut query = Movie::find().order_by_asc(movie::Column::Title);

        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(movie::Column::Title.contains(term))
                    .add(movie::Column::Genre.contains(term)),
            );
        }

        let paginator = query.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let movies = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((movies, total))
    }

    #[instrument(skip(self))]
    pub async fn get_movie(&self, id: Uuid) -> Result<MovieModel, ServiceError> {
        Movie::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Movie {} not found", id)))
    }

    /// Batch lookup in request order; unknown ids are skipped.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn get_movies(&self, ids: &[Uuid]) -> Result<Vec<MovieModel>, ServiceError> {
        let mut found = find_movies_by_ids(&*self.db, ids).await?;
        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    #[instrument(skip(self))]
    pub async fn create_movie(&self, input: CreateMovieInput) -> Result<MovieModel, ServiceError> {
        input.validate()?;
        check_prices(input.price, input.discount_price)?;

        let now = Utc::now();
        let movie = movie::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(input.title.trim().to_string()),
            description: Set(input.description),
            genre: Set(input.genre),
            cover_image: Set(input.cover_image),
            price: Set(input.price),
            discount_price: Set(input.discount_price),
            quantity: Set(input.quantity),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::MovieCreated(movie.id))
            .await;

        info!(movie_id = %movie.id, title = %movie.title, "Created movie");
        Ok(movie)
    }

    #[instrument(skip(self))]
    pub async fn update_movie(
        &self,
        id: Uuid,
        input: UpdateMovieInput,
    ) -> Result<MovieModel, ServiceError> {
        input.validate()?;
        let txn = self.db.begin().await?;

        let existing = Movie::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Movie {} not found", id)))?;

        let price = input.price.unwrap_or(existing.price);
        let discount_price = if input.clear_discount_price {
            None
        } else {
            input.discount_price.or(existing.discount_price)
        };
        check_prices(price, discount_price)?;

        let mut movie: movie::ActiveModel = existing.into();
        if let Some(title) = input.title {
            movie.title = Set(title.trim().to_string());
        }
        if let Some(description) = input.description {
            movie.description = Set(Some(description));
        }
        if let Some(genre) = input.genre {
            movie.genre = Set(Some(genre));
        }
        if let Some(cover_image) = input.cover_image {
            movie.cover_image = Set(Some(cover_image));
        }
        if let Some(quantity) = input.quantity {
            movie.quantity = Set(quantity);
        }
        movie.price = Set(price);
        movie.discount_price = Set(discount_price);
        movie.updated_at = Set(Utc::now());

        let movie = movie.update(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::MovieUpdated(movie.id))
            .await;

        info!(movie_id = %movie.id, "Updated movie");
        Ok(movie)
    }

    /// Deletes a movie. Cart lines that reference it are left in place and
    /// drop out of cart pricing.
    #[instrument(skip(self))]
    pub async fn delete_movie(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = Movie::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Movie {} not found", id)));
        }

        self.event_sender.send_or_log(Event::MovieDeleted(id)).await;
        info!(movie_id = %id, "Deleted movie");
        Ok(())
    }

    /// Deletes every listed movie that exists and returns how many were removed.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn delete_movies(&self, ids: &[Uuid]) -> Result<u64, ServiceError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let txn = self.db.begin().await?;
        let existing = find_movies_by_ids(&txn, ids).await?;
        let result = Movie::delete_many()
            .filter(movie::Column::Id.is_in(existing.keys().copied()))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        for id in existing.keys() {
            self.event_sender.send_or_log(Event::MovieDeleted(*id)).await;
        }

        info!(deleted = result.rows_affected, "Deleted movies");
        Ok(result.rows_affected)
    }

    #[instrument(skip(self))]
    pub async fn movie_statistics(&self) -> Result<MovieStatistics, ServiceError> {
        let movies = Movie::find().all(&*self.db).await?;
        Ok(summarize(&movies))
    }
}

fn summarize(movies: &[MovieModel]) -> MovieStatistics {
    let total_movies = movies.len() as u64;
    let total_stock = movies.iter().map(|m| i64::from(m.quantity)).sum();
    let out_of_stock = movies.iter().filter(|m| !m.in_stock()).count() as u64;
    let discounted = movies
        .iter()
        .filter(|m| m.discount_price.is_some())
        .count() as u64;
    let price_sum: Decimal = movies.iter().map(|m| m.price).sum();
    let average_price = if movies.is_empty() {
        Decimal::ZERO
    } else {
        crate::services::pricing::round_money(price_sum / Decimal::from(total_movies))
    };

    MovieStatistics {
        total_movies,
        total_stock,
        out_of_stock,
        discounted,
        average_price,
    }
}

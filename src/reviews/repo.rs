use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::repo::Entity;

/// Average shown for a tour nobody has reviewed yet.
pub const DEFAULT_RATING: f64 = 4.5;

const REVIEW_COLUMNS: &str = "id, tour_id, user_id, rating, review, created_at";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub review: String,
    pub created_at: OffsetDateTime,
}

impl Entity for Review {
    const TABLE: &'static str = "reviews";
    const COLUMNS: &'static str = REVIEW_COLUMNS;
}

/// Review row joined with its author's name for tour listings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewWithAuthor {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub review: String,
    pub created_at: OffsetDateTime,
    pub author_name: String,
}

/// The derived summary stored on a tour row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub quantity: i64,
    pub average: f64,
}

impl RatingSummary {
    /// Folds a COUNT/AVG aggregate into the stored summary. An empty review
    /// set gets the explicit default average, never NULL.
    pub fn from_aggregate(count: i64, average: Option<f64>) -> Self {
        match average {
            Some(average) => Self {
                quantity: count,
                average,
            },
            None => Self {
                quantity: 0,
                average: DEFAULT_RATING,
            },
        }
    }
}

/// Recomputes a tour's rating summary from its current review set and writes
/// it back. Callers must invoke this after every review create, update and
/// delete, before the request completes, so a read immediately after a write
/// never sees a stale summary.
pub async fn recalculate_ratings(db: &PgPool, tour_id: Uuid) -> anyhow::Result<()> {
    let (count, average): (i64, Option<f64>) =
        sqlx::query_as("SELECT COUNT(*), AVG(rating)::float8 FROM reviews WHERE tour_id = $1")
            .bind(tour_id)
            .fetch_one(db)
            .await?;

    let summary = RatingSummary::from_aggregate(count, average);
    sqlx::query("UPDATE tours SET ratings_quantity = $2, ratings_average = $3 WHERE id = $1")
        .bind(tour_id)
        .bind(summary.quantity as i32)
        .bind(summary.average)
        .execute(db)
        .await?;

    debug!(%tour_id, quantity = summary.quantity, average = summary.average, "tour ratings recalculated");
    Ok(())
}

impl Review {
    /// Returns the database error as-is so the unique (tour, user) violation
    /// can be mapped to a duplicate response.
    pub async fn create(
        db: &PgPool,
        tour_id: Uuid,
        user_id: Uuid,
        rating: i16,
        review: &str,
    ) -> Result<Review, sqlx::Error> {
        let sql = format!(
            "INSERT INTO reviews (tour_id, user_id, rating, review) \
             VALUES ($1, $2, $3, $4) RETURNING {REVIEW_COLUMNS}"
        );
        sqlx::query_as::<_, Review>(&sql)
            .bind(tour_id)
            .bind(user_id)
            .bind(rating)
            .bind(review)
            .fetch_one(db)
            .await
    }

    pub async fn update(
        db: &PgPool,
        id: Uuid,
        rating: Option<i16>,
        review: Option<&str>,
    ) -> Result<Option<Review>, sqlx::Error> {
        let sql = format!(
            "UPDATE reviews SET rating = COALESCE($2, rating), review = COALESCE($3, review) \
             WHERE id = $1 RETURNING {REVIEW_COLUMNS}"
        );
        sqlx::query_as::<_, Review>(&sql)
            .bind(id)
            .bind(rating)
            .bind(review)
            .fetch_optional(db)
            .await
    }

    pub async fn list_for_tour(
        db: &PgPool,
        tour_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<ReviewWithAuthor>> {
        let rows = sqlx::query_as::<_, ReviewWithAuthor>(
            "SELECT r.id, r.tour_id, r.user_id, r.rating, r.review, r.created_at, \
             u.name AS author_name \
             FROM reviews r JOIN users u ON u.id = r.user_id \
             WHERE r.tour_id = $1 \
             ORDER BY r.created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(tour_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_of_three_reviews() {
        // ratings [5, 4, 3]
        let summary = RatingSummary::from_aggregate(3, Some(4.0));
        assert_eq!(summary.quantity, 3);
        assert!((summary.average - 4.0).abs() < 1e-9);
    }

    #[test]
    fn empty_review_set_falls_back_to_default() {
        let summary = RatingSummary::from_aggregate(0, None);
        assert_eq!(summary.quantity, 0);
        assert!((summary.average - DEFAULT_RATING).abs() < 1e-9);
    }

    #[test]
    fn single_review_is_its_own_average() {
        let summary = RatingSummary::from_aggregate(1, Some(2.0));
        assert_eq!(summary.quantity, 1);
        assert!((summary.average - 2.0).abs() < 1e-9);
    }
}

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::repo::Entity;
use crate::tours::dto::{CreateTourRequest, UpdateTourRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "tour_difficulty", rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

const TOUR_COLUMNS: &str = "id, name, duration_days, max_group_size, difficulty, price, summary, \
     description, start_latitude, start_longitude, start_dates, ratings_quantity, \
     ratings_average, created_at";

/// Tour record. The two ratings fields are derived from the review set and
/// only ever written by the rating recalculation, never by tour updates.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub duration_days: i32,
    pub max_group_size: i32,
    pub difficulty: Difficulty,
    pub price: f64,
    pub summary: String,
    pub description: Option<String>,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub start_dates: Vec<OffsetDateTime>,
    pub ratings_quantity: i32,
    pub ratings_average: f64,
    pub created_at: OffsetDateTime,
}

impl Entity for Tour {
    const TABLE: &'static str = "tours";
    const COLUMNS: &'static str = TOUR_COLUMNS;
}

/// Great-circle distance in km from the bound point ($1 lat, $2 lng) to a
/// tour's start point.
const HAVERSINE_KM: &str = "6371.0 * 2 * asin(sqrt(pow(sin(radians(start_latitude - $1) / 2), 2) \
     + cos(radians($1)) * cos(radians(start_latitude)) \
     * pow(sin(radians(start_longitude - $2) / 2), 2)))";

#[derive(Debug, Serialize, FromRow)]
pub struct TourDistance {
    pub id: Uuid,
    pub name: String,
    pub distance: f64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct DifficultyStats {
    pub difficulty: Difficulty,
    pub num_tours: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct MonthlyPlanRow {
    pub month: i32,
    pub num_tour_starts: i64,
    pub tours: Vec<String>,
}

impl Tour {
    pub async fn create(db: &PgPool, new: &CreateTourRequest) -> Result<Tour, sqlx::Error> {
        let sql = format!(
            "INSERT INTO tours (name, duration_days, max_group_size, difficulty, price, summary, \
             description, start_latitude, start_longitude, start_dates) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {TOUR_COLUMNS}"
        );
        sqlx::query_as::<_, Tour>(&sql)
            .bind(&new.name)
            .bind(new.duration_days)
            .bind(new.max_group_size)
            .bind(new.difficulty)
            .bind(new.price)
            .bind(&new.summary)
            .bind(&new.description)
            .bind(new.start_latitude)
            .bind(new.start_longitude)
            .bind(&new.start_dates)
            .fetch_one(db)
            .await
    }

    /// Patch; absent fields keep their current value.
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        patch: &UpdateTourRequest,
    ) -> Result<Option<Tour>, sqlx::Error> {
        let sql = format!(
            "UPDATE tours SET name = COALESCE($2, name), \
             duration_days = COALESCE($3, duration_days), \
             max_group_size = COALESCE($4, max_group_size), \
             difficulty = COALESCE($5, difficulty), \
             price = COALESCE($6, price), \
             summary = COALESCE($7, summary), \
             description = COALESCE($8, description), \
             start_latitude = COALESCE($9, start_latitude), \
             start_longitude = COALESCE($10, start_longitude), \
             start_dates = COALESCE($11, start_dates) \
             WHERE id = $1 RETURNING {TOUR_COLUMNS}"
        );
        sqlx::query_as::<_, Tour>(&sql)
            .bind(id)
            .bind(&patch.name)
            .bind(patch.duration_days)
            .bind(patch.max_group_size)
            .bind(patch.difficulty)
            .bind(patch.price)
            .bind(&patch.summary)
            .bind(&patch.description)
            .bind(patch.start_latitude)
            .bind(patch.start_longitude)
            .bind(patch.start_dates.as_deref())
            .fetch_optional(db)
            .await
    }

    pub async fn within_radius(
        db: &PgPool,
        lat: f64,
        lng: f64,
        radius_km: f64,
    ) -> anyhow::Result<Vec<Tour>> {
        let sql =
            format!("SELECT {TOUR_COLUMNS} FROM tours WHERE {HAVERSINE_KM} <= $3 ORDER BY name");
        let tours = sqlx::query_as::<_, Tour>(&sql)
            .bind(lat)
            .bind(lng)
            .bind(radius_km)
            .fetch_all(db)
            .await?;
        Ok(tours)
    }

    pub async fn distances_from(db: &PgPool, lat: f64, lng: f64) -> anyhow::Result<Vec<TourDistance>> {
        let sql = format!("SELECT id, name, {HAVERSINE_KM} AS distance FROM tours ORDER BY distance");
        let rows = sqlx::query_as::<_, TourDistance>(&sql)
            .bind(lat)
            .bind(lng)
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn stats(db: &PgPool) -> anyhow::Result<Vec<DifficultyStats>> {
        let rows = sqlx::query_as::<_, DifficultyStats>(
            "SELECT difficulty, COUNT(*) AS num_tours, AVG(ratings_average) AS avg_rating, \
             AVG(price) AS avg_price, MIN(price) AS min_price, MAX(price) AS max_price \
             FROM tours GROUP BY difficulty ORDER BY avg_price",
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Per-month start counts for one calendar year, busiest month first.
    pub async fn monthly_plan(db: &PgPool, year: i32) -> anyhow::Result<Vec<MonthlyPlanRow>> {
        let rows = sqlx::query_as::<_, MonthlyPlanRow>(
            "SELECT EXTRACT(MONTH FROM d)::int4 AS month, COUNT(*) AS num_tour_starts, \
             array_agg(name ORDER BY name) AS tours \
             FROM tours, unnest(start_dates) AS d \
             WHERE EXTRACT(YEAR FROM d)::int4 = $1 \
             GROUP BY month ORDER BY num_tour_starts DESC, month",
        )
        .bind(year)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::guard::{restrict_to, CurrentUser},
    error::AppError,
    repo::{self, Pagination},
    state::AppState,
    tours::{
        dto::{parse_latlng, CreateTourRequest, Unit, UpdateTourRequest},
        repo::{DifficultyStats, MonthlyPlanRow, Tour, TourDistance},
    },
    users::repo::Role,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tours", get(list_tours).post(create_tour))
        .route("/tours/stats", get(tour_stats))
        .route("/tours/monthly-plan/:year", get(monthly_plan))
        .route(
            "/tours/within/:distance/center/:latlng/unit/:unit",
            get(tours_within),
        )
        .route("/tours/distances/:latlng/unit/:unit", get(tour_distances))
        .route(
            "/tours/:id",
            get(get_tour).patch(update_tour).delete(delete_tour),
        )
}

fn validate_tour_fields(
    name: Option<&str>,
    duration_days: Option<i32>,
    max_group_size: Option<i32>,
    price: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<(), AppError> {
    if let Some(name) = name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("a tour must have a name".into()));
        }
    }
    if matches!(duration_days, Some(d) if d <= 0) {
        return Err(AppError::Validation("duration must be positive".into()));
    }
    if matches!(max_group_size, Some(g) if g <= 0) {
        return Err(AppError::Validation("group size must be positive".into()));
    }
    if matches!(price, Some(p) if p < 0.0) {
        return Err(AppError::Validation("price must not be negative".into()));
    }
    if matches!(latitude, Some(lat) if !(-90.0..=90.0).contains(&lat)) {
        return Err(AppError::Validation("latitude is out of range".into()));
    }
    if matches!(longitude, Some(lng) if !(-180.0..=180.0).contains(&lng)) {
        return Err(AppError::Validation("longitude is out of range".into()));
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn list_tours(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Tour>>, AppError> {
    let tours = repo::list::<Tour>(&state.db, p.limit, p.offset)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(tours))
}

#[instrument(skip(state))]
pub async fn get_tour(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Tour>, AppError> {
    let tour = repo::find_by_id::<Tour>(&state.db, id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("no tour found with that ID".into()))?;
    Ok(Json(tour))
}

#[instrument(skip(state, user, payload))]
pub async fn create_tour(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateTourRequest>,
) -> Result<(StatusCode, Json<Tour>), AppError> {
    restrict_to(&user, &[Role::Admin, Role::LeadGuide])?;
    validate_tour_fields(
        Some(payload.name.as_str()),
        Some(payload.duration_days),
        Some(payload.max_group_size),
        Some(payload.price),
        Some(payload.start_latitude),
        Some(payload.start_longitude),
    )?;

    let tour = Tour::create(&state.db, &payload).await?;
    info!(tour_id = %tour.id, name = %tour.name, "tour created");
    Ok((StatusCode::CREATED, Json(tour)))
}

#[instrument(skip(state, user, payload))]
pub async fn update_tour(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTourRequest>,
) -> Result<Json<Tour>, AppError> {
    restrict_to(&user, &[Role::Admin, Role::LeadGuide])?;
    validate_tour_fields(
        payload.name.as_deref(),
        payload.duration_days,
        payload.max_group_size,
        payload.price,
        payload.start_latitude,
        payload.start_longitude,
    )?;

    let tour = Tour::update(&state.db, id, &payload)
        .await?
        .ok_or_else(|| AppError::NotFound("no tour found with that ID".into()))?;
    info!(tour_id = %tour.id, "tour updated");
    Ok(Json(tour))
}

#[instrument(skip(state, user))]
pub async fn delete_tour(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    restrict_to(&user, &[Role::Admin, Role::LeadGuide])?;
    let deleted = repo::delete_by_id::<Tour>(&state.db, id)
        .await
        .map_err(AppError::Internal)?;
    if !deleted {
        return Err(AppError::NotFound("no tour found with that ID".into()));
    }
    info!(tour_id = %id, "tour deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn tour_stats(
    State(state): State<AppState>,
) -> Result<Json<Vec<DifficultyStats>>, AppError> {
    let stats = Tour::stats(&state.db).await.map_err(AppError::Internal)?;
    Ok(Json(stats))
}

#[instrument(skip(state, user))]
pub async fn monthly_plan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(year): Path<i32>,
) -> Result<Json<Vec<MonthlyPlanRow>>, AppError> {
    restrict_to(&user, &[Role::Admin, Role::LeadGuide, Role::Guide])?;
    let plan = Tour::monthly_plan(&state.db, year)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(plan))
}

#[instrument(skip(state))]
pub async fn tours_within(
    State(state): State<AppState>,
    Path((distance, latlng, unit)): Path<(f64, String, String)>,
) -> Result<Json<Vec<Tour>>, AppError> {
    let unit: Unit = unit.parse()?;
    let (lat, lng) = parse_latlng(&latlng)?;
    if distance < 0.0 {
        return Err(AppError::Validation("distance must not be negative".into()));
    }

    let radius_km = distance * unit.km_per_unit();
    let tours = Tour::within_radius(&state.db, lat, lng, radius_km)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(tours))
}

#[instrument(skip(state))]
pub async fn tour_distances(
    State(state): State<AppState>,
    Path((latlng, unit)): Path<(String, String)>,
) -> Result<Json<Vec<TourDistance>>, AppError> {
    let unit: Unit = unit.parse()?;
    let (lat, lng) = parse_latlng(&latlng)?;

    let rows = Tour::distances_from(&state.db, lat, lng)
        .await
        .map_err(AppError::Internal)?;
    let converted = rows
        .into_iter()
        .map(|r| TourDistance {
            id: r.id,
            name: r.name,
            distance: r.distance / unit.km_per_unit(),
        })
        .collect();
    Ok(Json(converted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_validation_catches_bad_values() {
        assert!(validate_tour_fields(Some("  "), None, None, None, None, None).is_err());
        assert!(validate_tour_fields(None, Some(0), None, None, None, None).is_err());
        assert!(validate_tour_fields(None, None, Some(-3), None, None, None).is_err());
        assert!(validate_tour_fields(None, None, None, Some(-1.0), None, None).is_err());
        assert!(validate_tour_fields(None, None, None, None, Some(90.5), None).is_err());
        assert!(validate_tour_fields(None, None, None, None, None, Some(-181.0)).is_err());
    }

    #[test]
    fn field_validation_accepts_partial_patches() {
        assert!(validate_tour_fields(None, None, None, None, None, None).is_ok());
        assert!(
            validate_tour_fields(Some("Forest Hiker"), Some(5), Some(25), Some(397.0), Some(34.1), Some(-118.1))
                .is_ok()
        );
    }
}

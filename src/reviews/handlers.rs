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
    reviews::{
        dto::{CreateReviewRequest, UpdateReviewRequest},
        repo::{recalculate_ratings, Review, ReviewWithAuthor},
    },
    state::AppState,
    tours::repo::Tour,
    users::repo::{Role, User},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/tours/:id/reviews",
            get(list_tour_reviews).post(create_review),
        )
        .route("/reviews", get(list_reviews))
        .route(
            "/reviews/:id",
            get(get_review).patch(update_review).delete(delete_review),
        )
}

fn validate_rating(rating: i16) -> Result<(), AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation("rating must be between 1 and 5".into()));
    }
    Ok(())
}

/// The author or an admin may mutate a review; nobody else.
fn authorize_mutation(user: &User, review: &Review) -> Result<(), AppError> {
    if review.user_id == user.id {
        return Ok(());
    }
    restrict_to(user, &[Role::Admin])
}

#[instrument(skip(state))]
pub async fn list_tour_reviews(
    State(state): State<AppState>,
    Path(tour_id): Path<Uuid>,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<ReviewWithAuthor>>, AppError> {
    let reviews = Review::list_for_tour(&state.db, tour_id, p.limit, p.offset)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(reviews))
}

#[instrument(skip(state, user, payload))]
pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(tour_id): Path<Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    restrict_to(&user, &[Role::User])?;
    validate_rating(payload.rating)?;
    if payload.review.trim().is_empty() {
        return Err(AppError::Validation("review can not be empty".into()));
    }

    repo::find_by_id::<Tour>(&state.db, tour_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("no tour found with that ID".into()))?;

    // The author is always the caller, never taken from the body.
    let review = Review::create(&state.db, tour_id, user.id, payload.rating, &payload.review).await?;

    recalculate_ratings(&state.db, tour_id)
        .await
        .map_err(AppError::Internal)?;

    info!(review_id = %review.id, %tour_id, user_id = %user.id, "review created");
    Ok((StatusCode::CREATED, Json(review)))
}

#[instrument(skip(state))]
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Review>>, AppError> {
    let reviews = repo::list::<Review>(&state.db, p.limit, p.offset)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(reviews))
}

#[instrument(skip(state))]
pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Review>, AppError> {
    let review = repo::find_by_id::<Review>(&state.db, id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("no review found with that ID".into()))?;
    Ok(Json(review))
}

#[instrument(skip(state, user, payload))]
pub async fn update_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReviewRequest>,
) -> Result<Json<Review>, AppError> {
    // Snapshot before the mutation: the existing row decides who may touch
    // it and which tour to recompute afterwards.
    let existing = repo::find_by_id::<Review>(&state.db, id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("no review found with that ID".into()))?;
    authorize_mutation(&user, &existing)?;

    if let Some(rating) = payload.rating {
        validate_rating(rating)?;
    }
    if let Some(text) = payload.review.as_deref() {
        if text.trim().is_empty() {
            return Err(AppError::Validation("review can not be empty".into()));
        }
    }

    let updated = Review::update(&state.db, id, payload.rating, payload.review.as_deref())
        .await?
        .ok_or_else(|| AppError::NotFound("no review found with that ID".into()))?;

    recalculate_ratings(&state.db, existing.tour_id)
        .await
        .map_err(AppError::Internal)?;

    info!(review_id = %id, tour_id = %existing.tour_id, "review updated");
    Ok(Json(updated))
}

#[instrument(skip(state, user))]
pub async fn delete_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let existing = repo::find_by_id::<Review>(&state.db, id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("no review found with that ID".into()))?;
    authorize_mutation(&user, &existing)?;

    repo::delete_by_id::<Review>(&state.db, id)
        .await
        .map_err(AppError::Internal)?;

    recalculate_ratings(&state.db, existing.tour_id)
        .await
        .map_err(AppError::Internal)?;

    info!(review_id = %id, tour_id = %existing.tour_id, "review deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_by(user_id: Uuid) -> Review {
        Review {
            id: Uuid::new_v4(),
            tour_id: Uuid::new_v4(),
            user_id,
            rating: 4,
            review: "Lovely trail".into(),
            created_at: time::OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn rating_bounds() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
        for r in 1..=5 {
            assert!(validate_rating(r).is_ok());
        }
    }

    #[test]
    fn author_may_mutate_own_review() {
        let user = User::fake(Role::User);
        let review = review_by(user.id);
        assert!(authorize_mutation(&user, &review).is_ok());
    }

    #[test]
    fn admin_may_mutate_any_review() {
        let admin = User::fake(Role::Admin);
        let review = review_by(Uuid::new_v4());
        assert!(authorize_mutation(&admin, &review).is_ok());
    }

    #[test]
    fn other_users_are_forbidden() {
        let stranger = User::fake(Role::User);
        let review = review_by(Uuid::new_v4());
        let err = authorize_mutation(&stranger, &review).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let guide = User::fake(Role::Guide);
        assert!(authorize_mutation(&guide, &review).is_err());
    }
}

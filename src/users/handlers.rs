use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{
        dto::PublicUser,
        guard::{restrict_to, CurrentUser},
        handlers::is_valid_email,
    },
    error::AppError,
    repo::Pagination,
    state::AppState,
    users::{
        dto::{AdminUpdateUserRequest, UpdateMeRequest},
        repo::{Role, User},
    },
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me).patch(update_me).delete(delete_me))
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

#[instrument(skip(user))]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.into())
}

#[instrument(skip(state, user, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(mut payload): Json<UpdateMeRequest>,
) -> Result<Json<PublicUser>, AppError> {
    if payload.password.is_some() || payload.password_confirm.is_some() {
        return Err(AppError::Validation(
            "this route is not for password updates, please use /users/update-my-password".into(),
        ));
    }

    if let Some(email) = payload.email.as_mut() {
        *email = email.trim().to_lowercase();
        if !is_valid_email(email) {
            return Err(AppError::Validation("please provide a valid email".into()));
        }
    }
    if let Some(name) = payload.name.as_mut() {
        *name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("name can not be empty".into()));
        }
    }

    let updated = User::update(
        &state.db,
        user.id,
        payload.name.as_deref(),
        payload.email.as_deref(),
        None,
    )
    .await?
    .ok_or_else(|| AppError::NotFound("no user found with that ID".into()))?;

    info!(user_id = %updated.id, "profile updated");
    Ok(Json(updated.into()))
}

#[instrument(skip(state, user))]
pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, AppError> {
    User::deactivate(&state.db, user.id)
        .await
        .map_err(AppError::Internal)?;
    info!(user_id = %user.id, "account deactivated");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user))]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    restrict_to(&user, &[Role::Admin])?;
    let users = User::list(&state.db, p.limit, p.offset)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, user))]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, AppError> {
    restrict_to(&user, &[Role::Admin])?;
    let found = User::find_active_by_id(&state.db, id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("no user found with that ID".into()))?;
    Ok(Json(found.into()))
}

#[instrument(skip(state, user, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<AdminUpdateUserRequest>,
) -> Result<Json<PublicUser>, AppError> {
    restrict_to(&user, &[Role::Admin])?;

    if let Some(email) = payload.email.as_mut() {
        *email = email.trim().to_lowercase();
        if !is_valid_email(email) {
            return Err(AppError::Validation("please provide a valid email".into()));
        }
    }

    let updated = User::update(
        &state.db,
        id,
        payload.name.as_deref(),
        payload.email.as_deref(),
        payload.role,
    )
    .await?
    .ok_or_else(|| AppError::NotFound("no user found with that ID".into()))?;

    info!(user_id = %updated.id, admin_id = %user.id, "user updated by admin");
    Ok(Json(updated.into()))
}

#[instrument(skip(state, user))]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    restrict_to(&user, &[Role::Admin])?;
    let deleted = User::deactivate(&state.db, id)
        .await
        .map_err(AppError::Internal)?;
    if !deleted {
        return Err(AppError::NotFound("no user found with that ID".into()));
    }
    info!(user_id = %id, admin_id = %user.id, "user deactivated by admin");
    Ok(StatusCode::NO_CONTENT)
}

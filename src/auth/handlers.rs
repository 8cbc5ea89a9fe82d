use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{patch, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse,
            ResetPasswordRequest, SignupRequest, UpdatePasswordRequest,
        },
        guard::CurrentUser,
        jwt::JwtKeys,
        password::{generate_reset_token, hash_password, hash_reset_token, verify_password},
    },
    error::{AppError, AuthError},
    state::AppState,
    users::repo::User,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/signup", post(signup))
        .route("/users/login", post(login))
        .route("/users/forgot-password", post(forgot_password))
        .route("/users/reset-password/:token", patch(reset_password))
        .route("/users/update-my-password", patch(update_password))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn validate_new_password(password: &str, confirm: &str) -> Result<(), AppError> {
    if password.len() < 8 {
        return Err(AppError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }
    if password != confirm {
        return Err(AppError::Validation("passwords are not the same".into()));
    }
    Ok(())
}

fn issue_token(state: &AppState, user: User) -> Result<AuthResponse, AppError> {
    let keys = JwtKeys::from_ref(state);
    let token = keys.sign(user.id).map_err(AppError::Internal)?;
    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    payload.email = payload.email.trim().to_lowercase();
    let name = payload.name.trim().to_string();

    if name.is_empty() {
        return Err(AppError::Validation("please tell us your name".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::Validation("please provide a valid email".into()));
    }
    validate_new_password(&payload.password, &payload.password_confirm)?;

    if User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(AppError::Internal)?
        .is_some()
    {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::Duplicate("email already in use".into()));
    }

    // The confirmation field stops here; only the hash is persisted.
    let hash = hash_password(&payload.password).map_err(AppError::Internal)?;
    let user = User::create(&state.db, &name, &payload.email, &hash).await?;

    info!(user_id = %user.id, email = %user.email, "user signed up");
    let response = issue_token(&state, user)?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        return Err(AppError::Validation("please provide a valid email".into()));
    }

    // Unknown, deactivated and wrong-password cases are indistinguishable.
    let Some(user) = User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(AppError::Internal)?
    else {
        warn!(email = %payload.email, "login for unknown or inactive email");
        return Err(AuthError::InvalidCredentials.into());
    };

    let ok = verify_password(&payload.password, &user.password_hash).map_err(AppError::Internal)?;
    if !ok {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(AuthError::InvalidCredentials.into());
    }

    info!(user_id = %user.id, "user logged in");
    Ok(Json(issue_token(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound("there is no user with that email address".into()))?;

    let token = generate_reset_token();
    User::set_reset_token(&state.db, user.id, &token.hash, token.expires_at)
        .await
        .map_err(AppError::Internal)?;

    if let Err(e) = state
        .mailer
        .send_password_reset(&user.email, &token.raw)
        .await
    {
        // Do not leave a live token behind if the hand-off failed.
        User::clear_reset_token(&state.db, user.id)
            .await
            .map_err(AppError::Internal)?;
        return Err(AppError::Internal(e));
    }

    info!(user_id = %user.id, "password reset token sent");
    Ok(Json(MessageResponse {
        message: "token sent to email".into(),
    }))
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = User::find_by_reset_token(&state.db, &hash_reset_token(&token))
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::Validation("token is invalid or has expired".into()))?;

    validate_new_password(&payload.password, &payload.password_confirm)?;

    let hash = hash_password(&payload.password).map_err(AppError::Internal)?;
    User::update_password(&state.db, user.id, &hash)
        .await
        .map_err(AppError::Internal)?;

    info!(user_id = %user.id, "password reset");
    Ok(Json(issue_token(&state, user)?))
}

#[instrument(skip(state, user, payload))]
pub async fn update_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let ok = verify_password(&payload.password_current, &user.password_hash)
        .map_err(AppError::Internal)?;
    if !ok {
        warn!(user_id = %user.id, "current password mismatch");
        return Err(AuthError::InvalidCredentials.into());
    }

    validate_new_password(&payload.password, &payload.password_confirm)?;

    let hash = hash_password(&payload.password).map_err(AppError::Internal)?;
    User::update_password(&state.db, user.id, &hash)
        .await
        .map_err(AppError::Internal)?;

    info!(user_id = %user.id, "password updated");
    Ok(Json(issue_token(&state, user)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_normal_addresses() {
        assert!(is_valid_email("hiker@example.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
    }

    #[test]
    fn email_regex_rejects_garbage() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("missing@tld"));
    }

    #[test]
    fn new_passwords_must_be_long_and_confirmed() {
        assert!(validate_new_password("short", "short").is_err());
        assert!(validate_new_password("long-enough", "but-different").is_err());
        assert!(validate_new_password("long-enough", "long-enough").is_ok());
    }
}

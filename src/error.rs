use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Rejections of the bearer-token chain, in the order the guard checks them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("you are not logged in, please log in to get access")]
    MissingToken,
    #[error("invalid or expired token, please log in again")]
    InvalidToken,
    #[error("the user belonging to this token no longer exists")]
    UserNotFound,
    #[error("password was changed after this token was issued, please log in again")]
    PasswordChangedAfterToken,
    #[error("incorrect email or password")]
    InvalidCredentials,
}

/// Every failure a handler can surface. All variants except `Internal` are
/// operational: their message is safe to show to the client.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Duplicate(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("you do not have permission to perform this action")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Duplicate(_) => StatusCode::CONFLICT,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                let message = match db.constraint() {
                    Some("users_email_key") => "email already in use",
                    Some("tours_name_key") => "a tour with that name already exists",
                    Some("reviews_tour_id_user_id_key") => "you have already reviewed this tour",
                    _ => "duplicate field value, please use another value",
                };
                return AppError::Duplicate(message.into());
            }
        }
        AppError::Internal(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            // Programming or unknown error: log it, never leak details.
            if let AppError::Internal(source) = &self {
                error!(error = ?source, "internal error");
            }
            let body = json!({ "status": "error", "message": "something went very wrong" });
            return (status, Json(body)).into_response();
        }
        let body = json!({ "status": "fail", "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operational_errors_map_to_their_status() {
        assert_eq!(
            AppError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Duplicate("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Auth(AuthError::MissingToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Auth(AuthError::PasswordChangedAfterToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::NotFound("missing".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn internal_errors_are_500() {
        let err = AppError::Internal(anyhow::anyhow!("db exploded"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn auth_variants_carry_distinct_messages() {
        let messages = [
            AuthError::MissingToken.to_string(),
            AuthError::InvalidToken.to_string(),
            AuthError::UserNotFound.to_string(),
            AuthError::PasswordChangedAfterToken.to_string(),
            AuthError::InvalidCredentials.to_string(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::{
    auth::jwt::JwtKeys,
    error::{AppError, AuthError},
    state::AppState,
    users::repo::{Role, User},
};

/// The authenticated user attached to a request once the bearer-token chain
/// succeeds: token present, signature and expiry valid, user still active,
/// password unchanged since the token was issued. Any failed step rejects
/// the request before the handler runs.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(AuthError::MissingToken)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            AuthError::InvalidToken
        })?;

        let user = User::find_active_by_id(&state.db, claims.sub)
            .await
            .map_err(AppError::Internal)?
            .ok_or(AuthError::UserNotFound)?;

        if user.changed_password_after(claims.iat) {
            warn!(user_id = %user.id, "token predates password change");
            return Err(AuthError::PasswordChangedAfterToken.into());
        }

        Ok(CurrentUser(user))
    }
}

/// Static allow-list check for role-restricted routes.
pub fn restrict_to(user: &User, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        warn!(user_id = %user.id, role = ?user.role, "role not in allow list");
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_admits_listed_roles() {
        let lead = User::fake(Role::LeadGuide);
        assert!(restrict_to(&lead, &[Role::Admin, Role::LeadGuide]).is_ok());

        let admin = User::fake(Role::Admin);
        assert!(restrict_to(&admin, &[Role::Admin, Role::LeadGuide]).is_ok());
    }

    #[test]
    fn allow_list_rejects_other_roles() {
        let guide = User::fake(Role::Guide);
        let err = restrict_to(&guide, &[Role::Admin, Role::LeadGuide]).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let user = User::fake(Role::User);
        assert!(restrict_to(&user, &[Role::Admin]).is_err());
    }
}

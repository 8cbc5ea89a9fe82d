use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Access level attached to every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "user_role", rename_all = "kebab-case")]
pub enum Role {
    User,
    Admin,
    LeadGuide,
    Guide,
}

const USER_COLUMNS: &str = "id, name, email, role, password_hash, password_changed_at, \
     password_reset_token, password_reset_expires, active, created_at";

/// User record in the database. Credential fields never serialize to clients.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_changed_at: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub active: bool,
    pub created_at: OffsetDateTime,
}

impl User {
    /// Whether the password was changed after a token with this issued-at
    /// timestamp was signed. `None` means the password was never changed.
    pub fn changed_password_after(&self, token_iat: usize) -> bool {
        match self.password_changed_at {
            Some(changed_at) => (token_iat as i64) < changed_at.unix_timestamp(),
            None => false,
        }
    }

    /// Find an active user by (lowercased) email. Deactivated accounts are
    /// invisible to every read in this module.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND active = TRUE");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn find_active_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND active = TRUE");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// Create a user with the default role. Returns the database error as-is
    /// so a unique-violation on email can be mapped to a duplicate response.
    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        let sql = format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .fetch_one(db)
            .await
    }

    pub async fn list(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE active = TRUE \
             ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await?;
        Ok(users)
    }

    /// Patch name/email/role; absent fields keep their current value.
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
        role: Option<Role>,
    ) -> Result<Option<User>, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET name = COALESCE($2, name), email = COALESCE($3, email), \
             role = COALESCE($4, role) WHERE id = $1 AND active = TRUE \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(name)
            .bind(email)
            .bind(role)
            .fetch_optional(db)
            .await
    }

    /// Store a new password hash. The changed-at stamp is set one second in
    /// the past so a token issued in the same second as a slow write still
    /// compares as stale. Any pending reset token is invalidated.
    pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET password_hash = $2, \
             password_changed_at = now() - interval '1 second', \
             password_reset_token = NULL, password_reset_expires = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET password_reset_token = $2, password_reset_expires = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn clear_reset_token(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET password_reset_token = NULL, password_reset_expires = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Look up the owner of an unexpired reset-token digest.
    pub async fn find_by_reset_token(db: &PgPool, token_hash: &str) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE password_reset_token = $1 \
             AND password_reset_expires > now() AND active = TRUE"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(token_hash)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// Soft delete. The row stays for referential integrity; reads skip it.
    pub async fn deactivate(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE users SET active = FALSE WHERE id = $1 AND active = TRUE")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
impl User {
    pub fn fake(role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "Test User".into(),
            email: "test@example.com".into(),
            role,
            password_hash: "$argon2id$fake".into(),
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn role_serializes_kebab_case() {
        assert_eq!(serde_json::to_string(&Role::LeadGuide).unwrap(), r#""lead-guide""#);
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
        let role: Role = serde_json::from_str(r#""lead-guide""#).unwrap();
        assert_eq!(role, Role::LeadGuide);
    }

    #[test]
    fn unchanged_password_never_invalidates_tokens() {
        let user = User::fake(Role::User);
        assert!(!user.changed_password_after(0));
        assert!(!user.changed_password_after(usize::MAX));
    }

    #[test]
    fn token_issued_before_change_is_stale() {
        let mut user = User::fake(Role::User);
        let changed_at = OffsetDateTime::now_utc();
        user.password_changed_at = Some(changed_at);

        let before = (changed_at - Duration::minutes(5)).unix_timestamp() as usize;
        let after = (changed_at + Duration::minutes(5)).unix_timestamp() as usize;
        assert!(user.changed_password_after(before));
        assert!(!user.changed_password_after(after));
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User::fake(Role::Admin);
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"));
        assert!(json.contains("test@example.com"));
    }
}

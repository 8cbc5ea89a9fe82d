use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tracing::error;

/// Reset tokens are redeemable for 10 minutes.
pub const RESET_TOKEN_TTL: Duration = Duration::minutes(10);

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// A freshly generated password-reset token. `raw` goes out to the user,
/// only `hash` is persisted.
#[derive(Debug)]
pub struct ResetToken {
    pub raw: String,
    pub hash: String,
    pub expires_at: OffsetDateTime,
}

pub fn generate_reset_token() -> ResetToken {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);
    ResetToken {
        hash: hash_reset_token(&raw),
        raw,
        expires_at: OffsetDateTime::now_utc() + RESET_TOKEN_TTL,
    }
}

/// SHA-256 hex digest of a raw reset token, as stored and looked up.
pub fn hash_reset_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn hashing_twice_yields_different_strings() {
        let password = "same-input-each-time";
        let first = hash_password(password).expect("hash");
        let second = hash_password(password).expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn reset_token_stores_only_a_digest() {
        let token = generate_reset_token();
        assert_ne!(token.raw, token.hash);
        assert_eq!(hash_reset_token(&token.raw), token.hash);
        // 32 random bytes, hex-encoded.
        assert_eq!(token.raw.len(), 64);
        assert_eq!(token.hash.len(), 64);
    }

    #[test]
    fn reset_tokens_are_unique() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_ne!(a.raw, b.raw);
    }

    #[test]
    fn reset_token_expires_in_ten_minutes() {
        let token = generate_reset_token();
        let remaining = token.expires_at - OffsetDateTime::now_utc();
        assert!(remaining > Duration::minutes(9));
        assert!(remaining <= Duration::minutes(10));
    }
}

use axum::async_trait;
use tracing::info;

/// Delivery seam for password-reset tokens. The raw token leaves the process
/// only through this trait; the database keeps a SHA-256 digest.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, to: &str, raw_token: &str) -> anyhow::Result<()>;
}

/// Logs the hand-off instead of talking to a real transport.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, to: &str, raw_token: &str) -> anyhow::Result<()> {
        info!(%to, token = %raw_token, "password reset token issued");
        Ok(())
    }
}

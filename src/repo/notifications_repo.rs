use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct NotificationsRepo {
    pub pool: PgPool,
}

impl NotificationsRepo {
    pub async fn record(
        &self,
        wallet_id: Uuid,
        channel: &str,
        delivered: bool,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO wallet_notifications (wallet_id, channel, status, error) VALUES ($1, $2, $3, $4)",
        )
        .bind(wallet_id)
        .bind(channel)
        .bind(if delivered { "sent" } else { "failed" })
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

use anyhow::Result;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::gateway::GatewayRecord;

#[derive(Clone)]
pub struct GatewaysRepo {
    pub pool: PgPool,
}

impl GatewaysRepo {
    pub async fn get(&self, gateway_id: Uuid) -> Result<Option<GatewayRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, provider, credentials, is_active, priority, success_rate, health_score,
                   min_amount_minor, max_amount_minor, currencies
            FROM payment_gateways
            WHERE id = $1
            "#,
        )
        .bind(gateway_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| GatewayRecord {
            id: r.get("id"),
            provider: r.get("provider"),
            credentials: r.get("credentials"),
            is_active: r.get("is_active"),
            priority: r.get("priority"),
            success_rate: r.get("success_rate"),
            health_score: r.get("health_score"),
            min_amount_minor: r.get("min_amount_minor"),
            max_amount_minor: r.get("max_amount_minor"),
            currencies: r.get("currencies"),
        }))
    }

    /// EWMA write-back after each transaction outcome; the pipeline is the
    /// only writer of these two columns.
    pub async fn record_outcome(&self, gateway_id: Uuid, success: bool) -> Result<()> {
        let observation = if success { 1.0_f64 } else { 0.0_f64 };
        sqlx::query(
            r#"
            UPDATE payment_gateways
            SET success_rate = success_rate * 0.95 + $2 * 0.05,
                health_score = health_score * 0.9 + $2 * 0.1,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(gateway_id)
        .bind(observation)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

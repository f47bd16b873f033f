use anyhow::Result;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::client::{Client, ClientStatus, RotationMode};

#[derive(Clone)]
pub struct ClientsRepo {
    pub pool: PgPool,
}

impl ClientsRepo {
    pub async fn find_by_key(&self, client_key: &str) -> Result<Option<Client>> {
        let row = sqlx::query(
            r#"
            SELECT id, client_key, client_secret, company_name, fee_bps, rotation_mode,
                   current_rotation_position, total_assigned_gateways, rotation_daily_reset,
                   last_rotation_at, webhook_url, status
            FROM clients
            WHERE client_key = $1
            "#,
        )
        .bind(client_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_client).transpose()
    }

    pub async fn get(&self, client_id: Uuid) -> Result<Option<Client>> {
        let row = sqlx::query(
            r#"
            SELECT id, client_key, client_secret, company_name, fee_bps, rotation_mode,
                   current_rotation_position, total_assigned_gateways, rotation_daily_reset,
                   last_rotation_at, webhook_url, status
            FROM clients
            WHERE id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_client).transpose()
    }

    pub async fn advance_rotation(&self, client_id: Uuid, new_position: i32) -> Result<()> {
        sqlx::query(
            "UPDATE clients SET current_rotation_position = $2, last_rotation_at = now(), updated_at = now() WHERE id = $1",
        )
        .bind(client_id)
        .bind(new_position)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn reset_rotation_position(&self, client_id: Uuid) -> Result<()> {
        self.advance_rotation(client_id, 0).await
    }

    /// Operator control: advance the position N steps modulo the assigned
    /// gateway count without initiating a payment.
    pub async fn manual_advance(&self, client_id: Uuid, steps: i32) -> Result<i32> {
        let row = sqlx::query(
            r#"
            UPDATE clients
            SET current_rotation_position =
                    CASE WHEN total_assigned_gateways > 0
                         THEN ((current_rotation_position + $2 - 1) % total_assigned_gateways) + 1
                         ELSE 0 END,
                last_rotation_at = now(),
                updated_at = now()
            WHERE id = $1
            RETURNING current_rotation_position
            "#,
        )
        .bind(client_id)
        .bind(steps)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("current_rotation_position"))
    }

    /// Midnight rollover for clients that opted into a daily restart of
    /// the rotation cycle.
    pub async fn reset_positions_for_daily_reset(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE clients SET current_rotation_position = 0, updated_at = now() WHERE rotation_daily_reset = true",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_rotation_mode(&self, client_id: Uuid, mode: RotationMode) -> Result<()> {
        sqlx::query("UPDATE clients SET rotation_mode = $2, updated_at = now() WHERE id = $1")
            .bind(client_id)
            .bind(mode.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_daily_reset(&self, client_id: Uuid, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE clients SET rotation_daily_reset = $2, updated_at = now() WHERE id = $1")
            .bind(client_id)
            .bind(enabled)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_client(r: sqlx::postgres::PgRow) -> Result<Client> {
    let mode: String = r.get("rotation_mode");
    let status: String = r.get("status");
    Ok(Client {
        id: r.get("id"),
        client_key: r.get("client_key"),
        client_secret: r.get("client_secret"),
        company_name: r.get("company_name"),
        fee_bps: r.get("fee_bps"),
        rotation_mode: RotationMode::parse(&mode)
            .ok_or_else(|| anyhow::anyhow!("unknown rotation mode {mode}"))?,
        current_rotation_position: r.get("current_rotation_position"),
        total_assigned_gateways: r.get("total_assigned_gateways"),
        rotation_daily_reset: r.get("rotation_daily_reset"),
        last_rotation_at: r.get("last_rotation_at"),
        webhook_url: r.get("webhook_url"),
        status: if status == "suspended" {
            ClientStatus::Suspended
        } else {
            ClientStatus::Active
        },
    })
}

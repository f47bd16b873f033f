use anyhow::Result;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::rotation::EligibleAssignment;

#[derive(Clone)]
pub struct AssignmentsRepo {
    pub pool: PgPool,
}

impl AssignmentsRepo {
    /// Active assignments whose gateway is active, accepts the amount and
    /// currency, and whose daily limit is not exhausted, ordered by
    /// rotation order. This is the eligible set the selector works over.
    pub async fn eligible_for(
        &self,
        client_id: Uuid,
        amount_minor: i64,
        currency: &str,
    ) -> Result<Vec<EligibleAssignment>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id AS assignment_id, a.gateway_id, a.rotation_order, a.weight,
                   a.daily_limit, a.daily_used
            FROM client_gateway_assignments a
            JOIN payment_gateways g ON g.id = a.gateway_id
            WHERE a.client_id = $1
              AND a.is_active = true
              AND g.is_active = true
              AND (a.daily_limit <= 0 OR a.daily_used < a.daily_limit)
              AND $2 BETWEEN g.min_amount_minor AND g.max_amount_minor
              AND $3 = ANY(g.currencies)
            ORDER BY a.rotation_order ASC
            "#,
        )
        .bind(client_id)
        .bind(amount_minor)
        .bind(currency)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| EligibleAssignment {
                assignment_id: r.get("assignment_id"),
                gateway_id: r.get("gateway_id"),
                rotation_order: r.get("rotation_order"),
                weight: r.get("weight"),
                daily_limit: r.get("daily_limit"),
                daily_used: r.get("daily_used"),
            })
            .collect())
    }

    /// Atomic increment; concurrent orchestrators must not lose updates.
    pub async fn increment_usage(&self, assignment_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE client_gateway_assignments SET daily_used = daily_used + 1 WHERE id = $1",
        )
        .bind(assignment_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Midnight rollover: reopen every assignment for the new day.
    pub async fn reset_daily_usage(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE client_gateway_assignments SET daily_used = 0 WHERE daily_used > 0",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_weight(&self, assignment_id: Uuid, weight: i32) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE client_gateway_assignments SET weight = $2 WHERE id = $1",
        )
        .bind(assignment_id)
        .bind(weight)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

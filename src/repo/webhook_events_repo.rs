use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

/// A queued forward of a transaction event to the client's own webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub id: i64,
    pub transaction_id: String,
    pub payload: serde_json::Value,
    pub target_url: String,
    pub signature_secret: String,
    pub attempts: i32,
}

#[derive(Clone)]
pub struct WebhookEventsRepo {
    pub pool: PgPool,
}

impl WebhookEventsRepo {
    /// One row per transaction status transition; a replayed provider
    /// webhook re-enqueueing the same transition is a no-op.
    pub async fn enqueue(
        &self,
        transaction_id: &str,
        event_status: &str,
        payload: &serde_json::Value,
        target_url: &str,
        signature_secret: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO webhook_events (transaction_id, event_status, payload, target_url, signature_secret, status, attempts, next_attempt_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', 0, now())
            ON CONFLICT (transaction_id, event_status) DO NOTHING
            "#,
        )
        .bind(transaction_id)
        .bind(event_status)
        .bind(payload)
        .bind(target_url)
        .bind(signature_secret)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Claim a batch of due rows for delivery. `FOR UPDATE SKIP LOCKED`
    /// lets concurrent forwarder processes split the queue without
    /// double-sending. Rows stuck in `processing` past `stale_before`
    /// (claimed by a worker that died before resolving them) are
    /// reclaimed rather than stranded.
    pub async fn claim_due(
        &self,
        batch_size: i64,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<WebhookEvent>> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, transaction_id, payload, target_url, signature_secret, attempts
            FROM webhook_events
            WHERE (status = 'pending' AND next_attempt_at <= now())
               OR (status = 'processing' AND updated_at < $2)
            ORDER BY id ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(batch_size)
        .bind(stale_before)
        .fetch_all(tx.as_mut())
        .await?;

        if rows.is_empty() {
            tx.rollback().await?;
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.get("id")).collect();
        sqlx::query("UPDATE webhook_events SET status = 'processing', updated_at = now() WHERE id = ANY($1)")
            .bind(&ids)
            .execute(tx.as_mut())
            .await?;

        tx.commit().await?;

        Ok(rows
            .into_iter()
            .map(|r| WebhookEvent {
                id: r.get("id"),
                transaction_id: r.get("transaction_id"),
                payload: r.get("payload"),
                target_url: r.get("target_url"),
                signature_secret: r.get("signature_secret"),
                attempts: r.get("attempts"),
            })
            .collect())
    }

    pub async fn mark_sent(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE webhook_events SET status = 'sent', updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_retry(
        &self,
        id: i64,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE webhook_events SET status = 'pending', attempts = $2, next_attempt_at = $3, last_error = $4, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(attempts)
        .bind(next_attempt_at)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Exhausted deliveries are surfaced for manual inspection, never deleted.
    pub async fn mark_failed(&self, id: i64, attempts: i32, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE webhook_events SET status = 'failed', attempts = $2, last_error = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(attempts)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::repo::webhook_events_repo::{WebhookEvent, WebhookEventsRepo};

type HmacSha256 = Hmac<Sha256>;

/// Claims older than this are assumed orphaned by a dead worker.
const STALE_CLAIM_MINUTES: i64 = 10;

pub fn stale_claim_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::minutes(STALE_CLAIM_MINUTES)
}

/// Delivers queued transaction events to merchant webhook URLs with a
/// fixed backoff and a bounded attempt count.
#[derive(Clone)]
pub struct WebhookForwarder {
    pub events_repo: WebhookEventsRepo,
    pub client: reqwest::Client,
    pub max_attempts: i32,
    pub backoff_minutes: i64,
    pub request_timeout_ms: u64,
}

impl WebhookForwarder {
    pub async fn run(self) {
        loop {
            if let Err(err) = self.tick().await {
                tracing::error!("webhook forwarder error: {err:#}");
            }
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        }
    }

    pub async fn tick(&self) -> Result<()> {
        let batch = self
            .events_repo
            .claim_due(50, stale_claim_cutoff(Utc::now()))
            .await?;
        for event in batch {
            // one bad row must not abandon the rest of the claimed batch
            let event_id = event.id;
            if let Err(err) = self.deliver(event).await {
                tracing::error!(event_id, "webhook delivery errored: {err:#}");
            }
        }
        Ok(())
    }

    async fn deliver(&self, event: WebhookEvent) -> Result<()> {
        let body = serde_json::to_string(&event.payload)?;
        let signature = sign_payload(&event.signature_secret, body.as_bytes());

        let response = self
            .client
            .post(&event.target_url)
            .header("Content-Type", "application/json")
            .header("X-Signature", signature)
            .body(body)
            .timeout(std::time::Duration::from_millis(self.request_timeout_ms))
            .send()
            .await;

        let error = match response {
            Ok(r) if r.status().is_success() => {
                self.events_repo.mark_sent(event.id).await?;
                tracing::info!(event_id = event.id, txn_id = %event.transaction_id, "webhook forwarded");
                return Ok(());
            }
            Ok(r) => format!("HTTP {}", r.status().as_u16()),
            Err(e) => e.to_string(),
        };

        let attempts = event.attempts + 1;
        if attempts >= self.max_attempts {
            self.events_repo.mark_failed(event.id, attempts, &error).await?;
            tracing::warn!(
                event_id = event.id,
                txn_id = %event.transaction_id,
                attempts,
                "webhook delivery exhausted: {error}"
            );
        } else {
            let next = next_attempt_at(Utc::now(), self.backoff_minutes);
            self.events_repo
                .mark_retry(event.id, attempts, next, &error)
                .await?;
            tracing::debug!(event_id = event.id, attempts, "webhook retry scheduled: {error}");
        }
        Ok(())
    }
}

pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("hmac accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

pub fn next_attempt_at(now: DateTime<Utc>, backoff_minutes: i64) -> DateTime<Utc> {
    now + Duration::minutes(backoff_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_backoff_schedule() {
        let now = Utc::now();
        assert_eq!(next_attempt_at(now, 15) - now, Duration::minutes(15));
    }

    #[test]
    fn stale_cutoff_reclaims_abandoned_rows() {
        let now = Utc::now();
        let cutoff = stale_claim_cutoff(now);
        // a claim from a worker that died 11 minutes ago is reclaimable
        assert!(now - Duration::minutes(11) < cutoff);
        // a claim made moments ago is still owned by its worker
        assert!(now - Duration::minutes(1) > cutoff);
    }

    #[test]
    fn signature_is_stable_per_secret_and_body() {
        let a = sign_payload("secret", b"{\"x\":1}");
        let b = sign_payload("secret", b"{\"x\":1}");
        let c = sign_payload("other", b"{\"x\":1}");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::domain::wallet::CommissionWallet;
use crate::error::CoreError;
use crate::repo::clients_repo::ClientsRepo;
use crate::repo::notifications_repo::NotificationsRepo;
use crate::repo::wallets_repo::WalletsRepo;
use crate::service::ledger::CommissionLedger;

/// External messaging collaborator for low-balance alerts.
#[async_trait::async_trait]
pub trait AlertSender: Send + Sync {
    async fn send_low_balance_alert(
        &self,
        company_name: &str,
        balance_due: i64,
        warn_threshold: i64,
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PayoutAck {
    pub accepted: bool,
    pub reference: Option<String>,
}

/// External payout-provider collaborator. The ledger is only touched after
/// the provider confirms the payout was accepted or queued. The
/// idempotency key makes a re-request after a failed ledger debit a
/// duplicate at the provider, not a second payment.
#[async_trait::async_trait]
pub trait PayoutProvider: Send + Sync {
    async fn request_payout(
        &self,
        company_name: &str,
        amount_minor: i64,
        idempotency_key: &str,
    ) -> Result<PayoutAck>;
}

/// Stable across retries of the same payout: the ledger head only moves
/// when an entry is booked, so a failed debit reuses the key while a
/// settled payout produces a fresh one.
pub fn payout_idempotency_key(wallet_id: uuid::Uuid, ledger_head: i64) -> String {
    format!("{wallet_id}-{ledger_head}")
}

/// A wallet over its warn threshold is alerted at most once per cooldown
/// window; inside the window it is skipped entirely.
pub fn alert_due(
    wa_last_sent: Option<DateTime<Utc>>,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> bool {
    match wa_last_sent {
        None => true,
        Some(last) => now - last >= cooldown,
    }
}

pub fn payout_due(balance_due: i64, min_payout_minor: i64) -> bool {
    balance_due >= min_payout_minor
}

#[derive(Clone)]
pub struct SweepEngine {
    pub wallets_repo: WalletsRepo,
    pub clients_repo: ClientsRepo,
    pub notifications_repo: NotificationsRepo,
    pub ledger: CommissionLedger,
    pub alert_sender: Arc<dyn AlertSender>,
    pub payout_provider: Arc<dyn PayoutProvider>,
    pub alert_cooldown: Duration,
    pub min_payout_minor: i64,
}

impl SweepEngine {
    pub async fn run_low_balance_sweep(&self) -> Result<()> {
        let now = Utc::now();
        let wallets = self.wallets_repo.list_over_warn_threshold().await?;
        for wallet in wallets {
            if !alert_due(wallet.wa_last_sent, self.alert_cooldown, now) {
                continue;
            }
            if let Err(err) = self.alert_wallet(&wallet).await {
                tracing::error!(wallet_id = %wallet.id, "low-balance alert failed: {err:#}");
            }
        }
        Ok(())
    }

    async fn alert_wallet(&self, wallet: &CommissionWallet) -> Result<()> {
        let client = self
            .clients_repo
            .get(wallet.client_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("client {} missing for wallet", wallet.client_id))?;

        let sent = self
            .alert_sender
            .send_low_balance_alert(&client.company_name, wallet.balance_due, wallet.warn_threshold)
            .await;

        match sent {
            Ok(()) => {
                self.wallets_repo.mark_alert_sent(wallet.id).await?;
                self.notifications_repo
                    .record(wallet.id, "whatsapp", true, None)
                    .await?;
                tracing::info!(wallet_id = %wallet.id, balance_due = wallet.balance_due, "low-balance alert sent");
            }
            Err(err) => {
                self.notifications_repo
                    .record(wallet.id, "whatsapp", false, Some(&err.to_string()))
                    .await?;
                return Err(err);
            }
        }
        Ok(())
    }

    pub async fn run_payout_sweep(&self) -> Result<()> {
        let wallets = self.wallets_repo.list_payout_eligible(self.min_payout_minor).await?;
        for wallet in wallets {
            if !payout_due(wallet.balance_due, self.min_payout_minor) {
                continue;
            }
            if let Err(err) = self.pay_out_wallet(&wallet).await {
                // wallet left untouched; next sweep retries
                tracing::error!(wallet_id = %wallet.id, "auto-payout failed: {err:#}");
            }
        }
        Ok(())
    }

    async fn pay_out_wallet(&self, wallet: &CommissionWallet) -> Result<()> {
        let client = self
            .clients_repo
            .get(wallet.client_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("client {} missing for wallet", wallet.client_id))?;

        let head = self.wallets_repo.ledger_head(wallet.id).await?;
        let ack = self
            .payout_provider
            .request_payout(
                &client.company_name,
                wallet.balance_due,
                &payout_idempotency_key(wallet.id, head),
            )
            .await?;
        if !ack.accepted {
            anyhow::bail!("payout provider did not accept the request");
        }

        match self.ledger.payout(wallet.id, wallet.balance_due).await {
            Ok(()) => {
                tracing::info!(
                    wallet_id = %wallet.id,
                    amount_minor = wallet.balance_due,
                    reference = ack.reference.as_deref().unwrap_or("-"),
                    "auto-payout booked"
                );
                Ok(())
            }
            Err(CoreError::InsufficientBalance) => {
                // balance moved under us between the select and the booking
                anyhow::bail!("balance changed during payout, will retry next sweep")
            }
            Err(err) => Err(anyhow::anyhow!(err)),
        }
    }
}

/// Low-balance alert delivery over the WhatsApp business API.
pub struct WhatsAppAlertSender {
    pub client: reqwest::Client,
    pub api_url: String,
    pub api_key: String,
}

#[async_trait::async_trait]
impl AlertSender for WhatsAppAlertSender {
    async fn send_low_balance_alert(
        &self,
        company_name: &str,
        balance_due: i64,
        warn_threshold: i64,
    ) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/messages", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "template": "low_balance",
                "payload": {
                    "company": company_name,
                    "balance_due": balance_due,
                    "threshold": warn_threshold,
                }
            }))
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("alert API returned HTTP {}", resp.status().as_u16());
        }
        Ok(())
    }
}

/// Payout issuance through an external payouts API.
pub struct HttpPayoutProvider {
    pub client: reqwest::Client,
    pub api_url: String,
    pub api_key: String,
}

#[async_trait::async_trait]
impl PayoutProvider for HttpPayoutProvider {
    async fn request_payout(
        &self,
        company_name: &str,
        amount_minor: i64,
        idempotency_key: &str,
    ) -> Result<PayoutAck> {
        let resp = self
            .client
            .post(format!("{}/payouts", self.api_url))
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", idempotency_key)
            .json(&json!({ "beneficiary": company_name, "amount": amount_minor }))
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("payout API returned HTTP {}", resp.status().as_u16());
        }
        let v: serde_json::Value = resp.json().await?;
        let status = v.get("status").and_then(|s| s.as_str()).unwrap_or_default();
        Ok(PayoutAck {
            accepted: matches!(status, "accepted" | "queued"),
            reference: v.get("reference").and_then(|r| r.as_str()).map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_alert_is_due_then_cooldown_applies() {
        let now = Utc::now();
        let cooldown = Duration::hours(24);
        assert!(alert_due(None, cooldown, now));
        // sent just now, swept again a minute later
        assert!(!alert_due(Some(now), cooldown, now + Duration::minutes(1)));
        assert!(alert_due(Some(now), cooldown, now + Duration::hours(24)));
    }

    #[test]
    fn payout_threshold_is_inclusive() {
        assert!(payout_due(100_000, 100_000));
        assert!(!payout_due(99_999, 100_000));
    }

    #[test]
    fn idempotency_key_stable_until_the_ledger_moves() {
        let wallet = uuid::Uuid::new_v4();
        // retry of the same failed payout reuses the key
        assert_eq!(
            payout_idempotency_key(wallet, 42),
            payout_idempotency_key(wallet, 42)
        );
        // a booked payout entry advances the head, so the next payout is new
        assert_ne!(
            payout_idempotency_key(wallet, 42),
            payout_idempotency_key(wallet, 43)
        );
        assert_ne!(
            payout_idempotency_key(wallet, 42),
            payout_idempotency_key(uuid::Uuid::new_v4(), 42)
        );
    }
}

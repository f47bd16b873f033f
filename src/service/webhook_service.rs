use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::domain::gateway::ProviderCredentials;
use crate::domain::transaction::TransactionStatus;
use crate::error::CoreError;
use crate::providers::AdapterRegistry;
use crate::repo::clients_repo::ClientsRepo;
use crate::repo::gateways_repo::GatewaysRepo;
use crate::repo::transactions_repo::TransactionsRepo;
use crate::repo::webhook_events_repo::WebhookEventsRepo;
use crate::service::ledger::CommissionLedger;
use crate::vault::CredentialVault;

/// Outcome reported back to the provider; duplicates are accepted so the
/// provider stops re-delivering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Applied,
    Duplicate,
}

/// Side effects owed after a webhook, given whether the status row changed
/// and the status now stored on the transaction. Commission booking and
/// the merchant forward are re-run on replays of a terminal row (both are
/// idempotent at the store), so a crash between the status update and its
/// side effects heals on the provider's next delivery. The gateway health
/// write-back is observational and runs only on the first transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementActions {
    pub book_commission: bool,
    pub record_gateway_outcome: bool,
    pub forward_event: bool,
}

pub fn settlement_actions(updated: bool, stored: TransactionStatus) -> SettlementActions {
    SettlementActions {
        book_commission: stored == TransactionStatus::Paid,
        record_gateway_outcome: updated && stored.is_terminal(),
        forward_event: updated || stored.is_terminal(),
    }
}

/// Resolve the address the webhook actually came from. `x-forwarded-for`
/// is only honored when the TCP peer is a configured proxy; anyone else
/// could put whatever they like in that header.
pub fn effective_source_ip(
    peer: IpAddr,
    forwarded: Option<&str>,
    trusted_proxies: &[IpAddr],
) -> IpAddr {
    if !trusted_proxies.contains(&peer) {
        return peer;
    }
    forwarded
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(peer)
}

#[derive(Clone)]
pub struct WebhookService {
    pub transactions_repo: TransactionsRepo,
    pub clients_repo: ClientsRepo,
    pub gateways_repo: GatewaysRepo,
    pub webhook_events_repo: WebhookEventsRepo,
    pub ledger: CommissionLedger,
    pub vault: Arc<CredentialVault>,
    pub adapters: AdapterRegistry,
    pub brand_name: String,
    /// Optional per-provider source-address allow-lists, checked before
    /// signature verification.
    pub allow_lists: Arc<HashMap<String, Vec<IpAddr>>>,
    /// Peers allowed to speak for the real client via `x-forwarded-for`.
    pub trusted_proxies: Arc<Vec<IpAddr>>,
}

impl WebhookService {
    pub async fn ingest(
        &self,
        provider: &str,
        source_ip: Option<IpAddr>,
        signature: Option<&str>,
        raw_body: &[u8],
    ) -> Result<IngestOutcome, CoreError> {
        let adapter = self
            .adapters
            .get(provider)
            .ok_or(CoreError::NotFound("provider"))?;

        if let Some(allowed) = self.allow_lists.get(provider) {
            match source_ip {
                Some(ip) if allowed.contains(&ip) => {}
                _ => {
                    tracing::warn!(provider, ?source_ip, "webhook from outside allow-list");
                    return Err(CoreError::Authentication);
                }
            }
        }

        // the transaction reference is only used to locate the credential
        // set; nothing else in the payload is trusted until verification
        let parsed = adapter.parse_webhook(raw_body)?;
        let txn = self
            .transactions_repo
            .find(&parsed.transaction_ref)
            .await
            .map_err(CoreError::Internal)?
            .ok_or(CoreError::NotFound("transaction"))?;

        let gateway = self
            .gateways_repo
            .get(txn.gateway_id)
            .await
            .map_err(CoreError::Internal)?
            .ok_or(CoreError::NotFound("gateway"))?;
        let creds = self.decrypt_credentials(&gateway.credentials)?;

        adapter.verify_webhook(&creds, raw_body, signature)?;

        let updated = self
            .transactions_repo
            .update_status_if_not_terminal(
                &txn.txn_id,
                parsed.status,
                parsed.provider_ref.as_deref(),
                &parsed.raw,
            )
            .await
            .map_err(CoreError::Internal)?;

        // on a replay the row is already terminal; settle against what is
        // actually stored, so a crash after the status update but before
        // the ledger or the forward-enqueue heals on re-delivery
        let stored = if updated {
            parsed.status
        } else {
            self.transactions_repo
                .find(&txn.txn_id)
                .await
                .map_err(CoreError::Internal)?
                .map(|t| t.status)
                .unwrap_or(parsed.status)
        };
        let actions = settlement_actions(updated, stored);

        if updated {
            tracing::info!(
                txn_id = %txn.txn_id,
                provider,
                status = stored.as_str(),
                "transaction status updated"
            );
        } else {
            tracing::debug!(txn_id = %txn.txn_id, "terminal row, settling replay idempotently");
        }

        let client = self
            .clients_repo
            .get(txn.client_id)
            .await
            .map_err(CoreError::Internal)?
            .ok_or(CoreError::NotFound("client"))?;

        if actions.book_commission {
            self.ledger
                .book(client.id, &txn.txn_id, txn.amount_minor, client.fee_bps)
                .await?;
        }
        if actions.record_gateway_outcome {
            self.gateways_repo
                .record_outcome(gateway.id, stored == TransactionStatus::Paid)
                .await
                .map_err(CoreError::Internal)?;
        }

        // forward to the merchant regardless of ledger outcome
        if actions.forward_event {
            if let Some(url) = client.webhook_url.as_deref() {
                let event = json!({
                    "transaction_id": txn.txn_id,
                    "status": stored.as_str(),
                    "amount": txn.amount_minor,
                    "gateway": self.brand_name,
                    "processed_at": Utc::now().to_rfc3339(),
                });
                self.webhook_events_repo
                    .enqueue(&txn.txn_id, stored.as_str(), &event, url, &client.client_secret)
                    .await
                    .map_err(CoreError::Internal)?;
            }
        }

        if updated {
            Ok(IngestOutcome::Applied)
        } else {
            Ok(IngestOutcome::Duplicate)
        }
    }

    fn decrypt_credentials(&self, blob: &str) -> Result<ProviderCredentials, CoreError> {
        let value: serde_json::Value = serde_json::from_str(blob)
            .map_err(|_| CoreError::Decryption("credential blob is not valid JSON".to_string()))?;
        let decrypted = self.vault.decrypt_object(&value)?;
        serde_json::from_value(decrypted)
            .map_err(|_| CoreError::Decryption("credential blob has unexpected shape".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_paid_transition_runs_everything() {
        let a = settlement_actions(true, TransactionStatus::Paid);
        assert!(a.book_commission);
        assert!(a.record_gateway_outcome);
        assert!(a.forward_event);
    }

    #[test]
    fn replay_of_paid_still_books_and_forwards() {
        // crash between the terminal update and the side effects: the
        // provider re-delivers, the update is a no-op, settlement is not
        let a = settlement_actions(false, TransactionStatus::Paid);
        assert!(a.book_commission);
        assert!(a.forward_event);
        // health feedback only counts the first transition
        assert!(!a.record_gateway_outcome);
    }

    #[test]
    fn replay_of_failed_forwards_but_books_nothing() {
        let a = settlement_actions(false, TransactionStatus::Failed);
        assert!(!a.book_commission);
        assert!(a.forward_event);
        assert!(!a.record_gateway_outcome);
    }

    #[test]
    fn pending_update_forwards_without_booking() {
        let a = settlement_actions(true, TransactionStatus::Pending);
        assert!(!a.book_commission);
        assert!(!a.record_gateway_outcome);
        assert!(a.forward_event);
    }

    #[test]
    fn forwarded_header_ignored_from_untrusted_peer() {
        let peer: IpAddr = "203.0.113.9".parse().unwrap();
        let proxies: Vec<IpAddr> = vec!["10.0.0.1".parse().unwrap()];
        assert_eq!(
            effective_source_ip(peer, Some("198.51.100.1"), &proxies),
            peer
        );
    }

    #[test]
    fn trusted_proxy_reveals_the_real_client() {
        let proxy: IpAddr = "10.0.0.1".parse().unwrap();
        let real: IpAddr = "198.51.100.1".parse().unwrap();
        let proxies = vec![proxy];
        assert_eq!(
            effective_source_ip(proxy, Some("198.51.100.1, 10.0.0.1"), &proxies),
            real
        );
        // malformed header falls back to the peer itself
        assert_eq!(effective_source_ip(proxy, Some("not-an-ip"), &proxies), proxy);
        assert_eq!(effective_source_ip(proxy, None, &proxies), proxy);
    }
}

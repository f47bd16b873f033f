use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `created -> pending -> {paid, failed, cancelled}`. Terminal states are
/// never left again; a late webhook for a terminal transaction is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Created,
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Failed | Self::Cancelled)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl CustomerInfo {
    pub fn has_contact(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.is_empty())
            || self.phone.as_deref().is_some_and(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitiatePaymentRequest {
    pub client_key: String,
    pub client_secret: String,
    pub amount_minor: i64,
    pub currency: String,
    pub customer: CustomerInfo,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiatePaymentResponse {
    pub transaction_id: String,
    pub checkout_url: String,
    pub status: TransactionStatus,
    pub amount_minor: i64,
    pub currency: String,
    pub gateway: String,
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub txn_id: String,
    pub client_id: Uuid,
    pub gateway_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub status: TransactionStatus,
    pub provider_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Branded transaction id: `LSP_<millis>_<6 uppercase alphanumerics>`.
/// This is the only id the customer or the PSP ever sees.
pub fn generate_txn_id() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("LSP_{}_{}", Utc::now().timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!TransactionStatus::Created.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Paid.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn txn_id_is_branded() {
        let id = generate_txn_id();
        assert!(id.starts_with("LSP_"));
        assert_eq!(id.split('_').count(), 3);
    }
}

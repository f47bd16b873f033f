use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CommissionWallet {
    pub id: Uuid,
    pub client_id: Uuid,
    pub balance_due: i64,
    pub warn_threshold: i64,
    pub wa_last_sent: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    #[serde(rename = "COMMISSION")]
    Commission,
    #[serde(rename = "COMMISSION_PAYOUT")]
    CommissionPayout,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commission => "COMMISSION",
            Self::CommissionPayout => "COMMISSION_PAYOUT",
        }
    }
}

/// Append-only ledger row. The wallet balance is a materialized projection
/// of these entries; the entries are the source of truth.
#[derive(Debug, Clone)]
pub struct CommissionEntry {
    pub id: i64,
    pub wallet_id: Uuid,
    pub amount: i64,
    pub entry_type: EntryType,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

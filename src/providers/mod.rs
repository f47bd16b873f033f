use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use thiserror::Error;

use crate::domain::gateway::ProviderCredentials;
use crate::domain::transaction::{CustomerInfo, TransactionStatus};
use crate::error::CoreError;

pub mod easebuzz;
pub mod mock;
pub mod payu;
pub mod razorpay;

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub txn_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub customer: CustomerInfo,
    pub product_info: String,
    pub return_url: String,
}

#[derive(Debug, Clone)]
pub struct OrderOutcome {
    /// The provider's own reference for the order, when it issues one.
    pub provider_ref: Option<String>,
    pub raw: serde_json::Value,
}

/// `Transient` failures (timeouts, 5xx, network) are retried with backoff;
/// `Rejected` is a definitive provider answer and fails the transaction.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("transient provider failure: {0}")]
    Transient(String),
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedWebhook {
    /// Our branded transaction id as echoed back by the provider.
    pub transaction_ref: String,
    pub status: TransactionStatus,
    pub provider_ref: Option<String>,
    pub raw: serde_json::Value,
}

#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_order(
        &self,
        creds: &ProviderCredentials,
        request: &OrderRequest,
    ) -> Result<OrderOutcome, OrderError>;

    /// Authenticate the callback before any field of it is trusted.
    /// `signature` carries a header-borne signature where the provider
    /// uses one; hash-in-body schemes ignore it.
    fn verify_webhook(
        &self,
        creds: &ProviderCredentials,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<(), CoreError>;

    fn parse_webhook(&self, raw_body: &[u8]) -> Result<ParsedWebhook, CoreError>;
}

#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<&'static str, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.name(), adapter);
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider).cloned()
    }
}

/// Minor units to the rupee string the hash schemes are computed over.
pub(crate) fn amount_rupees(amount_minor: i64) -> String {
    format!("{}.{:02}", amount_minor / 100, amount_minor % 100)
}

pub(crate) fn sha512_hex(input: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Form-decode a webhook body into a flat string map.
pub(crate) fn decode_form(raw_body: &[u8]) -> Result<HashMap<String, String>, CoreError> {
    serde_urlencoded::from_bytes(raw_body)
        .map_err(|_| CoreError::Validation("malformed webhook body".to_string()))
}

pub(crate) fn form_to_json(form: &HashMap<String, String>) -> serde_json::Value {
    serde_json::to_value(form).unwrap_or(serde_json::Value::Null)
}

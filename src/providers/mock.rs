use anyhow::Result;
use serde_json::json;

use crate::domain::gateway::ProviderCredentials;
use crate::domain::transaction::TransactionStatus;
use crate::error::CoreError;
use crate::providers::{OrderError, OrderOutcome, OrderRequest, ParsedWebhook, ProviderAdapter};

/// Test double with scripted behavior; `salt` doubles as the webhook hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    AlwaysAccept,
    AlwaysReject,
    AlwaysTimeout,
}

pub struct MockAdapter {
    pub behavior: MockBehavior,
}

#[async_trait::async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_order(
        &self,
        _creds: &ProviderCredentials,
        request: &OrderRequest,
    ) -> Result<OrderOutcome, OrderError> {
        match self.behavior {
            MockBehavior::AlwaysAccept => Ok(OrderOutcome {
                provider_ref: Some(format!("mock_{}", request.txn_id)),
                raw: json!({ "mock": true }),
            }),
            MockBehavior::AlwaysReject => Err(OrderError::Rejected("mock rejection".to_string())),
            MockBehavior::AlwaysTimeout => {
                Err(OrderError::Transient("mock timeout".to_string()))
            }
        }
    }

    fn verify_webhook(
        &self,
        creds: &ProviderCredentials,
        _raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<(), CoreError> {
        if signature == Some(creds.salt.as_str()) {
            Ok(())
        } else {
            Err(CoreError::Authentication)
        }
    }

    fn parse_webhook(&self, raw_body: &[u8]) -> Result<ParsedWebhook, CoreError> {
        let v: serde_json::Value = serde_json::from_slice(raw_body)
            .map_err(|_| CoreError::Validation("malformed webhook body".to_string()))?;
        let transaction_ref = v
            .get("txnid")
            .and_then(|t| t.as_str())
            .ok_or_else(|| CoreError::Validation("missing transaction reference".to_string()))?
            .to_string();
        let status = v
            .get("status")
            .and_then(|s| s.as_str())
            .and_then(TransactionStatus::parse)
            .unwrap_or(TransactionStatus::Pending);
        Ok(ParsedWebhook {
            transaction_ref,
            status,
            provider_ref: None,
            raw: v,
        })
    }
}

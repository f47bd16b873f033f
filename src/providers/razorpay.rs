use anyhow::Result;
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use serde_json::json;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::gateway::ProviderCredentials;
use crate::domain::transaction::TransactionStatus;
use crate::error::CoreError;
use crate::providers::{OrderError, OrderOutcome, OrderRequest, ParsedWebhook, ProviderAdapter};

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_BASE_URL: &str = "https://api.razorpay.com";

pub struct RazorpayAdapter {
    pub client: reqwest::Client,
    pub timeout_ms: u64,
}

#[async_trait::async_trait]
impl ProviderAdapter for RazorpayAdapter {
    fn name(&self) -> &'static str {
        "razorpay"
    }

    async fn create_order(
        &self,
        creds: &ProviderCredentials,
        request: &OrderRequest,
    ) -> Result<OrderOutcome, OrderError> {
        let base = creds.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let body = json!({
            "amount": request.amount_minor,
            "currency": request.currency,
            "receipt": request.txn_id,
            "payment_capture": 1,
            "notes": { "transaction_id": request.txn_id }
        });

        let resp = self
            .client
            .post(format!("{base}/v1/orders"))
            .basic_auth(&creds.merchant_key, Some(&creds.salt))
            .json(&body)
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => {
                let v: serde_json::Value = r
                    .json()
                    .await
                    .map_err(|e| OrderError::Transient(e.to_string()))?;
                let order_id = v.get("id").and_then(|id| id.as_str()).map(str::to_string);
                Ok(OrderOutcome {
                    provider_ref: order_id,
                    raw: v,
                })
            }
            Ok(r) if r.status().is_server_error() || r.status() == StatusCode::REQUEST_TIMEOUT => {
                Err(OrderError::Transient(format!("HTTP {}", r.status().as_u16())))
            }
            Ok(r) => {
                let status = r.status();
                let body = r.text().await.unwrap_or_default();
                Err(OrderError::Rejected(format!(
                    "order rejected (HTTP {}): {}",
                    status.as_u16(),
                    body.chars().take(200).collect::<String>()
                )))
            }
            Err(e) if e.is_timeout() => Err(OrderError::Transient("request timed out".to_string())),
            Err(e) => Err(OrderError::Transient(e.to_string())),
        }
    }

    fn verify_webhook(
        &self,
        creds: &ProviderCredentials,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<(), CoreError> {
        let secret = creds
            .webhook_secret
            .as_deref()
            .ok_or(CoreError::Authentication)?;
        let provided = signature.ok_or(CoreError::Authentication)?;
        let provided_bytes = hex::decode(provided).map_err(|_| CoreError::Authentication)?;

        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| CoreError::Authentication)?;
        mac.update(raw_body);
        let expected = mac.finalize().into_bytes();

        if expected.ct_eq(provided_bytes.as_slice()).into() {
            Ok(())
        } else {
            Err(CoreError::Authentication)
        }
    }

    fn parse_webhook(&self, raw_body: &[u8]) -> Result<ParsedWebhook, CoreError> {
        let v: serde_json::Value = serde_json::from_slice(raw_body)
            .map_err(|_| CoreError::Validation("malformed webhook body".to_string()))?;

        let entity = v
            .pointer("/payload/payment/entity")
            .ok_or_else(|| CoreError::Validation("missing payment entity".to_string()))?;
        let transaction_ref = entity
            .pointer("/notes/transaction_id")
            .and_then(|t| t.as_str())
            .ok_or_else(|| CoreError::Validation("missing transaction reference".to_string()))?
            .to_string();
        let provider_ref = entity.get("id").and_then(|id| id.as_str()).map(str::to_string);

        let status = match v.get("event").and_then(|e| e.as_str()).unwrap_or_default() {
            "payment.captured" => TransactionStatus::Paid,
            "payment.failed" => TransactionStatus::Failed,
            _ => TransactionStatus::Pending,
        };

        Ok(ParsedWebhook {
            transaction_ref,
            status,
            provider_ref,
            raw: v,
        })
    }
}

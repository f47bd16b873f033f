use anyhow::Result;
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::domain::gateway::ProviderCredentials;
use crate::domain::transaction::TransactionStatus;
use crate::error::CoreError;
use crate::providers::{
    amount_rupees, decode_form, form_to_json, sha512_hex, OrderError, OrderOutcome, OrderRequest,
    ParsedWebhook, ProviderAdapter,
};

/// PayU is redirect-based: the "order" is a signed form the hosted checkout
/// page posts to PayU, so `create_order` builds and signs the form without
/// a network round trip.
pub struct PayuAdapter;

#[async_trait::async_trait]
impl ProviderAdapter for PayuAdapter {
    fn name(&self) -> &'static str {
        "payu"
    }

    async fn create_order(
        &self,
        creds: &ProviderCredentials,
        request: &OrderRequest,
    ) -> Result<OrderOutcome, OrderError> {
        let amount = amount_rupees(request.amount_minor);
        let product_info = &request.product_info;
        let name = request.customer.name.as_deref().unwrap_or("Customer");
        let email = request.customer.email.as_deref().unwrap_or("");

        // key|txnid|amount|productinfo|firstname|email|udf1..udf10(empty)|salt
        let hash_input = format!(
            "{}|{}|{}|{}|{}|{}|||||||||||{}",
            creds.merchant_key, request.txn_id, amount, product_info, name, email, creds.salt
        );
        let hash = sha512_hex(&hash_input);

        let form = json!({
            "key": creds.merchant_key,
            "txnid": request.txn_id,
            "amount": amount,
            "productinfo": product_info,
            "firstname": name,
            "email": email,
            "phone": request.customer.phone.as_deref().unwrap_or(""),
            "surl": format!("{}?status=success", request.return_url),
            "furl": format!("{}?status=failure", request.return_url),
            "hash": hash,
            "service_provider": "payu_paisa"
        });

        Ok(OrderOutcome {
            provider_ref: Some(request.txn_id.clone()),
            raw: form,
        })
    }

    fn verify_webhook(
        &self,
        creds: &ProviderCredentials,
        raw_body: &[u8],
        _signature: Option<&str>,
    ) -> Result<(), CoreError> {
        let form = decode_form(raw_body)?;
        let get = |k: &str| form.get(k).map(String::as_str).unwrap_or("");
        let provided = form.get("hash").ok_or(CoreError::Authentication)?;

        // reverse hash: salt|status|udf10..udf1(empty)|email|firstname|productinfo|amount|txnid|key
        let hash_input = format!(
            "{}|{}|||||||||||{}|{}|{}|{}|{}|{}",
            creds.salt,
            get("status"),
            get("email"),
            get("firstname"),
            get("productinfo"),
            get("amount"),
            get("txnid"),
            get("key"),
        );
        let expected = sha512_hex(&hash_input);

        if expected.as_bytes().ct_eq(provided.as_bytes()).into() {
            Ok(())
        } else {
            Err(CoreError::Authentication)
        }
    }

    fn parse_webhook(&self, raw_body: &[u8]) -> Result<ParsedWebhook, CoreError> {
        let form = decode_form(raw_body)?;
        let transaction_ref = form
            .get("txnid")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CoreError::Validation("missing transaction reference".to_string()))?
            .clone();

        let status = match form.get("status").map(String::as_str).unwrap_or_default() {
            "success" => TransactionStatus::Paid,
            "failure" | "failed" => TransactionStatus::Failed,
            "pending" => TransactionStatus::Pending,
            _ => TransactionStatus::Cancelled,
        };

        Ok(ParsedWebhook {
            transaction_ref,
            status,
            provider_ref: form.get("mihpayid").cloned(),
            raw: form_to_json(&form),
        })
    }
}

use anyhow::Result;
use subtle::ConstantTimeEq;

use crate::domain::gateway::ProviderCredentials;
use crate::domain::transaction::TransactionStatus;
use crate::error::CoreError;
use crate::providers::{
    amount_rupees, decode_form, form_to_json, sha512_hex, OrderError, OrderOutcome, OrderRequest,
    ParsedWebhook, ProviderAdapter,
};

const DEFAULT_BASE_URL: &str = "https://pay.easebuzz.in";

/// key|txnid|amount|productinfo|firstname|email|udf1..udf7(empty)|salt
fn initiate_hash_input(
    creds: &ProviderCredentials,
    txnid: &str,
    amount: &str,
    productinfo: &str,
    firstname: &str,
    email: &str,
) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}||||||||{}",
        creds.merchant_key, txnid, amount, productinfo, firstname, email, creds.salt
    )
}

pub struct EasebuzzAdapter {
    pub client: reqwest::Client,
    pub timeout_ms: u64,
}

#[async_trait::async_trait]
impl ProviderAdapter for EasebuzzAdapter {
    fn name(&self) -> &'static str {
        "easebuzz"
    }

    async fn create_order(
        &self,
        creds: &ProviderCredentials,
        request: &OrderRequest,
    ) -> Result<OrderOutcome, OrderError> {
        let base = creds.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let amount = amount_rupees(request.amount_minor);
        let name = request.customer.name.as_deref().unwrap_or("Customer");
        let email = request.customer.email.as_deref().unwrap_or("");

        let hash = sha512_hex(&initiate_hash_input(
            creds,
            &request.txn_id,
            &amount,
            &request.product_info,
            name,
            email,
        ));

        let form = [
            ("key", creds.merchant_key.as_str()),
            ("txnid", request.txn_id.as_str()),
            ("amount", amount.as_str()),
            ("productinfo", request.product_info.as_str()),
            ("firstname", name),
            ("email", email),
            ("phone", request.customer.phone.as_deref().unwrap_or("")),
            ("surl", request.return_url.as_str()),
            ("furl", request.return_url.as_str()),
            ("hash", hash.as_str()),
        ];

        let resp = self
            .client
            .post(format!("{base}/payment/initiateLink"))
            .form(&form)
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => {
                let v: serde_json::Value = r
                    .json()
                    .await
                    .map_err(|e| OrderError::Transient(e.to_string()))?;
                // status == 1 means the link was issued; data carries the access key
                if v.get("status").and_then(|s| s.as_i64()) == Some(1) {
                    let access_key = v.get("data").and_then(|d| d.as_str()).map(str::to_string);
                    Ok(OrderOutcome {
                        provider_ref: access_key,
                        raw: v,
                    })
                } else {
                    let msg = v
                        .get("data")
                        .and_then(|d| d.as_str())
                        .unwrap_or("payment initiation failed");
                    Err(OrderError::Rejected(msg.to_string()))
                }
            }
            Ok(r) if r.status().is_server_error() => {
                Err(OrderError::Transient(format!("HTTP {}", r.status().as_u16())))
            }
            Ok(r) => Err(OrderError::Rejected(format!("HTTP {}", r.status().as_u16()))),
            Err(e) if e.is_timeout() => Err(OrderError::Transient("request timed out".to_string())),
            Err(e) => Err(OrderError::Transient(e.to_string())),
        }
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

        // reverse hash: salt|status|udf7..udf1(empty)|email|firstname|productinfo|amount|txnid|key
        let hash_input = format!(
            "{}|{}||||||||{}|{}|{}|{}|{}|{}",
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

        let status = match form
            .get("status")
            .map(|s| s.to_lowercase())
            .unwrap_or_default()
            .as_str()
        {
            "success" => TransactionStatus::Paid,
            "failed" | "failure" => TransactionStatus::Failed,
            "usercancel" => TransactionStatus::Cancelled,
            _ => TransactionStatus::Pending,
        };

        Ok(ParsedWebhook {
            transaction_ref,
            status,
            provider_ref: form.get("easepayid").cloned(),
            raw: form_to_json(&form),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> ProviderCredentials {
        ProviderCredentials {
            merchant_key: "EKEY".to_string(),
            salt: "ESALT".to_string(),
            webhook_secret: None,
            base_url: None,
        }
    }

    #[test]
    fn initiate_hash_carries_seven_empty_udf_fields() {
        let input = initiate_hash_input(&creds(), "TXN1", "99.50", "Payment", "Asha", "a@b.c");
        let fields: Vec<&str> = input.split('|').collect();
        assert_eq!(fields.len(), 14);
        assert_eq!(input.matches('|').count(), 13);
        assert_eq!(&fields[6..13], &["", "", "", "", "", "", ""]);
        assert_eq!(fields[0], "EKEY");
        assert_eq!(fields[13], "ESALT");
    }

    #[test]
    fn initiate_hash_matches_joined_field_list() {
        let creds = creds();
        let joined = [
            creds.merchant_key.as_str(),
            "TXN1",
            "99.50",
            "Payment",
            "Asha",
            "a@b.c",
            "", "", "", "", "", "", "",
            creds.salt.as_str(),
        ]
        .join("|");
        assert_eq!(
            initiate_hash_input(&creds, "TXN1", "99.50", "Payment", "Asha", "a@b.c"),
            joined
        );
    }
}

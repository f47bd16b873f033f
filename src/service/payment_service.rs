use std::sync::Arc;

use subtle::ConstantTimeEq;

use crate::domain::client::Client;
use crate::domain::gateway::ProviderCredentials;
use crate::domain::transaction::{
    generate_txn_id, InitiatePaymentRequest, InitiatePaymentResponse, TransactionStatus,
};
use crate::error::CoreError;
use crate::providers::{AdapterRegistry, OrderError, OrderRequest};
use crate::repo::assignments_repo::AssignmentsRepo;
use crate::repo::clients_repo::ClientsRepo;
use crate::repo::gateways_repo::GatewaysRepo;
use crate::repo::transactions_repo::{TransactionInput, TransactionsRepo};
use crate::rotation::select_next;
use crate::service::retry::with_retries;
use crate::vault::CredentialVault;

#[derive(Clone)]
pub struct PaymentService {
    pub clients_repo: ClientsRepo,
    pub gateways_repo: GatewaysRepo,
    pub assignments_repo: AssignmentsRepo,
    pub transactions_repo: TransactionsRepo,
    pub vault: Arc<CredentialVault>,
    pub adapters: AdapterRegistry,
    pub brand_name: String,
    pub checkout_base_url: String,
    pub order_max_attempts: u32,
}

impl PaymentService {
    /// Turn a merchant payment request into a provider-hosted checkout.
    pub async fn initiate(
        &self,
        req: InitiatePaymentRequest,
    ) -> Result<InitiatePaymentResponse, CoreError> {
        validate(&req)?;
        let client = self.authenticate(&req).await?;

        // eligible set, selection, and position advance; a crash between the
        // advance and the transaction insert only skips one slot, which the
        // next selection absorbs
        let eligible = self
            .assignments_repo
            .eligible_for(client.id, req.amount_minor, &req.currency)
            .await
            .map_err(CoreError::Internal)?;
        let selection = select_next(client.rotation_mode, client.current_rotation_position, &eligible)?;
        self.clients_repo
            .advance_rotation(client.id, selection.new_position)
            .await
            .map_err(CoreError::Internal)?;

        let gateway = self
            .gateways_repo
            .get(selection.assignment.gateway_id)
            .await
            .map_err(CoreError::Internal)?
            .ok_or(CoreError::NotFound("gateway"))?;

        let adapter = self
            .adapters
            .get(&gateway.provider)
            .ok_or(CoreError::NotFound("provider adapter"))?;

        // fail-fast: unusable credentials abort before any transaction row
        let creds = self.decrypt_credentials(&gateway.credentials)?;

        let txn_id = generate_txn_id();
        let order_request = OrderRequest {
            txn_id: txn_id.clone(),
            amount_minor: req.amount_minor,
            currency: req.currency.clone(),
            customer: req.customer.clone(),
            product_info: req.description.clone().unwrap_or_else(|| "Payment".to_string()),
            return_url: req
                .return_url
                .clone()
                .unwrap_or_else(|| format!("{}/callback/return", self.checkout_base_url)),
        };

        let order = with_retries(self.order_max_attempts, || {
            adapter.create_order(&creds, &order_request)
        })
        .await;

        match order {
            Ok(outcome) => {
                self.transactions_repo
                    .insert(&TransactionInput {
                        txn_id: &txn_id,
                        client_id: client.id,
                        gateway_id: gateway.id,
                        amount_minor: req.amount_minor,
                        currency: &req.currency,
                        status: TransactionStatus::Pending,
                        provider_ref: outcome.provider_ref.as_deref(),
                        provider_response: Some(&outcome.raw),
                        customer: &req.customer,
                    })
                    .await
                    .map_err(CoreError::Internal)?;
                self.assignments_repo
                    .increment_usage(selection.assignment.assignment_id)
                    .await
                    .map_err(CoreError::Internal)?;

                tracing::info!(
                    %txn_id,
                    client_id = %client.id,
                    gateway_id = %gateway.id,
                    provider = %gateway.provider,
                    "payment initiated"
                );

                Ok(InitiatePaymentResponse {
                    checkout_url: format!("{}/checkout/{}", self.checkout_base_url, txn_id),
                    transaction_id: txn_id,
                    status: TransactionStatus::Pending,
                    amount_minor: req.amount_minor,
                    currency: req.currency,
                    gateway: self.brand_name.clone(),
                })
            }
            Err(err) => {
                // synchronous provider failure: no webhook will ever arrive,
                // so the transaction is terminal right away
                let message = match &err {
                    OrderError::Rejected(m) => m.clone(),
                    OrderError::Transient(m) => format!("provider unavailable: {m}"),
                };
                self.transactions_repo
                    .insert(&TransactionInput {
                        txn_id: &txn_id,
                        client_id: client.id,
                        gateway_id: gateway.id,
                        amount_minor: req.amount_minor,
                        currency: &req.currency,
                        status: TransactionStatus::Failed,
                        provider_ref: None,
                        provider_response: None,
                        customer: &req.customer,
                    })
                    .await
                    .map_err(CoreError::Internal)?;
                self.gateways_repo
                    .record_outcome(gateway.id, false)
                    .await
                    .map_err(CoreError::Internal)?;

                tracing::warn!(%txn_id, gateway_id = %gateway.id, "order creation failed: {message}");
                Err(CoreError::Provider(message))
            }
        }
    }

    async fn authenticate(&self, req: &InitiatePaymentRequest) -> Result<Client, CoreError> {
        let client = self
            .clients_repo
            .find_by_key(&req.client_key)
            .await
            .map_err(CoreError::Internal)?
            .ok_or(CoreError::Authentication)?;

        let secret_ok: bool = client
            .client_secret
            .as_bytes()
            .ct_eq(req.client_secret.as_bytes())
            .into();
        if !secret_ok {
            return Err(CoreError::Authentication);
        }
        if !client.is_active() {
            return Err(CoreError::Validation("client account is suspended".to_string()));
        }
        Ok(client)
    }

    fn decrypt_credentials(&self, blob: &str) -> Result<ProviderCredentials, CoreError> {
        let value: serde_json::Value = serde_json::from_str(blob)
            .map_err(|_| CoreError::Decryption("credential blob is not valid JSON".to_string()))?;
        let decrypted = self.vault.decrypt_object(&value)?;
        serde_json::from_value(decrypted)
            .map_err(|_| CoreError::Decryption("credential blob has unexpected shape".to_string()))
    }
}

fn validate(req: &InitiatePaymentRequest) -> Result<(), CoreError> {
    if req.amount_minor <= 0 {
        return Err(CoreError::Validation("amount_minor must be > 0".to_string()));
    }
    if req.currency.len() != 3 {
        return Err(CoreError::Validation("currency must be a 3-letter code".to_string()));
    }
    if !req.customer.has_contact() {
        return Err(CoreError::Validation(
            "customer email or phone is required".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::CustomerInfo;

    fn request(amount: i64, email: Option<&str>) -> InitiatePaymentRequest {
        InitiatePaymentRequest {
            client_key: "ck".to_string(),
            client_secret: "cs".to_string(),
            amount_minor: amount,
            currency: "INR".to_string(),
            customer: CustomerInfo {
                name: Some("A".to_string()),
                email: email.map(str::to_string),
                phone: None,
            },
            description: None,
            return_url: None,
        }
    }

    #[test]
    fn rejects_non_positive_amount() {
        assert!(matches!(
            validate(&request(0, Some("a@b.c"))),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn rejects_missing_contact() {
        assert!(matches!(
            validate(&request(100, None)),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn accepts_valid_request() {
        assert!(validate(&request(100, Some("a@b.c"))).is_ok());
    }
}

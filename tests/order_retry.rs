use psp_gateway::domain::gateway::ProviderCredentials;
use psp_gateway::domain::transaction::{generate_txn_id, CustomerInfo};
use psp_gateway::providers::mock::{MockAdapter, MockBehavior};
use psp_gateway::providers::{OrderError, OrderRequest, ProviderAdapter};
use psp_gateway::service::retry::with_retries;

fn order_request() -> OrderRequest {
    OrderRequest {
        txn_id: generate_txn_id(),
        amount_minor: 25_000,
        currency: "INR".to_string(),
        customer: CustomerInfo {
            name: Some("Asha".to_string()),
            email: Some("asha@example.com".to_string()),
            phone: None,
        },
        product_info: "Order payment".to_string(),
        return_url: "https://merchant.example/return".to_string(),
    }
}

fn creds() -> ProviderCredentials {
    ProviderCredentials {
        merchant_key: "mk".to_string(),
        salt: "salt".to_string(),
        webhook_secret: None,
        base_url: None,
    }
}

#[tokio::test]
async fn accepted_order_carries_provider_reference() {
    let adapter = MockAdapter {
        behavior: MockBehavior::AlwaysAccept,
    };
    let req = order_request();
    let creds = creds();

    let outcome = with_retries(3, || adapter.create_order(&creds, &req))
        .await
        .unwrap();
    assert_eq!(
        outcome.provider_ref.as_deref(),
        Some(format!("mock_{}", req.txn_id).as_str())
    );
}

#[tokio::test]
async fn rejection_surfaces_without_retry() {
    let adapter = MockAdapter {
        behavior: MockBehavior::AlwaysReject,
    };
    let req = order_request();
    let creds = creds();

    let result = with_retries(5, || adapter.create_order(&creds, &req)).await;
    assert!(matches!(result, Err(OrderError::Rejected(_))));
}

#[tokio::test(start_paused = true)]
async fn timeouts_exhaust_the_attempt_budget() {
    let adapter = MockAdapter {
        behavior: MockBehavior::AlwaysTimeout,
    };
    let req = order_request();
    let creds = creds();

    let result = with_retries(3, || adapter.create_order(&creds, &req)).await;
    assert!(matches!(result, Err(OrderError::Transient(_))));
}

use hmac::{Hmac, Mac};
use psp_gateway::domain::gateway::ProviderCredentials;
use psp_gateway::domain::transaction::TransactionStatus;
use psp_gateway::providers::easebuzz::EasebuzzAdapter;
use psp_gateway::providers::payu::PayuAdapter;
use psp_gateway::providers::razorpay::RazorpayAdapter;
use psp_gateway::providers::ProviderAdapter;
use sha2::{Digest, Sha256, Sha512};

fn creds() -> ProviderCredentials {
    ProviderCredentials {
        merchant_key: "merchant-key".to_string(),
        salt: "top-salt".to_string(),
        webhook_secret: Some("whsec".to_string()),
        base_url: None,
    }
}

fn sha512_hex(input: &str) -> String {
    let mut h = Sha512::new();
    h.update(input.as_bytes());
    hex::encode(h.finalize())
}

fn payu_body(creds: &ProviderCredentials, status: &str) -> String {
    let (txnid, amount, productinfo, firstname, email) = (
        "LSP_1724500000000_AB12CD",
        "150.00",
        "Order payment",
        "Asha",
        "asha@example.com",
    );
    let hash = sha512_hex(&format!(
        "{}|{}|||||||||||{}|{}|{}|{}|{}|{}",
        creds.salt, status, email, firstname, productinfo, amount, txnid, creds.merchant_key
    ));
    serde_urlencoded::to_string([
        ("key", creds.merchant_key.as_str()),
        ("txnid", txnid),
        ("amount", amount),
        ("productinfo", productinfo),
        ("firstname", firstname),
        ("email", email),
        ("status", status),
        ("mihpayid", "403993715531"),
        ("hash", hash.as_str()),
    ])
    .unwrap()
}

#[test]
fn payu_accepts_correctly_hashed_callback() {
    let creds = creds();
    let body = payu_body(&creds, "success");
    let adapter = PayuAdapter;

    adapter.verify_webhook(&creds, body.as_bytes(), None).unwrap();

    let parsed = adapter.parse_webhook(body.as_bytes()).unwrap();
    assert_eq!(parsed.transaction_ref, "LSP_1724500000000_AB12CD");
    assert_eq!(parsed.status, TransactionStatus::Paid);
    assert_eq!(parsed.provider_ref.as_deref(), Some("403993715531"));
}

#[test]
fn payu_rejects_tampered_amount() {
    let creds = creds();
    let body = payu_body(&creds, "success").replace("150.00", "1.00");
    assert!(PayuAdapter.verify_webhook(&creds, body.as_bytes(), None).is_err());
}

#[test]
fn payu_maps_failure_and_unknown_statuses() {
    let creds = creds();
    let adapter = PayuAdapter;

    let parsed = adapter.parse_webhook(payu_body(&creds, "failure").as_bytes()).unwrap();
    assert_eq!(parsed.status, TransactionStatus::Failed);

    let parsed = adapter.parse_webhook(payu_body(&creds, "pending").as_bytes()).unwrap();
    assert_eq!(parsed.status, TransactionStatus::Pending);

    let parsed = adapter.parse_webhook(payu_body(&creds, "dropped").as_bytes()).unwrap();
    assert_eq!(parsed.status, TransactionStatus::Cancelled);
}

#[test]
fn easebuzz_reverse_hash_roundtrip() {
    let creds = creds();
    let (txnid, amount, productinfo, firstname, email, status) = (
        "LSP_1724500000001_ZZ99XX",
        "99.50",
        "Order payment",
        "Ravi",
        "ravi@example.com",
        "success",
    );
    let hash = sha512_hex(&format!(
        "{}|{}||||||||{}|{}|{}|{}|{}|{}",
        creds.salt, status, email, firstname, productinfo, amount, txnid, creds.merchant_key
    ));
    let body = serde_urlencoded::to_string([
        ("key", creds.merchant_key.as_str()),
        ("txnid", txnid),
        ("amount", amount),
        ("productinfo", productinfo),
        ("firstname", firstname),
        ("email", email),
        ("status", status),
        ("easepayid", "EZ123456"),
        ("hash", hash.as_str()),
    ])
    .unwrap();

    let adapter = EasebuzzAdapter {
        client: reqwest::Client::new(),
        timeout_ms: 1000,
    };
    adapter.verify_webhook(&creds, body.as_bytes(), None).unwrap();

    let parsed = adapter.parse_webhook(body.as_bytes()).unwrap();
    assert_eq!(parsed.status, TransactionStatus::Paid);
    assert_eq!(parsed.provider_ref.as_deref(), Some("EZ123456"));

    // a user-abandoned payment maps to cancelled, not failed
    let cancelled = body.replace("status=success", "status=usercancel");
    let parsed = adapter.parse_webhook(cancelled.as_bytes()).unwrap();
    assert_eq!(parsed.status, TransactionStatus::Cancelled);
}

#[test]
fn razorpay_hmac_verification_and_event_mapping() {
    let creds = creds();
    let body = serde_json::json!({
        "event": "payment.captured",
        "payload": { "payment": { "entity": {
            "id": "pay_29QQoUBi66xm2f",
            "amount": 15000,
            "notes": { "transaction_id": "LSP_1724500000002_QQ11WW" }
        }}}
    })
    .to_string();

    let mut mac = Hmac::<Sha256>::new_from_slice(b"whsec").unwrap();
    mac.update(body.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    let adapter = RazorpayAdapter {
        client: reqwest::Client::new(),
        timeout_ms: 1000,
    };
    adapter
        .verify_webhook(&creds, body.as_bytes(), Some(&signature))
        .unwrap();

    // flipping one body byte invalidates the signature
    let tampered = body.replace("15000", "15001");
    assert!(adapter
        .verify_webhook(&creds, tampered.as_bytes(), Some(&signature))
        .is_err());
    // missing signature is rejected outright
    assert!(adapter.verify_webhook(&creds, body.as_bytes(), None).is_err());

    let parsed = adapter.parse_webhook(body.as_bytes()).unwrap();
    assert_eq!(parsed.transaction_ref, "LSP_1724500000002_QQ11WW");
    assert_eq!(parsed.status, TransactionStatus::Paid);
    assert_eq!(parsed.provider_ref.as_deref(), Some("pay_29QQoUBi66xm2f"));
}

#[test]
fn razorpay_failed_event_maps_to_failed() {
    let body = serde_json::json!({
        "event": "payment.failed",
        "payload": { "payment": { "entity": {
            "id": "pay_x",
            "notes": { "transaction_id": "LSP_1_AAAAAA" }
        }}}
    })
    .to_string();

    let adapter = RazorpayAdapter {
        client: reqwest::Client::new(),
        timeout_ms: 1000,
    };
    let parsed = adapter.parse_webhook(body.as_bytes()).unwrap();
    assert_eq!(parsed.status, TransactionStatus::Failed);
}

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use psp_gateway::config::AppConfig;
use psp_gateway::providers::easebuzz::EasebuzzAdapter;
use psp_gateway::providers::mock::{MockAdapter, MockBehavior};
use psp_gateway::providers::payu::PayuAdapter;
use psp_gateway::providers::razorpay::RazorpayAdapter;
use psp_gateway::providers::AdapterRegistry;
use psp_gateway::repo::assignments_repo::AssignmentsRepo;
use psp_gateway::repo::clients_repo::ClientsRepo;
use psp_gateway::repo::gateways_repo::GatewaysRepo;
use psp_gateway::repo::transactions_repo::TransactionsRepo;
use psp_gateway::repo::wallets_repo::WalletsRepo;
use psp_gateway::repo::webhook_events_repo::WebhookEventsRepo;
use psp_gateway::service::forwarder::WebhookForwarder;
use psp_gateway::service::ledger::CommissionLedger;
use psp_gateway::service::payment_service::PaymentService;
use psp_gateway::service::webhook_service::WebhookService;
use psp_gateway::vault::CredentialVault;
use psp_gateway::AppState;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    // a missing or malformed key is fatal here, never per-call
    let vault = Arc::new(CredentialVault::from_hex_key(&cfg.encryption_key)?);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let clients_repo = ClientsRepo { pool: pool.clone() };
    let gateways_repo = GatewaysRepo { pool: pool.clone() };
    let assignments_repo = AssignmentsRepo { pool: pool.clone() };
    let transactions_repo = TransactionsRepo { pool: pool.clone() };
    let wallets_repo = WalletsRepo { pool: pool.clone() };
    let webhook_events_repo = WebhookEventsRepo { pool: pool.clone() };

    let http_client = reqwest::Client::new();
    let mut adapters = AdapterRegistry::default();
    adapters.register(Arc::new(RazorpayAdapter {
        client: http_client.clone(),
        timeout_ms: cfg.provider_timeout_ms,
    }));
    adapters.register(Arc::new(PayuAdapter));
    adapters.register(Arc::new(EasebuzzAdapter {
        client: http_client.clone(),
        timeout_ms: cfg.provider_timeout_ms,
    }));
    // staging-only provider for end-to-end checks without real PSP accounts
    if std::env::var("ENABLE_MOCK_PROVIDER").is_ok() {
        adapters.register(Arc::new(MockAdapter {
            behavior: MockBehavior::AlwaysAccept,
        }));
    }

    let ledger = CommissionLedger {
        wallets_repo: wallets_repo.clone(),
    };

    let payment_service = PaymentService {
        clients_repo: clients_repo.clone(),
        gateways_repo: gateways_repo.clone(),
        assignments_repo: assignments_repo.clone(),
        transactions_repo: transactions_repo.clone(),
        vault: vault.clone(),
        adapters: adapters.clone(),
        brand_name: cfg.brand_name.clone(),
        checkout_base_url: cfg.checkout_base_url.clone(),
        order_max_attempts: cfg.order_max_attempts,
    };

    let webhook_service = WebhookService {
        transactions_repo: transactions_repo.clone(),
        clients_repo: clients_repo.clone(),
        gateways_repo: gateways_repo.clone(),
        webhook_events_repo: webhook_events_repo.clone(),
        ledger: ledger.clone(),
        vault,
        adapters,
        brand_name: cfg.brand_name.clone(),
        allow_lists: Arc::new(allow_lists_from_env()),
        trusted_proxies: Arc::new(trusted_proxies_from_env()),
    };

    // the dedicated webhook_forwarder bin can run alongside this; the
    // SKIP LOCKED claim keeps deliveries single-shot either way
    let forwarder = WebhookForwarder {
        events_repo: webhook_events_repo,
        client: http_client,
        max_attempts: cfg.forward_max_attempts,
        backoff_minutes: cfg.forward_backoff_minutes,
        request_timeout_ms: cfg.provider_timeout_ms,
    };
    tokio::spawn(forwarder.run());

    let state = AppState {
        payment_service,
        webhook_service,
        clients_repo,
        assignments_repo,
        ledger,
    };

    let admin_key = cfg.internal_api_key.clone();
    let admin_routes = Router::new()
        .route(
            "/admin/rotation/:client_id/reset",
            post(psp_gateway::http::handlers::admin::reset_rotation),
        )
        .route(
            "/admin/rotation/:client_id/advance",
            post(psp_gateway::http::handlers::admin::advance_rotation),
        )
        .route(
            "/admin/rotation/:client_id/mode",
            put(psp_gateway::http::handlers::admin::set_rotation_mode),
        )
        .route(
            "/admin/rotation/:client_id/daily-reset",
            put(psp_gateway::http::handlers::admin::set_daily_reset),
        )
        .route(
            "/admin/assignments/:assignment_id/weight",
            put(psp_gateway::http::handlers::admin::set_assignment_weight),
        )
        .route(
            "/admin/wallets/:wallet_id",
            get(psp_gateway::http::handlers::admin::wallet_statement),
        )
        .route(
            "/admin/wallets/:wallet_id/payout",
            post(psp_gateway::http::handlers::admin::manual_payout),
        )
        .layer(from_fn_with_state(
            admin_key,
            psp_gateway::http::middleware::admin_auth::require_internal_api_key,
        ));

    let app = Router::new()
        .route("/health", get(psp_gateway::http::handlers::payments::health))
        .route(
            "/payments/initiate",
            post(psp_gateway::http::handlers::payments::initiate_payment),
        )
        .route(
            "/callback/:provider",
            post(psp_gateway::http::handlers::webhooks::provider_callback),
        )
        .merge(admin_routes)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// `TRUSTED_PROXIES` format: comma-separated addresses whose
/// `x-forwarded-for` header is believed.
fn trusted_proxies_from_env() -> Vec<IpAddr> {
    std::env::var("TRUSTED_PROXIES")
        .unwrap_or_default()
        .split(',')
        .filter_map(|ip| ip.trim().parse().ok())
        .collect()
}

/// `WEBHOOK_ALLOW_LIST` format: `provider=ip,ip;provider=ip`.
fn allow_lists_from_env() -> HashMap<String, Vec<IpAddr>> {
    let raw = std::env::var("WEBHOOK_ALLOW_LIST").unwrap_or_default();
    let mut lists = HashMap::new();
    for entry in raw.split(';').filter(|e| !e.is_empty()) {
        if let Some((provider, ips)) = entry.split_once('=') {
            let parsed: Vec<IpAddr> = ips
                .split(',')
                .filter_map(|ip| ip.trim().parse().ok())
                .collect();
            if !parsed.is_empty() {
                lists.insert(provider.trim().to_string(), parsed);
            }
        }
    }
    lists
}

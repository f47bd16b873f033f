use std::sync::Arc;

use anyhow::Result;
use psp_gateway::config::AppConfig;
use psp_gateway::repo::assignments_repo::AssignmentsRepo;
use psp_gateway::repo::clients_repo::ClientsRepo;
use psp_gateway::repo::notifications_repo::NotificationsRepo;
use psp_gateway::repo::wallets_repo::WalletsRepo;
use psp_gateway::service::ledger::CommissionLedger;
use psp_gateway::service::sweeps::{HttpPayoutProvider, SweepEngine, WhatsAppAlertSender};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.database_url)
        .await?;

    let wallets_repo = WalletsRepo { pool: pool.clone() };
    let clients_repo = ClientsRepo { pool: pool.clone() };
    let assignments_repo = AssignmentsRepo { pool: pool.clone() };
    let http_client = reqwest::Client::new();

    let engine = SweepEngine {
        wallets_repo: wallets_repo.clone(),
        clients_repo: clients_repo.clone(),
        notifications_repo: NotificationsRepo { pool },
        ledger: CommissionLedger { wallets_repo },
        alert_sender: Arc::new(WhatsAppAlertSender {
            client: http_client.clone(),
            api_url: cfg.wa_api_url.clone(),
            api_key: cfg.wa_api_key.clone(),
        }),
        payout_provider: Arc::new(HttpPayoutProvider {
            client: http_client,
            api_url: cfg.payout_api_url.clone(),
            api_key: cfg.payout_api_key.clone(),
        }),
        alert_cooldown: chrono::Duration::hours(cfg.alert_cooldown_hours),
        min_payout_minor: cfg.min_payout_minor,
    };

    let mut current_day = chrono::Utc::now().date_naive();
    loop {
        // midnight rollover: reopen daily limits and restart opted-in cycles
        let today = chrono::Utc::now().date_naive();
        if today != current_day {
            match assignments_repo.reset_daily_usage().await {
                Ok(n) => tracing::info!(rows = n, "daily usage counters reset"),
                Err(err) => tracing::error!("daily usage reset failed: {err:#}"),
            }
            match clients_repo.reset_positions_for_daily_reset().await {
                Ok(n) => tracing::info!(rows = n, "rotation positions reset"),
                Err(err) => tracing::error!("rotation position reset failed: {err:#}"),
            }
            current_day = today;
        }

        if let Err(err) = engine.run_low_balance_sweep().await {
            tracing::error!("low-balance sweep failed: {err:#}");
        }
        if let Err(err) = engine.run_payout_sweep().await {
            tracing::error!("payout sweep failed: {err:#}");
        }
        tokio::time::sleep(std::time::Duration::from_secs(300)).await;
    }
}

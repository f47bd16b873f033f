use anyhow::Result;
use psp_gateway::config::AppConfig;
use psp_gateway::repo::webhook_events_repo::WebhookEventsRepo;
use psp_gateway::service::forwarder::WebhookForwarder;
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

    let forwarder = WebhookForwarder {
        events_repo: WebhookEventsRepo { pool },
        client: reqwest::Client::new(),
        max_attempts: cfg.forward_max_attempts,
        backoff_minutes: cfg.forward_backoff_minutes,
        request_timeout_ms: cfg.provider_timeout_ms,
    };

    tracing::info!("webhook forwarder started");
    forwarder.run().await;
    Ok(())
}

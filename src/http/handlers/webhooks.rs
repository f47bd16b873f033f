use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::service::webhook_service::{effective_source_ip, IngestOutcome};
use crate::AppState;

/// Provider callback endpoint: `200` on accepted-or-duplicate, `401` on a
/// bad signature, `404` for an unknown transaction reference.
pub async fn provider_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get("x-razorpay-signature")
        .or_else(|| headers.get("x-webhook-signature"))
        .and_then(|h| h.to_str().ok());

    let forwarded = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok());
    let source_ip = effective_source_ip(
        peer.ip(),
        forwarded,
        &state.webhook_service.trusted_proxies,
    );

    match state
        .webhook_service
        .ingest(&provider, Some(source_ip), signature, &body)
        .await
    {
        Ok(outcome) => (
            axum::http::StatusCode::OK,
            Json(json!({
                "success": true,
                "duplicate": outcome == IngestOutcome::Duplicate,
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

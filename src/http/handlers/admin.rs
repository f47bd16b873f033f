use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::client::RotationMode;
use crate::error::CoreError;
use crate::AppState;

#[derive(Deserialize)]
pub struct AdvanceRequest {
    #[serde(default = "default_steps")]
    pub steps: i32,
}

fn default_steps() -> i32 {
    1
}

#[derive(Deserialize)]
pub struct ModeRequest {
    pub mode: String,
}

#[derive(Deserialize)]
pub struct DailyResetRequest {
    pub enabled: bool,
}

#[derive(Deserialize)]
pub struct WeightRequest {
    pub weight: i32,
}

#[derive(Deserialize)]
pub struct PayoutRequest {
    pub amount_minor: i64,
}

pub async fn reset_rotation(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.clients_repo.reset_rotation_position(client_id).await {
        Ok(()) => Json(json!({ "client_id": client_id, "position": 0 })).into_response(),
        Err(err) => CoreError::Internal(err).into_response(),
    }
}

pub async fn advance_rotation(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Json(req): Json<AdvanceRequest>,
) -> impl IntoResponse {
    if req.steps <= 0 {
        return CoreError::Validation("steps must be > 0".to_string()).into_response();
    }
    match state.clients_repo.manual_advance(client_id, req.steps).await {
        Ok(position) => Json(json!({ "client_id": client_id, "position": position })).into_response(),
        Err(err) => CoreError::Internal(err).into_response(),
    }
}

pub async fn set_rotation_mode(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Json(req): Json<ModeRequest>,
) -> impl IntoResponse {
    let Some(mode) = RotationMode::parse(&req.mode) else {
        return CoreError::Validation(
            "mode must be one of round_robin, priority, smart".to_string(),
        )
        .into_response();
    };
    match state.clients_repo.set_rotation_mode(client_id, mode).await {
        Ok(()) => Json(json!({ "client_id": client_id, "mode": mode.as_str() })).into_response(),
        Err(err) => CoreError::Internal(err).into_response(),
    }
}

pub async fn set_daily_reset(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Json(req): Json<DailyResetRequest>,
) -> impl IntoResponse {
    match state.clients_repo.set_daily_reset(client_id, req.enabled).await {
        Ok(()) => Json(json!({ "client_id": client_id, "daily_reset": req.enabled })).into_response(),
        Err(err) => CoreError::Internal(err).into_response(),
    }
}

pub async fn set_assignment_weight(
    State(state): State<AppState>,
    Path(assignment_id): Path<Uuid>,
    Json(req): Json<WeightRequest>,
) -> impl IntoResponse {
    if req.weight <= 0 {
        return CoreError::Validation("weight must be > 0".to_string()).into_response();
    }
    match state.assignments_repo.set_weight(assignment_id, req.weight).await {
        Ok(true) => {
            Json(json!({ "assignment_id": assignment_id, "weight": req.weight })).into_response()
        }
        Ok(false) => CoreError::NotFound("assignment").into_response(),
        Err(err) => CoreError::Internal(err).into_response(),
    }
}

/// Wallet balance plus the most recent ledger entries.
pub async fn wallet_statement(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> impl IntoResponse {
    let repo = &state.ledger.wallets_repo;
    let wallet = match repo.get(wallet_id).await {
        Ok(Some(w)) => w,
        Ok(None) => return CoreError::NotFound("wallet").into_response(),
        Err(err) => return CoreError::Internal(err).into_response(),
    };
    match repo.list_entries(wallet_id, 100).await {
        Ok(entries) => {
            let entries: Vec<_> = entries
                .iter()
                .map(|e| {
                    json!({
                        "id": e.id,
                        "amount": e.amount,
                        "entry_type": e.entry_type.as_str(),
                        "transaction_id": e.transaction_id,
                        "created_at": e.created_at,
                    })
                })
                .collect();
            Json(json!({
                "wallet_id": wallet.id,
                "balance_due": wallet.balance_due,
                "warn_threshold": wallet.warn_threshold,
                "entries": entries,
            }))
            .into_response()
        }
        Err(err) => CoreError::Internal(err).into_response(),
    }
}

/// Operator-initiated payout; the sweep engine uses the same ledger path.
pub async fn manual_payout(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
    Json(req): Json<PayoutRequest>,
) -> impl IntoResponse {
    match state.ledger.payout(wallet_id, req.amount_minor).await {
        Ok(()) => Json(json!({ "wallet_id": wallet_id, "paid_out": req.amount_minor })).into_response(),
        Err(err) => err.into_response(),
    }
}

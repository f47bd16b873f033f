use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::domain::transaction::InitiatePaymentRequest;
use crate::AppState;

pub async fn initiate_payment(
    State(state): State<AppState>,
    Json(req): Json<InitiatePaymentRequest>,
) -> impl IntoResponse {
    match state.payment_service.initiate(req).await {
        Ok(resp) => (axum::http::StatusCode::OK, Json(resp)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn health() -> impl IntoResponse {
    (axum::http::StatusCode::OK, "ok")
}

use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppJson;
use crate::error::{AppError, AppResult};
use crate::services::booking::normalize_currency;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/payments/create-payment-intent", post(create_payment_intent))
}

/// Сумма уже в минимальных единицах валюты (центах).
#[derive(Debug, Deserialize)]
struct PaymentIntentRequest {
    amount: i64,
    currency: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentIntentResponse {
    client_secret: String,
}

// POST /api/payments/create-payment-intent
async fn create_payment_intent(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<PaymentIntentRequest>,
) -> AppResult<impl IntoResponse> {
    if req.amount <= 0 {
        return Err(AppError::validation("Amount must be a positive integer"));
    }
    let currency = normalize_currency(req.currency);

    let intent = state
        .payments
        .create_payment_intent(req.amount, &currency)
        .await?;

    Ok(Json(PaymentIntentResponse {
        client_secret: intent.client_secret,
    }))
}

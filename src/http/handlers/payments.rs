use crate::domain::payment::{PaymentCreateRequest, PaymentDetail, PaymentResponse};
use crate::error::SagaError;
use crate::OrchestratorState;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use std::time::Instant;
use uuid::Uuid;

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get("x-correlation-id")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub async fn create_payment(
    State(state): State<OrchestratorState>,
    headers: HeaderMap,
    Json(req): Json<PaymentCreateRequest>,
) -> Result<Json<PaymentResponse>, SagaError> {
    let correlation_id = correlation_id(&headers);

    let allowed = state
        .cache
        .take_token(&req.customer_id, state.rate_limit_per_minute)
        .await
        .map_err(|e| SagaError::Transient(e.to_string()))?;
    if !allowed {
        return Err(SagaError::RateLimited);
    }

    let started = Instant::now();
    let response = state.service.create_payment(req, &correlation_id).await?;
    state
        .service
        .metrics
        .payment_latency_seconds
        .observe(started.elapsed().as_millis() as f64 / 1_000.0);

    Ok(Json(response))
}

pub async fn get_payment(
    State(state): State<OrchestratorState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentDetail>, SagaError> {
    Ok(Json(state.service.get_payment(payment_id).await?))
}

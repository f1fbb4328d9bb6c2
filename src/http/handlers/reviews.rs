use crate::domain::risk::RiskDecision;
use crate::error::SagaError;
use crate::repo::risk_reviews_repo::RiskReviewRow;
use crate::RiskState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListReviewsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ManualReviewRequest {
    pub reviewed_by: String,
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get("x-correlation-id")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub async fn list_reviews(
    State(state): State<RiskState>,
    Query(query): Query<ListReviewsQuery>,
) -> Result<Json<Vec<RiskReviewRow>>, SagaError> {
    let status = query
        .status
        .unwrap_or_else(|| "PENDING".to_string())
        .to_uppercase();
    let limit = query.limit.unwrap_or(100).clamp(1, 1_000);
    Ok(Json(state.service.list_reviews(&status, limit).await?))
}

async fn decide(
    state: RiskState,
    payment_id: Uuid,
    decision: RiskDecision,
    req: ManualReviewRequest,
    headers: HeaderMap,
) -> Result<Json<RiskReviewRow>, SagaError> {
    if req.reviewed_by.trim().is_empty() {
        return Err(SagaError::Validation("reviewed_by must not be empty".to_string()));
    }
    let correlation_id = correlation_id(&headers);
    let row = state
        .service
        .manual_decision(payment_id, decision, &req.reviewed_by, &correlation_id)
        .await?;
    Ok(Json(row))
}

pub async fn approve_review(
    State(state): State<RiskState>,
    Path(payment_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<ManualReviewRequest>,
) -> Result<Json<RiskReviewRow>, SagaError> {
    decide(state, payment_id, RiskDecision::Approve, req, headers).await
}

pub async fn deny_review(
    State(state): State<RiskState>,
    Path(payment_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<ManualReviewRequest>,
) -> Result<Json<RiskReviewRow>, SagaError> {
    decide(state, payment_id, RiskDecision::Deny, req, headers).await
}

use crate::domain::ledger::ReconciliationReport;
use crate::error::SagaError;
use crate::service::ledger::TransactionReconciliation;
use crate::LedgerState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SweepQuery {
    pub limit: Option<i64>,
}

pub async fn reconcile_transaction(
    State(state): State<LedgerState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionReconciliation>, SagaError> {
    Ok(Json(state.service.reconcile_transaction(transaction_id).await?))
}

pub async fn reconcile_all(
    State(state): State<LedgerState>,
    Query(query): Query<SweepQuery>,
) -> Result<Json<ReconciliationReport>, SagaError> {
    let limit = query.limit.unwrap_or(1_000).clamp(1, 100_000);
    Ok(Json(state.service.reconcile_all(limit).await?))
}

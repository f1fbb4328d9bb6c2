use crate::cache::CacheStore;
use crate::domain::envelope::{topics, EventEnvelope};
use crate::domain::risk::{evaluate, RiskDecision, RiskThresholds};
use crate::error::SagaError;
use crate::metrics::Metrics;
use crate::repo::inbox_repo::InboxRepo;
use crate::repo::outbox_repo::OutboxRepo;
use crate::repo::risk_reviews_repo::{RiskReviewRow, RiskReviewsRepo};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub const SERVICE_NAME: &str = "risk";

fn transient(err: anyhow::Error) -> SagaError {
    SagaError::Transient(err.to_string())
}

#[derive(Clone)]
pub struct RiskService {
    pub pool: PgPool,
    pub reviews_repo: RiskReviewsRepo,
    pub cache: CacheStore,
    pub metrics: Arc<Metrics>,
    pub thresholds: RiskThresholds,
    pub http: reqwest::Client,
    pub orchestrator_url: String,
}

impl RiskService {
    pub async fn handle_payment_requested(&self, event: EventEnvelope) -> Result<(), SagaError> {
        let customer_id = event
            .payload
            .get("customer_id")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let amount_cents = event
            .payload
            .get("amount_cents")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        let mut tx = self.pool.begin().await.map_err(|e| transient(e.into()))?;
        if !InboxRepo::try_mark_tx(&mut tx, event.event_id, SERVICE_NAME)
            .await
            .map_err(transient)?
        {
            tx.rollback().await.map_err(|e| transient(e.into()))?;
            self.metrics.duplicate_skipped(topics::PAYMENTS_REQUESTED);
            tracing::info!(event_id = %event.event_id, "duplicate event skipped");
            return Ok(());
        }

        // Counters bump after the dedup gate so redeliveries stay invisible
        // to the velocity windows.
        let counters = self
            .cache
            .bump_velocity(&customer_id, Utc::now())
            .await
            .map_err(transient)?;
        let (decision, reason) = evaluate(amount_cents, &counters, &self.thresholds);

        if decision == RiskDecision::Review {
            RiskReviewsRepo::insert_pending_tx(
                &mut tx,
                event.aggregate_id,
                &customer_id,
                amount_cents,
                reason,
            )
            .await
            .map_err(transient)?;
        }

        let (topic, payload) = match decision {
            RiskDecision::Approve => (
                topics::RISK_APPROVED,
                serde_json::json!({
                    "decision": "APPROVE",
                    "reason": reason,
                    "customer_id": customer_id,
                }),
            ),
            _ => (
                topics::RISK_DENIED,
                serde_json::json!({
                    "decision": decision.as_str(),
                    "reason": reason,
                    "customer_id": customer_id,
                }),
            ),
        };
        let outcome = EventEnvelope::new(topic, event.aggregate_id, &event.correlation_id, payload);
        OutboxRepo::insert_tx(&mut tx, topic, &outcome)
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(|e| transient(e.into()))?;

        tracing::info!(
            payment_id = %event.aggregate_id,
            decision = decision.as_str(),
            reason,
            "risk decision"
        );
        Ok(())
    }

    pub async fn list_reviews(&self, status: &str, limit: i64) -> Result<Vec<RiskReviewRow>, SagaError> {
        self.reviews_repo
            .list(status, limit)
            .await
            .map_err(transient)
    }

    /// Validate payment state with the orchestrator before acting; the
    /// review row and the outcome event commit together through the outbox.
    pub async fn manual_decision(
        &self,
        payment_id: Uuid,
        decision: RiskDecision,
        reviewed_by: &str,
        correlation_id: &str,
    ) -> Result<RiskReviewRow, SagaError> {
        let review = self
            .reviews_repo
            .find(payment_id)
            .await
            .map_err(transient)?
            .ok_or_else(|| SagaError::NotFound(format!("review for payment {payment_id}")))?;
        if review.status != "PENDING" {
            return Err(SagaError::Conflict(format!(
                "review already finalized with status={}",
                review.status
            )));
        }

        let orchestrator_status = self.fetch_payment_status(payment_id).await?;
        if orchestrator_status != "RISK_REVIEW" {
            return Err(SagaError::Conflict(format!(
                "payment must be in RISK_REVIEW for manual decision (current={orchestrator_status})"
            )));
        }

        let (topic, review_status, reason) = match decision {
            RiskDecision::Approve => (topics::RISK_APPROVED, "APPROVED", "manual_approve"),
            RiskDecision::Deny => (topics::RISK_DENIED, "DENIED", "manual_deny"),
            RiskDecision::Review => {
                return Err(SagaError::Validation(
                    "decision must be APPROVE or DENY".to_string(),
                ))
            }
        };

        let outcome = EventEnvelope::new(
            topic,
            payment_id,
            correlation_id,
            serde_json::json!({
                "decision": decision.as_str(),
                "reason": reason,
                "customer_id": review.customer_id,
                "reviewed_by": reviewed_by,
            }),
        );

        let mut tx = self.pool.begin().await.map_err(|e| transient(e.into()))?;
        let finalized = RiskReviewsRepo::finalize_tx(
            &mut tx,
            payment_id,
            review_status,
            reviewed_by,
            outcome.event_id,
        )
        .await
        .map_err(transient)?;
        if !finalized {
            tx.rollback().await.map_err(|e| transient(e.into()))?;
            return Err(SagaError::Conflict(
                "review already finalized by another operator".to_string(),
            ));
        }
        OutboxRepo::insert_tx(&mut tx, topic, &outcome)
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(|e| transient(e.into()))?;

        tracing::info!(
            payment_id = %payment_id,
            decision = decision.as_str(),
            reviewed_by,
            "manual review decision"
        );
        self.reviews_repo
            .find(payment_id)
            .await
            .map_err(transient)?
            .ok_or_else(|| SagaError::NotFound(format!("review for payment {payment_id}")))
    }

    async fn fetch_payment_status(&self, payment_id: Uuid) -> Result<String, SagaError> {
        let url = format!("{}/payments/{}", self.orchestrator_url, payment_id);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SagaError::Transient(format!("orchestrator lookup failed: {e}")))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SagaError::NotFound(format!(
                "payment {payment_id} not known to orchestrator"
            )));
        }
        if !resp.status().is_success() {
            return Err(SagaError::Transient(format!(
                "orchestrator status check returned {}",
                resp.status()
            )));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SagaError::Transient(format!("orchestrator response malformed: {e}")))?;
        body.get("status")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| SagaError::Transient("orchestrator response missing status".to_string()))
    }
}

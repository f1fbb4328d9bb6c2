use crate::domain::envelope::{dead_letter, dlq_topic, topics, EventEnvelope};
use crate::error::SagaError;
use crate::metrics::Metrics;
use crate::provider::{
    parse_authorize_payload, retry_step, CardProvider, ProviderOutcome, RetryStep,
};
use crate::repo::inbox_repo::InboxRepo;
use crate::repo::outbox_repo::OutboxRepo;
use crate::repo::provider_attempts_repo::{NewProviderAttempt, ProviderAttemptsRepo};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

pub const SERVICE_NAME: &str = "provider-adapter";

fn transient(err: anyhow::Error) -> SagaError {
    SagaError::Transient(err.to_string())
}

#[derive(Clone)]
pub struct ProviderAdapterService {
    pub pool: PgPool,
    pub attempts_repo: ProviderAttemptsRepo,
    pub metrics: Arc<Metrics>,
    pub provider: Arc<dyn CardProvider>,
    pub max_attempts: i32,
}

impl ProviderAdapterService {
    /// Authorize flow: inbox guard, payload validation, then a bounded retry
    /// loop for the transient timeout class only. Retrying happens inside
    /// the consumer, not via broker redelivery.
    pub async fn handle_authorize_request(&self, event: EventEnvelope) -> Result<(), SagaError> {
        let request = {
            let mut tx = self.pool.begin().await.map_err(|e| transient(e.into()))?;
            if !InboxRepo::try_mark_tx(&mut tx, event.event_id, SERVICE_NAME)
                .await
                .map_err(transient)?
            {
                tx.rollback().await.map_err(|e| transient(e.into()))?;
                self.metrics
                    .duplicate_skipped(topics::PROVIDER_AUTHORIZE_REQUESTED);
                tracing::info!(event_id = %event.event_id, "duplicate event skipped");
                return Ok(());
            }

            match parse_authorize_payload(event.aggregate_id, &event.payload) {
                Ok(request) => {
                    tx.commit().await.map_err(|e| transient(e.into()))?;
                    request
                }
                Err(reason) => {
                    // Malformed payload: terminal, no retry, straight to DLQ.
                    ProviderAttemptsRepo::insert_tx(
                        &mut tx,
                        &NewProviderAttempt {
                            payment_id: event.aggregate_id,
                            event_id: event.event_id,
                            attempt_number: 1,
                            outcome: "MALFORMED".to_string(),
                            latency_ms: 0,
                            backoff_ms: 0,
                            error_code: Some(reason.clone()),
                        },
                    )
                    .await
                    .map_err(transient)?;
                    self.stage_failed_tx(&mut tx, &event, 1, 0, "NON_RETRYABLE")
                        .await?;
                    self.stage_dlq_tx(&mut tx, &event, &reason, "NON_RETRYABLE", false)
                        .await?;
                    tx.commit().await.map_err(|e| transient(e.into()))?;
                    tracing::warn!(
                        event_id = %event.event_id,
                        payment_id = %event.aggregate_id,
                        "malformed authorize request dead-lettered: {reason}"
                    );
                    return Ok(());
                }
            }
        };

        let mut attempt = 1;
        loop {
            let started = Instant::now();
            let outcome = self.provider.authorize(&request).await;
            let latency_ms = started.elapsed().as_millis() as i32;
            let step = retry_step(outcome, attempt, self.max_attempts);
            let backoff_ms = match step {
                RetryStep::RetryAfter(delay) => delay.as_millis() as i64,
                _ => 0,
            };

            self.attempts_repo
                .insert(&NewProviderAttempt {
                    payment_id: request.payment_id,
                    event_id: event.event_id,
                    attempt_number: attempt,
                    outcome: outcome.as_str().to_string(),
                    latency_ms,
                    backoff_ms,
                    error_code: match outcome {
                        ProviderOutcome::Success => None,
                        ProviderOutcome::Decline => Some("PROVIDER_DECLINE".to_string()),
                        ProviderOutcome::Timeout => Some("PROVIDER_TIMEOUT".to_string()),
                    },
                })
                .await
                .map_err(transient)?;

            match step {
                RetryStep::Emit(ProviderOutcome::Success) => {
                    let mut tx = self.pool.begin().await.map_err(|e| transient(e.into()))?;
                    let authorized = EventEnvelope::new(
                        topics::PAYMENTS_AUTHORIZED,
                        request.payment_id,
                        &event.correlation_id,
                        serde_json::json!({
                            "attempt_number": attempt,
                            "latency_ms": latency_ms,
                        }),
                    );
                    OutboxRepo::insert_tx(&mut tx, topics::PAYMENTS_AUTHORIZED, &authorized)
                        .await
                        .map_err(transient)?;
                    tx.commit().await.map_err(|e| transient(e.into()))?;
                    return Ok(());
                }
                RetryStep::Emit(_) => {
                    // Hard decline is final on the first sight.
                    let mut tx = self.pool.begin().await.map_err(|e| transient(e.into()))?;
                    self.stage_failed_tx(&mut tx, &event, attempt, latency_ms, "DECLINE")
                        .await?;
                    tx.commit().await.map_err(|e| transient(e.into()))?;
                    return Ok(());
                }
                RetryStep::RetryAfter(delay) => {
                    self.metrics
                        .retries_total
                        .with_label_values(&["provider"])
                        .inc();
                    tracing::warn!(
                        payment_id = %request.payment_id,
                        attempt,
                        backoff_ms,
                        "provider timeout, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryStep::Exhausted => {
                    let mut tx = self.pool.begin().await.map_err(|e| transient(e.into()))?;
                    self.stage_failed_tx(&mut tx, &event, attempt, latency_ms, "RETRY_EXHAUSTED")
                        .await?;
                    self.stage_dlq_tx(&mut tx, &event, "PROVIDER_TIMEOUT", "RETRY_EXHAUSTED", true)
                        .await?;
                    tx.commit().await.map_err(|e| transient(e.into()))?;
                    tracing::warn!(
                        payment_id = %request.payment_id,
                        attempts = attempt,
                        "provider retries exhausted, dead-lettered"
                    );
                    return Ok(());
                }
            }
        }
    }

    async fn stage_failed_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        event: &EventEnvelope,
        attempt: i32,
        latency_ms: i32,
        classification: &str,
    ) -> Result<(), SagaError> {
        let failed = EventEnvelope::new(
            topics::PAYMENTS_FAILED,
            event.aggregate_id,
            &event.correlation_id,
            serde_json::json!({
                "classification": classification,
                "attempt_number": attempt,
                "latency_ms": latency_ms,
            }),
        );
        OutboxRepo::insert_tx(tx, topics::PAYMENTS_FAILED, &failed)
            .await
            .map_err(transient)
    }

    async fn stage_dlq_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        event: &EventEnvelope,
        reason: &str,
        error_type: &str,
        replayable: bool,
    ) -> Result<(), SagaError> {
        let topic = dlq_topic(topics::PROVIDER_AUTHORIZE_REQUESTED);
        let replay_topic = replayable.then_some(topics::PROVIDER_AUTHORIZE_REQUESTED);
        let envelope = dead_letter(event, reason, error_type, replay_topic);
        OutboxRepo::insert_tx(tx, &topic, &envelope)
            .await
            .map_err(transient)?;
        self.metrics.dlq_published(&topic, error_type);
        Ok(())
    }
}

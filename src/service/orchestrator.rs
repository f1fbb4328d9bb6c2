use crate::cache::CacheStore;
use crate::domain::envelope::{topics, EventEnvelope};
use crate::domain::payment::{
    validate_create_request, PaymentCreateRequest, PaymentDetail, PaymentResponse, PaymentState,
};
use crate::domain::state_machine::{is_at_or_beyond, validate_transition};
use crate::error::SagaError;
use crate::metrics::Metrics;
use crate::repo::inbox_repo::InboxRepo;
use crate::repo::outbox_repo::OutboxRepo;
use crate::repo::payment_attempts_repo::{NewPaymentAttempt, PaymentAttemptsRepo};
use crate::repo::payments_repo::{NewPayment, PaymentsRepo, StoredPayment};
use crate::repo::timeline_repo::TimelineRepo;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use uuid::Uuid;

pub const SERVICE_NAME: &str = "orchestrator";

fn transient(err: anyhow::Error) -> SagaError {
    SagaError::Transient(err.to_string())
}

fn db_transient(err: sqlx::Error) -> SagaError {
    SagaError::Transient(err.to_string())
}

#[derive(Clone)]
pub struct OrchestratorService {
    pub pool: PgPool,
    pub payments_repo: PaymentsRepo,
    pub timeline_repo: TimelineRepo,
    pub cache: CacheStore,
    pub metrics: Arc<Metrics>,
    pub idempotency_ttl_seconds: u64,
}

impl OrchestratorService {
    pub async fn create_payment(
        &self,
        req: PaymentCreateRequest,
        correlation_id: &str,
    ) -> Result<PaymentResponse, SagaError> {
        validate_create_request(&req).map_err(SagaError::Validation)?;
        let currency = req.currency.to_uppercase();
        self.metrics.payment_requests_total.inc();

        // Fast path: short-lived cache resolves repeat submissions without
        // touching the unique constraint.
        match self
            .cache
            .idempotency_get(&req.customer_id, &req.idempotency_key)
            .await
        {
            Ok(Some(payment_id)) => {
                if let Some(existing) = self
                    .payments_repo
                    .find_by_id(payment_id)
                    .await
                    .map_err(transient)?
                {
                    return Ok(PaymentResponse {
                        payment_id: existing.payment_id,
                        status: existing.status,
                    });
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!("idempotency cache read failed: {err}"),
        }

        if let Some(existing) = self
            .payments_repo
            .find_by_idempotency(&req.customer_id, &req.idempotency_key)
            .await
            .map_err(transient)?
        {
            return Ok(PaymentResponse {
                payment_id: existing.payment_id,
                status: existing.status,
            });
        }

        let new_payment = NewPayment {
            payment_id: Uuid::new_v4(),
            customer_id: req.customer_id.clone(),
            amount_cents: req.amount_cents,
            currency,
            idempotency_key: req.idempotency_key.clone(),
            correlation_id: correlation_id.to_string(),
        };

        let mut tx = self.pool.begin().await.map_err(db_transient)?;
        let inserted = PaymentsRepo::insert_created_tx(&mut tx, &new_payment)
            .await
            .map_err(transient)?;
        if !inserted {
            // Racing request won the insert; hand back its row.
            tx.rollback().await.map_err(db_transient)?;
            let existing = self
                .payments_repo
                .find_by_idempotency(&req.customer_id, &req.idempotency_key)
                .await
                .map_err(transient)?
                .ok_or_else(|| {
                    SagaError::Conflict("idempotency collision with no stored payment".to_string())
                })?;
            return Ok(PaymentResponse {
                payment_id: existing.payment_id,
                status: existing.status,
            });
        }

        TimelineRepo::insert_tx(
            &mut tx,
            new_payment.payment_id,
            None,
            PaymentState::Created,
            "payment_created",
            None,
        )
        .await
        .map_err(transient)?;

        let envelope = EventEnvelope::new(
            topics::PAYMENTS_REQUESTED,
            new_payment.payment_id,
            correlation_id,
            serde_json::json!({
                "customer_id": new_payment.customer_id,
                "amount_cents": new_payment.amount_cents,
                "currency": new_payment.currency,
            }),
        );
        OutboxRepo::insert_tx(&mut tx, topics::PAYMENTS_REQUESTED, &envelope)
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(db_transient)?;

        if let Err(err) = self
            .cache
            .idempotency_put(
                &req.customer_id,
                &req.idempotency_key,
                new_payment.payment_id,
                self.idempotency_ttl_seconds,
            )
            .await
        {
            tracing::warn!("idempotency cache write failed: {err}");
        }

        tracing::info!(
            payment_id = %new_payment.payment_id,
            correlation_id = %correlation_id,
            "payment created"
        );
        Ok(PaymentResponse {
            payment_id: new_payment.payment_id,
            status: PaymentState::Created,
        })
    }

    pub async fn get_payment(&self, payment_id: Uuid) -> Result<PaymentDetail, SagaError> {
        let payment = self
            .payments_repo
            .find_by_id(payment_id)
            .await
            .map_err(transient)?
            .ok_or_else(|| SagaError::NotFound(format!("payment {payment_id}")))?;
        let timeline = self
            .timeline_repo
            .list_by_payment(payment_id)
            .await
            .map_err(transient)?;

        Ok(PaymentDetail {
            payment_id: payment.payment_id,
            customer_id: payment.customer_id,
            amount_cents: payment.amount_cents,
            currency: payment.currency,
            status: payment.status,
            state_version: payment.state_version,
            correlation_id: payment.correlation_id,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
            timeline,
        })
    }

    /// One CAS transition with its timeline row. `Ok(None)` means another
    /// worker already moved the payment at or past the target and the event
    /// is a no-op; `Err(Invariant)` means the observed state cannot legally
    /// reach the target.
    async fn transition_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        payment: &StoredPayment,
        to: PaymentState,
        reason: &str,
        event_id: Uuid,
    ) -> Result<Option<StoredPayment>, SagaError> {
        if validate_transition(payment.status, to).is_err() {
            if is_at_or_beyond(payment.status, to) {
                tracing::info!(
                    payment_id = %payment.payment_id,
                    observed = %payment.status,
                    target = %to,
                    "stale transition skipped"
                );
                return Ok(None);
            }
            return Err(SagaError::Invariant(format!(
                "invalid transition {} -> {} for payment {}",
                payment.status, to, payment.payment_id
            )));
        }

        let swapped = PaymentsRepo::cas_transition_tx(
            tx,
            payment.payment_id,
            payment.status,
            to,
            payment.state_version,
        )
        .await
        .map_err(transient)?;

        if !swapped {
            // Lost the race; re-read and classify.
            let current = PaymentsRepo::find_by_id_tx(tx, payment.payment_id)
                .await
                .map_err(transient)?
                .ok_or_else(|| {
                    SagaError::Invariant(format!("payment {} vanished mid-saga", payment.payment_id))
                })?;
            if is_at_or_beyond(current.status, to) {
                return Ok(None);
            }
            return Err(SagaError::Invariant(format!(
                "cas conflict on payment {}: observed {} while targeting {}",
                payment.payment_id, current.status, to
            )));
        }

        TimelineRepo::insert_tx(tx, payment.payment_id, Some(payment.status), to, reason, Some(event_id))
            .await
            .map_err(transient)?;

        let mut updated = payment.clone();
        updated.status = to;
        updated.state_version += 1;
        Ok(Some(updated))
    }

    async fn begin_handling(
        &self,
        event: &EventEnvelope,
        topic: &str,
    ) -> Result<Option<(Transaction<'static, Postgres>, StoredPayment)>, SagaError> {
        let mut tx = self.pool.begin().await.map_err(db_transient)?;
        if !InboxRepo::try_mark_tx(&mut tx, event.event_id, SERVICE_NAME)
            .await
            .map_err(transient)?
        {
            tx.rollback().await.map_err(db_transient)?;
            self.metrics.duplicate_skipped(topic);
            tracing::info!(topic = %topic, event_id = %event.event_id, "duplicate event skipped");
            return Ok(None);
        }

        match PaymentsRepo::find_by_id_tx(&mut tx, event.aggregate_id)
            .await
            .map_err(transient)?
        {
            Some(payment) => Ok(Some((tx, payment))),
            None => {
                // Unknown aggregate: keep the inbox mark so redeliveries stay
                // quiet, nothing else to do.
                tracing::warn!(topic = %topic, payment_id = %event.aggregate_id, "event for unknown payment");
                tx.commit().await.map_err(db_transient)?;
                Ok(None)
            }
        }
    }

    fn observe_terminal(&self, payment: &StoredPayment, terminal: PaymentState) {
        let elapsed = (Utc::now() - payment.created_at).num_milliseconds().max(0) as f64 / 1_000.0;
        self.metrics
            .payment_e2e_seconds
            .with_label_values(&[terminal.as_str()])
            .observe(elapsed);
    }

    pub async fn handle_risk_approved(&self, event: EventEnvelope) -> Result<(), SagaError> {
        let Some((mut tx, payment)) = self.begin_handling(&event, topics::RISK_APPROVED).await?
        else {
            return Ok(());
        };

        let applied = self
            .transition_tx(&mut tx, &payment, PaymentState::Approved, "risk_approved", event.event_id)
            .await?;

        if let Some(updated) = applied {
            let authorize = EventEnvelope::new(
                topics::PROVIDER_AUTHORIZE_REQUESTED,
                updated.payment_id,
                &event.correlation_id,
                serde_json::json!({
                    "customer_id": updated.customer_id,
                    "amount_cents": updated.amount_cents,
                    "currency": updated.currency,
                }),
            );
            OutboxRepo::insert_tx(&mut tx, topics::PROVIDER_AUTHORIZE_REQUESTED, &authorize)
                .await
                .map_err(transient)?;
        }
        tx.commit().await.map_err(db_transient)?;
        Ok(())
    }

    pub async fn handle_risk_denied(&self, event: EventEnvelope) -> Result<(), SagaError> {
        let Some((mut tx, payment)) = self.begin_handling(&event, topics::RISK_DENIED).await?
        else {
            return Ok(());
        };

        let decision = event
            .payload
            .get("decision")
            .and_then(|v| v.as_str())
            .unwrap_or("DENY");

        if decision == "REVIEW" {
            self.transition_tx(
                &mut tx,
                &payment,
                PaymentState::RiskReview,
                "risk_review_required",
                event.event_id,
            )
            .await?;
            tx.commit().await.map_err(db_transient)?;
            return Ok(());
        }

        let applied = self
            .transition_tx(&mut tx, &payment, PaymentState::Failed, "risk_denied", event.event_id)
            .await?;
        if let Some(updated) = applied {
            let failed = EventEnvelope::new(
                topics::PAYMENTS_FAILED,
                updated.payment_id,
                &event.correlation_id,
                serde_json::json!({
                    "classification": "RISK_DENIED",
                    "reason": event.payload.get("reason").cloned().unwrap_or_default(),
                }),
            );
            OutboxRepo::insert_tx(&mut tx, topics::PAYMENTS_FAILED, &failed)
                .await
                .map_err(transient)?;
        }
        tx.commit().await.map_err(db_transient)?;

        self.metrics.payment_failure_total.inc();
        self.observe_terminal(&payment, PaymentState::Failed);
        if let Err(err) = self.cache.record_failure(&payment.customer_id).await {
            tracing::warn!("failure counter bump failed: {err}");
        }
        Ok(())
    }

    pub async fn handle_authorized(&self, event: EventEnvelope) -> Result<(), SagaError> {
        let Some((mut tx, payment)) = self
            .begin_handling(&event, topics::PAYMENTS_AUTHORIZED)
            .await?
        else {
            return Ok(());
        };

        let authorized = self
            .transition_tx(
                &mut tx,
                &payment,
                PaymentState::Authorized,
                "provider_authorized",
                event.event_id,
            )
            .await?;

        let Some(authorized) = authorized else {
            tx.commit().await.map_err(db_transient)?;
            return Ok(());
        };

        // Auto-capture immediately after authorization.
        let captured = self
            .transition_tx(
                &mut tx,
                &authorized,
                PaymentState::Captured,
                "capture_requested",
                event.event_id,
            )
            .await?;

        PaymentAttemptsRepo::insert_tx(
            &mut tx,
            &NewPaymentAttempt {
                payment_id: payment.payment_id,
                attempt_number: event
                    .payload
                    .get("attempt_number")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(1) as i32,
                result: "AUTHORIZED".to_string(),
                latency_ms: event
                    .payload
                    .get("latency_ms")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0) as i32,
                error_code: None,
            },
        )
        .await
        .map_err(transient)?;

        if captured.is_some() {
            let captured_event = EventEnvelope::new(
                topics::PAYMENTS_CAPTURED,
                payment.payment_id,
                &event.correlation_id,
                serde_json::json!({
                    "customer_id": payment.customer_id,
                    "amount_cents": payment.amount_cents,
                    "currency": payment.currency,
                }),
            );
            OutboxRepo::insert_tx(&mut tx, topics::PAYMENTS_CAPTURED, &captured_event)
                .await
                .map_err(transient)?;
        }
        tx.commit().await.map_err(db_transient)?;
        Ok(())
    }

    pub async fn handle_provider_failed(&self, event: EventEnvelope) -> Result<(), SagaError> {
        let classification = event
            .payload
            .get("classification")
            .and_then(|v| v.as_str())
            .unwrap_or("UNKNOWN")
            .to_string();

        let Some((mut tx, payment)) = self.begin_handling(&event, topics::PAYMENTS_FAILED).await?
        else {
            return Ok(());
        };

        if classification == "RISK_DENIED" {
            // Our own terminal event looping back; notification owns it.
            tx.commit().await.map_err(db_transient)?;
            return Ok(());
        }

        PaymentAttemptsRepo::insert_tx(
            &mut tx,
            &NewPaymentAttempt {
                payment_id: payment.payment_id,
                attempt_number: event
                    .payload
                    .get("attempt_number")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(1) as i32,
                result: "FAILED".to_string(),
                latency_ms: event
                    .payload
                    .get("latency_ms")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0) as i32,
                error_code: Some(classification.clone()),
            },
        )
        .await
        .map_err(transient)?;

        // Timeout exhaustion against an already-authorized payment is
        // compensated, not failed: the hold must be released.
        let terminal = if classification == "RETRY_EXHAUSTED"
            && payment.status == PaymentState::Authorized
        {
            let applied = self
                .transition_tx(
                    &mut tx,
                    &payment,
                    PaymentState::Reversed,
                    "capture_timeout_compensation",
                    event.event_id,
                )
                .await?;
            if applied.is_some() {
                let reversed = EventEnvelope::new(
                    topics::PAYMENTS_REVERSED,
                    payment.payment_id,
                    &event.correlation_id,
                    serde_json::json!({
                        "reason": "capture_timeout_compensation",
                        "source_event_id": event.event_id,
                    }),
                );
                OutboxRepo::insert_tx(&mut tx, topics::PAYMENTS_REVERSED, &reversed)
                    .await
                    .map_err(transient)?;
            }
            PaymentState::Reversed
        } else {
            if payment.status != PaymentState::Failed {
                self.transition_tx(
                    &mut tx,
                    &payment,
                    PaymentState::Failed,
                    &format!("provider_failed:{classification}"),
                    event.event_id,
                )
                .await?;
            }
            PaymentState::Failed
        };

        tx.commit().await.map_err(db_transient)?;

        self.metrics.payment_failure_total.inc();
        self.observe_terminal(&payment, terminal);
        if let Err(err) = self.cache.record_failure(&payment.customer_id).await {
            tracing::warn!("failure counter bump failed: {err}");
        }
        Ok(())
    }

    pub async fn handle_settled(&self, event: EventEnvelope) -> Result<(), SagaError> {
        let Some((mut tx, payment)) = self.begin_handling(&event, topics::PAYMENTS_SETTLED).await?
        else {
            return Ok(());
        };

        let applied = self
            .transition_tx(&mut tx, &payment, PaymentState::Settled, "ledger_settled", event.event_id)
            .await?;
        tx.commit().await.map_err(db_transient)?;

        if applied.is_some() {
            self.metrics.payment_success_total.inc();
            self.observe_terminal(&payment, PaymentState::Settled);
        }
        Ok(())
    }
}

use crate::broker::EventBus;
use crate::domain::envelope::EventEnvelope;
use crate::metrics::Metrics;
use crate::repo::outbox_repo::{attempts_exhausted, OutboxRepo};
use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Drains the service-local outbox to the broker. Any number of publishers
/// can run against the same table; stale PROCESSING claims from a crashed
/// worker are reclaimed after the reclaim timeout and the downstream inbox
/// absorbs the resulting double publish.
#[derive(Clone)]
pub struct OutboxPublisher {
    pub outbox_repo: OutboxRepo,
    pub bus: EventBus,
    pub metrics: Arc<Metrics>,
    pub batch_size: i64,
    pub reclaim_seconds: i64,
    pub max_attempts: i32,
}

impl OutboxPublisher {
    pub async fn run(self) {
        loop {
            if let Err(err) = self.tick().await {
                tracing::error!("outbox publisher error: {err}");
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }

    pub async fn tick(&self) -> Result<()> {
        let stale_before = Utc::now() - Duration::seconds(self.reclaim_seconds);
        let batch = self.outbox_repo.claim_batch(self.batch_size, stale_before).await?;

        for item in &batch {
            let envelope: EventEnvelope = match serde_json::from_value(item.payload.clone()) {
                Ok(envelope) => envelope,
                Err(err) => {
                    // A row we cannot decode will never publish; park it.
                    tracing::error!(event_id = %item.event_id, "undecodable outbox payload: {err}");
                    self.outbox_repo.mark_failed(item.event_id, item.claim_token).await?;
                    self.metrics.outbox_failed_total.inc();
                    continue;
                }
            };

            match self.bus.publish(&item.topic, &envelope).await {
                Ok(()) => {
                    self.outbox_repo.mark_published(item.event_id, item.claim_token).await?;
                }
                Err(err) => {
                    tracing::warn!(
                        event_id = %item.event_id,
                        topic = %item.topic,
                        attempts = item.attempts,
                        "outbox publish failed: {err}"
                    );
                    if attempts_exhausted(item.attempts + 1, self.max_attempts) {
                        self.outbox_repo.mark_failed(item.event_id, item.claim_token).await?;
                        self.metrics.outbox_failed_total.inc();
                        tracing::error!(
                            event_id = %item.event_id,
                            topic = %item.topic,
                            "outbox row parked as FAILED after repeated publish failures"
                        );
                    } else {
                        self.outbox_repo.release(item.event_id, item.claim_token).await?;
                    }
                }
            }
        }

        let backlog = self.outbox_repo.backlog().await?;
        self.metrics.outbox_pending_total.set(backlog.pending);
        self.metrics
            .outbox_oldest_pending_age_seconds
            .set(backlog.oldest_age_seconds);

        Ok(())
    }
}

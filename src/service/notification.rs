use crate::domain::envelope::EventEnvelope;
use crate::error::SagaError;
use crate::metrics::Metrics;
use crate::repo::inbox_repo::InboxRepo;
use crate::repo::notification_repo::NotificationRepo;
use sqlx::PgPool;
use std::sync::Arc;

pub const SERVICE_NAME: &str = "notification";

fn transient(err: anyhow::Error) -> SagaError {
    SagaError::Transient(err.to_string())
}

#[derive(Clone)]
pub struct NotificationService {
    pub pool: PgPool,
    pub repo: NotificationRepo,
    pub metrics: Arc<Metrics>,
}

impl NotificationService {
    pub async fn handle_terminal(&self, event: EventEnvelope) -> Result<(), SagaError> {
        let mut tx = self.pool.begin().await.map_err(|e| transient(e.into()))?;
        if !InboxRepo::try_mark_tx(&mut tx, event.event_id, SERVICE_NAME)
            .await
            .map_err(transient)?
        {
            tx.rollback().await.map_err(|e| transient(e.into()))?;
            self.metrics.duplicate_skipped(&event.event_type);
            tracing::info!(
                topic = %event.event_type,
                event_id = %event.event_id,
                "duplicate event skipped"
            );
            return Ok(());
        }

        let message = format!("payment {} reached {}", event.aggregate_id, event.event_type);
        NotificationRepo::insert_tx(&mut tx, event.aggregate_id, &event.event_type, &message)
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(|e| transient(e.into()))?;

        tracing::info!(payment_id = %event.aggregate_id, outcome = %event.event_type, "notification recorded");
        Ok(())
    }
}

use crate::domain::envelope::EventEnvelope;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ClaimedEvent {
    pub event_id: Uuid,
    pub topic: String,
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub claim_token: Uuid,
}

#[derive(Debug, Clone, Copy)]
pub struct OutboxBacklog {
    pub pending: i64,
    pub oldest_age_seconds: f64,
}

#[derive(Clone)]
pub struct OutboxRepo {
    pub pool: PgPool,
}

impl OutboxRepo {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        topic: &str,
        event: &EventEnvelope,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox_events (event_id, aggregate_id, topic, payload, status, attempts)
            VALUES ($1, $2, $3, $4, 'PENDING', 0)
            "#,
        )
        .bind(event.event_id)
        .bind(event.aggregate_id)
        .bind(topic)
        .bind(serde_json::to_value(event)?)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    }

    /// Claim a batch of publishable rows: PENDING rows plus PROCESSING rows
    /// whose claim went stale. Skip-locked so concurrent publishers never
    /// hand out the same row twice.
    pub async fn claim_batch(
        &self,
        limit: i64,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<ClaimedEvent>> {
        let claim_token = Uuid::new_v4();
        let rows = sqlx::query(
            r#"
            WITH claimable AS (
                SELECT event_id
                FROM outbox_events
                WHERE status = 'PENDING'
                   OR (status = 'PROCESSING' AND claimed_at < $2)
                ORDER BY created_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE outbox_events o
            SET status = 'PROCESSING', claim_token = $3, claimed_at = now()
            FROM claimable c
            WHERE o.event_id = c.event_id
            RETURNING o.event_id, o.topic, o.payload, o.attempts
            "#,
        )
        .bind(limit)
        .bind(stale_before)
        .bind(claim_token)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ClaimedEvent {
                event_id: r.get("event_id"),
                topic: r.get("topic"),
                payload: r.get("payload"),
                attempts: r.get("attempts"),
                claim_token,
            })
            .collect())
    }

    pub async fn mark_published(&self, event_id: Uuid, claim_token: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = 'PUBLISHED', published_at = now()
            WHERE event_id = $1 AND claim_token = $2 AND status = 'PROCESSING'
            "#,
        )
        .bind(event_id)
        .bind(claim_token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn release(&self, event_id: Uuid, claim_token: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = 'PENDING', claim_token = NULL, claimed_at = NULL, attempts = attempts + 1
            WHERE event_id = $1 AND claim_token = $2 AND status = 'PROCESSING'
            "#,
        )
        .bind(event_id)
        .bind(claim_token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, event_id: Uuid, claim_token: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = 'FAILED', claim_token = NULL, claimed_at = NULL, attempts = attempts + 1
            WHERE event_id = $1 AND claim_token = $2 AND status = 'PROCESSING'
            "#,
        )
        .bind(event_id)
        .bind(claim_token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn backlog(&self) -> Result<OutboxBacklog> {
        let row = sqlx::query(
            r#"
            SELECT count(*) AS pending, min(created_at) AS oldest
            FROM outbox_events
            WHERE status IN ('PENDING', 'PROCESSING')
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let pending: i64 = row.get("pending");
        let oldest: Option<DateTime<Utc>> = row.get("oldest");
        let oldest_age_seconds = oldest
            .map(|t| (Utc::now() - t).num_milliseconds().max(0) as f64 / 1_000.0)
            .unwrap_or(0.0);

        Ok(OutboxBacklog {
            pending,
            oldest_age_seconds,
        })
    }
}

/// Whether a publish failure should park the row as FAILED instead of
/// releasing it for another attempt.
pub fn attempts_exhausted(attempts_after_failure: i32, max_attempts: i32) -> bool {
    attempts_after_failure >= max_attempts
}

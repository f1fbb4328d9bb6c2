use anyhow::Result;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewProviderAttempt {
    pub payment_id: Uuid,
    pub event_id: Uuid,
    pub attempt_number: i32,
    pub outcome: String,
    pub latency_ms: i32,
    pub backoff_ms: i64,
    pub error_code: Option<String>,
}

#[derive(Clone)]
pub struct ProviderAttemptsRepo {
    pub pool: PgPool,
}

impl ProviderAttemptsRepo {
    pub async fn insert(&self, attempt: &NewProviderAttempt) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_tx(&mut tx, attempt).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        attempt: &NewProviderAttempt,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO provider_attempts (
                attempt_id, payment_id, event_id, attempt_number, outcome, latency_ms, backoff_ms, error_code
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(attempt.payment_id)
        .bind(attempt.event_id)
        .bind(attempt.attempt_number)
        .bind(&attempt.outcome)
        .bind(attempt.latency_ms)
        .bind(attempt.backoff_ms)
        .bind(&attempt.error_code)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    }
}

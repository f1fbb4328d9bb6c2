use anyhow::Result;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewPaymentAttempt {
    pub payment_id: Uuid,
    pub attempt_number: i32,
    pub result: String,
    pub latency_ms: i32,
    pub error_code: Option<String>,
}

#[derive(Clone)]
pub struct PaymentAttemptsRepo {
    pub pool: PgPool,
}

impl PaymentAttemptsRepo {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        attempt: &NewPaymentAttempt,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_attempts (attempt_id, payment_id, attempt_number, result, latency_ms, error_code)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(attempt.payment_id)
        .bind(attempt.attempt_number)
        .bind(&attempt.result)
        .bind(attempt.latency_ms)
        .bind(&attempt.error_code)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    }
}

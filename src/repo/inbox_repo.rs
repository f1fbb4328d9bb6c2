use anyhow::Result;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Clone)]
pub struct InboxRepo {
    pub pool: PgPool,
}

impl InboxRepo {
    /// Record that this consumer processed the event. Returns false when the
    /// row already exists, which means every side effect of a prior delivery
    /// is already committed and the handler must short-circuit.
    pub async fn try_mark_tx(
        tx: &mut Transaction<'_, Postgres>,
        event_id: Uuid,
        consumer_service: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO inbox_events (event_id, consumer_service)
            VALUES ($1, $2)
            ON CONFLICT (event_id, consumer_service) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(consumer_service)
        .execute(tx.as_mut())
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

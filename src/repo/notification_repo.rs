use anyhow::Result;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Clone)]
pub struct NotificationRepo {
    pub pool: PgPool,
}

impl NotificationRepo {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        payment_id: Uuid,
        outcome: &str,
        message: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_log (notification_id, payment_id, outcome, message)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payment_id)
        .bind(outcome)
        .bind(message)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    }
}

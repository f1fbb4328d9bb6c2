use crate::domain::payment::{PaymentState, TimelineEntry};
use anyhow::Result;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

#[derive(Clone)]
pub struct TimelineRepo {
    pub pool: PgPool,
}

impl TimelineRepo {
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        payment_id: Uuid,
        from_state: Option<PaymentState>,
        to_state: PaymentState,
        reason: &str,
        event_id: Option<Uuid>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_timeline (timeline_id, payment_id, from_state, to_state, reason, event_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payment_id)
        .bind(from_state.map(|s| s.as_str()))
        .bind(to_state.as_str())
        .bind(reason)
        .bind(event_id)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    }

    pub async fn list_by_payment(&self, payment_id: Uuid) -> Result<Vec<TimelineEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT from_state, to_state, reason, event_id, created_at
            FROM payment_timeline
            WHERE payment_id = $1
            ORDER BY created_at ASC, timeline_id ASC
            "#,
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let from_raw: Option<String> = r.get("from_state");
                let to_raw: String = r.get("to_state");
                let to_state = PaymentState::parse(&to_raw)
                    .ok_or_else(|| anyhow::anyhow!("unknown timeline state: {to_raw}"))?;
                Ok(TimelineEntry {
                    from_state: from_raw.as_deref().and_then(PaymentState::parse),
                    to_state,
                    reason: r.get("reason"),
                    event_id: r.get("event_id"),
                    created_at: r.get("created_at"),
                })
            })
            .collect()
    }
}

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct RiskReviewRow {
    pub payment_id: Uuid,
    pub customer_id: String,
    pub amount_cents: i64,
    pub reason: String,
    pub status: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub decision_event_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct RiskReviewsRepo {
    pub pool: PgPool,
}

fn from_row(r: &PgRow) -> RiskReviewRow {
    RiskReviewRow {
        payment_id: r.get("payment_id"),
        customer_id: r.get("customer_id"),
        amount_cents: r.get("amount_cents"),
        reason: r.get("reason"),
        status: r.get("status"),
        reviewed_by: r.get("reviewed_by"),
        reviewed_at: r.get("reviewed_at"),
        decision_event_id: r.get("decision_event_id"),
        created_at: r.get("created_at"),
    }
}

impl RiskReviewsRepo {
    pub async fn insert_pending_tx(
        tx: &mut Transaction<'_, Postgres>,
        payment_id: Uuid,
        customer_id: &str,
        amount_cents: i64,
        reason: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO risk_reviews (payment_id, customer_id, amount_cents, reason, status)
            VALUES ($1, $2, $3, $4, 'PENDING')
            ON CONFLICT (payment_id) DO NOTHING
            "#,
        )
        .bind(payment_id)
        .bind(customer_id)
        .bind(amount_cents)
        .bind(reason)
        .execute(tx.as_mut())
        .await?;

        Ok(())
    }

    pub async fn find(&self, payment_id: Uuid) -> Result<Option<RiskReviewRow>> {
        let row = sqlx::query("SELECT * FROM risk_reviews WHERE payment_id = $1")
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| from_row(&r)))
    }

    pub async fn list(&self, status: &str, limit: i64) -> Result<Vec<RiskReviewRow>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM risk_reviews
            WHERE status = $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(from_row).collect())
    }

    /// Finalize one PENDING review. Returns false when another operator got
    /// there first.
    pub async fn finalize_tx(
        tx: &mut Transaction<'_, Postgres>,
        payment_id: Uuid,
        status: &str,
        reviewed_by: &str,
        decision_event_id: Uuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE risk_reviews
            SET status = $2, reviewed_by = $3, reviewed_at = now(), decision_event_id = $4
            WHERE payment_id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(payment_id)
        .bind(status)
        .bind(reviewed_by)
        .bind(decision_event_id)
        .execute(tx.as_mut())
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

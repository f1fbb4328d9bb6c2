use crate::domain::payment::PaymentState;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredPayment {
    pub payment_id: Uuid,
    pub customer_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentState,
    pub state_version: i32,
    pub idempotency_key: String,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payment_id: Uuid,
    pub customer_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub idempotency_key: String,
    pub correlation_id: String,
}

#[derive(Clone)]
pub struct PaymentsRepo {
    pub pool: PgPool,
}

fn from_row(r: &PgRow) -> Result<StoredPayment> {
    let status_raw: String = r.get("status");
    let status = PaymentState::parse(&status_raw)
        .ok_or_else(|| anyhow::anyhow!("unknown payment status in store: {status_raw}"))?;
    Ok(StoredPayment {
        payment_id: r.get("payment_id"),
        customer_id: r.get("customer_id"),
        amount_cents: r.get("amount_cents"),
        currency: r.get("currency"),
        status,
        state_version: r.get("state_version"),
        idempotency_key: r.get("idempotency_key"),
        correlation_id: r.get("correlation_id"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

const SELECT_COLS: &str = r#"
    SELECT payment_id, customer_id, amount_cents, currency, status, state_version,
           idempotency_key, correlation_id, created_at, updated_at
    FROM payments
"#;

impl PaymentsRepo {
    /// Insert guarded by the (customer_id, idempotency_key) unique
    /// constraint. Returns false when a racing request already inserted the
    /// row; the caller reads it back and returns the existing record.
    pub async fn insert_created_tx(
        tx: &mut Transaction<'_, Postgres>,
        data: &NewPayment,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (
                payment_id, customer_id, amount_cents, currency, status, state_version,
                idempotency_key, correlation_id
            ) VALUES ($1, $2, $3, $4, 'CREATED', 0, $5, $6)
            ON CONFLICT (customer_id, idempotency_key) DO NOTHING
            "#,
        )
        .bind(data.payment_id)
        .bind(&data.customer_id)
        .bind(data.amount_cents)
        .bind(&data.currency)
        .bind(&data.idempotency_key)
        .bind(&data.correlation_id)
        .execute(tx.as_mut())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<StoredPayment>> {
        let row = sqlx::query(&format!("{SELECT_COLS} WHERE payment_id = $1"))
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| from_row(&r)).transpose()
    }

    pub async fn find_by_id_tx(
        tx: &mut Transaction<'_, Postgres>,
        payment_id: Uuid,
    ) -> Result<Option<StoredPayment>> {
        let row = sqlx::query(&format!("{SELECT_COLS} WHERE payment_id = $1"))
            .bind(payment_id)
            .fetch_optional(tx.as_mut())
            .await?;
        row.map(|r| from_row(&r)).transpose()
    }

    pub async fn find_by_idempotency(
        &self,
        customer_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<StoredPayment>> {
        let row = sqlx::query(&format!(
            "{SELECT_COLS} WHERE customer_id = $1 AND idempotency_key = $2"
        ))
        .bind(customer_id)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| from_row(&r)).transpose()
    }

    /// Compare-and-swap transition. Succeeds only when both the current
    /// status and the state_version match; the version advances by exactly
    /// one on success.
    pub async fn cas_transition_tx(
        tx: &mut Transaction<'_, Postgres>,
        payment_id: Uuid,
        from: PaymentState,
        to: PaymentState,
        expected_version: i32,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $3, state_version = state_version + 1, updated_at = now()
            WHERE payment_id = $1 AND status = $2 AND state_version = $4
            "#,
        )
        .bind(payment_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(expected_version)
        .execute(tx.as_mut())
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

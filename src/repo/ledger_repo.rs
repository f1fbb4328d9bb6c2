use crate::domain::ledger::{Direction, LedgerEntryRow, TransactionBalance};
use anyhow::Result;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

#[derive(Clone)]
pub struct LedgerRepo {
    pub pool: PgPool,
}

impl LedgerRepo {
    /// Bootstrap the chart of accounts. Idempotent; safe to run at every
    /// startup.
    pub async fn ensure_accounts(&self, accounts: &[(&str, &str)]) -> Result<()> {
        for (account_id, account_type) in accounts {
            sqlx::query(
                r#"
                INSERT INTO accounts (account_id, account_type, balance_cents)
                VALUES ($1, $2, 0)
                ON CONFLICT (account_id) DO NOTHING
                "#,
            )
            .bind(account_id)
            .bind(account_type)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Insert one append-only entry and move the running account balance.
    /// The entries table rejects UPDATE/DELETE at the storage layer.
    pub async fn post_entry_tx(
        tx: &mut Transaction<'_, Postgres>,
        transaction_id: Uuid,
        account_id: &str,
        direction: Direction,
        amount_cents: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (entry_id, transaction_id, account_id, direction, amount_cents)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(transaction_id)
        .bind(account_id)
        .bind(direction.as_str())
        .bind(amount_cents)
        .execute(tx.as_mut())
        .await?;

        let delta = match direction {
            Direction::Debit => -amount_cents,
            Direction::Credit => amount_cents,
        };
        sqlx::query("UPDATE accounts SET balance_cents = balance_cents + $2 WHERE account_id = $1")
            .bind(account_id)
            .bind(delta)
            .execute(tx.as_mut())
            .await?;

        Ok(())
    }

    pub async fn entries_for(&self, transaction_id: Uuid) -> Result<Vec<LedgerEntryRow>> {
        let rows = sqlx::query(
            r#"
            SELECT entry_id, transaction_id, account_id, direction, amount_cents, created_at
            FROM ledger_entries
            WHERE transaction_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let direction_raw: String = r.get("direction");
                let direction = Direction::parse(&direction_raw)
                    .ok_or_else(|| anyhow::anyhow!("unknown entry direction: {direction_raw}"))?;
                Ok(LedgerEntryRow {
                    entry_id: r.get("entry_id"),
                    transaction_id: r.get("transaction_id"),
                    account_id: r.get("account_id"),
                    direction,
                    amount_cents: r.get("amount_cents"),
                    created_at: r.get("created_at"),
                })
            })
            .collect()
    }

    pub async fn entries_for_tx(
        tx: &mut Transaction<'_, Postgres>,
        transaction_id: Uuid,
    ) -> Result<Vec<(Direction, i64)>> {
        let rows = sqlx::query(
            "SELECT direction, amount_cents FROM ledger_entries WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .fetch_all(tx.as_mut())
        .await?;

        rows.into_iter()
            .map(|r| {
                let direction_raw: String = r.get("direction");
                let direction = Direction::parse(&direction_raw)
                    .ok_or_else(|| anyhow::anyhow!("unknown entry direction: {direction_raw}"))?;
                Ok((direction, r.get("amount_cents")))
            })
            .collect()
    }

    pub async fn balances_by_transaction(&self, limit: i64) -> Result<Vec<TransactionBalance>> {
        let rows = sqlx::query(
            r#"
            SELECT transaction_id,
                   coalesce(sum(amount_cents) FILTER (WHERE direction = 'DEBIT'), 0) AS debits,
                   coalesce(sum(amount_cents) FILTER (WHERE direction = 'CREDIT'), 0) AS credits,
                   count(*) AS entry_count
            FROM ledger_entries
            GROUP BY transaction_id
            ORDER BY transaction_id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| TransactionBalance {
                transaction_id: r.get("transaction_id"),
                debits: r.get("debits"),
                credits: r.get("credits"),
                entry_count: r.get("entry_count"),
            })
            .collect())
    }
}

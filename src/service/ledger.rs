use crate::domain::envelope::{topics, EventEnvelope};
use crate::domain::ledger::{build_report, Direction, ReconciliationReport, TransactionBalance};
use crate::error::SagaError;
use crate::metrics::Metrics;
use crate::repo::inbox_repo::InboxRepo;
use crate::repo::ledger_repo::LedgerRepo;
use crate::repo::outbox_repo::OutboxRepo;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub const SERVICE_NAME: &str = "ledger";

fn transient(err: anyhow::Error) -> SagaError {
    SagaError::Transient(err.to_string())
}

#[derive(Debug, Serialize)]
pub struct TransactionReconciliation {
    pub transaction_id: Uuid,
    pub balanced: bool,
    pub debits: i64,
    pub credits: i64,
    pub delta: i64,
    pub entries: Vec<crate::domain::ledger::LedgerEntryRow>,
}

#[derive(Clone)]
pub struct LedgerService {
    pub pool: PgPool,
    pub ledger_repo: LedgerRepo,
    pub metrics: Arc<Metrics>,
    pub debit_account: String,
    pub credit_account: String,
}

impl LedgerService {
    pub async fn ensure_accounts(&self) -> Result<(), SagaError> {
        self.ledger_repo
            .ensure_accounts(&[
                (self.debit_account.as_str(), "CUSTOMER"),
                (self.credit_account.as_str(), "MERCHANT"),
                ("platform_fee", "PLATFORM"),
                ("clearing", "CLEARING"),
            ])
            .await
            .map_err(transient)
    }

    /// Post the balanced double entry for one captured payment and stage
    /// `payments.settled`, all in the inbox transaction.
    pub async fn handle_captured(&self, event: EventEnvelope) -> Result<(), SagaError> {
        let amount_cents = event
            .payload
            .get("amount_cents")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| {
                SagaError::Invariant(format!(
                    "capture event {} missing amount_cents",
                    event.event_id
                ))
            })?;
        let transaction_id = event.aggregate_id;

        let mut tx = self.pool.begin().await.map_err(|e| transient(e.into()))?;
        if !InboxRepo::try_mark_tx(&mut tx, event.event_id, SERVICE_NAME)
            .await
            .map_err(transient)?
        {
            tx.rollback().await.map_err(|e| transient(e.into()))?;
            self.metrics.duplicate_skipped(topics::PAYMENTS_CAPTURED);
            tracing::info!(event_id = %event.event_id, "duplicate event skipped");
            return Ok(());
        }

        LedgerRepo::post_entry_tx(
            &mut tx,
            transaction_id,
            &self.debit_account,
            Direction::Debit,
            amount_cents,
        )
        .await
        .map_err(transient)?;
        LedgerRepo::post_entry_tx(
            &mut tx,
            transaction_id,
            &self.credit_account,
            Direction::Credit,
            amount_cents,
        )
        .await
        .map_err(transient)?;

        // Balance assertion before anything commits.
        let entries = LedgerRepo::entries_for_tx(&mut tx, transaction_id)
            .await
            .map_err(transient)?;
        let debits: i64 = entries
            .iter()
            .filter(|(d, _)| *d == Direction::Debit)
            .map(|(_, a)| a)
            .sum();
        let credits: i64 = entries
            .iter()
            .filter(|(d, _)| *d == Direction::Credit)
            .map(|(_, a)| a)
            .sum();
        if debits != credits {
            return Err(SagaError::Invariant(format!(
                "ledger imbalance for transaction {transaction_id}: debits={debits} credits={credits}"
            )));
        }

        let settled = EventEnvelope::new(
            topics::PAYMENTS_SETTLED,
            transaction_id,
            &event.correlation_id,
            serde_json::json!({
                "transaction_id": transaction_id,
                "amount_cents": amount_cents,
            }),
        );
        OutboxRepo::insert_tx(&mut tx, topics::PAYMENTS_SETTLED, &settled)
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(|e| transient(e.into()))?;

        tracing::info!(
            payment_id = %transaction_id,
            amount_cents,
            "settlement entries posted"
        );
        Ok(())
    }

    pub async fn reconcile_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<TransactionReconciliation, SagaError> {
        let entries = self
            .ledger_repo
            .entries_for(transaction_id)
            .await
            .map_err(transient)?;
        let balance = crate::domain::ledger::summarize(transaction_id, &entries);

        Ok(TransactionReconciliation {
            transaction_id,
            balanced: balance.balanced(),
            debits: balance.debits,
            credits: balance.credits,
            delta: balance.delta(),
            entries,
        })
    }

    pub async fn reconcile_all(&self, limit: i64) -> Result<ReconciliationReport, SagaError> {
        let groups: Vec<TransactionBalance> = self
            .ledger_repo
            .balances_by_transaction(limit)
            .await
            .map_err(transient)?;
        let report = build_report(groups);
        if report.imbalanced_count > 0 {
            self.metrics.invariant_violations_total.inc();
            tracing::error!(
                imbalanced = report.imbalanced_count,
                "reconciliation sweep found imbalanced transactions"
            );
        }
        Ok(report)
    }
}

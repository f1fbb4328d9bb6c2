use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Debit,
    Credit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Debit => "DEBIT",
            Direction::Credit => "CREDIT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DEBIT" => Some(Direction::Debit),
            "CREDIT" => Some(Direction::Credit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntryRow {
    pub entry_id: Uuid,
    pub transaction_id: Uuid,
    pub account_id: String,
    pub direction: Direction,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionBalance {
    pub transaction_id: Uuid,
    pub debits: i64,
    pub credits: i64,
    pub entry_count: i64,
}

impl TransactionBalance {
    pub fn delta(&self) -> i64 {
        self.debits - self.credits
    }

    pub fn balanced(&self) -> bool {
        self.delta() == 0
    }
}

pub fn summarize(transaction_id: Uuid, entries: &[LedgerEntryRow]) -> TransactionBalance {
    let mut debits = 0;
    let mut credits = 0;
    for entry in entries {
        match entry.direction {
            Direction::Debit => debits += entry.amount_cents,
            Direction::Credit => credits += entry.amount_cents,
        }
    }
    TransactionBalance {
        transaction_id,
        debits,
        credits,
        entry_count: entries.len() as i64,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub transactions_checked: usize,
    pub imbalanced_count: usize,
    pub imbalanced_transactions: Vec<TransactionBalance>,
}

pub fn build_report(groups: Vec<TransactionBalance>) -> ReconciliationReport {
    let checked = groups.len();
    let imbalanced: Vec<TransactionBalance> =
        groups.into_iter().filter(|g| !g.balanced()).collect();
    ReconciliationReport {
        transactions_checked: checked,
        imbalanced_count: imbalanced.len(),
        imbalanced_transactions: imbalanced,
    }
}

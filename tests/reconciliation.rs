use chrono::Utc;
use sagapay::domain::ledger::{
    build_report, summarize, Direction, LedgerEntryRow, TransactionBalance,
};
use uuid::Uuid;

fn entry(transaction_id: Uuid, direction: Direction, amount_cents: i64) -> LedgerEntryRow {
    LedgerEntryRow {
        entry_id: Uuid::new_v4(),
        transaction_id,
        account_id: match direction {
            Direction::Debit => "customer_cash".to_string(),
            Direction::Credit => "merchant_receivable".to_string(),
        },
        direction,
        amount_cents,
        created_at: Utc::now(),
    }
}

#[test]
fn a_capture_posting_balances() {
    let tx = Uuid::new_v4();
    let entries = vec![
        entry(tx, Direction::Debit, 2_500),
        entry(tx, Direction::Credit, 2_500),
    ];
    let balance = summarize(tx, &entries);
    assert_eq!(balance.debits, 2_500);
    assert_eq!(balance.credits, 2_500);
    assert_eq!(balance.delta(), 0);
    assert!(balance.balanced());
    assert_eq!(balance.entry_count, 2);
}

#[test]
fn a_lopsided_group_reports_its_delta() {
    let tx = Uuid::new_v4();
    let entries = vec![
        entry(tx, Direction::Debit, 2_500),
        entry(tx, Direction::Credit, 1_500),
    ];
    let balance = summarize(tx, &entries);
    assert_eq!(balance.delta(), 1_000);
    assert!(!balance.balanced());
}

#[test]
fn empty_transactions_are_vacuously_balanced() {
    let tx = Uuid::new_v4();
    let balance = summarize(tx, &[]);
    assert!(balance.balanced());
    assert_eq!(balance.entry_count, 0);
}

#[test]
fn the_sweep_reports_only_imbalanced_groups() {
    let bad = Uuid::new_v4();
    let groups = vec![
        TransactionBalance {
            transaction_id: Uuid::new_v4(),
            debits: 100,
            credits: 100,
            entry_count: 2,
        },
        TransactionBalance {
            transaction_id: bad,
            debits: 300,
            credits: 100,
            entry_count: 3,
        },
        TransactionBalance {
            transaction_id: Uuid::new_v4(),
            debits: 0,
            credits: 0,
            entry_count: 0,
        },
    ];

    let report = build_report(groups);
    assert_eq!(report.transactions_checked, 3);
    assert_eq!(report.imbalanced_count, 1);
    assert_eq!(report.imbalanced_transactions[0].transaction_id, bad);
    assert_eq!(report.imbalanced_transactions[0].delta(), 200);
}

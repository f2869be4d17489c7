//! Integration tests for ledger reconstruction through `ClientBook`.
//!
//! 1. Deposit then withdrawal comes back newest first with correct balances
//! 2. Balances chain from zero across entries
//! 3. Transfers are signed by role
//! 4. Drift against the stored balance is reported, not raised
//! 5. Unknown clients and name-only references

use chrono::{TimeZone, Utc};
use clientbook_core::{
    balance::Role,
    book::ClientBook,
    client::{Client, NewClient},
    operation::Operation,
    types::Timestamp,
};

fn build() -> ClientBook {
    let _ = env_logger::builder().is_test(true).try_init();
    ClientBook::build_test().expect("build_test failed")
}

fn new_client(book: &mut ClientBook, first: &str, last: &str) -> Client {
    book.create_client(&NewClient {
        first_name: first.into(),
        last_name: last.into(),
        ..NewClient::default()
    })
    .unwrap()
}

fn day(d: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, d, 10, 30, 0).unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: deposit then withdrawal
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn deposit_then_withdrawal_newest_first() {
    let mut book = build();
    let x = new_client(&mut book, "Xavier", "Roy");

    book.record_operation(Operation::deposit(x.id, 100.0, day(1))).unwrap();
    book.record_operation(Operation::withdrawal(x.id, 30.0, day(2))).unwrap();

    let ledger = book.ledger(x.id).unwrap();
    assert_eq!(ledger.len(), 2);

    let newest = &ledger.entries[0];
    assert_eq!(newest.operation.kind.as_str(), "withdrawal");
    assert_eq!(newest.balance_before, 100.0);
    assert_eq!(newest.balance_after, 70.0);

    let oldest = &ledger.entries[1];
    assert_eq!(oldest.operation.kind.as_str(), "deposit");
    assert_eq!(oldest.balance_before, 0.0);
    assert_eq!(oldest.balance_after, 100.0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: before/after chain
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn balances_chain_from_zero() {
    let mut book = build();
    let x = new_client(&mut book, "Xavier", "Roy");
    let y = new_client(&mut book, "Yara", "Diaz");

    book.record_operation(Operation::deposit(x.id, 500.0, day(4))).unwrap();
    book.record_operation(Operation::withdrawal(x.id, 40.0, day(2))).unwrap();
    book.record_operation(Operation::transfer(x.id, y.id, 60.0, day(3))).unwrap();
    book.record_operation(Operation::direct_transfer(y.id, x.id, 25.0, day(5))).unwrap();
    book.record_operation(Operation::deposit(y.id, 999.0, day(1))).unwrap();

    let ledger = book.ledger(x.id).unwrap();
    assert_eq!(ledger.len(), 4, "only X's operations are relevant");

    let ordered: Vec<_> = ledger.chronological().collect();
    assert_eq!(ordered[0].balance_before, 0.0);
    for pair in ordered.windows(2) {
        assert_eq!(pair[0].balance_after, pair[1].balance_before);
        assert!(pair[0].operation.effective_date() <= pair[1].operation.effective_date());
    }
    assert_eq!(ledger.final_balance, 425.0);
    assert_eq!(ordered.last().unwrap().balance_after, ledger.final_balance);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: transfer attribution
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn transfer_is_negative_for_sender_and_positive_for_receiver() {
    let mut book = build();
    let a = new_client(&mut book, "Ana", "Lopez");
    let b = new_client(&mut book, "Ben", "Ortiz");
    let c = new_client(&mut book, "Cleo", "Park");

    book.record_operation(Operation::transfer(a.id, b.id, 50.0, day(1))).unwrap();

    let for_a = book.ledger(a.id).unwrap();
    assert_eq!(for_a.entries[0].impact, -50.0);
    assert_eq!(for_a.entries[0].role, Role::Sender);

    let for_b = book.ledger(b.id).unwrap();
    assert_eq!(for_b.entries[0].impact, 50.0);
    assert_eq!(for_b.entries[0].role, Role::Receiver);

    let for_c = book.ledger(c.id).unwrap();
    assert!(for_c.is_empty(), "unrelated client sees nothing");
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: drift
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn drift_is_flagged_without_error() {
    let mut book = build();
    let x = new_client(&mut book, "Xavier", "Roy");

    book.record_operation(Operation::deposit(x.id, 1000.0, day(1))).unwrap();
    book.record_operation(Operation::withdrawal(x.id, 40.0, day(2))).unwrap();
    book.store.set_client_balance(x.id, 1000.0).unwrap();

    let ledger = book.ledger(x.id).expect("drift must not be an error");
    let drift = ledger.drift.expect("drift should be reported");
    assert_eq!(drift.stored, 1000.0);
    assert_eq!(drift.reconstructed, 960.0);
    assert_eq!(drift.difference, 40.0);
}

#[test]
fn matching_stored_balance_has_no_drift() {
    let mut book = build();
    let x = new_client(&mut book, "Xavier", "Roy");
    book.record_operation(Operation::deposit(x.id, 12.5, day(1))).unwrap();
    book.store.set_client_balance(x.id, 12.5).unwrap();

    assert!(!book.ledger(x.id).unwrap().has_drift());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: unknown clients, name-only references, repeatability
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn unknown_client_gives_empty_ledger() {
    let book = build();
    let ledger = book.ledger(4242).unwrap();
    assert!(ledger.is_empty());
    assert!(ledger.client_id.is_none());
}

#[test]
fn name_only_rows_are_matched_by_full_name() {
    let mut book = build();
    let x = new_client(&mut book, "Xavier", "Roy");

    // Straight into the store so ingestion normalization is bypassed.
    let mut legacy = Operation::deposit(0, 80.0, day(1));
    legacy.client_id = None;
    legacy.client_name = Some("Xavier Roy".into());
    book.store.insert_operation(&legacy).unwrap();

    let ledger = book.ledger(x.id).unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.final_balance, 80.0);
}

#[test]
fn recording_resolves_unique_names_to_ids() {
    let mut book = build();
    let a = new_client(&mut book, "Ana", "Lopez");
    let b = new_client(&mut book, "Ben", "Ortiz");

    let mut t = Operation::transfer(0, 0, 20.0, day(1));
    t.from_client_id = None;
    t.to_client_id = None;
    t.from_client_name = Some("Ana Lopez".into());
    t.to_client_name = Some("Ben Ortiz".into());

    let stored = book.record_operation(t).unwrap();
    assert_eq!(stored.from_client_id, Some(a.id));
    assert_eq!(stored.to_client_id, Some(b.id));
}

#[test]
fn reconstruction_is_repeatable() {
    let mut book = build();
    let x = new_client(&mut book, "Xavier", "Roy");
    for d in 1..=5 {
        book.record_operation(Operation::deposit(x.id, d as f64 * 10.0, day(6 - d))).unwrap();
    }
    let first = book.ledger(x.id).unwrap();
    let second = book.ledger(x.id).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.final_balance, 150.0);
}

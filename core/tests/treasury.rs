//! Integration tests for treasury reporting, client search and the
//! name-to-id backfill.

use chrono::{TimeZone, Utc};
use clientbook_core::{
    book::ClientBook,
    client::{Client, ClientSort, ClientStatus, NewClient},
    operation::{Operation, OperationStatus},
    retry::CancellationToken,
    statistics::Period,
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

fn month(m: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, m, 15, 12, 0, 0).unwrap()
}

#[test]
fn treasury_totals_confirmed_operations() {
    let mut book = build();
    let a = new_client(&mut book, "Ana", "Lopez");
    let b = new_client(&mut book, "Ben", "Ortiz");

    book.record_operation(Operation::deposit(a.id, 200.0, month(1))).unwrap();
    book.record_operation(Operation::deposit(b.id, 100.0, month(2))).unwrap();
    book.record_operation(Operation::withdrawal(a.id, 50.0, month(2))).unwrap();
    book.record_operation(Operation::transfer(a.id, b.id, 30.0, month(3))).unwrap();
    book.record_operation(Operation::direct_transfer(b.id, a.id, 5.0, month(3))).unwrap();
    book.record_operation(
        Operation::deposit(a.id, 1000.0, month(3)).with_status(OperationStatus::Cancelled),
    )
    .unwrap();
    book.refresh_all(&CancellationToken::new()).unwrap();

    let report = book.treasury(Period::all_time()).unwrap();
    assert_eq!(report.totals.deposits, 300.0);
    assert_eq!(report.totals.withdrawals, 50.0);
    assert_eq!(report.totals.transfers, 30.0);
    assert_eq!(report.totals.direct_transfers, 5.0);
    assert_eq!(report.operation_count(), 5);
    assert_eq!(report.net_flow, 250.0);
    assert_eq!(report.treasury, 250.0, "transfers leave the treasury unchanged");
    assert_eq!(report.client_count, 2);
    assert_eq!(report.active_clients, 2);
}

#[test]
fn treasury_period_is_half_open() {
    let mut book = build();
    let a = new_client(&mut book, "Ana", "Lopez");
    book.record_operation(Operation::deposit(a.id, 10.0, month(1))).unwrap();
    book.record_operation(Operation::deposit(a.id, 20.0, month(2))).unwrap();
    book.record_operation(Operation::deposit(a.id, 40.0, month(3))).unwrap();

    let report = book.treasury(Period::between(month(2), month(3))).unwrap();
    assert_eq!(report.totals.deposits, 20.0);
    assert_eq!(report.totals.deposit_count, 1);
}

#[test]
fn search_filters_and_sorts_clients() {
    let mut book = build();
    let ana = new_client(&mut book, "Ana", "Lopez");
    new_client(&mut book, "Ben", "Ortiz");
    let anabel = new_client(&mut book, "Anabel", "Kim");
    book.store.set_client_balance(anabel.id, 500.0).unwrap();
    book.store.update_client_status(ana.id, ClientStatus::Suspended).unwrap();

    let by_name = book.search_clients("ana", ClientSort::Name).unwrap();
    let names: Vec<_> = by_name.iter().map(Client::full_name).collect();
    assert_eq!(names, vec!["Anabel Kim", "Ana Lopez"]);

    let by_balance = book.search_clients("", ClientSort::BalanceDesc).unwrap();
    assert_eq!(by_balance[0].id, anabel.id);

    let report = book.treasury(Period::all_time()).unwrap();
    assert_eq!(report.active_clients, 2);
}

#[test]
fn search_wildcards_match_literally() {
    let mut book = build();
    let promo = new_client(&mut book, "Promo", "50%_Off");
    new_client(&mut book, "Ana", "Lopez");
    new_client(&mut book, "Ben", "Ortiz");

    let hits = book.search_clients("50%", ClientSort::Name).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, promo.id);

    assert_eq!(book.search_clients("%", ClientSort::Name).unwrap().len(), 1);
    assert_eq!(book.search_clients("_", ClientSort::Name).unwrap().len(), 1);
}

#[test]
fn backfill_resolves_stored_name_references() {
    let mut book = build();
    let ana = new_client(&mut book, "Ana", "Lopez");
    new_client(&mut book, "Sam", "Reed");
    new_client(&mut book, "Sam", "Reed");

    let mut legacy = Operation::deposit(0, 15.0, month(1));
    legacy.client_id = None;
    legacy.client_name = Some("Ana Lopez".into());
    let legacy = book.store.insert_operation(&legacy).unwrap();

    let mut shared = Operation::deposit(0, 15.0, month(1));
    shared.client_id = None;
    shared.client_name = Some("Sam Reed".into());
    let shared = book.store.insert_operation(&shared).unwrap();

    let report = book.normalize_references().unwrap();
    assert_eq!(report.backfilled, 1);
    assert_eq!(report.ambiguous, 1);

    assert_eq!(book.store.operation(&legacy.id).unwrap().client_id, Some(ana.id));
    assert_eq!(book.store.operation(&shared.id).unwrap().client_id, None);
}

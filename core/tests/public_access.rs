//! Integration tests for public access tokens.

use chrono::{Duration, TimeZone, Utc};
use clientbook_core::{
    book::ClientBook,
    client::{Client, NewClient},
    error::LedgerError,
    operation::Operation,
};

fn build() -> ClientBook {
    let _ = env_logger::builder().is_test(true).try_init();
    ClientBook::build_test().expect("build_test failed")
}

fn new_client(book: &mut ClientBook, first: &str, last: &str) -> Client {
    book.create_client(&NewClient {
        first_name: first.into(),
        last_name: last.into(),
        phone: Some("+33 6 00 00 00 00".into()),
        email: Some("client@example.org".into()),
    })
    .unwrap()
}

#[test]
fn issued_token_resolves_to_its_client() {
    let mut book = build();
    let x = new_client(&mut book, "Xavier", "Roy");

    let token = book.issue_token(x.id).unwrap();
    assert_eq!(token.client_id, x.id);
    assert!(token.expires_at.is_some(), "default config issues expiring tokens");
    assert_eq!(book.access().resolve(&token.token).unwrap(), x.id);
    assert_eq!(book.store.access_tokens_for_client(x.id).unwrap().len(), 1);
}

#[test]
fn public_view_shows_profile_and_ledger() {
    let mut book = build();
    let x = new_client(&mut book, "Xavier", "Roy");
    let d = Utc.with_ymd_and_hms(2024, 9, 1, 9, 0, 0).unwrap();
    book.record_operation(Operation::deposit(x.id, 64.0, d)).unwrap();

    let token = book.issue_token(x.id).unwrap();
    let view = book.public_view(&token.token).unwrap();
    assert_eq!(view.profile.id, x.id);
    assert_eq!(view.profile.first_name, "Xavier");
    assert_eq!(view.ledger.len(), 1);
    assert_eq!(view.ledger.final_balance, 64.0);

    let json = serde_json::to_string(&view.profile).unwrap();
    assert!(!json.contains("example.org"), "contact details stay private");
}

#[test]
fn expired_token_is_rejected() {
    let mut book = build();
    let x = new_client(&mut book, "Xavier", "Roy");
    let token = book.access().issue(x.id, Some(Duration::days(1))).unwrap();

    let later = Utc::now() + Duration::days(2);
    assert!(matches!(
        book.access().resolve_at(&token.token, later),
        Err(LedgerError::TokenExpired { .. })
    ));
}

#[test]
fn token_without_expiry_never_expires() {
    let mut book = build();
    let x = new_client(&mut book, "Xavier", "Roy");
    let token = book.access().issue(x.id, None).unwrap();

    let far = Utc::now() + Duration::days(3650);
    assert_eq!(book.access().resolve_at(&token.token, far).unwrap(), x.id);
}

#[test]
fn revoked_and_unknown_tokens_are_invalid() {
    let mut book = build();
    let x = new_client(&mut book, "Xavier", "Roy");
    let token = book.issue_token(x.id).unwrap();

    book.access().revoke(&token.token).unwrap();
    assert!(matches!(
        book.access().resolve(&token.token),
        Err(LedgerError::InvalidToken)
    ));
    assert!(matches!(
        book.public_view("not-a-token"),
        Err(LedgerError::InvalidToken)
    ));
    assert_eq!(book.store.events_of_type("access_token_revoked").unwrap().len(), 1);
}

#[test]
fn tokens_need_an_existing_client() {
    let book = build();
    assert!(matches!(
        book.issue_token(31337),
        Err(LedgerError::NotFound { .. })
    ));
}

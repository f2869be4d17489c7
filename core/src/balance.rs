//! The one signed-sum rule every balance computation goes through.
//!
//! `ledger` uses `signed_impact` per entry; `refresh` uses
//! `compute_balance` to rewrite the stored cache. Both therefore agree on
//! which operations count and with which sign.

use crate::{
    client::ClientRef,
    operation::{Operation, OperationKind},
    types::{Amount, ClientId, Timestamp},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How an operation relates to the client a balance is computed for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The client owns a deposit or withdrawal.
    Owner,
    Receiver,
    Sender,
    /// The row references the client, but not through the field that
    /// decides the sign: a transfer whose sender and receiver both miss, or
    /// a deposit/withdrawal reached only through a transfer field.
    Unattributed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    pub amount: Amount,
    pub role:   Role,
}

impl Impact {
    const NONE: Impact = Impact { amount: 0.0, role: Role::Unattributed };
}

/// True when `op` carries an effective date and any id or name field on it
/// points at `client`. Ledger reconstruction and `compute_balance` both
/// select rows with this predicate.
pub fn is_relevant(op: &Operation, client: &ClientRef) -> bool {
    op.effective_date().is_some() && references(op, client)
}

fn references(op: &Operation, client: &ClientRef) -> bool {
    client.matches_id(op.client_id)
        || client.matches_id(op.from_client_id)
        || client.matches_id(op.to_client_id)
        || client.matches_name(op.client_name.as_deref())
        || client.matches_name(op.from_client_name.as_deref())
        || client.matches_name(op.to_client_name.as_deref())
}

/// Signed effect of `op` on `client`'s balance, ignoring status.
///
/// For transfers, id matches are checked before name matches and the
/// receiver before the sender, so a row carrying a stale name but a correct
/// id still resolves by id.
pub fn signed_impact(op: &Operation, client: &ClientRef) -> Impact {
    match op.kind {
        OperationKind::Deposit | OperationKind::Withdrawal => {
            let owns = client.matches_id(op.client_id)
                || client.matches_name(op.client_name.as_deref());
            if !owns {
                return Impact::NONE;
            }
            let amount = if op.kind == OperationKind::Deposit { op.amount } else { -op.amount };
            Impact { amount, role: Role::Owner }
        }
        OperationKind::Transfer | OperationKind::DirectTransfer => {
            let role = if client.matches_id(op.to_client_id) {
                Role::Receiver
            } else if client.matches_id(op.from_client_id) {
                Role::Sender
            } else if client.matches_name(op.to_client_name.as_deref()) {
                Role::Receiver
            } else if client.matches_name(op.from_client_name.as_deref()) {
                Role::Sender
            } else {
                Role::Unattributed
            };
            let amount = match role {
                Role::Receiver => op.amount,
                Role::Sender   => -op.amount,
                _              => 0.0,
            };
            Impact { amount, role }
        }
    }
}

/// Order-independent balance of `client` over confirmed, dated operations.
/// Equals the `final_balance` of the reconstructed ledger for the same rows.
pub fn compute_balance<'a, I>(client: &ClientRef, operations: I) -> Amount
where
    I: IntoIterator<Item = &'a Operation>,
{
    operations
        .into_iter()
        .filter(|op| op.status.counts_toward_balance())
        .filter(|op| is_relevant(op, client))
        .map(|op| signed_impact(op, client).amount)
        .sum()
}

/// Discrepancy between a stored balance and a recomputed one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drift {
    pub client_id:     ClientId,
    pub stored:        Amount,
    pub reconstructed: Amount,
    /// `stored - reconstructed`.
    pub difference:    Amount,
}

pub fn detect_drift(
    client_id: ClientId,
    stored: Amount,
    reconstructed: Amount,
    tolerance: Amount,
) -> Option<Drift> {
    let difference = stored - reconstructed;
    if difference.abs() > tolerance {
        Some(Drift { client_id, stored, reconstructed, difference })
    } else {
        None
    }
}

// ── Cache ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedBalance {
    pub value:       Amount,
    pub computed_at: Timestamp,
}

/// Computed balances keyed by client. Entries stay until explicitly
/// invalidated; writers that touch a client's operations must call
/// `invalidate` for every client the write references.
#[derive(Debug, Default)]
pub struct BalanceCache {
    entries: HashMap<ClientId, CachedBalance>,
}

impl BalanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, client_id: ClientId) -> Option<CachedBalance> {
        self.entries.get(&client_id).copied()
    }

    pub fn insert(&mut self, client_id: ClientId, value: Amount) -> CachedBalance {
        let cached = CachedBalance { value, computed_at: Utc::now() };
        self.entries.insert(client_id, cached);
        cached
    }

    pub fn invalidate(&mut self, client_id: ClientId) -> bool {
        self.entries.remove(&client_id).is_some()
    }

    /// Invalidate every client an operation references by id.
    pub fn invalidate_for(&mut self, op: &Operation) {
        for id in [op.client_id, op.from_client_id, op.to_client_id].into_iter().flatten() {
            self.invalidate(id);
        }
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationStatus;
    use chrono::TimeZone;

    fn day(d: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()
    }

    fn client(id: ClientId, name: &str) -> ClientRef {
        ClientRef { id, full_name: name.to_string() }
    }

    #[test]
    fn transfer_sign_depends_on_role() {
        let op = Operation::transfer(1, 2, 50.0, day(1));
        assert_eq!(signed_impact(&op, &client(1, "A")).amount, -50.0);
        assert_eq!(signed_impact(&op, &client(2, "B")).amount, 50.0);
        let other = signed_impact(&op, &client(3, "C"));
        assert_eq!(other.amount, 0.0);
        assert_eq!(other.role, Role::Unattributed);
    }

    #[test]
    fn name_only_transfer_resolves_by_name() {
        let mut op = Operation::transfer(0, 0, 20.0, day(1));
        op.from_client_id = None;
        op.to_client_id = None;
        op.from_client_name = Some("Ana Lopez".into());
        op.to_client_name = Some("Ben Ortiz".into());
        assert_eq!(signed_impact(&op, &client(9, "Ana Lopez")).role, Role::Sender);
        assert_eq!(signed_impact(&op, &client(8, "Ben Ortiz")).role, Role::Receiver);
        assert_eq!(signed_impact(&op, &client(7, "Ben Ortiz ")).role, Role::Unattributed);
    }

    #[test]
    fn compute_balance_skips_unconfirmed_and_foreign_rows() {
        let a = client(1, "A");
        let ops = vec![
            Operation::deposit(1, 100.0, day(1)),
            Operation::withdrawal(1, 40.0, day(2)),
            Operation::deposit(1, 999.0, day(3)).with_status(OperationStatus::Pending),
            Operation::deposit(2, 500.0, day(3)),
            Operation::direct_transfer(2, 1, 15.0, day(4)),
        ];
        assert_eq!(compute_balance(&a, &ops), 75.0);
    }

    #[test]
    fn compute_balance_matches_reconstruction() {
        use crate::{client::{Client, ClientStatus}, ledger::reconstruct};

        let owner = Client {
            id: 1,
            first_name: "A".into(),
            last_name: String::new(),
            phone: None,
            email: None,
            balance: 0.0,
            status: ClientStatus::Active,
            created_at: day(1),
        };
        let mut undated = Operation::deposit(1, 99.0, day(2)).with_id("deposit-2");
        undated.operation_date = None;
        undated.date = None;
        let ops = vec![
            Operation::deposit(1, 10.0, day(1)).with_id("deposit-1"),
            undated,
            Operation::transfer(1, 2, 3.0, day(3)).with_id("transfer-1"),
        ];

        let computed = compute_balance(&owner.reference(), &ops);
        let ledger = reconstruct(Some(&owner), &ops, 0.001);
        assert_eq!(computed, 7.0);
        assert_eq!(computed, ledger.final_balance);
    }

    #[test]
    fn drift_respects_tolerance() {
        assert!(detect_drift(1, 100.0, 100.0005, 0.001).is_none());
        let drift = detect_drift(1, 1000.0, 960.0, 0.001).unwrap();
        assert_eq!(drift.difference, 40.0);
    }

    #[test]
    fn cache_is_invalidated_explicitly() {
        let a = client(1, "A");
        let mut ops = vec![Operation::deposit(1, 10.0, day(1))];
        let mut cache = BalanceCache::new();
        cache.insert(1, compute_balance(&a, &ops));

        ops.push(Operation::deposit(1, 5.0, day(2)));
        assert_eq!(cache.get(1).unwrap().value, 10.0, "stale until invalidated");

        cache.invalidate_for(&ops[1]);
        assert!(cache.get(1).is_none());
        cache.insert(1, compute_balance(&a, &ops));
        assert_eq!(cache.get(1).unwrap().value, 15.0);
        cache.invalidate_all();
        assert!(cache.is_empty());
    }
}

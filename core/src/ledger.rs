//! Ledger reconstruction.
//!
//! Turns an unordered bag of operations into a chronological,
//! balance-annotated ledger for one client:
//!   1. keep records that reference the client by id or exact full name
//!      and carry a usable date
//!   2. sort by effective date, ties by record id
//!   3. walk once from a zero balance, tagging before/after per entry
//!   4. compare the final balance with the stored one
//!
//! The walk starts from zero, never from the stored balance, so a stale
//! cache shows up as drift instead of being absorbed.

use crate::{
    balance::{detect_drift, is_relevant, signed_impact, Drift, Role},
    client::Client,
    operation::Operation,
    types::{Amount, ClientId, OperationId},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub operation:      Operation,
    pub role:           Role,
    /// Signed amount applied to the running balance. Zero for unattributed
    /// transfers and unconfirmed operations.
    pub impact:         Amount,
    pub balance_before: Amount,
    pub balance_after:  Amount,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Ledger {
    pub client_id:     Option<ClientId>,
    /// Newest first.
    pub entries:       Vec<LedgerEntry>,
    pub final_balance: Amount,
    pub drift:         Option<Drift>,
    /// Operations that referenced the client without a resolvable role.
    pub unattributed:  Vec<OperationId>,
}

impl Ledger {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn chronological(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().rev()
    }

    pub fn has_drift(&self) -> bool {
        self.drift.is_some()
    }
}

/// Reconstruct `client`'s ledger from `operations`.
///
/// Never fails: a missing client or empty input yields an empty ledger, and
/// drift is reported on the result rather than as an error.
pub fn reconstruct(client: Option<&Client>, operations: &[Operation], tolerance: Amount) -> Ledger {
    let Some(client) = client else {
        return Ledger::empty();
    };
    let reference = client.reference();

    let mut relevant: Vec<&Operation> = operations
        .iter()
        .filter(|op| is_relevant(op, &reference))
        .collect();

    relevant.sort_by(|a, b| {
        a.effective_date()
            .cmp(&b.effective_date())
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut running: Amount = 0.0;
    let mut entries = Vec::with_capacity(relevant.len());
    let mut unattributed = Vec::new();

    for op in relevant {
        let impact = signed_impact(op, &reference);
        if impact.role == Role::Unattributed {
            if op.kind.is_transfer() {
                log::warn!(
                    "{} {} references client {} ('{}') but neither sender nor receiver matches; applying zero impact",
                    op.kind, op.id, reference.id, reference.full_name
                );
            } else {
                log::warn!(
                    "{} {} references client {} ('{}') only through a transfer field; applying zero impact",
                    op.kind, op.id, reference.id, reference.full_name
                );
            }
            unattributed.push(op.id.clone());
        }
        let applied = if op.status.counts_toward_balance() { impact.amount } else { 0.0 };

        let balance_before = running;
        running += applied;
        entries.push(LedgerEntry {
            operation: op.clone(),
            role: impact.role,
            impact: applied,
            balance_before,
            balance_after: running,
        });
    }

    let drift = detect_drift(client.id, client.balance, running, tolerance);
    if let Some(d) = &drift {
        log::warn!(
            "Balance drift for client {}: stored {:.3}, reconstructed {:.3}, difference {:.3}",
            d.client_id, d.stored, d.reconstructed, d.difference
        );
    }

    entries.reverse();
    log::debug!("Reconstructed {} entries for client {}", entries.len(), client.id);

    Ledger {
        client_id: Some(client.id),
        entries,
        final_balance: running,
        drift,
        unattributed,
    }
}

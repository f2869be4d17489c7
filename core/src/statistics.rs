//! Treasury reporting over confirmed operations.

use crate::{
    error::LedgerResult,
    store::{ClientTotals, LedgerStore, OperationTotals},
    types::{Amount, Timestamp},
};
use serde::{Deserialize, Serialize};

/// Half-open reporting window `[from, to)`. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Period {
    pub from: Option<Timestamp>,
    pub to:   Option<Timestamp>,
}

impl Period {
    pub fn all_time() -> Self {
        Self::default()
    }

    pub fn between(from: Timestamp, to: Timestamp) -> Self {
        Self { from: Some(from), to: Some(to) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreasuryReport {
    pub period:         Period,
    pub totals:         OperationTotals,
    /// Deposits minus withdrawals. Transfers move money between clients and
    /// leave it unchanged.
    pub net_flow:       Amount,
    /// Sum of stored client balances.
    pub treasury:       Amount,
    pub client_count:   i64,
    pub active_clients: i64,
}

impl TreasuryReport {
    pub fn build(store: &LedgerStore, period: Period) -> LedgerResult<Self> {
        let totals = store.operation_totals(period.from, period.to)?;
        let ClientTotals { client_count, active_clients, total_balance } = store.client_totals()?;
        Ok(Self {
            period,
            net_flow: totals.deposits - totals.withdrawals,
            totals,
            treasury: total_balance,
            client_count,
            active_clients,
        })
    }

    pub fn operation_count(&self) -> i64 {
        self.totals.deposit_count
            + self.totals.withdrawal_count
            + self.totals.transfer_count
            + self.totals.direct_transfer_count
    }
}

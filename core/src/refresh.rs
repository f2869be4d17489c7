//! Balance refresh: rewrite a client's cached balance from its operations.

use crate::{
    balance::{compute_balance, detect_drift, BalanceCache, Drift},
    error::LedgerResult,
    event::LedgerEvent,
    retry::{CancellationToken, RetryPolicy},
    store::LedgerStore,
    types::{Amount, ClientId},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshOutcome {
    pub client_id:  ClientId,
    pub previous:   Amount,
    pub recomputed: Amount,
    /// Set when `previous` differed from `recomputed` beyond tolerance.
    pub drift:      Option<Drift>,
}

impl RefreshOutcome {
    pub fn changed(&self) -> bool {
        self.drift.is_some()
    }
}

pub struct BalanceRefresher<'a> {
    store:     &'a LedgerStore,
    policy:    RetryPolicy,
    tolerance: Amount,
}

impl<'a> BalanceRefresher<'a> {
    pub fn new(store: &'a LedgerStore, policy: RetryPolicy, tolerance: Amount) -> Self {
        Self { store, policy, tolerance }
    }

    /// Recompute and store one client's balance. Rerunning converges to the
    /// same value as long as the operations are unchanged.
    pub fn refresh(
        &self,
        client_id: ClientId,
        cache: &mut BalanceCache,
        token: &CancellationToken,
    ) -> LedgerResult<RefreshOutcome> {
        let (client, operations) = self.policy.run(token, |_| {
            let client = self.store.client(client_id)?;
            let operations = self.store.operations_for_client(&client.reference())?;
            Ok((client, operations))
        })?;

        let recomputed = compute_balance(&client.reference(), &operations);
        let drift = detect_drift(client_id, client.balance, recomputed, self.tolerance);

        self.policy
            .run(token, |_| self.store.set_client_balance(client_id, recomputed))?;
        cache.insert(client_id, recomputed);

        if let Some(d) = &drift {
            log::warn!(
                "Client {client_id}: stored balance {:.3} corrected to {:.3} (difference {:.3})",
                d.stored, d.reconstructed, d.difference
            );
            self.store.append_event(
                Some(client_id),
                &LedgerEvent::DriftDetected {
                    client_id,
                    stored: d.stored,
                    reconstructed: d.reconstructed,
                    difference: d.difference,
                },
            )?;
        }
        self.store.append_event(
            Some(client_id),
            &LedgerEvent::BalanceRefreshed { client_id, previous: client.balance, recomputed },
        )?;
        log::info!("Client {client_id}: balance refreshed to {recomputed:.2}");

        Ok(RefreshOutcome {
            client_id,
            previous: client.balance,
            recomputed,
            drift,
        })
    }

    /// Refresh every client. Stops at the first failure.
    pub fn refresh_all(
        &self,
        cache: &mut BalanceCache,
        token: &CancellationToken,
    ) -> LedgerResult<Vec<RefreshOutcome>> {
        let clients = self.policy.run(token, |_| self.store.all_clients())?;
        clients
            .iter()
            .map(|c| self.refresh(c.id, cache, token))
            .collect()
    }
}

//! `ClientBook` wires the store, configuration, balance cache and retry
//! policy together and is the entry point for callers.
//!
//! RULES:
//!   - Every write that moves money appends an audit event.
//!   - Every write that touches a client's operations invalidates that
//!     client's cached balance.
//!   - Reads that fail transiently are retried through one policy.

use crate::{
    access::{AccessService, AccessToken, PublicView},
    balance::{compute_balance, BalanceCache},
    client::{Client, ClientSort, NewClient},
    config::LedgerConfig,
    error::LedgerResult,
    event::LedgerEvent,
    export::write_ledger_csv,
    identity::{ClientDirectory, NormalizeReport},
    ledger::{reconstruct, Ledger},
    operation::{Operation, OperationEdit},
    refresh::{BalanceRefresher, RefreshOutcome},
    retry::{CancellationToken, RetryPolicy},
    statistics::{Period, TreasuryReport},
    store::LedgerStore,
    types::{Amount, ClientId},
};
use std::io::Write;
use std::time::Duration;

pub struct ClientBook {
    pub store:  LedgerStore,
    pub config: LedgerConfig,
    policy:     RetryPolicy,
    cache:      BalanceCache,
}

impl ClientBook {
    pub fn new(store: LedgerStore, config: LedgerConfig) -> Self {
        Self {
            policy: RetryPolicy::from_config(&config.retry),
            cache: BalanceCache::new(),
            store,
            config,
        }
    }

    /// Open (or create) the database at `path` and apply migrations.
    pub fn open(path: &str, config: LedgerConfig) -> LedgerResult<Self> {
        let store = LedgerStore::open(path, Duration::from_millis(config.busy_timeout_ms))?;
        store.migrate()?;
        Ok(Self::new(store, config))
    }

    /// Migrated in-memory book with default configuration (used in tests).
    pub fn build_test() -> LedgerResult<Self> {
        let store = LedgerStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(store, LedgerConfig::default()))
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    // ── Clients ───────────────────────────────────────────────────

    pub fn create_client(&mut self, new: &NewClient) -> LedgerResult<Client> {
        let client = self.store.insert_client(new)?;
        self.store.append_event(
            Some(client.id),
            &LedgerEvent::ClientCreated { client_id: client.id, full_name: client.full_name() },
        )?;
        Ok(client)
    }

    pub fn search_clients(&self, query: &str, sort: ClientSort) -> LedgerResult<Vec<Client>> {
        self.policy
            .run(&CancellationToken::new(), |_| self.store.search_clients(query, sort))
    }

    // ── Operations ────────────────────────────────────────────────

    /// Insert an operation. Name-only client references are resolved to ids
    /// first when the name identifies exactly one client.
    pub fn record_operation(&mut self, op: Operation) -> LedgerResult<Operation> {
        let directory = self.directory()?;
        let mut batch = [op];
        directory.normalize(&mut batch);
        let [op] = batch;

        let stored = self.store.insert_operation(&op)?;
        self.store.append_event(
            primary_client(&stored),
            &LedgerEvent::OperationRecorded { operation_id: stored.id.clone(), amount: stored.amount },
        )?;
        self.invalidate_cached(&directory, &stored);
        Ok(stored)
    }

    pub fn edit_operation(&mut self, id: &str, edit: &OperationEdit) -> LedgerResult<Operation> {
        let (before, after) = self.store.update_operation(id, edit)?;
        self.store.append_event(
            primary_client(&after),
            &LedgerEvent::OperationEdited {
                operation_id: after.id.clone(),
                old_amount: before.amount,
                new_amount: after.amount,
            },
        )?;
        let directory = self.directory()?;
        self.invalidate_cached(&directory, &after);
        Ok(after)
    }

    /// Archive and remove an operation.
    pub fn delete_operation(&mut self, id: &str, reason: Option<&str>) -> LedgerResult<Operation> {
        let removed = self.store.soft_delete_operation(id, reason)?;
        self.store.append_event(
            primary_client(&removed),
            &LedgerEvent::OperationDeleted {
                operation_id: removed.id.clone(),
                amount: removed.amount,
                reason: reason.map(str::to_string),
            },
        )?;
        let directory = self.directory()?;
        self.invalidate_cached(&directory, &removed);
        Ok(removed)
    }

    /// Backfill missing client ids on stored operations from unique name
    /// matches.
    pub fn normalize_references(&mut self) -> LedgerResult<NormalizeReport> {
        let directory = self.directory()?;
        let mut operations = self.store.all_operations()?;
        let before = operations.clone();
        let report = directory.normalize(&mut operations);

        for (old, new) in before.iter().zip(&operations) {
            if old != new {
                self.store.update_operation_references(new)?;
            }
        }
        if report.backfilled > 0 {
            self.cache.invalidate_all();
        }
        log::info!(
            "Backfilled {} client references ({} ambiguous, {} unknown)",
            report.backfilled, report.ambiguous, report.unknown
        );
        Ok(report)
    }

    fn directory(&self) -> LedgerResult<ClientDirectory> {
        Ok(ClientDirectory::from_clients(&self.store.all_clients()?))
    }

    /// Drop cached balances for every client `op` counts toward, whether it
    /// names them by id or by (possibly shared) full name.
    fn invalidate_cached(&mut self, directory: &ClientDirectory, op: &Operation) {
        self.cache.invalidate_for(op);
        for id in directory.named_in(op) {
            self.cache.invalidate(id);
        }
    }

    // ── Ledger and balances ───────────────────────────────────────

    /// Reconstructed ledger, newest first. An unknown client yields an empty
    /// ledger.
    pub fn ledger(&self, client_id: ClientId) -> LedgerResult<Ledger> {
        let token = CancellationToken::new();
        let loaded = self.policy.run(&token, |_| {
            let Some(client) = self.store.find_client(client_id)? else {
                return Ok(None);
            };
            let operations = self.store.operations_for_client(&client.reference())?;
            Ok(Some((client, operations)))
        })?;

        let Some((client, operations)) = loaded else {
            log::debug!("Ledger requested for unknown client {client_id}");
            return Ok(Ledger::empty());
        };
        Ok(reconstruct(Some(&client), &operations, self.config.drift_tolerance))
    }

    /// Current balance from the operations, served from the cache when warm.
    pub fn balance(&mut self, client_id: ClientId) -> LedgerResult<Amount> {
        if let Some(hit) = self.cache.get(client_id) {
            return Ok(hit.value);
        }
        let client = self.store.client(client_id)?;
        let operations = self.store.operations_for_client(&client.reference())?;
        let value = compute_balance(&client.reference(), &operations);
        Ok(self.cache.insert(client_id, value).value)
    }

    pub fn refresh_balance(
        &mut self,
        client_id: ClientId,
        token: &CancellationToken,
    ) -> LedgerResult<RefreshOutcome> {
        let refresher = BalanceRefresher::new(&self.store, self.policy.clone(), self.config.drift_tolerance);
        refresher.refresh(client_id, &mut self.cache, token)
    }

    pub fn refresh_all(&mut self, token: &CancellationToken) -> LedgerResult<Vec<RefreshOutcome>> {
        let refresher = BalanceRefresher::new(&self.store, self.policy.clone(), self.config.drift_tolerance);
        refresher.refresh_all(&mut self.cache, token)
    }

    pub fn export_ledger_csv<W: Write>(&self, client_id: ClientId, out: W) -> LedgerResult<()> {
        let ledger = self.ledger(client_id)?;
        write_ledger_csv(&ledger, out)?;
        Ok(())
    }

    // ── Public access ─────────────────────────────────────────────

    pub fn access(&self) -> AccessService<'_> {
        AccessService::new(&self.store, self.config.drift_tolerance)
    }

    /// Issue a token with the configured default validity.
    pub fn issue_token(&self, client_id: ClientId) -> LedgerResult<AccessToken> {
        let validity = self
            .config
            .default_token_validity_days
            .map(chrono::Duration::days);
        self.access().issue(client_id, validity)
    }

    pub fn public_view(&self, token: &str) -> LedgerResult<PublicView> {
        self.access().public_view(token)
    }

    // ── Reporting ─────────────────────────────────────────────────

    pub fn treasury(&self, period: Period) -> LedgerResult<TreasuryReport> {
        TreasuryReport::build(&self.store, period)
    }
}

/// Client an audit event for `op` is filed under.
fn primary_client(op: &Operation) -> Option<ClientId> {
    op.client_id.or(op.to_client_id).or(op.from_client_id)
}

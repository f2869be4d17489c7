//! Canonical client references.
//!
//! Upstream rows reference clients by numeric id, by free-text full name,
//! or both. `ClientDirectory::normalize` backfills missing ids from exact
//! name matches once, at ingestion, so later matching can rely on ids.

use crate::{
    client::{full_name, Client},
    operation::Operation,
    types::ClientId,
};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct ClientDirectory {
    by_name: HashMap<String, Vec<ClientId>>,
}

#[derive(Debug, Default, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Id fields filled in from a unique name match.
    pub backfilled: usize,
    /// Names shared by more than one client; left untouched.
    pub ambiguous:  usize,
    /// Names matching no client.
    pub unknown:    usize,
}

impl ClientDirectory {
    pub fn from_clients(clients: &[Client]) -> Self {
        let mut by_name: HashMap<String, Vec<ClientId>> = HashMap::new();
        for c in clients {
            let name = c.full_name();
            if name.is_empty() {
                continue;
            }
            by_name.entry(name).or_default().push(c.id);
        }
        Self { by_name }
    }

    pub fn insert(&mut self, id: ClientId, first: &str, last: &str) {
        let name = full_name(first, last);
        if !name.is_empty() {
            self.by_name.entry(name).or_default().push(id);
        }
    }

    /// Id of the single client whose full name equals `name` (trimmed).
    pub fn resolve_name(&self, name: &str) -> Option<ClientId> {
        match self.by_name.get(name.trim()).map(Vec::as_slice) {
            Some([id]) => Some(*id),
            _ => None,
        }
    }

    /// Every client whose full name equals `name` (trimmed).
    pub fn ids_for_name(&self, name: &str) -> &[ClientId] {
        self.by_name.get(name.trim()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Clients `op` reaches through any of its name fields, including every
    /// holder of a shared name.
    pub fn named_in(&self, op: &Operation) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = [&op.client_name, &op.from_client_name, &op.to_client_name]
            .into_iter()
            .flatten()
            .flat_map(|name| self.ids_for_name(name).iter().copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Fill `*_client_id` fields that are empty but have a name beside them.
    pub fn normalize(&self, operations: &mut [Operation]) -> NormalizeReport {
        let mut report = NormalizeReport::default();
        for op in operations.iter_mut() {
            self.backfill(&mut op.client_id, op.client_name.as_deref(), &mut report);
            self.backfill(&mut op.from_client_id, op.from_client_name.as_deref(), &mut report);
            self.backfill(&mut op.to_client_id, op.to_client_name.as_deref(), &mut report);
        }
        if report.ambiguous > 0 || report.unknown > 0 {
            log::warn!(
                "Client reference normalization: {} backfilled, {} ambiguous, {} unknown",
                report.backfilled, report.ambiguous, report.unknown
            );
        }
        report
    }

    fn backfill(&self, id: &mut Option<ClientId>, name: Option<&str>, report: &mut NormalizeReport) {
        if id.is_some() {
            return;
        }
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return;
        };
        match self.by_name.get(name).map(Vec::len) {
            Some(1) => {
                *id = self.resolve_name(name);
                report.backfilled += 1;
            }
            Some(_) => report.ambiguous += 1,
            None => report.unknown += 1,
        }
    }
}

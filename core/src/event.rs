//! Audit events.
//!
//! Every write that changes money or access is recorded in `event_log` as a
//! tagged JSON payload. Variants are only ever added.

use crate::types::{Amount, ClientId, OperationId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    ClientCreated {
        client_id: ClientId,
        full_name: String,
    },
    OperationRecorded {
        operation_id: OperationId,
        amount:       Amount,
    },
    OperationEdited {
        operation_id: OperationId,
        old_amount:   Amount,
        new_amount:   Amount,
    },
    OperationDeleted {
        operation_id: OperationId,
        amount:       Amount,
        reason:       Option<String>,
    },
    BalanceRefreshed {
        client_id:  ClientId,
        previous:   Amount,
        recomputed: Amount,
    },
    DriftDetected {
        client_id:     ClientId,
        stored:        Amount,
        reconstructed: Amount,
        difference:    Amount,
    },
    AccessTokenIssued {
        client_id:  ClientId,
        expires_at: Option<Timestamp>,
    },
    AccessTokenRevoked {
        client_id: ClientId,
    },
}

impl LedgerEvent {
    /// Stable name stored in the `event_type` column.
    pub fn type_name(&self) -> &'static str {
        match self {
            LedgerEvent::ClientCreated { .. }      => "client_created",
            LedgerEvent::OperationRecorded { .. }  => "operation_recorded",
            LedgerEvent::OperationEdited { .. }    => "operation_edited",
            LedgerEvent::OperationDeleted { .. }   => "operation_deleted",
            LedgerEvent::BalanceRefreshed { .. }   => "balance_refreshed",
            LedgerEvent::DriftDetected { .. }      => "drift_detected",
            LedgerEvent::AccessTokenIssued { .. }  => "access_token_issued",
            LedgerEvent::AccessTokenRevoked { .. } => "access_token_revoked",
        }
    }
}

/// A persisted event row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub client_id:  Option<ClientId>,
    pub event_type: String,
    pub payload:    String,
    pub created_at: Timestamp,
}

impl EventLogEntry {
    pub fn event(&self) -> serde_json::Result<LedgerEvent> {
        serde_json::from_str(&self.payload)
    }
}

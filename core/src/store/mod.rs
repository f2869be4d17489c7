//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Reconstruction, refresh and reporting call store methods; they never
//! execute SQL directly.

use crate::{
    error::LedgerResult,
    event::{EventLogEntry, LedgerEvent},
    types::{Amount, ClientId},
};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod access;
mod client;
mod operation;

pub struct LedgerStore {
    conn: Connection,
    path: Option<String>, // None for :memory:
}

impl LedgerStore {
    pub fn open(path: &str, busy_timeout: Duration) -> LedgerResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(busy_timeout)?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> LedgerResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_clients.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_operations.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_qr_access.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_event_log.sql"))?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, client_id: Option<ClientId>, event: &LedgerEvent) -> LedgerResult<()> {
        let payload = serde_json::to_string(event)?;
        self.conn.execute(
            "INSERT INTO event_log (client_id, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![client_id, event.type_name(), payload, Utc::now()],
        )?;
        Ok(())
    }

    pub fn events_for_client(&self, client_id: ClientId) -> LedgerResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, client_id, event_type, payload, created_at
             FROM event_log WHERE client_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![client_id], map_event_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn events_of_type(&self, event_type: &str) -> LedgerResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, client_id, event_type, payload, created_at
             FROM event_log WHERE event_type = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![event_type], map_event_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn map_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventLogEntry> {
    Ok(EventLogEntry {
        id: Some(row.get(0)?),
        client_id: row.get(1)?,
        event_type: row.get(2)?,
        payload: row.get(3)?,
        created_at: row.get(4)?,
    })
}

// ── Row types ─────────────────────────────────────────────────────

/// Confirmed totals per operation kind over a period.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OperationTotals {
    pub deposits:               Amount,
    pub withdrawals:            Amount,
    pub transfers:              Amount,
    pub direct_transfers:       Amount,
    pub deposit_count:          i64,
    pub withdrawal_count:       i64,
    pub transfer_count:         i64,
    pub direct_transfer_count:  i64,
}

/// Snapshot of the client table used for treasury reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientTotals {
    pub client_count:   i64,
    pub active_clients: i64,
    pub total_balance:  Amount,
}

/// Archived copy of a soft-deleted operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeletedOperationRow {
    pub archive_id:  i64,
    pub operation:   crate::operation::Operation,
    pub deleted_at:  crate::types::Timestamp,
    pub reason:      Option<String>,
}

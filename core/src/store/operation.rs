use super::{DeletedOperationRow, LedgerStore, OperationTotals};
use crate::{
    client::ClientRef,
    error::{LedgerError, LedgerResult},
    operation::{operation_id, Operation, OperationEdit, OperationKind},
    types::Timestamp,
};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

const OWNED_COLUMNS: &str =
    "id, client_id, client_name, amount, operation_date, created_at, description, status";
const TRANSFER_COLUMNS: &str = "id, kind, from_client_id, to_client_id, from_client_name, \
     to_client_name, amount, operation_date, created_at, description, status";

/// Split `direct_transfer-12` into its kind and row id.
fn parse_operation_id(id: &str) -> LedgerResult<(OperationKind, i64)> {
    let invalid = || LedgerError::InvalidOperation(format!("malformed operation id '{id}'"));
    let (kind, row) = id.rsplit_once('-').ok_or_else(invalid)?;
    let kind: OperationKind = kind.parse().map_err(|_| invalid())?;
    let row: i64 = row.parse().map_err(|_| invalid())?;
    Ok((kind, row))
}

fn validate(op: &Operation) -> LedgerResult<()> {
    if !op.amount.is_finite() || op.amount <= 0.0 {
        return Err(LedgerError::InvalidOperation(format!(
            "amount must be a positive number (got {})",
            op.amount
        )));
    }
    if op.effective_date().is_none() {
        return Err(LedgerError::InvalidOperation("operation has no date".into()));
    }
    let has_party = if op.kind.is_transfer() {
        (op.from_client_id.is_some() || op.from_client_name.is_some())
            && (op.to_client_id.is_some() || op.to_client_name.is_some())
    } else {
        op.client_id.is_some() || op.client_name.is_some()
    };
    if !has_party {
        return Err(LedgerError::InvalidOperation(format!(
            "{} does not reference its client(s)",
            op.kind
        )));
    }
    Ok(())
}

impl LedgerStore {
    // ── Operations ────────────────────────────────────────────────

    /// Insert `op` into its table and return it with the assigned id.
    pub fn insert_operation(&self, op: &Operation) -> LedgerResult<Operation> {
        validate(op)?;
        let created_at = op.date.unwrap_or_else(Utc::now);
        if op.kind.is_transfer() {
            self.conn.execute(
                "INSERT INTO transfers
                 (kind, from_client_id, to_client_id, from_client_name, to_client_name,
                  amount, operation_date, created_at, description, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    op.kind,
                    op.from_client_id,
                    op.to_client_id,
                    op.from_client_name,
                    op.to_client_name,
                    op.amount,
                    op.operation_date,
                    created_at,
                    op.description,
                    op.status,
                ],
            )?;
        } else {
            let sql = format!(
                "INSERT INTO {}
                 (client_id, client_name, amount, operation_date, created_at, description, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                op.kind.table()
            );
            self.conn.execute(
                &sql,
                params![
                    op.client_id,
                    op.client_name,
                    op.amount,
                    op.operation_date,
                    created_at,
                    op.description,
                    op.status,
                ],
            )?;
        }
        let row_id = self.conn.last_insert_rowid();
        Ok(Operation {
            id: operation_id(op.kind, row_id),
            date: Some(created_at),
            ..op.clone()
        })
    }

    pub fn find_operation(&self, id: &str) -> LedgerResult<Option<Operation>> {
        let (kind, row_id) = parse_operation_id(id)?;
        let found = if kind.is_transfer() {
            let sql = format!("SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = ?1 AND kind = ?2");
            self.conn
                .query_row(&sql, params![row_id, kind], map_transfer_row)
                .optional()?
        } else {
            let sql = format!("SELECT {OWNED_COLUMNS} FROM {} WHERE id = ?1", kind.table());
            self.conn
                .query_row(&sql, params![row_id], |row| map_owned_row(kind, row))
                .optional()?
        };
        Ok(found)
    }

    pub fn operation(&self, id: &str) -> LedgerResult<Operation> {
        self.find_operation(id)?
            .ok_or_else(|| LedgerError::not_found("operation", id))
    }

    /// Edit amount, date and description in place. Returns the row as it
    /// was before and after the edit.
    pub fn update_operation(
        &self,
        id: &str,
        edit: &OperationEdit,
    ) -> LedgerResult<(Operation, Operation)> {
        let before = self.operation(id)?;
        let mut after = before.clone();
        if let Some(amount) = edit.amount {
            after.amount = amount;
        }
        if let Some(date) = edit.operation_date {
            after.operation_date = Some(date);
        }
        if let Some(description) = &edit.description {
            after.description = Some(description.clone());
        }
        validate(&after)?;

        let row_id = after.row_id().ok_or_else(|| LedgerError::not_found("operation", id))?;
        let sql = format!(
            "UPDATE {} SET amount = ?1, operation_date = ?2, description = ?3 WHERE id = ?4",
            after.kind.table()
        );
        self.conn.execute(
            &sql,
            params![after.amount, after.operation_date, after.description, row_id],
        )?;
        Ok((before, after))
    }

    /// Persist the id columns of `op` (used by the name-to-id backfill).
    pub fn update_operation_references(&self, op: &Operation) -> LedgerResult<()> {
        let row_id = op.row_id().ok_or_else(|| LedgerError::not_found("operation", &op.id))?;
        if op.kind.is_transfer() {
            self.conn.execute(
                "UPDATE transfers SET from_client_id = ?1, to_client_id = ?2 WHERE id = ?3",
                params![op.from_client_id, op.to_client_id, row_id],
            )?;
        } else {
            let sql = format!("UPDATE {} SET client_id = ?1 WHERE id = ?2", op.kind.table());
            self.conn.execute(&sql, params![op.client_id, row_id])?;
        }
        Ok(())
    }

    /// Copy the row into its archive table, then remove it from the live
    /// table, in one transaction.
    pub fn soft_delete_operation(&self, id: &str, reason: Option<&str>) -> LedgerResult<Operation> {
        let op = self.operation(id)?;
        let row_id = op.row_id().ok_or_else(|| LedgerError::not_found("operation", id))?;
        let deleted_at: Timestamp = Utc::now();

        let tx = self.conn.unchecked_transaction()?;
        if op.kind.is_transfer() {
            tx.execute(
                "INSERT INTO deleted_transfers_log
                 (original_id, kind, from_client_id, to_client_id, from_client_name, to_client_name,
                  amount, operation_date, created_at, description, status, deleted_at, reason)
                 SELECT id, kind, from_client_id, to_client_id, from_client_name, to_client_name,
                        amount, operation_date, created_at, description, status, ?2, ?3
                 FROM transfers WHERE id = ?1",
                params![row_id, deleted_at, reason],
            )?;
        } else {
            let sql = format!(
                "INSERT INTO {archive}
                 (original_id, client_id, client_name, amount, operation_date, created_at,
                  description, status, deleted_at, reason)
                 SELECT id, client_id, client_name, amount, operation_date, created_at,
                        description, status, ?2, ?3
                 FROM {live} WHERE id = ?1",
                archive = op.kind.archive_table(),
                live = op.kind.table(),
            );
            tx.execute(&sql, params![row_id, deleted_at, reason])?;
        }
        let sql = format!("DELETE FROM {} WHERE id = ?1", op.kind.table());
        tx.execute(&sql, params![row_id])?;
        tx.commit()?;

        log::info!("Archived {} ({:.2})", op.id, op.amount);
        Ok(op)
    }

    /// Archived rows for one operation kind, oldest deletion first.
    pub fn deleted_operations(&self, kind: OperationKind) -> LedgerResult<Vec<DeletedOperationRow>> {
        if kind.is_transfer() {
            let mut stmt = self.conn.prepare(
                "SELECT original_id, kind, from_client_id, to_client_id, from_client_name,
                        to_client_name, amount, operation_date, created_at, description, status,
                        archive_id, deleted_at, reason
                 FROM deleted_transfers_log WHERE kind = ?1
                 ORDER BY archive_id ASC",
            )?;
            let rows = stmt.query_map(params![kind], |row| {
                Ok(DeletedOperationRow {
                    operation: map_transfer_row(row)?,
                    archive_id: row.get(11)?,
                    deleted_at: row.get(12)?,
                    reason: row.get(13)?,
                })
            })?;
            return rows.collect::<Result<Vec<_>, _>>().map_err(Into::into);
        }

        let sql = format!(
            "SELECT original_id, client_id, client_name, amount, operation_date, created_at,
                    description, status, archive_id, deleted_at, reason
             FROM {} ORDER BY archive_id ASC",
            kind.archive_table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(DeletedOperationRow {
                operation: map_owned_row(kind, row)?,
                archive_id: row.get(8)?,
                deleted_at: row.get(9)?,
                reason: row.get(10)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Every live operation referencing `client` by id or by full name, in
    /// no particular order.
    pub fn operations_for_client(&self, client: &ClientRef) -> LedgerResult<Vec<Operation>> {
        let mut ops = Vec::new();
        for kind in [OperationKind::Deposit, OperationKind::Withdrawal] {
            let sql = format!(
                "SELECT {OWNED_COLUMNS} FROM {} WHERE client_id = ?1 OR client_name = ?2",
                kind.table()
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params![client.id, client.full_name], |row| {
                map_owned_row(kind, row)
            })?;
            for row in rows {
                ops.push(row?);
            }
        }

        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers
             WHERE from_client_id = ?1 OR to_client_id = ?1
                OR from_client_name = ?2 OR to_client_name = ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![client.id, client.full_name], map_transfer_row)?;
        for row in rows {
            ops.push(row?);
        }
        Ok(ops)
    }

    pub fn all_operations(&self) -> LedgerResult<Vec<Operation>> {
        let mut ops = Vec::new();
        for kind in [OperationKind::Deposit, OperationKind::Withdrawal] {
            let sql = format!("SELECT {OWNED_COLUMNS} FROM {}", kind.table());
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| map_owned_row(kind, row))?;
            for row in rows {
                ops.push(row?);
            }
        }
        let sql = format!("SELECT {TRANSFER_COLUMNS} FROM transfers");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_transfer_row)?;
        for row in rows {
            ops.push(row?);
        }
        Ok(ops)
    }

    /// Confirmed totals per kind with effective date in `[from, to)`.
    /// Open bounds are unbounded.
    pub fn operation_totals(
        &self,
        from: Option<Timestamp>,
        to: Option<Timestamp>,
    ) -> LedgerResult<OperationTotals> {
        const RANGE: &str = "status = 'confirmed'
             AND (?1 IS NULL OR COALESCE(operation_date, created_at) >= ?1)
             AND (?2 IS NULL OR COALESCE(operation_date, created_at) < ?2)";

        let sum_owned = |table: &str| -> LedgerResult<(f64, i64)> {
            let sql = format!(
                "SELECT COALESCE(SUM(amount), 0.0), COUNT(*) FROM {table} WHERE {RANGE}"
            );
            let totals = self
                .conn
                .query_row(&sql, params![from, to], |row| Ok((row.get(0)?, row.get(1)?)))?;
            Ok(totals)
        };
        let sum_transfers = |kind: OperationKind| -> LedgerResult<(f64, i64)> {
            let sql = format!(
                "SELECT COALESCE(SUM(amount), 0.0), COUNT(*) FROM transfers
                 WHERE kind = ?3 AND {RANGE}"
            );
            let totals = self.conn.query_row(&sql, params![from, to, kind], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            Ok(totals)
        };

        let (deposits, deposit_count) = sum_owned("deposits")?;
        let (withdrawals, withdrawal_count) = sum_owned("withdrawals")?;
        let (transfers, transfer_count) = sum_transfers(OperationKind::Transfer)?;
        let (direct_transfers, direct_transfer_count) =
            sum_transfers(OperationKind::DirectTransfer)?;

        Ok(OperationTotals {
            deposits,
            withdrawals,
            transfers,
            direct_transfers,
            deposit_count,
            withdrawal_count,
            transfer_count,
            direct_transfer_count,
        })
    }
}

/// Row shape shared by `deposits`, `withdrawals` and their archives; the
/// first eight columns must follow `OWNED_COLUMNS`.
fn map_owned_row(kind: OperationKind, row: &rusqlite::Row<'_>) -> rusqlite::Result<Operation> {
    Ok(Operation {
        id: operation_id(kind, row.get(0)?),
        kind,
        client_id: row.get(1)?,
        client_name: row.get(2)?,
        amount: row.get(3)?,
        operation_date: row.get(4)?,
        date: row.get(5)?,
        description: row.get(6)?,
        status: row.get(7)?,
        from_client_id: None,
        to_client_id: None,
        from_client_name: None,
        to_client_name: None,
    })
}

/// The first eleven columns must follow `TRANSFER_COLUMNS`.
fn map_transfer_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Operation> {
    let kind: OperationKind = row.get(1)?;
    Ok(Operation {
        id: operation_id(kind, row.get(0)?),
        kind,
        from_client_id: row.get(2)?,
        to_client_id: row.get(3)?,
        from_client_name: row.get(4)?,
        to_client_name: row.get(5)?,
        amount: row.get(6)?,
        operation_date: row.get(7)?,
        date: row.get(8)?,
        description: row.get(9)?,
        status: row.get(10)?,
        client_id: None,
        client_name: None,
    })
}

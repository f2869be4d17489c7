use super::{ClientTotals, LedgerStore};
use crate::{
    client::{Client, ClientSort, ClientStatus, NewClient},
    error::{LedgerError, LedgerResult},
    types::{Amount, ClientId},
};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

const CLIENT_COLUMNS: &str =
    "id, first_name, last_name, phone, email, balance, status, created_at";

impl LedgerStore {
    // ── Clients ───────────────────────────────────────────────────

    pub fn insert_client(&self, new: &NewClient) -> LedgerResult<Client> {
        if new.first_name.trim().is_empty() && new.last_name.trim().is_empty() {
            return Err(LedgerError::InvalidOperation(
                "a client needs a first or last name".into(),
            ));
        }
        self.conn.execute(
            "INSERT INTO clients (first_name, last_name, phone, email, balance, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
            params![
                new.first_name.trim(),
                new.last_name.trim(),
                new.phone,
                new.email,
                ClientStatus::Active,
                Utc::now(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.client(id)
    }

    pub fn find_client(&self, client_id: ClientId) -> LedgerResult<Option<Client>> {
        let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1");
        self.conn
            .query_row(&sql, params![client_id], map_client_row)
            .optional()
            .map_err(Into::into)
    }

    /// Like `find_client`, but a missing row is an error.
    pub fn client(&self, client_id: ClientId) -> LedgerResult<Client> {
        self.find_client(client_id)?
            .ok_or_else(|| LedgerError::not_found("client", client_id))
    }

    pub fn all_clients(&self) -> LedgerResult<Vec<Client>> {
        self.search_clients("", ClientSort::Name)
    }

    /// Case-insensitive substring match on first name, last name or
    /// `"first last"`. An empty query returns every client.
    pub fn search_clients(&self, query: &str, sort: ClientSort) -> LedgerResult<Vec<Client>> {
        let pattern = format!("%{}%", escape_like(query.trim()));
        let sql = format!(
            "SELECT {CLIENT_COLUMNS} FROM clients
             WHERE first_name LIKE ?1 ESCAPE '\\'
                OR last_name LIKE ?1 ESCAPE '\\'
                OR (first_name || ' ' || last_name) LIKE ?1 ESCAPE '\\'
             ORDER BY {}",
            sort.order_by()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![pattern], map_client_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn update_client_status(&self, client_id: ClientId, status: ClientStatus) -> LedgerResult<()> {
        let changed = self.conn.execute(
            "UPDATE clients SET status = ?1 WHERE id = ?2",
            params![status, client_id],
        )?;
        if changed == 0 {
            return Err(LedgerError::not_found("client", client_id));
        }
        Ok(())
    }

    /// Overwrite the cached balance.
    pub fn set_client_balance(&self, client_id: ClientId, balance: Amount) -> LedgerResult<()> {
        let changed = self.conn.execute(
            "UPDATE clients SET balance = ?1 WHERE id = ?2",
            params![balance, client_id],
        )?;
        if changed == 0 {
            return Err(LedgerError::not_found("client", client_id));
        }
        Ok(())
    }

    pub fn delete_client(&self, client_id: ClientId) -> LedgerResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM clients WHERE id = ?1", params![client_id])?;
        if changed == 0 {
            return Err(LedgerError::not_found("client", client_id));
        }
        Ok(())
    }

    pub fn client_totals(&self) -> LedgerResult<ClientTotals> {
        let totals = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(balance), 0.0)
             FROM clients",
            [],
            |row| {
                Ok(ClientTotals {
                    client_count: row.get(0)?,
                    active_clients: row.get(1)?,
                    total_balance: row.get(2)?,
                })
            },
        )?;
        Ok(totals)
    }
}

/// Escape `LIKE` wildcards so they match literally under `ESCAPE '\'`.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn map_client_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        balance: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
    })
}

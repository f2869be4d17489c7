use super::LedgerStore;
use crate::{
    access::AccessToken,
    error::{LedgerError, LedgerResult},
    types::ClientId,
};
use rusqlite::{params, OptionalExtension};

impl LedgerStore {
    // ── Public access tokens ──────────────────────────────────────

    pub fn insert_access_token(&self, token: &AccessToken) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO qr_access (token, client_id, created_at, expires_at, revoked)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                token.token,
                token.client_id,
                token.created_at,
                token.expires_at,
                token.revoked,
            ],
        )?;
        Ok(())
    }

    pub fn find_access_token(&self, token: &str) -> LedgerResult<Option<AccessToken>> {
        self.conn
            .query_row(
                "SELECT token, client_id, created_at, expires_at, revoked
                 FROM qr_access WHERE token = ?1",
                params![token],
                map_token_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn access_tokens_for_client(&self, client_id: ClientId) -> LedgerResult<Vec<AccessToken>> {
        let mut stmt = self.conn.prepare(
            "SELECT token, client_id, created_at, expires_at, revoked
             FROM qr_access WHERE client_id = ?1
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![client_id], map_token_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn revoke_access_token(&self, token: &str) -> LedgerResult<()> {
        let changed = self.conn.execute(
            "UPDATE qr_access SET revoked = 1 WHERE token = ?1",
            params![token],
        )?;
        if changed == 0 {
            return Err(LedgerError::InvalidToken);
        }
        Ok(())
    }
}

fn map_token_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccessToken> {
    Ok(AccessToken {
        token: row.get(0)?,
        client_id: row.get(1)?,
        created_at: row.get(2)?,
        expires_at: row.get(3)?,
        revoked: row.get(4)?,
    })
}

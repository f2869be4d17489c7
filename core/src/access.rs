//! Public access tokens.
//!
//! A token in `qr_access` grants read-only access to one client's profile
//! and ledger without signing in. Tokens may expire and may be revoked.

use crate::{
    client::{Client, ClientStatus},
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    ledger::{reconstruct, Ledger},
    store::LedgerStore,
    types::{Amount, ClientId, Timestamp},
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessToken {
    pub token:      String,
    pub client_id:  ClientId,
    pub created_at: Timestamp,
    pub expires_at: Option<Timestamp>,
    pub revoked:    bool,
}

impl AccessToken {
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// What a token holder may see: no contact details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicProfile {
    pub id:         ClientId,
    pub first_name: String,
    pub last_name:  String,
    pub balance:    Amount,
    pub status:     ClientStatus,
}

impl From<&Client> for PublicProfile {
    fn from(c: &Client) -> Self {
        Self {
            id: c.id,
            first_name: c.first_name.clone(),
            last_name: c.last_name.clone(),
            balance: c.balance,
            status: c.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicView {
    pub profile: PublicProfile,
    pub ledger:  Ledger,
}

pub struct AccessService<'a> {
    store:     &'a LedgerStore,
    tolerance: Amount,
}

impl<'a> AccessService<'a> {
    pub fn new(store: &'a LedgerStore, tolerance: Amount) -> Self {
        Self { store, tolerance }
    }

    /// Issue a fresh token for an existing client.
    pub fn issue(&self, client_id: ClientId, valid_for: Option<Duration>) -> LedgerResult<AccessToken> {
        self.store.client(client_id)?;
        let now = Utc::now();
        let token = AccessToken {
            token: Uuid::new_v4().to_string(),
            client_id,
            created_at: now,
            expires_at: valid_for.map(|d| now + d),
            revoked: false,
        };
        self.store.insert_access_token(&token)?;
        self.store.append_event(
            Some(client_id),
            &LedgerEvent::AccessTokenIssued { client_id, expires_at: token.expires_at },
        )?;
        log::info!("Issued public access token for client {client_id}");
        Ok(token)
    }

    /// Client id the token grants access to.
    pub fn resolve(&self, token: &str) -> LedgerResult<ClientId> {
        self.resolve_at(token, Utc::now())
    }

    pub fn resolve_at(&self, token: &str, now: Timestamp) -> LedgerResult<ClientId> {
        let Some(found) = self.store.find_access_token(token.trim())? else {
            return Err(LedgerError::InvalidToken);
        };
        if found.revoked {
            return Err(LedgerError::InvalidToken);
        }
        if found.is_expired_at(now) {
            let expired_at = found.expires_at.map(|t| t.to_rfc3339()).unwrap_or_default();
            return Err(LedgerError::TokenExpired { expired_at });
        }
        Ok(found.client_id)
    }

    pub fn revoke(&self, token: &str) -> LedgerResult<()> {
        let Some(found) = self.store.find_access_token(token)? else {
            return Err(LedgerError::InvalidToken);
        };
        self.store.revoke_access_token(token)?;
        self.store.append_event(
            Some(found.client_id),
            &LedgerEvent::AccessTokenRevoked { client_id: found.client_id },
        )?;
        Ok(())
    }

    /// Profile and reconstructed ledger for the token's client.
    pub fn public_view(&self, token: &str) -> LedgerResult<PublicView> {
        let client_id = self.resolve(token)?;
        let client = self.store.client(client_id)?;
        let operations = self.store.operations_for_client(&client.reference())?;
        let ledger = reconstruct(Some(&client), &operations, self.tolerance);
        Ok(PublicView {
            profile: PublicProfile::from(&client),
            ledger,
        })
    }
}

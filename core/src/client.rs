//! Client records.
//!
//! A client's `balance` is a cache of its ledger total. It is recomputed by
//! `refresh` and compared against reconstructions by `ledger`; it is never a
//! source of truth.

use crate::types::{Amount, ClientId, Timestamp};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    pub id:         ClientId,
    pub first_name: String,
    pub last_name:  String,
    pub phone:      Option<String>,
    pub email:      Option<String>,
    pub balance:    Amount,
    pub status:     ClientStatus,
    pub created_at: Timestamp,
}

impl Client {
    /// `"{first} {last}"` with surrounding whitespace removed. This is the
    /// exact string free-text operation references are compared against.
    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }

    pub fn reference(&self) -> ClientRef {
        ClientRef {
            id:        self.id,
            full_name: self.full_name(),
        }
    }
}

pub fn full_name(first: &str, last: &str) -> String {
    format!("{first} {last}").trim().to_string()
}

/// The two ways an operation can point at a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRef {
    pub id:        ClientId,
    pub full_name: String,
}

impl ClientRef {
    pub fn matches_id(&self, candidate: Option<ClientId>) -> bool {
        candidate == Some(self.id)
    }

    /// Exact equality. A blank full name never matches anything.
    pub fn matches_name(&self, candidate: Option<&str>) -> bool {
        !self.full_name.is_empty() && candidate == Some(self.full_name.as_str())
    }
}

/// Fields needed to create a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewClient {
    pub first_name: String,
    pub last_name:  String,
    pub phone:      Option<String>,
    pub email:      Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    Inactive,
    Suspended,
}

impl ClientStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ClientStatus::Active    => "active",
            ClientStatus::Inactive  => "inactive",
            ClientStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active"    => Ok(ClientStatus::Active),
            "inactive"  => Ok(ClientStatus::Inactive),
            "suspended" => Ok(ClientStatus::Suspended),
            other       => Err(format!("unknown client status '{other}'")),
        }
    }
}

impl ToSql for ClientStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ClientStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// Sort orders offered by client search.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientSort {
    #[default]
    Name,
    BalanceDesc,
    Newest,
}

impl ClientSort {
    pub(crate) fn order_by(self) -> &'static str {
        match self {
            ClientSort::Name        => "last_name COLLATE NOCASE ASC, first_name COLLATE NOCASE ASC, id ASC",
            ClientSort::BalanceDesc => "balance DESC, id ASC",
            ClientSort::Newest      => "created_at DESC, id DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_is_trimmed() {
        assert_eq!(full_name("Ana", "Lopez"), "Ana Lopez");
        assert_eq!(full_name("Ana", ""), "Ana");
        assert_eq!(full_name("", ""), "");
    }

    #[test]
    fn blank_reference_never_matches_by_name() {
        let r = ClientRef { id: 1, full_name: String::new() };
        assert!(!r.matches_name(Some("")));
        assert!(r.matches_id(Some(1)));
        assert!(!r.matches_id(None));
    }
}

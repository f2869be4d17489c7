//! Operation records: the heterogeneous rows a ledger is built from.

use crate::types::{Amount, ClientId, OperationId, Timestamp};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Deposit,
    Withdrawal,
    Transfer,
    DirectTransfer,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Deposit        => "deposit",
            OperationKind::Withdrawal     => "withdrawal",
            OperationKind::Transfer       => "transfer",
            OperationKind::DirectTransfer => "direct_transfer",
        }
    }

    /// Transfers and direct transfers have a sender and a receiver instead
    /// of a single owning client.
    pub fn is_transfer(self) -> bool {
        matches!(self, OperationKind::Transfer | OperationKind::DirectTransfer)
    }

    /// Live table holding rows of this kind.
    pub(crate) fn table(self) -> &'static str {
        match self {
            OperationKind::Deposit    => "deposits",
            OperationKind::Withdrawal => "withdrawals",
            OperationKind::Transfer | OperationKind::DirectTransfer => "transfers",
        }
    }

    /// Archive table rows are copied into on soft delete.
    pub(crate) fn archive_table(self) -> &'static str {
        match self {
            OperationKind::Deposit    => "deleted_deposits",
            OperationKind::Withdrawal => "deleted_withdrawals",
            OperationKind::Transfer | OperationKind::DirectTransfer => "deleted_transfers_log",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit"         => Ok(OperationKind::Deposit),
            "withdrawal"      => Ok(OperationKind::Withdrawal),
            "transfer"        => Ok(OperationKind::Transfer),
            "direct_transfer" => Ok(OperationKind::DirectTransfer),
            other             => Err(format!("unknown operation kind '{other}'")),
        }
    }
}

impl ToSql for OperationKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for OperationKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Confirmed,
    Pending,
    Cancelled,
}

impl OperationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::Confirmed => "confirmed",
            OperationStatus::Pending   => "pending",
            OperationStatus::Cancelled => "cancelled",
        }
    }

    /// Only confirmed operations move money.
    pub fn counts_toward_balance(self) -> bool {
        self == OperationStatus::Confirmed
    }
}

impl FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(OperationStatus::Confirmed),
            "pending"   => Ok(OperationStatus::Pending),
            "cancelled" => Ok(OperationStatus::Cancelled),
            other       => Err(format!("unknown operation status '{other}'")),
        }
    }
}

impl ToSql for OperationStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for OperationStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// One deposit, withdrawal, transfer or direct transfer.
///
/// Deposits and withdrawals use `client_id` / `client_name`; transfers use
/// the `from_*` / `to_*` pairs. Any of these may be missing, and id and name
/// may both be set for the same party.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    #[serde(default)]
    pub id:               OperationId,
    pub kind:             OperationKind,
    pub amount:           Amount,
    pub operation_date:   Option<Timestamp>,
    pub date:             Option<Timestamp>,
    pub client_id:        Option<ClientId>,
    pub client_name:      Option<String>,
    pub from_client_id:   Option<ClientId>,
    pub to_client_id:     Option<ClientId>,
    pub from_client_name: Option<String>,
    pub to_client_name:   Option<String>,
    pub description:      Option<String>,
    #[serde(default)]
    pub status:           OperationStatus,
}

impl Operation {
    fn blank(kind: OperationKind, amount: Amount, date: Timestamp) -> Self {
        Self {
            id: String::new(),
            kind,
            amount,
            operation_date: Some(date),
            date: Some(date),
            client_id: None,
            client_name: None,
            from_client_id: None,
            to_client_id: None,
            from_client_name: None,
            to_client_name: None,
            description: None,
            status: OperationStatus::Confirmed,
        }
    }

    pub fn deposit(client_id: ClientId, amount: Amount, date: Timestamp) -> Self {
        Self {
            client_id: Some(client_id),
            ..Self::blank(OperationKind::Deposit, amount, date)
        }
    }

    pub fn withdrawal(client_id: ClientId, amount: Amount, date: Timestamp) -> Self {
        Self {
            client_id: Some(client_id),
            ..Self::blank(OperationKind::Withdrawal, amount, date)
        }
    }

    pub fn transfer(from: ClientId, to: ClientId, amount: Amount, date: Timestamp) -> Self {
        Self {
            from_client_id: Some(from),
            to_client_id: Some(to),
            ..Self::blank(OperationKind::Transfer, amount, date)
        }
    }

    pub fn direct_transfer(from: ClientId, to: ClientId, amount: Amount, date: Timestamp) -> Self {
        Self {
            kind: OperationKind::DirectTransfer,
            ..Self::transfer(from, to, amount, date)
        }
    }

    pub fn with_id(mut self, id: impl Into<OperationId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: OperationStatus) -> Self {
        self.status = status;
        self
    }

    /// The date the operation is ordered by: the operation date when set,
    /// otherwise the generic record date.
    pub fn effective_date(&self) -> Option<Timestamp> {
        self.operation_date.or(self.date)
    }

    /// Numeric row id within the operation's table, parsed from the
    /// `{kind}-{row}` identifier.
    pub fn row_id(&self) -> Option<i64> {
        self.id
            .strip_prefix(self.kind.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|n| n.parse().ok())
    }
}

pub fn operation_id(kind: OperationKind, row_id: i64) -> OperationId {
    format!("{}-{row_id}", kind.as_str())
}

/// Fields that may be changed on an existing operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationEdit {
    pub amount:         Option<Amount>,
    pub operation_date: Option<Timestamp>,
    pub description:    Option<String>,
}

impl OperationEdit {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none() && self.operation_date.is_none() && self.description.is_none()
    }
}

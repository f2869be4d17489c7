//! Shared primitive types used across the ledger.

use chrono::{DateTime, Utc};

/// Numeric identifier of a client row.
pub type ClientId = i64;

/// Kind-prefixed operation identifier, e.g. `deposit-12`.
pub type OperationId = String;

/// Monetary amount. Stored balances use the same representation.
pub type Amount = f64;

/// All timestamps are UTC.
pub type Timestamp = DateTime<Utc>;

/// Default tolerance used when comparing a reconstructed balance to the
/// stored one.
pub const DEFAULT_DRIFT_TOLERANCE: Amount = 0.001;

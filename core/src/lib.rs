//! clientbook-core: client ledgers rebuilt from deposits, withdrawals and
//! transfers, with drift detection against stored balances.

pub mod access;
pub mod balance;
pub mod book;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod export;
pub mod identity;
pub mod ledger;
pub mod operation;
pub mod refresh;
pub mod retry;
pub mod statistics;
pub mod store;
pub mod types;

//! Credit ledger for the payment saga participant.
//!
//! The ledger is the sole source of truth for per-user credit balances.
//! Accounts are created lazily with a fixed starting balance, and every
//! mutation is keyed by a request ID so that redelivered commands do
//! not debit or credit twice.
//!
//! Two implementations are provided: [`PostgresLedger`] for production
//! and [`InMemoryLedger`] for tests.

pub mod account;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use account::{CreditAccount, EntryKind, LedgerEntry, STARTING_BALANCE};
pub use common::{RequestId, Username};
pub use error::{LedgerError, Result};
pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;
pub use store::{DebitOutcome, LedgerStore};

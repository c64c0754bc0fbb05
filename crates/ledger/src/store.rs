use async_trait::async_trait;
use common::{RequestId, Username};

use crate::{CreditAccount, LedgerEntry, Result};

/// Result of a conditional debit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// The balance covered the amount and was reduced in one atomic
    /// step. Carries the balance after the debit.
    Applied { balance: i64 },

    /// The balance did not cover the amount; nothing was written.
    /// Carries the balance that was observed.
    Insufficient { balance: i64 },

    /// A debit with this request ID was already applied; nothing was
    /// written. Carries the current balance.
    Duplicate { balance: i64 },
}

impl DebitOutcome {
    /// Returns true if the debit is in effect (applied now or earlier).
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            DebitOutcome::Applied { .. } | DebitOutcome::Duplicate { .. }
        )
    }

    /// Returns the balance observed by the attempt.
    pub fn balance(&self) -> i64 {
        match self {
            DebitOutcome::Applied { balance }
            | DebitOutcome::Insufficient { balance }
            | DebitOutcome::Duplicate { balance } => *balance,
        }
    }
}

/// Core trait for credit ledger implementations.
///
/// Every operation runs as a single transaction: it acquires a
/// connection, performs its reads and writes, and releases it on every
/// exit path. A failed operation leaves the account unchanged.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Looks up the account for `username`, creating it with the
    /// starting balance if absent.
    ///
    /// Creation is insert-if-absent: concurrent first-time calls for
    /// the same username produce exactly one account.
    async fn ensure_account(&self, username: &Username) -> Result<CreditAccount>;

    /// Returns the current balance.
    ///
    /// Fails with `AccountNotFound` if the account was never ensured.
    async fn balance(&self, username: &Username) -> Result<i64>;

    /// Debits `amount` only if the current balance covers it, as one
    /// conditional write. A balance exactly equal to `amount` is
    /// sufficient.
    ///
    /// A request ID whose debit was already applied yields
    /// [`DebitOutcome::Duplicate`] without touching the balance.
    async fn try_debit(
        &self,
        username: &Username,
        amount: i64,
        request: RequestId,
    ) -> Result<DebitOutcome>;

    /// Unconditionally subtracts `amount` from the balance.
    ///
    /// The caller is responsible for having verified affordability;
    /// this operation does not re-check it. Duplicate request IDs are
    /// no-ops. Returns the balance after the operation.
    async fn debit(&self, username: &Username, amount: i64, request: RequestId) -> Result<i64>;

    /// Unconditionally adds `amount` to the balance, reversing a prior
    /// debit as saga compensation. Duplicate request IDs are no-ops.
    /// Returns the balance after the operation.
    async fn credit(&self, username: &Username, amount: i64, request: RequestId) -> Result<i64>;

    /// Returns the applied mutations for an account, oldest first.
    async fn history(&self, username: &Username) -> Result<Vec<LedgerEntry>>;
}

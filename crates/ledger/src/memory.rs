use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{RequestId, Username};
use tokio::sync::RwLock;

use crate::{
    CreditAccount, EntryKind, LedgerEntry, LedgerError, Result, STARTING_BALANCE,
    store::{DebitOutcome, LedgerStore},
};

#[derive(Debug, Default)]
struct InMemoryLedgerState {
    accounts: HashMap<Username, i64>,
    applied: HashSet<(RequestId, EntryKind)>,
    entries: Vec<LedgerEntry>,
    fail: bool,
}

impl InMemoryLedgerState {
    fn check_available(&self) -> Result<()> {
        if self.fail {
            return Err(LedgerError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn record(&mut self, username: &Username, kind: EntryKind, amount: i64, request: RequestId) {
        self.applied.insert((request, kind));
        self.entries.push(LedgerEntry {
            request_id: request,
            kind,
            username: username.clone(),
            amount,
            recorded_at: Utc::now(),
        });
    }
}

/// In-memory ledger implementation for testing.
///
/// Holds all accounts behind a single lock, which gives every
/// operation the same atomicity the PostgreSQL implementation gets
/// from per-operation transactions.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<InMemoryLedgerState>>,
}

impl InMemoryLedger {
    /// Creates a new empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of accounts.
    pub async fn account_count(&self) -> usize {
        self.state.read().await.accounts.len()
    }

    /// Configures every subsequent operation to fail with a storage
    /// error, simulating an unreachable database.
    pub async fn set_fail(&self, fail: bool) {
        self.state.write().await.fail = fail;
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn ensure_account(&self, username: &Username) -> Result<CreditAccount> {
        let mut state = self.state.write().await;
        state.check_available()?;
        let balance = *state
            .accounts
            .entry(username.clone())
            .or_insert(STARTING_BALANCE);
        Ok(CreditAccount {
            username: username.clone(),
            balance,
        })
    }

    async fn balance(&self, username: &Username) -> Result<i64> {
        let state = self.state.read().await;
        state.check_available()?;
        state
            .accounts
            .get(username)
            .copied()
            .ok_or_else(|| LedgerError::AccountNotFound(username.clone()))
    }

    async fn try_debit(
        &self,
        username: &Username,
        amount: i64,
        request: RequestId,
    ) -> Result<DebitOutcome> {
        let mut state = self.state.write().await;
        state.check_available()?;
        let balance = *state
            .accounts
            .get(username)
            .ok_or_else(|| LedgerError::AccountNotFound(username.clone()))?;

        if state.applied.contains(&(request, EntryKind::Debit)) {
            return Ok(DebitOutcome::Duplicate { balance });
        }
        if balance < amount {
            return Ok(DebitOutcome::Insufficient { balance });
        }

        let balance = balance - amount;
        state.accounts.insert(username.clone(), balance);
        state.record(username, EntryKind::Debit, amount, request);
        Ok(DebitOutcome::Applied { balance })
    }

    async fn debit(&self, username: &Username, amount: i64, request: RequestId) -> Result<i64> {
        let mut state = self.state.write().await;
        state.check_available()?;
        let balance = *state
            .accounts
            .get(username)
            .ok_or_else(|| LedgerError::AccountNotFound(username.clone()))?;

        if state.applied.contains(&(request, EntryKind::Debit)) {
            return Ok(balance);
        }

        let balance = balance - amount;
        state.accounts.insert(username.clone(), balance);
        state.record(username, EntryKind::Debit, amount, request);
        Ok(balance)
    }

    async fn credit(&self, username: &Username, amount: i64, request: RequestId) -> Result<i64> {
        let mut state = self.state.write().await;
        state.check_available()?;
        let balance = *state
            .accounts
            .get(username)
            .ok_or_else(|| LedgerError::AccountNotFound(username.clone()))?;

        if state.applied.contains(&(request, EntryKind::Credit)) {
            return Ok(balance);
        }

        let balance = balance + amount;
        state.accounts.insert(username.clone(), balance);
        state.record(username, EntryKind::Credit, amount, request);
        Ok(balance)
    }

    async fn history(&self, username: &Username) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state
            .entries
            .iter()
            .filter(|e| &e.username == username)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> Username {
        Username::new(name).unwrap()
    }

    #[tokio::test]
    async fn ensure_account_seeds_starting_balance() {
        let ledger = InMemoryLedger::new();
        let account = ledger.ensure_account(&user("alice")).await.unwrap();
        assert_eq!(account.balance, STARTING_BALANCE);
        assert_eq!(ledger.account_count().await, 1);
    }

    #[tokio::test]
    async fn ensure_account_is_idempotent() {
        let ledger = InMemoryLedger::new();
        let alice = user("alice");
        ledger.ensure_account(&alice).await.unwrap();
        ledger.debit(&alice, 30, RequestId::new()).await.unwrap();

        // A second ensure must not reseed the balance
        let account = ledger.ensure_account(&alice).await.unwrap();
        assert_eq!(account.balance, 70);
        assert_eq!(ledger.account_count().await, 1);
    }

    #[tokio::test]
    async fn balance_requires_existing_account() {
        let ledger = InMemoryLedger::new();
        let result = ledger.balance(&user("ghost")).await;
        assert!(matches!(result, Err(LedgerError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn try_debit_boundary_is_inclusive() {
        let ledger = InMemoryLedger::new();
        let alice = user("alice");
        ledger.ensure_account(&alice).await.unwrap();

        // balance == amount is sufficient
        let outcome = ledger
            .try_debit(&alice, STARTING_BALANCE, RequestId::new())
            .await
            .unwrap();
        assert_eq!(outcome, DebitOutcome::Applied { balance: 0 });

        // one short is not
        let outcome = ledger.try_debit(&alice, 1, RequestId::new()).await.unwrap();
        assert_eq!(outcome, DebitOutcome::Insufficient { balance: 0 });
    }

    #[tokio::test]
    async fn try_debit_rejects_duplicate_request() {
        let ledger = InMemoryLedger::new();
        let alice = user("alice");
        ledger.ensure_account(&alice).await.unwrap();

        let request = RequestId::new();
        let first = ledger.try_debit(&alice, 30, request).await.unwrap();
        assert_eq!(first, DebitOutcome::Applied { balance: 70 });

        let second = ledger.try_debit(&alice, 30, request).await.unwrap();
        assert_eq!(second, DebitOutcome::Duplicate { balance: 70 });
        assert_eq!(ledger.balance(&alice).await.unwrap(), 70);
    }

    #[tokio::test]
    async fn debit_then_credit_restores_balance() {
        let ledger = InMemoryLedger::new();
        let alice = user("alice");
        ledger.ensure_account(&alice).await.unwrap();

        let request = RequestId::new();
        ledger.debit(&alice, 40, request).await.unwrap();
        assert_eq!(ledger.balance(&alice).await.unwrap(), 60);

        // Compensation credits back under the same request ID
        ledger.credit(&alice, 40, request).await.unwrap();
        assert_eq!(ledger.balance(&alice).await.unwrap(), STARTING_BALANCE);
    }

    #[tokio::test]
    async fn duplicate_credit_is_a_noop() {
        let ledger = InMemoryLedger::new();
        let alice = user("alice");
        ledger.ensure_account(&alice).await.unwrap();

        let request = RequestId::new();
        ledger.credit(&alice, 25, request).await.unwrap();
        let balance = ledger.credit(&alice, 25, request).await.unwrap();
        assert_eq!(balance, 125);
    }

    #[tokio::test]
    async fn history_records_applied_mutations_in_order() {
        let ledger = InMemoryLedger::new();
        let alice = user("alice");
        ledger.ensure_account(&alice).await.unwrap();

        let request = RequestId::new();
        ledger.debit(&alice, 30, request).await.unwrap();
        ledger.credit(&alice, 30, request).await.unwrap();

        let entries = ledger.history(&alice).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Debit);
        assert_eq!(entries[1].kind, EntryKind::Credit);
        assert!(entries.iter().all(|e| e.amount == 30));
    }

    #[tokio::test]
    async fn set_fail_simulates_storage_errors() {
        let ledger = InMemoryLedger::new();
        let alice = user("alice");
        ledger.ensure_account(&alice).await.unwrap();

        ledger.set_fail(true).await;
        let result = ledger.balance(&alice).await;
        assert!(matches!(result, Err(LedgerError::Database(_))));

        ledger.set_fail(false).await;
        assert_eq!(ledger.balance(&alice).await.unwrap(), STARTING_BALANCE);
    }

    #[tokio::test]
    async fn concurrent_first_time_ensures_create_one_account() {
        let ledger = InMemoryLedger::new();
        let alice = user("alice");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = ledger.clone();
                let alice = alice.clone();
                tokio::spawn(async move { ledger.ensure_account(&alice).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(ledger.account_count().await, 1);
        assert_eq!(ledger.balance(&alice).await.unwrap(), STARTING_BALANCE);
    }
}

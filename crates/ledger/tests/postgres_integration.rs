//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p ledger --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use ledger::{
    DebitOutcome, EntryKind, LedgerError, LedgerStore, PostgresLedger, RequestId,
    STARTING_BALANCE, Username,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_ledger_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh ledger with its own pool and cleared tables
async fn get_test_ledger() -> PostgresLedger {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query("TRUNCATE TABLE user_credit, ledger_entries")
        .execute(&pool)
        .await
        .unwrap();

    PostgresLedger::new(pool)
}

fn user(name: &str) -> Username {
    Username::new(name).unwrap()
}

#[tokio::test]
async fn ensure_account_seeds_starting_balance() {
    let ledger = get_test_ledger().await;
    let account = ledger.ensure_account(&user("alice")).await.unwrap();

    assert_eq!(account.balance, STARTING_BALANCE);
    assert_eq!(account.username.as_str(), "alice");
}

#[tokio::test]
async fn ensure_account_does_not_reseed() {
    let ledger = get_test_ledger().await;
    let alice = user("alice");

    ledger.ensure_account(&alice).await.unwrap();
    ledger.debit(&alice, 30, RequestId::new()).await.unwrap();

    let account = ledger.ensure_account(&alice).await.unwrap();
    assert_eq!(account.balance, 70);
}

#[tokio::test]
async fn concurrent_ensures_create_exactly_one_account() {
    let ledger = get_test_ledger().await;
    let alice = user("alice");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            let alice = alice.clone();
            tokio::spawn(async move { ledger.ensure_account(&alice).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_credit WHERE username = $1")
        .bind("alice")
        .fetch_one(ledger.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(ledger.balance(&alice).await.unwrap(), STARTING_BALANCE);
}

#[tokio::test]
async fn balance_of_unknown_account_fails() {
    let ledger = get_test_ledger().await;

    let result = ledger.balance(&user("ghost")).await;
    assert!(matches!(result, Err(LedgerError::AccountNotFound(_))));
}

#[tokio::test]
async fn try_debit_applies_when_balance_covers_cost() {
    let ledger = get_test_ledger().await;
    let alice = user("alice");
    ledger.ensure_account(&alice).await.unwrap();

    let outcome = ledger.try_debit(&alice, 30, RequestId::new()).await.unwrap();
    assert_eq!(outcome, DebitOutcome::Applied { balance: 70 });
    assert_eq!(ledger.balance(&alice).await.unwrap(), 70);
}

#[tokio::test]
async fn try_debit_boundary_exact_balance_is_sufficient() {
    let ledger = get_test_ledger().await;
    let alice = user("alice");
    ledger.ensure_account(&alice).await.unwrap();

    let outcome = ledger
        .try_debit(&alice, STARTING_BALANCE, RequestId::new())
        .await
        .unwrap();
    assert_eq!(outcome, DebitOutcome::Applied { balance: 0 });
}

#[tokio::test]
async fn try_debit_one_over_balance_is_insufficient() {
    let ledger = get_test_ledger().await;
    let alice = user("alice");
    ledger.ensure_account(&alice).await.unwrap();

    let outcome = ledger
        .try_debit(&alice, STARTING_BALANCE + 1, RequestId::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        DebitOutcome::Insufficient {
            balance: STARTING_BALANCE
        }
    );
    // Insufficiency leaves the balance and the audit trail untouched
    assert_eq!(ledger.balance(&alice).await.unwrap(), STARTING_BALANCE);
    assert!(ledger.history(&alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn try_debit_duplicate_request_debits_once() {
    let ledger = get_test_ledger().await;
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
async fn concurrent_debits_cannot_overspend() {
    let ledger = get_test_ledger().await;
    let alice = user("alice");
    ledger.ensure_account(&alice).await.unwrap();

    // Ten concurrent 30-credit debits against a balance of 100: only
    // three can apply.
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let ledger = ledger.clone();
            let alice = alice.clone();
            tokio::spawn(async move { ledger.try_debit(&alice, 30, RequestId::new()).await })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_applied() {
            applied += 1;
        }
    }

    assert_eq!(applied, 3);
    assert_eq!(ledger.balance(&alice).await.unwrap(), 10);
}

#[tokio::test]
async fn debit_then_credit_restores_balance() {
    let ledger = get_test_ledger().await;
    let alice = user("alice");
    ledger.ensure_account(&alice).await.unwrap();

    let request = RequestId::new();
    let after_debit = ledger.debit(&alice, 40, request).await.unwrap();
    assert_eq!(after_debit, 60);

    let after_credit = ledger.credit(&alice, 40, request).await.unwrap();
    assert_eq!(after_credit, STARTING_BALANCE);
}

#[tokio::test]
async fn duplicate_credit_is_a_noop() {
    let ledger = get_test_ledger().await;
    let alice = user("alice");
    ledger.ensure_account(&alice).await.unwrap();

    let request = RequestId::new();
    ledger.credit(&alice, 25, request).await.unwrap();
    let balance = ledger.credit(&alice, 25, request).await.unwrap();
    assert_eq!(balance, 125);
}

#[tokio::test]
async fn debit_of_unknown_account_fails() {
    let ledger = get_test_ledger().await;

    let result = ledger.debit(&user("ghost"), 10, RequestId::new()).await;
    assert!(matches!(result, Err(LedgerError::AccountNotFound(_))));
}

#[tokio::test]
async fn history_returns_entries_oldest_first() {
    let ledger = get_test_ledger().await;
    let alice = user("alice");
    ledger.ensure_account(&alice).await.unwrap();

    let request = RequestId::new();
    ledger.debit(&alice, 30, request).await.unwrap();
    ledger.credit(&alice, 30, request).await.unwrap();
    ledger.debit(&alice, 10, RequestId::new()).await.unwrap();

    let entries = ledger.history(&alice).await.unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].kind, EntryKind::Debit);
    assert_eq!(entries[0].amount, 30);
    assert_eq!(entries[1].kind, EntryKind::Credit);
    assert_eq!(entries[2].amount, 10);
}

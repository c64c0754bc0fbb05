use async_trait::async_trait;
use common::{RequestId, Username};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CreditAccount, EntryKind, LedgerEntry, LedgerError, Result, STARTING_BALANCE,
    store::{DebitOutcome, LedgerStore},
};

/// PostgreSQL-backed credit ledger.
///
/// Each operation runs in its own transaction and releases the
/// connection on every exit path. Account creation and conditional
/// debits are expressed as single atomic statements, so concurrent
/// commands for the same username cannot create duplicate rows or
/// overspend through a read-then-write interleaving.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_entry(row: PgRow) -> Result<LedgerEntry> {
        let kind: String = row.try_get("kind")?;
        let kind = EntryKind::parse(&kind).ok_or_else(|| {
            LedgerError::Database(sqlx::Error::Decode(
                format!("unknown ledger entry kind: {kind}").into(),
            ))
        })?;
        let username: String = row.try_get("username")?;
        let username = Username::new(username).ok_or_else(|| {
            LedgerError::Database(sqlx::Error::Decode("empty username in ledger entry".into()))
        })?;

        Ok(LedgerEntry {
            request_id: RequestId::from_uuid(row.try_get::<Uuid, _>("request_id")?),
            kind,
            username,
            amount: row.try_get("amount")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }

    /// Records the mutation in the entries table. Returns false if an
    /// entry with this `(request, kind)` already exists.
    async fn record_entry(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        username: &Username,
        kind: EntryKind,
        amount: i64,
        request: RequestId,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO ledger_entries (request_id, kind, username, amount)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (request_id, kind) DO NOTHING
            "#,
        )
        .bind(request.as_uuid())
        .bind(kind.as_str())
        .bind(username.as_str())
        .bind(amount)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn balance_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        username: &Username,
    ) -> Result<i64> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM user_credit WHERE username = $1")
                .bind(username.as_str())
                .fetch_optional(&mut **tx)
                .await?;

        balance.ok_or_else(|| LedgerError::AccountNotFound(username.clone()))
    }
}

#[async_trait]
impl LedgerStore for PostgresLedger {
    async fn ensure_account(&self, username: &Username) -> Result<CreditAccount> {
        let mut tx = self.pool.begin().await?;

        // Insert-if-absent: under concurrent first-time calls exactly
        // one row wins and the rest fall through to the read.
        let inserted = sqlx::query(
            r#"
            INSERT INTO user_credit (username, balance)
            VALUES ($1, $2)
            ON CONFLICT (username) DO NOTHING
            "#,
        )
        .bind(username.as_str())
        .bind(STARTING_BALANCE)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() > 0 {
            tracing::info!(%username, balance = STARTING_BALANCE, "account created");
        }

        let balance = Self::balance_in_tx(&mut tx, username).await?;
        tx.commit().await?;

        Ok(CreditAccount {
            username: username.clone(),
            balance,
        })
    }

    async fn balance(&self, username: &Username) -> Result<i64> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM user_credit WHERE username = $1")
                .bind(username.as_str())
                .fetch_optional(&self.pool)
                .await?;

        balance.ok_or_else(|| LedgerError::AccountNotFound(username.clone()))
    }

    async fn try_debit(
        &self,
        username: &Username,
        amount: i64,
        request: RequestId,
    ) -> Result<DebitOutcome> {
        let mut tx = self.pool.begin().await?;

        if !Self::record_entry(&mut tx, username, EntryKind::Debit, amount, request).await? {
            let balance = Self::balance_in_tx(&mut tx, username).await?;
            tx.rollback().await?;
            return Ok(DebitOutcome::Duplicate { balance });
        }

        // Conditional write: the affordability check and the debit are
        // one statement, closing the check-then-debit window.
        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE user_credit
            SET balance = balance - $2
            WHERE username = $1 AND balance >= $2
            RETURNING balance
            "#,
        )
        .bind(username.as_str())
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;

        match balance {
            Some(balance) => {
                tx.commit().await?;
                Ok(DebitOutcome::Applied { balance })
            }
            None => {
                let balance = Self::balance_in_tx(&mut tx, username).await?;
                tx.rollback().await?;
                Ok(DebitOutcome::Insufficient { balance })
            }
        }
    }

    async fn debit(&self, username: &Username, amount: i64, request: RequestId) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        if !Self::record_entry(&mut tx, username, EntryKind::Debit, amount, request).await? {
            let balance = Self::balance_in_tx(&mut tx, username).await?;
            tx.rollback().await?;
            return Ok(balance);
        }

        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE user_credit
            SET balance = balance - $2
            WHERE username = $1
            RETURNING balance
            "#,
        )
        .bind(username.as_str())
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;

        let balance = balance.ok_or_else(|| LedgerError::AccountNotFound(username.clone()))?;
        tx.commit().await?;
        Ok(balance)
    }

    async fn credit(&self, username: &Username, amount: i64, request: RequestId) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        if !Self::record_entry(&mut tx, username, EntryKind::Credit, amount, request).await? {
            let balance = Self::balance_in_tx(&mut tx, username).await?;
            tx.rollback().await?;
            return Ok(balance);
        }

        let balance: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE user_credit
            SET balance = balance + $2
            WHERE username = $1
            RETURNING balance
            "#,
        )
        .bind(username.as_str())
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;

        let balance = balance.ok_or_else(|| LedgerError::AccountNotFound(username.clone()))?;
        tx.commit().await?;
        Ok(balance)
    }

    async fn history(&self, username: &Username) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT request_id, kind, username, amount, recorded_at
            FROM ledger_entries
            WHERE username = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(username.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }
}

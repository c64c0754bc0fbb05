use common::Username;
use thiserror::Error;

/// Errors that can occur when interacting with the credit ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The account was never created; normal flows ensure the account
    /// before reading or mutating it, so this signals an invariant
    /// violation by the caller.
    #[error("Account not found: {0}")]
    AccountNotFound(Username),

    /// A database error occurred. The enclosing transaction was not
    /// committed and the account is unchanged.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

use dispatch::DispatchError;
use ledger::LedgerError;
use thiserror::Error;

/// Errors that can occur while handling a payment command.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The command name is not one this participant serves. Nothing
    /// was dispatched and the ledger was not touched.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// The command payload did not parse as a purchase request.
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// Ledger error.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Dispatch error. The current saga step could not emit its next
    /// command; this is fatal to the step and surfaced to the caller.
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Result type for participant operations.
pub type Result<T> = std::result::Result<T, PaymentError>;

//! Per-purchase state machine.

use serde::{Deserialize, Serialize};

/// The phases a single purchase drives through.
///
/// Payment path:
/// ```text
/// Received ──► AccountEnsured ──┬──► Insufficient
///                               └──► Debited ──► DownstreamDispatched
///                                      ──► AwaitingResult ──┬──► Resolved
///                                                           └──► StillRunning
/// ```
/// Compensation path:
/// ```text
/// RollbackReceived ──► CreditedBack ──► CompensationDispatched
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PurchasePhase {
    /// Command received, nothing done yet.
    #[default]
    Received,

    /// The account exists (created now or earlier).
    AccountEnsured,

    /// The balance did not cover the cost (terminal).
    Insufficient,

    /// The cost was debited from the balance.
    Debited,

    /// The inventory command was enqueued.
    DownstreamDispatched,

    /// Suspended waiting for the inventory result.
    AwaitingResult,

    /// The inventory result arrived within the window (terminal).
    Resolved,

    /// The window elapsed with the task unfinished (terminal).
    StillRunning,

    /// Compensation command received.
    RollbackReceived,

    /// The debit was credited back.
    CreditedBack,

    /// The order compensation was enqueued (terminal).
    CompensationDispatched,
}

impl PurchasePhase {
    /// Returns true if no further transition occurs for this purchase.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PurchasePhase::Insufficient
                | PurchasePhase::Resolved
                | PurchasePhase::StillRunning
                | PurchasePhase::CompensationDispatched
        )
    }

    /// Returns the phase name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchasePhase::Received => "Received",
            PurchasePhase::AccountEnsured => "AccountEnsured",
            PurchasePhase::Insufficient => "Insufficient",
            PurchasePhase::Debited => "Debited",
            PurchasePhase::DownstreamDispatched => "DownstreamDispatched",
            PurchasePhase::AwaitingResult => "AwaitingResult",
            PurchasePhase::Resolved => "Resolved",
            PurchasePhase::StillRunning => "StillRunning",
            PurchasePhase::RollbackReceived => "RollbackReceived",
            PurchasePhase::CreditedBack => "CreditedBack",
            PurchasePhase::CompensationDispatched => "CompensationDispatched",
        }
    }
}

impl std::fmt::Display for PurchasePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

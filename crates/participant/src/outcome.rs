use serde::{Deserialize, Serialize};

/// The value returned to a caller awaiting a `pay` command.
///
/// Serialized as a tagged object, e.g. `{"outcome": "still_running"}`,
/// so callers match on the tag instead of raw sentinel strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SagaOutcome {
    /// The balance did not cover the cost; no debit occurred and the
    /// order step was compensated.
    InsufficientFunds,

    /// The downstream inventory task finished within the wait window;
    /// carries its result, forwarded opaquely.
    Resolved { result: serde_json::Value },

    /// The inventory task had not finished within the wait window.
    /// The debit stands and the task keeps running.
    StillRunning,

    /// The ledger was unreachable; the purchase outcome is unknown to
    /// this participant. Distinguishable from a slow task, unlike the
    /// silent success it replaces.
    LedgerUnavailable,
}

impl SagaOutcome {
    /// Returns the outcome tag as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaOutcome::InsufficientFunds => "insufficient_funds",
            SagaOutcome::Resolved { .. } => "resolved",
            SagaOutcome::StillRunning => "still_running",
            SagaOutcome::LedgerUnavailable => "ledger_unavailable",
        }
    }
}

impl std::fmt::Display for SagaOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

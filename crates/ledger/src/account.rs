use chrono::{DateTime, Utc};
use common::{RequestId, Username};
use serde::{Deserialize, Serialize};

/// Balance seeded into an account the first time a username is seen.
pub const STARTING_BALANCE: i64 = 100;

/// One user's spendable credit balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAccount {
    pub username: Username,
    pub balance: i64,
}

/// Direction of a ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Debit,
    Credit,
}

impl EntryKind {
    /// Returns the kind as the string stored in the entries table.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Debit => "debit",
            EntryKind::Credit => "credit",
        }
    }

    /// Parses a stored kind string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debit" => Some(EntryKind::Debit),
            "credit" => Some(EntryKind::Credit),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One applied mutation in the ledger's audit trail.
///
/// The `(request_id, kind)` pair is unique: a pay saga debits under a
/// request ID and its compensation credits back under the same ID, so
/// both directions of one purchase can coexist while redeliveries of
/// either are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub request_id: RequestId,
    pub kind: EntryKind,
    pub username: Username,
    pub amount: i64,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_kind_round_trips_through_strings() {
        assert_eq!(EntryKind::parse("debit"), Some(EntryKind::Debit));
        assert_eq!(EntryKind::parse("credit"), Some(EntryKind::Credit));
        assert_eq!(EntryKind::parse("refund"), None);
        assert_eq!(EntryKind::Debit.as_str(), "debit");
        assert_eq!(EntryKind::Credit.to_string(), "credit");
    }

    #[test]
    fn credit_account_serialization() {
        let account = CreditAccount {
            username: Username::new("alice").unwrap(),
            balance: STARTING_BALANCE,
        };
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json, serde_json::json!({"username": "alice", "balance": 100}));
    }
}

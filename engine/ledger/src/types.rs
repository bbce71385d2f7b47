//! Core value types stored in the ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable user identifier, assigned once at creation
pub type UserId = u64;

/// A participant and their current debt in bars
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub debt: i64,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), debt: 0 }
    }
}

/// Net change in bars applied to one user over a coalescing window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Time of the first edit in the burst; never refreshed on merge
    pub timestamp: DateTime<Utc>,

    pub target_user_id: UserId,

    pub bars_delta: i64,
}

impl HistoryEntry {
    pub fn new(timestamp: DateTime<Utc>, target_user_id: UserId, bars_delta: i64) -> Self {
        Self { timestamp, target_user_id, bars_delta }
    }
}

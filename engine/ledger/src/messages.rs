//! Wire envelopes exchanged with clients
//!
//! Both directions are JSON objects discriminated by a `type` field.

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::types::{User, UserId};
use serde::{Deserialize, Serialize};

/// Inbound event submitted by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    NewUser {
        name: String,
    },
    UpdateDebt {
        id: UserId,
        debt: i64,
    },
    UpdatePrice {
        price: f64,
    },
    Reset {
        #[serde(rename = "keepParticipants", default)]
        keep_participants: bool,
    },
}

impl Event {
    /// Every `type` value the processor understands
    pub const KINDS: [&'static str; 4] = ["newUser", "updateDebt", "updatePrice", "reset"];

    /// Decode an inbound frame
    ///
    /// A well-formed envelope naming a kind outside [`Event::KINDS`] is reported
    /// as `UnknownEventKind`; anything else that fails to parse is `Decode`.
    pub fn decode(bytes: &[u8]) -> LedgerResult<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| LedgerError::Decode(e.to_string()))?;

        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| LedgerError::Decode("missing string field `type`".to_string()))?;

        if !Self::KINDS.contains(&kind) {
            return Err(LedgerError::UnknownEventKind(kind.to_string()));
        }

        serde_json::from_value(value).map_err(|e| LedgerError::Decode(e.to_string()))
    }

    /// Wire name of this event
    pub fn kind(&self) -> &'static str {
        match self {
            Event::NewUser { .. } => "newUser",
            Event::UpdateDebt { .. } => "updateDebt",
            Event::UpdatePrice { .. } => "updatePrice",
            Event::Reset { .. } => "reset",
        }
    }
}

/// Outbound answer rebroadcast to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Answer {
    /// Full ledger; sent on connect and after a reset
    AllData { data: Ledger },
    NewUser { user: User },
    UpdateDebt { id: UserId, debt: i64 },
    UpdatePrice { price: f64 },
    /// Rejection notice, sent only to the client whose message failed
    Error { message: String },
}

impl Answer {
    /// Build the rejection answer for a failed inbound message
    pub fn error(err: &LedgerError) -> Self {
        Answer::Error { message: err.to_string() }
    }

    /// Wire name of this answer
    pub fn kind(&self) -> &'static str {
        match self {
            Answer::AllData { .. } => "allData",
            Answer::NewUser { .. } => "newUser",
            Answer::UpdateDebt { .. } => "updateDebt",
            Answer::UpdatePrice { .. } => "updatePrice",
            Answer::Error { .. } => "error",
        }
    }

    /// Serialize to the JSON text sent on the wire
    pub fn to_json(&self) -> LedgerResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_each_kind() {
        assert_eq!(
            Event::decode(br#"{"type":"newUser","name":"Ada"}"#).unwrap(),
            Event::NewUser { name: "Ada".to_string() }
        );
        assert_eq!(
            Event::decode(br#"{"type":"updateDebt","id":3,"debt":-2}"#).unwrap(),
            Event::UpdateDebt { id: 3, debt: -2 }
        );
        assert_eq!(
            Event::decode(br#"{"type":"updatePrice","price":0.75}"#).unwrap(),
            Event::UpdatePrice { price: 0.75 }
        );
        assert_eq!(
            Event::decode(br#"{"type":"reset","keepParticipants":true}"#).unwrap(),
            Event::Reset { keep_participants: true }
        );
    }

    #[test]
    fn test_reset_defaults_to_dropping_participants() {
        assert_eq!(
            Event::decode(br#"{"type":"reset"}"#).unwrap(),
            Event::Reset { keep_participants: false }
        );
    }

    #[test]
    fn test_unknown_kind_is_distinguished_from_malformed() {
        let err = Event::decode(br#"{"type":"deleteUser","id":1}"#).unwrap_err();
        assert!(matches!(err, LedgerError::UnknownEventKind(ref k) if k == "deleteUser"));

        assert!(matches!(Event::decode(b"not json").unwrap_err(), LedgerError::Decode(_)));
        assert!(matches!(Event::decode(br#"{"name":"x"}"#).unwrap_err(), LedgerError::Decode(_)));
        assert!(matches!(
            Event::decode(br#"{"type":"updateDebt","id":"one"}"#).unwrap_err(),
            LedgerError::Decode(_)
        ));
    }

    #[test]
    fn test_answer_wire_format() {
        let answer = Answer::NewUser { user: User::new(0, "Ada") };
        let value: serde_json::Value = serde_json::from_str(&answer.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "newUser");
        assert_eq!(value["user"]["id"], 0);
        assert_eq!(value["user"]["debt"], 0);

        let answer = Answer::AllData { data: Ledger::new() };
        let value: serde_json::Value = serde_json::from_str(&answer.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "allData");
        assert!(value["data"]["users"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_error_answer() {
        let answer = Answer::error(&LedgerError::UserNotFound(9));
        assert_eq!(answer.kind(), "error");
        assert_eq!(answer, Answer::Error { message: "User 9 not found".to_string() });
    }
}

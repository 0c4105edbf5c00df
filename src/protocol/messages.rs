//! Wire payloads exchanged with the controller
//!
//! Incoming action payloads are decoded here; outgoing messages are modelled
//! as [`Envelope`] variants that know their topic and serialize to compact JSON.

use super::topics::TopicBuilder;
use super::validation::Facts;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status code used for method responses when the caller gives none
pub const DEFAULT_METHOD_RESPONSE_CODE: u16 = 200;

/// Payload of `agent/{id}/action_received`
///
/// # Examples
/// ```
/// use agentwire::protocol::ActionPayload;
///
/// let action: ActionPayload = serde_json::from_str(r#"{"name": "reboot"}"#).unwrap();
/// assert_eq!(action.name, "reboot");
/// assert!(action.facts.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionPayload {
    pub name: String,
    /// Arbitrary fact entries attached by the controller
    #[serde(default)]
    pub facts: Vec<Value>,
}

/// Body shared by `action_completed` and `event` messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedEnvelope {
    pub name: String,
    /// Omitted from the JSON entirely when `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facts: Option<Facts>,
}

/// Body of `method_response/{name}` messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MethodResponseBody {
    pub payload: Value,
    pub code: u16,
}

/// Outgoing message with a fixed shape per topic kind
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    ActionCompleted(NamedEnvelope),
    Event(NamedEnvelope),
    /// Published as the bare map, no wrapper object
    Facts(Facts),
    MethodResponse {
        method: String,
        body: MethodResponseBody,
    },
}

impl Envelope {
    pub fn action_completed(name: impl Into<String>, facts: Option<Facts>) -> Self {
        Envelope::ActionCompleted(NamedEnvelope {
            name: name.into(),
            facts,
        })
    }

    pub fn event(name: impl Into<String>, facts: Option<Facts>) -> Self {
        Envelope::Event(NamedEnvelope {
            name: name.into(),
            facts,
        })
    }

    pub fn method_response(method: impl Into<String>, payload: Value, code: u16) -> Self {
        Envelope::MethodResponse {
            method: method.into(),
            body: MethodResponseBody { payload, code },
        }
    }

    /// Destination topic for this envelope
    pub fn topic(&self, client_id: &str) -> String {
        match self {
            Envelope::ActionCompleted(_) => TopicBuilder::action_completed(client_id),
            Envelope::Event(_) => TopicBuilder::event(client_id),
            Envelope::Facts(_) => TopicBuilder::facts(client_id),
            Envelope::MethodResponse { method, .. } => {
                TopicBuilder::method_response(client_id, method)
            }
        }
    }

    /// Compact JSON bytes for the wire
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Envelope::ActionCompleted(body) | Envelope::Event(body) => serde_json::to_vec(body),
            Envelope::Facts(facts) => serde_json::to_vec(facts),
            Envelope::MethodResponse { body, .. } => serde_json::to_vec(body),
        }
    }
}

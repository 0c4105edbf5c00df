//! Topic naming scheme for agent messaging
//!
//! Every topic lives under `agent/{client_id}/{kind}`; `method` and
//! `method_response` topics carry one extra level holding the method name.
//! This wire contract is fixed and must match byte for byte.

use std::fmt;
use thiserror::Error;

/// Root level shared by every agent topic
pub const TOPIC_ROOT: &str = "agent";

/// Single-level MQTT wildcard
pub const SINGLE_LEVEL_WILDCARD: &str = "+";

/// Message kinds addressed by the topic scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    /// Controller -> agent: fire-and-forget action
    ActionReceived,
    /// Controller -> agent: named method invocation
    Method,
    /// Agent -> controller: action finished
    ActionCompleted,
    /// Agent -> controller: free-form event
    Event,
    /// Agent -> controller: flat fact map
    Facts,
    /// Agent -> controller: reply to a method invocation
    MethodResponse,
}

impl TopicKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicKind::ActionReceived => "action_received",
            TopicKind::Method => "method",
            TopicKind::ActionCompleted => "action_completed",
            TopicKind::Event => "event",
            TopicKind::Facts => "facts",
            TopicKind::MethodResponse => "method_response",
        }
    }

    /// Whether topics of this kind end with a name level
    pub fn carries_name(&self) -> bool {
        matches!(self, TopicKind::Method | TopicKind::MethodResponse)
    }
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A received topic that does not belong to the expected agent/kind
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TopicError {
    #[error("topic '{topic}' does not start with '{prefix}'")]
    PrefixMismatch { topic: String, prefix: String },
    #[error("topic '{0}' has an unexpected trailing level")]
    UnexpectedRemainder(String),
    #[error("topic '{0}' is missing the name level")]
    MissingName(String),
    #[error("topic '{0}' has a multi-level name")]
    NestedName(String),
}

/// Build `agent/{client_id}/{kind}` or `agent/{client_id}/{kind}/{name}`
///
/// `name` is only appended for kinds that carry one.
pub fn build_topic(client_id: &str, kind: TopicKind, name: Option<&str>) -> String {
    match name {
        Some(name) if kind.carries_name() => format!("{TOPIC_ROOT}/{client_id}/{kind}/{name}"),
        _ => format!("{TOPIC_ROOT}/{client_id}/{kind}"),
    }
}

/// Strip the `agent/{client_id}/{expected}` prefix from a received topic
///
/// Returns `Ok(None)` for exact-match kinds and `Ok(Some(name))` for kinds
/// that carry a name.
pub fn parse_received_topic<'t>(
    topic: &'t str,
    client_id: &str,
    expected: TopicKind,
) -> Result<Option<&'t str>, TopicError> {
    let prefix = build_topic(client_id, expected, None);
    let remainder = topic
        .strip_prefix(prefix.as_str())
        .ok_or_else(|| TopicError::PrefixMismatch {
            topic: topic.to_string(),
            prefix: prefix.clone(),
        })?;

    if !expected.carries_name() {
        return if remainder.is_empty() {
            Ok(None)
        } else {
            Err(TopicError::UnexpectedRemainder(topic.to_string()))
        };
    }

    let name = match remainder.strip_prefix('/') {
        Some(name) if !name.is_empty() => name,
        Some(_) => return Err(TopicError::MissingName(topic.to_string())),
        // "agent/x/methodfoo" shares the prefix text but not the level
        None if remainder.is_empty() => return Err(TopicError::MissingName(topic.to_string())),
        None => {
            return Err(TopicError::PrefixMismatch {
                topic: topic.to_string(),
                prefix,
            })
        }
    };

    if name.contains('/') {
        return Err(TopicError::NestedName(topic.to_string()));
    }
    Ok(Some(name))
}

/// Subscription filter for a received kind: exact for actions, `+` for methods
pub fn subscription_pattern(client_id: &str, kind: TopicKind) -> String {
    build_topic(client_id, kind, Some(SINGLE_LEVEL_WILDCARD))
}

/// MQTT topic filter matching with `+` (one level) and `#` (remaining levels)
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Topic constructors for each message kind
pub struct TopicBuilder;

impl TopicBuilder {
    /// `agent/{client_id}/action_received`
    pub fn action_received(client_id: &str) -> String {
        build_topic(client_id, TopicKind::ActionReceived, None)
    }

    /// `agent/{client_id}/method/+`
    pub fn method_subscription(client_id: &str) -> String {
        subscription_pattern(client_id, TopicKind::Method)
    }

    /// `agent/{client_id}/method/{name}`
    pub fn method(client_id: &str, name: &str) -> String {
        build_topic(client_id, TopicKind::Method, Some(name))
    }

    /// `agent/{client_id}/action_completed`
    pub fn action_completed(client_id: &str) -> String {
        build_topic(client_id, TopicKind::ActionCompleted, None)
    }

    /// `agent/{client_id}/event`
    pub fn event(client_id: &str) -> String {
        build_topic(client_id, TopicKind::Event, None)
    }

    /// `agent/{client_id}/facts`
    pub fn facts(client_id: &str) -> String {
        build_topic(client_id, TopicKind::Facts, None)
    }

    /// `agent/{client_id}/method_response/{name}`
    pub fn method_response(client_id: &str, name: &str) -> String {
        build_topic(client_id, TopicKind::MethodResponse, Some(name))
    }
}

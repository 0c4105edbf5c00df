//! Argument validation for every public SDK call
//!
//! All checks here are pure and run before any broker interaction, so a bad
//! argument never produces a partial network action.

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Flat fact map reported by the agent: non-empty string keys to non-empty string values
pub type Facts = BTreeMap<String, String>;

/// Validation errors raised synchronously by public operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
    #[error("{field} contains reserved topic character '{ch}'")]
    ReservedTopicChar { field: &'static str, ch: char },
    #[error("facts must be a JSON object, got {0}")]
    FactsNotAnObject(&'static str),
    #[error("facts cannot be empty")]
    EmptyFacts,
    #[error("fact names cannot be empty")]
    EmptyFactName,
    #[error("fact '{0}' must have a non-empty string value")]
    InvalidFactValue(String),
    #[error("payload cannot be null")]
    NullPayload,
}

/// Require a non-empty identifier
pub fn validate_identifier<'a>(
    field: &'static str,
    value: &'a str,
) -> Result<&'a str, ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(value)
}

/// Require an identifier that can be used verbatim as a single topic level
///
/// Rejects `/` (level separator) and the `+`/`#` wildcards so that a built
/// topic always parses back to the same segment.
pub fn validate_topic_segment<'a>(
    field: &'static str,
    value: &'a str,
) -> Result<&'a str, ValidationError> {
    validate_identifier(field, value)?;
    if let Some(ch) = value.chars().find(|c| matches!(c, '/' | '+' | '#')) {
        return Err(ValidationError::ReservedTopicChar { field, ch });
    }
    Ok(value)
}

/// Check every entry of a typed fact map
pub fn validate_fact_map(facts: &Facts) -> Result<&Facts, ValidationError> {
    for (name, value) in facts {
        if name.is_empty() {
            return Err(ValidationError::EmptyFactName);
        }
        if value.is_empty() {
            return Err(ValidationError::InvalidFactValue(name.clone()));
        }
    }
    Ok(facts)
}

/// Check a fact map that must carry at least one entry
pub fn validate_non_empty_facts(facts: &Facts) -> Result<&Facts, ValidationError> {
    if facts.is_empty() {
        return Err(ValidationError::EmptyFacts);
    }
    validate_fact_map(facts)
}

/// Convert dynamic JSON into a validated, non-empty fact map
///
/// Nested objects, arrays, numbers and empty strings are all rejected;
/// only flat string-to-string objects pass.
pub fn validate_facts(value: &Value) -> Result<Facts, ValidationError> {
    let object = value
        .as_object()
        .ok_or_else(|| ValidationError::FactsNotAnObject(json_type_name(value)))?;

    let mut facts = Facts::new();
    for (name, value) in object {
        match value {
            Value::String(s) => {
                facts.insert(name.clone(), s.clone());
            }
            _ => return Err(ValidationError::InvalidFactValue(name.clone())),
        }
    }

    validate_non_empty_facts(&facts)?;
    Ok(facts)
}

/// Reject JSON `null`; any other value is a valid payload
pub fn validate_payload(value: &Value) -> Result<&Value, ValidationError> {
    if value.is_null() {
        return Err(ValidationError::NullPayload);
    }
    Ok(value)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

//! Incoming message dispatch tests
//!
//! Messages are delivered through `MockBroker::deliver`, exactly as the
//! network loop would hand them to the client.

mod test_helpers;

use serde_json::{json, Value};
use test_helpers::*;

#[test]
fn test_should_use_action_handler_when_action_received() {
    // Arrange
    let client = connected_client();
    let log = CallLog::new();
    let sink = log.clone();
    client
        .on_action("some_action", move |facts| {
            sink.record(None, Value::Array(facts));
            Ok(())
        })
        .unwrap();

    // Act
    client
        .broker()
        .deliver(&action_topic(), r#"{"name": "some_action"}"#);

    // Assert
    assert_eq!(log.calls(), vec![(None, json!([]))]);
}

#[test]
fn test_should_not_use_action_handler_when_different_action_received() {
    // Arrange
    let client = connected_client();
    let log = CallLog::new();
    let sink = log.clone();
    client
        .on_action("some_action", move |facts| {
            sink.record(None, Value::Array(facts));
            Ok(())
        })
        .unwrap();

    // Act
    client
        .broker()
        .deliver(&action_topic(), r#"{"name": "other_action"}"#);

    // Assert
    assert_eq!(log.count(), 0);
    assert_eq!(client.metrics().messages_unhandled, 1);
}

#[test]
fn test_should_use_any_action_handler_when_action_received() {
    // Arrange
    let client = connected_client();
    let log = CallLog::new();
    let sink = log.clone();
    client.on_any_action(move |name, facts| {
        sink.record(Some(name), Value::Array(facts));
        Ok(())
    });

    // Act
    client
        .broker()
        .deliver(&action_topic(), r#"{"name": "some_action"}"#);

    // Assert
    assert_eq!(
        log.calls(),
        vec![(Some("some_action".to_string()), json!([]))]
    );
}

#[test]
fn test_specific_action_handler_wins_over_catch_all() {
    // Arrange
    let client = connected_client();
    let specific = CallLog::new();
    let any = CallLog::new();
    let (s, a) = (specific.clone(), any.clone());
    client.on_any_action(move |name, facts| {
        a.record(Some(name), Value::Array(facts));
        Ok(())
    });
    client
        .on_action("some_action", move |facts| {
            s.record(None, Value::Array(facts));
            Ok(())
        })
        .unwrap();

    // Act
    client.broker().deliver(
        &action_topic(),
        r#"{"name": "some_action", "facts": [{"door": "open"}]}"#,
    );

    // Assert
    assert_eq!(specific.calls(), vec![(None, json!([{"door": "open"}]))]);
    assert_eq!(any.count(), 0);
}

#[test]
fn test_re_registration_replaces_action_handler() {
    // Arrange
    let client = connected_client();
    let first = CallLog::new();
    let second = CallLog::new();
    let (f, s) = (first.clone(), second.clone());
    client
        .on_action("some_action", move |facts| {
            f.record(None, Value::Array(facts));
            Ok(())
        })
        .unwrap();
    client
        .on_action("some_action", move |facts| {
            s.record(None, Value::Array(facts));
            Ok(())
        })
        .unwrap();

    // Act
    client
        .broker()
        .deliver(&action_topic(), r#"{"name": "some_action"}"#);

    // Assert
    assert_eq!(first.count(), 0);
    assert_eq!(second.count(), 1);
}

#[test]
fn test_should_use_method_handler_when_method_invoked() {
    // Arrange
    let client = connected_client();
    let log = CallLog::new();
    let sink = log.clone();
    client
        .on_method("foo", move |name, payload| {
            sink.record(Some(name), payload);
            Ok(())
        })
        .unwrap();

    // Act
    client.broker().deliver(&method_topic("foo"), r#"{"x": 1}"#);

    // Assert
    assert_eq!(log.calls(), vec![(Some("foo".to_string()), json!({"x": 1}))]);
}

#[test]
fn test_should_use_any_method_handler_when_no_specific_handler() {
    // Arrange
    let client = connected_client();
    let specific = CallLog::new();
    let any = CallLog::new();
    let (s, a) = (specific.clone(), any.clone());
    client
        .on_method("foo", move |name, payload| {
            s.record(Some(name), payload);
            Ok(())
        })
        .unwrap();
    client.on_any_method(move |name, payload| {
        a.record(Some(name), payload);
        Ok(())
    });

    // Act
    client.broker().deliver(&method_topic("bar"), "[1, 2]");
    client.broker().deliver(&method_topic("foo"), "true");

    // Assert
    assert_eq!(any.calls(), vec![(Some("bar".to_string()), json!([1, 2]))]);
    assert_eq!(specific.calls(), vec![(Some("foo".to_string()), json!(true))]);
}

#[test]
fn test_unhandled_messages_are_dropped_silently() {
    // Arrange
    let client = connected_client();

    // Act
    client
        .broker()
        .deliver(&action_topic(), r#"{"name": "nobody_listens"}"#);
    client.broker().deliver(&method_topic("nobody"), "{}");

    // Assert
    let metrics = client.metrics();
    assert_eq!(metrics.messages_received, 2);
    assert_eq!(metrics.messages_unhandled, 2);
    assert_eq!(metrics.messages_dispatched, 0);
    assert!(client.broker().published().is_empty());
}

#[test]
fn test_malformed_messages_never_reach_handlers() {
    // Arrange
    let client = connected_client();
    let log = CallLog::new();
    let (a, m) = (log.clone(), log.clone());
    client.on_any_action(move |name, facts| {
        a.record(Some(name), Value::Array(facts));
        Ok(())
    });
    client.on_any_method(move |name, payload| {
        m.record(Some(name), payload);
        Ok(())
    });

    // Act
    let broker = client.broker();
    broker.deliver(&action_topic(), "not json");
    broker.deliver(&action_topic(), r#"{"facts": []}"#);
    broker.deliver(&action_topic(), r#"{"name": 123}"#);
    broker.deliver(&action_topic(), r#"{"name": "x", "facts": {"a": "b"}}"#);
    broker.deliver(&method_topic("foo"), "{broken");
    broker.deliver(&format!("agent/{CLIENT_ID}/method/a/b"), "{}");

    // Assert
    assert_eq!(log.count(), 0);
    assert_eq!(client.metrics().messages_dropped(), 6);
}

#[test]
fn test_messages_for_other_topics_are_unrouted() {
    let client = connected_client();
    let log = CallLog::new();
    let sink = log.clone();
    client.on_any_method(move |name, payload| {
        sink.record(Some(name), payload);
        Ok(())
    });

    client.broker().deliver("agent/other_id/method/foo", "{}");
    client
        .broker()
        .deliver(&format!("agent/{CLIENT_ID}/method_response/foo"), "{}");

    assert_eq!(log.count(), 0);
    assert_eq!(client.metrics().messages_unrouted, 2);
}

#[test]
fn test_failing_handlers_do_not_stop_dispatch() {
    // Arrange
    let client = connected_client();
    let log = CallLog::new();
    let sink = log.clone();
    client
        .on_method("panics", |_, _| panic!("handler bug"))
        .unwrap();
    client
        .on_method("errors", |_, _| Err("handler refused".into()))
        .unwrap();
    client
        .on_method("works", move |name, payload| {
            sink.record(Some(name), payload);
            Ok(())
        })
        .unwrap();

    // Act
    client.broker().deliver(&method_topic("panics"), "{}");
    client.broker().deliver(&method_topic("errors"), "{}");
    client.broker().deliver(&method_topic("works"), "{}");

    // Assert
    assert_eq!(log.count(), 1);
    let metrics = client.metrics();
    assert_eq!(metrics.handler_failures, 2);
    assert_eq!(metrics.messages_dispatched, 1);
}

#[test]
fn test_handler_may_respond_from_inside_callback() {
    // Arrange
    let client = std::sync::Arc::new(connected_client());
    let responder = std::sync::Arc::downgrade(&client);
    client
        .on_method("status", move |name, _payload| {
            if let Some(client) = responder.upgrade() {
                client.send_method_response(name, json!({"healthy": true}))?;
            }
            Ok(())
        })
        .unwrap();

    // Act
    client.broker().deliver(&method_topic("status"), "{}");

    // Assert
    let published = client.broker().published();
    assert_eq!(published.len(), 1);
    assert_eq!(
        published[0].topic,
        format!("agent/{CLIENT_ID}/method_response/status")
    );
    assert_eq!(
        published[0].json(),
        json!({"payload": {"healthy": true}, "code": 200})
    );
}

#[test]
fn test_registration_rejects_invalid_names() {
    let client = connected_client();
    assert!(client.on_action("", |_| Ok(())).is_err());
    for name in ["", "a/b", "+", "#"] {
        assert!(client.on_method(name, |_, _| Ok(())).is_err());
    }
}

#[test]
fn test_action_names_with_topic_characters_round_trip() {
    // Arrange
    let client = connected_client();
    let log = CallLog::new();
    let sink = log.clone();
    client.on_any_action(move |name, facts| {
        sink.record(Some(name), Value::Array(facts));
        Ok(())
    });

    // Act
    client
        .broker()
        .deliver(&action_topic(), r#"{"name": "deploy/v2"}"#);
    let specific = log.clone();
    client
        .on_action("deploy/v2", move |facts| {
            specific.record(None, Value::Array(facts));
            Ok(())
        })
        .unwrap();
    client
        .broker()
        .deliver(&action_topic(), r#"{"name": "deploy/v2"}"#);
    client.send_action_completed("deploy/v2", None).unwrap();

    // Assert
    assert_eq!(
        log.calls(),
        vec![
            (Some("deploy/v2".to_string()), json!([])),
            (None, json!([])),
        ]
    );
    let published = client.broker().published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].json(), json!({"name": "deploy/v2"}));
}

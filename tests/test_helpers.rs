//! Test helpers and utilities for integration tests

use agentwire::testing::MockBroker;
use agentwire::{AgentClient, AgentIdentity, ConnectionConfig};
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[allow(dead_code)]
pub const CLIENT_ID: &str = "some_id";
#[allow(dead_code)]
pub const AGENT_KEY: &str = "some_key";
#[allow(dead_code)]
pub const AGENT_SECRET_KEY: &str = "some_secret_key";
#[allow(dead_code)]
pub const HOSTNAME: &str = "some_hostname";

#[allow(dead_code)]
pub fn test_identity() -> AgentIdentity {
    AgentIdentity::new(CLIENT_ID, AGENT_KEY, AGENT_SECRET_KEY)
}

/// Client over a broker that never acknowledges on its own
#[allow(dead_code)]
pub fn not_connected_client() -> AgentClient<MockBroker> {
    AgentClient::new(
        test_identity(),
        ConnectionConfig::new(HOSTNAME),
        MockBroker::new(),
    )
    .unwrap()
}

/// Client whose connect has been acknowledged, with setup calls cleared
#[allow(dead_code)]
pub fn connected_client() -> AgentClient<MockBroker> {
    let client = not_connected_client();
    client.connect().unwrap();
    client.broker().fire_connect(0);
    assert!(client.is_connected());
    client.broker().clear_history();
    client
}

#[allow(dead_code)]
pub fn action_topic() -> String {
    format!("agent/{CLIENT_ID}/action_received")
}

#[allow(dead_code)]
pub fn method_topic(name: &str) -> String {
    format!("agent/{CLIENT_ID}/method/{name}")
}

/// Records every handler invocation as `(name, value)`
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

#[allow(dead_code)]
impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: Option<&str>, value: Value) {
        self.calls
            .lock()
            .unwrap()
            .push((name.map(str::to_string), value));
    }

    pub fn calls(&self) -> Vec<(Option<String>, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

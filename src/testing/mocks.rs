//! Mock broker for testing
//!
//! [`MockBroker`] records every request the agent core makes and lets a test
//! play the broker's side: acknowledge connects, drop the session, deliver
//! messages. Callbacks always run with no internal lock held, so a callback
//! may call straight back into the broker.

use crate::transport::{BrokerClient, BrokerError, NetworkCallbacks, QoS, RawMessage};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One recorded `publish` call
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl PublishedMessage {
    /// Payload decoded as JSON
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

/// Arguments of one recorded `connect` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectCall {
    pub host: String,
    pub port: u16,
    pub keepalive_secs: u16,
}

#[derive(Debug, Default)]
struct Recorded {
    credentials: Option<(String, String)>,
    tls_enabled: bool,
    connects: Vec<ConnectCall>,
    disconnects: usize,
    loop_starts: usize,
    loop_stops: usize,
    subscriptions: Vec<(String, QoS)>,
    published: Vec<PublishedMessage>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Behaviour {
    auto_ack: Option<u8>,
    fail_connects: bool,
    fail_publishes: bool,
    fail_subscribes: bool,
}

/// In-memory [`BrokerClient`] with call recording
#[derive(Default)]
pub struct MockBroker {
    recorded: Mutex<Recorded>,
    behaviour: Mutex<Behaviour>,
    callbacks: Mutex<Option<Arc<dyn NetworkCallbacks>>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broker that acknowledges connect with `return_code` and disconnect with `0`
    /// as soon as they are requested
    pub fn auto_ack(return_code: u8) -> Self {
        let broker = Self::new();
        lock(&broker.behaviour).auto_ack = Some(return_code);
        broker
    }

    pub fn fail_connects(&self, fail: bool) {
        lock(&self.behaviour).fail_connects = fail;
    }

    pub fn fail_publishes(&self, fail: bool) {
        lock(&self.behaviour).fail_publishes = fail;
    }

    pub fn fail_subscribes(&self, fail: bool) {
        lock(&self.behaviour).fail_subscribes = fail;
    }

    /// Invoke the connect callback as the network loop would
    pub fn fire_connect(&self, return_code: u8) {
        if let Some(callbacks) = self.callbacks() {
            callbacks.on_connect(self, return_code);
        }
    }

    /// Invoke the disconnect callback as the network loop would
    pub fn fire_disconnect(&self, return_code: u8) {
        if let Some(callbacks) = self.callbacks() {
            callbacks.on_disconnect(self, return_code);
        }
    }

    /// Deliver a message on `topic` to the registered callbacks
    pub fn deliver(&self, topic: &str, payload: impl Into<Vec<u8>>) {
        if let Some(callbacks) = self.callbacks() {
            callbacks.on_message(self, RawMessage::new(topic, payload));
        }
    }

    pub fn has_callbacks(&self) -> bool {
        lock(&self.callbacks).is_some()
    }

    pub fn credentials(&self) -> Option<(String, String)> {
        lock(&self.recorded).credentials.clone()
    }

    pub fn tls_enabled(&self) -> bool {
        lock(&self.recorded).tls_enabled
    }

    pub fn connects(&self) -> Vec<ConnectCall> {
        lock(&self.recorded).connects.clone()
    }

    pub fn disconnect_count(&self) -> usize {
        lock(&self.recorded).disconnects
    }

    pub fn loop_start_count(&self) -> usize {
        lock(&self.recorded).loop_starts
    }

    pub fn loop_stop_count(&self) -> usize {
        lock(&self.recorded).loop_stops
    }

    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        lock(&self.recorded).subscriptions.clone()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        lock(&self.recorded).published.clone()
    }

    pub fn clear_history(&self) {
        *lock(&self.recorded) = Recorded::default();
    }

    fn callbacks(&self) -> Option<Arc<dyn NetworkCallbacks>> {
        lock(&self.callbacks).clone()
    }

    fn behaviour(&self) -> Behaviour {
        *lock(&self.behaviour)
    }
}

impl BrokerClient for MockBroker {
    fn set_credentials(&self, username: &str, password: &str) -> Result<(), BrokerError> {
        lock(&self.recorded).credentials = Some((username.to_string(), password.to_string()));
        Ok(())
    }

    fn enable_tls(&self) -> Result<(), BrokerError> {
        lock(&self.recorded).tls_enabled = true;
        Ok(())
    }

    fn set_callbacks(&self, callbacks: Arc<dyn NetworkCallbacks>) {
        *lock(&self.callbacks) = Some(callbacks);
    }

    fn connect(&self, host: &str, port: u16, keepalive_secs: u16) -> Result<(), BrokerError> {
        let behaviour = self.behaviour();
        if behaviour.fail_connects {
            return Err(BrokerError::Client("Mock connection failure".into()));
        }

        lock(&self.recorded).connects.push(ConnectCall {
            host: host.to_string(),
            port,
            keepalive_secs,
        });

        if let Some(return_code) = behaviour.auto_ack {
            self.fire_connect(return_code);
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<(), BrokerError> {
        lock(&self.recorded).disconnects += 1;
        if self.behaviour().auto_ack.is_some() {
            self.fire_disconnect(0);
        }
        Ok(())
    }

    fn loop_start(&self) -> Result<(), BrokerError> {
        lock(&self.recorded).loop_starts += 1;
        Ok(())
    }

    fn loop_stop(&self) -> Result<(), BrokerError> {
        lock(&self.recorded).loop_stops += 1;
        Ok(())
    }

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), BrokerError> {
        if self.behaviour().fail_subscribes {
            return Err(BrokerError::Client("Mock subscribe failure".into()));
        }
        lock(&self.recorded)
            .subscriptions
            .push((topic.to_string(), qos));
        Ok(())
    }

    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), BrokerError> {
        if self.behaviour().fail_publishes {
            return Err(BrokerError::Client("Mock publish failure".into()));
        }
        lock(&self.recorded).published.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
            qos,
            retain,
        });
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//! Transport layer seam
//!
//! The agent core never talks MQTT directly. It drives a [`BrokerClient`]
//! (credentials, TLS, connect, subscribe, publish, loop control) and receives
//! network events through [`NetworkCallbacks`], which the broker invokes on
//! its own I/O thread.

use std::sync::Arc;
use thiserror::Error;

pub mod mqtt;

/// Return code reported by a successful connect acknowledgment
pub const CONNECT_SUCCESS: u8 = 0;

/// Transport-neutral delivery guarantee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// A message delivered by the broker on a subscribed topic
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl RawMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Failures reported by a broker client implementation
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Broker client is not connected")]
    NotConnected,
    #[error("Invalid connection options: {0}")]
    InvalidOptions(String),
    #[error("Broker request failed")]
    Client(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Background network loop failed: {0}")]
    Loop(String),
}

/// Network event entry points, invoked sequentially on the broker's I/O thread
///
/// The broker passes itself in so a handler can issue follow-up requests
/// (subscribe after connect, loop stop after disconnect) without holding a
/// reference back to the client.
pub trait NetworkCallbacks: Send + Sync {
    /// Transport handshake finished; `return_code == 0` means success
    fn on_connect(&self, broker: &dyn BrokerClient, return_code: u8);

    /// Session ended, cleanly (`0`) or not
    fn on_disconnect(&self, broker: &dyn BrokerClient, return_code: u8);

    /// Message received on a subscribed topic
    fn on_message(&self, broker: &dyn BrokerClient, message: RawMessage);
}

/// Capabilities the agent core requires from a publish/subscribe client
///
/// Every method is a synchronous request submission; none of them waits for
/// a broker acknowledgment.
pub trait BrokerClient: Send + Sync {
    /// Username/password-equivalent credentials sent on connect
    fn set_credentials(&self, username: &str, password: &str) -> Result<(), BrokerError>;

    /// Establish the transport security context for the next connect
    fn enable_tls(&self) -> Result<(), BrokerError>;

    /// Register the network callback entry points
    fn set_callbacks(&self, callbacks: Arc<dyn NetworkCallbacks>);

    /// Submit a connect request
    fn connect(&self, host: &str, port: u16, keepalive_secs: u16) -> Result<(), BrokerError>;

    /// Submit a disconnect request
    fn disconnect(&self) -> Result<(), BrokerError>;

    /// Start the background network loop that drives the callbacks
    fn loop_start(&self) -> Result<(), BrokerError>;

    /// Stop the background network loop
    fn loop_stop(&self) -> Result<(), BrokerError>;

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), BrokerError>;

    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), BrokerError>;
}

impl<B: BrokerClient + ?Sized> BrokerClient for Arc<B> {
    fn set_credentials(&self, username: &str, password: &str) -> Result<(), BrokerError> {
        (**self).set_credentials(username, password)
    }

    fn enable_tls(&self) -> Result<(), BrokerError> {
        (**self).enable_tls()
    }

    fn set_callbacks(&self, callbacks: Arc<dyn NetworkCallbacks>) {
        (**self).set_callbacks(callbacks)
    }

    fn connect(&self, host: &str, port: u16, keepalive_secs: u16) -> Result<(), BrokerError> {
        (**self).connect(host, port, keepalive_secs)
    }

    fn disconnect(&self) -> Result<(), BrokerError> {
        (**self).disconnect()
    }

    fn loop_start(&self) -> Result<(), BrokerError> {
        (**self).loop_start()
    }

    fn loop_stop(&self) -> Result<(), BrokerError> {
        (**self).loop_stop()
    }

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), BrokerError> {
        (**self).subscribe(topic, qos)
    }

    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), BrokerError> {
        (**self).publish(topic, payload, qos, retain)
    }
}

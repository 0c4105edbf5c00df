//! agentwire - agent-side SDK for controller messaging over MQTT
//!
//! An agent process registers callbacks for the actions and methods a remote
//! controller may send it, connects to the broker, and publishes results,
//! events and facts back. All topics are scoped to the agent's client id:
//!
//! | Direction | Topic | Payload |
//! |---|---|---|
//! | receive | `agent/{id}/action_received` | `{"name": .., "facts"?: [..]}` |
//! | receive | `agent/{id}/method/{name}` | any JSON |
//! | send | `agent/{id}/action_completed` | `{"name": .., "facts"?: {..}}` |
//! | send | `agent/{id}/event` | `{"name": .., "facts"?: {..}}` |
//! | send | `agent/{id}/facts` | `{..}` |
//! | send | `agent/{id}/method_response/{name}` | `{"payload": .., "code": ..}` |
//!
//! # Overview
//!
//! - [`protocol`] - topic model, wire payloads and argument validation
//! - [`agent`] - handler registry, connection state, dispatcher, publisher
//!   and the [`AgentClient`] facade
//! - [`transport`] - the broker client seam and its rumqttc implementation
//! - [`config`] - identity and connection settings from TOML or environment
//! - [`observability`] - tracing setup and per-client counters
//! - [`testing`] - a recording broker double
//!
//! # Quick Start
//!
//! ```rust
//! use agentwire::testing::MockBroker;
//! use agentwire::{AgentClient, AgentIdentity, ConnectionConfig};
//! use serde_json::json;
//!
//! let client = AgentClient::new(
//!     AgentIdentity::new("some_id", "some_key", "some_secret"),
//!     ConnectionConfig::new("broker.example.com"),
//!     MockBroker::auto_ack(0),
//! )
//! .unwrap();
//!
//! client
//!     .on_method("status", |_name, _payload| Ok(()))
//!     .unwrap();
//! client.connect().unwrap();
//! assert!(client.is_connected());
//!
//! client
//!     .send_method_response("status", json!({"healthy": true}))
//!     .unwrap();
//! assert_eq!(
//!     client.broker().published()[0].topic,
//!     "agent/some_id/method_response/status"
//! );
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod testing;
pub mod transport;

pub use agent::{AgentClient, ConnectionState, HandlerError, HandlerResult};
pub use config::{AgentConfig, AgentIdentity, ConfigError, ConnectionConfig};
pub use error::{AgentError, AgentResult};
pub use observability::MetricsSnapshot;
pub use protocol::Facts;
pub use transport::mqtt::MqttBroker;
pub use transport::{BrokerClient, BrokerError, NetworkCallbacks, QoS, RawMessage};

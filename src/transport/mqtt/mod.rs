//! MQTT v5 implementation of the broker client seam
//!
//! - [`connection`] - Pure option building and QoS mapping
//! - [`message_handler`] - Pure routing of rumqttc events
//! - [`client`] - The [`MqttBroker`] adapter and its network thread
//!
//! # Usage
//!
//! ```rust,no_run
//! use agentwire::{AgentClient, AgentIdentity, ConnectionConfig};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let identity = AgentIdentity::new("my-agent", "agent-key", "agent-secret");
//! let client = AgentClient::mqtt(identity, ConnectionConfig::new("broker.example.com"))?;
//!
//! client.on_any_action(|name, facts| {
//!     tracing::info!(name, facts = facts.len(), "Action received");
//!     Ok(())
//! });
//!
//! client.connect()?;
//! client.wait_for_connection(Duration::from_secs(10)).await?;
//! client.send_event("started", None)?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::MqttBroker;
pub use connection::{build_mqtt_options, SessionSettings};
pub use message_handler::{EventRoute, MessageHandler};

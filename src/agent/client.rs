//! Public agent client facade
//!
//! [`AgentClient`] owns the broker, the handler registry, the connection
//! tracker and the metrics for one agent identity. Application threads call
//! into it to register handlers, connect and publish; the broker calls the
//! shared [`Dispatcher`] on its own thread.

use super::dispatcher::Dispatcher;
use super::publisher::Publisher;
use super::registry::{HandlerRegistry, HandlerResult};
use super::state::{ConnectionState, ConnectionTracker};
use crate::config::{AgentConfig, AgentIdentity, ConnectionConfig};
use crate::error::{AgentError, AgentResult};
use crate::observability::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::protocol::Facts;
use crate::transport::mqtt::MqttBroker;
use crate::transport::BrokerClient;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Agent-side SDK client bound to one identity and one broker connection
pub struct AgentClient<B: BrokerClient> {
    identity: AgentIdentity,
    connection: ConnectionConfig,
    broker: Arc<B>,
    registry: Arc<HandlerRegistry>,
    state: Arc<ConnectionTracker>,
    metrics: Arc<DispatchMetrics>,
    dispatcher: Arc<Dispatcher>,
    publisher: Publisher<B>,
}

impl<B: BrokerClient + 'static> AgentClient<B> {
    /// Build a client around an existing broker client
    ///
    /// Identity and connection parameters are validated here; nothing is sent
    /// until [`connect`](Self::connect).
    pub fn new(identity: AgentIdentity, connection: ConnectionConfig, broker: B) -> AgentResult<Self> {
        identity.validate()?;
        connection.validate()?;

        let broker = Arc::new(broker);
        let registry = Arc::new(HandlerRegistry::new());
        let state = Arc::new(ConnectionTracker::new());
        let metrics = Arc::new(DispatchMetrics::new());
        let dispatcher = Arc::new(Dispatcher::new(
            identity.client_id.as_str(),
            registry.clone(),
            state.clone(),
            metrics.clone(),
        ));
        let publisher = Publisher::new(identity.client_id.as_str(), broker.clone(), metrics.clone());

        Ok(Self {
            identity,
            connection,
            broker,
            registry,
            state,
            metrics,
            dispatcher,
            publisher,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.identity.client_id
    }

    pub fn connection_config(&self) -> &ConnectionConfig {
        &self.connection
    }

    /// The underlying broker client
    pub fn broker(&self) -> &B {
        &self.broker
    }

    // Handler registration
    //
    // Handlers run one at a time on the network thread, in arrival order.
    // A handler that blocks delays every later message and keepalives; it
    // may publish freely, requests never wait for the network.

    /// Handle the action `name`; the handler receives only the facts
    ///
    /// Runs on the network thread, so long work belongs on another thread.
    pub fn on_action<F>(&self, name: &str, handler: F) -> AgentResult<()>
    where
        F: Fn(Vec<Value>) -> HandlerResult + Send + Sync + 'static,
    {
        self.registry.register_action(name, handler)
    }

    /// Handle every action without a specific handler; receives `(name, facts)`
    pub fn on_any_action<F>(&self, handler: F)
    where
        F: Fn(&str, Vec<Value>) -> HandlerResult + Send + Sync + 'static,
    {
        self.registry.register_any_action(handler)
    }

    /// Handle invocations of method `name`; receives `(name, payload)`
    ///
    /// Runs on the network thread. Calling
    /// [`send_method_response`](Self::send_method_response) from inside the
    /// handler is fine.
    pub fn on_method<F>(&self, name: &str, handler: F) -> AgentResult<()>
    where
        F: Fn(&str, Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.registry.register_method(name, handler)
    }

    /// Handle every method without a specific handler; receives `(name, payload)`
    pub fn on_any_method<F>(&self, handler: F)
    where
        F: Fn(&str, Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.registry.register_any_method(handler)
    }

    // Lifecycle

    /// Configure the broker and submit a connect request
    ///
    /// Returns once the request is submitted and the network loop started.
    /// The client becomes connected when the broker acknowledges; use
    /// [`wait_for_connection`](Self::wait_for_connection) to wait for that.
    pub fn connect(&self) -> AgentResult<()> {
        let _span = crate::mqtt_span!(
            operation = "connect",
            client_id = %self.identity.client_id,
            host = %self.connection.host,
            port = self.connection.port
        )
        .entered();

        self.broker
            .set_credentials(&self.identity.key, &self.identity.secret_key)?;
        self.broker.enable_tls()?;

        self.dispatcher.install_routes();
        self.broker.set_callbacks(self.dispatcher.clone());

        self.broker.connect(
            &self.connection.host,
            self.connection.port,
            self.connection.keepalive_secs,
        )?;
        self.broker.loop_start()?;

        info!("Connect request submitted");
        Ok(())
    }

    /// Submit a disconnect request
    ///
    /// The state flips to disconnected only when the broker acknowledges.
    pub fn disconnect(&self) -> AgentResult<()> {
        let _span = crate::mqtt_span!(
            operation = "disconnect",
            client_id = %self.identity.client_id
        )
        .entered();

        self.broker.disconnect()?;
        info!("Disconnect request submitted");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.current()
    }

    /// Receiver notified on every connection state change
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Wait until the broker acknowledges the connection
    pub async fn wait_for_connection(&self, timeout: Duration) -> AgentResult<()> {
        if self.state.wait_for(ConnectionState::Connected, timeout).await {
            Ok(())
        } else {
            Err(AgentError::ConnectionTimeout(timeout))
        }
    }

    // Publishing

    pub fn send_action_completed(&self, name: &str, facts: Option<&Facts>) -> AgentResult<()> {
        self.publisher.send_action_completed(name, facts)
    }

    pub fn send_event(&self, name: &str, facts: Option<&Facts>) -> AgentResult<()> {
        self.publisher.send_event(name, facts)
    }

    pub fn send_facts(&self, facts: &Facts) -> AgentResult<()> {
        self.publisher.send_facts(facts)
    }

    /// Publish facts given as a JSON object of string values
    pub fn send_facts_json(&self, facts: &Value) -> AgentResult<()> {
        self.publisher.send_facts_json(facts)
    }

    /// Respond to a method invocation with code 200
    pub fn send_method_response(&self, method: &str, payload: Value) -> AgentResult<()> {
        self.publisher.send_method_response(method, payload)
    }

    pub fn send_method_response_with_code(
        &self,
        method: &str,
        payload: Value,
        code: u16,
    ) -> AgentResult<()> {
        self.publisher
            .send_method_response_with_code(method, payload, code)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl AgentClient<MqttBroker> {
    /// Client backed by the bundled MQTT v5 broker client
    pub fn mqtt(identity: AgentIdentity, connection: ConnectionConfig) -> AgentResult<Self> {
        let broker = MqttBroker::new(identity.client_id.as_str());
        Self::new(identity, connection, broker)
    }

    /// Load a TOML config file and build an MQTT-backed client from it
    pub fn from_config_file(path: &std::path::Path) -> AgentResult<Self> {
        let (identity, connection) = AgentConfig::load_from_file(path)?.into_parts()?;
        Self::mqtt(identity, connection)
    }
}

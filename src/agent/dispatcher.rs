//! Network callback entry points
//!
//! The [`Dispatcher`] is what the broker calls on its I/O thread. It turns
//! connect/disconnect acknowledgments into state transitions and routes each
//! received message through the topic model and the handler registry.
//!
//! Nothing raised here may reach the broker: malformed input is dropped,
//! handler errors are logged, and handler panics are caught.

use super::registry::{HandlerRegistry, HandlerResult, Resolved};
use super::state::{ConnectionEvent, ConnectionTracker};
use crate::observability::metrics::{DispatchMetrics, DropReason};
use crate::protocol::{
    parse_received_topic, subscription_pattern, topic_matches, ActionPayload, TopicKind,
};
use crate::transport::{BrokerClient, NetworkCallbacks, QoS, RawMessage, CONNECT_SUCCESS};
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

/// Kinds the agent subscribes to, in subscription order
pub const RECEIVED_KINDS: [TopicKind; 2] = [TopicKind::ActionReceived, TopicKind::Method];

/// One entry of the dispatch table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub pattern: String,
    pub kind: TopicKind,
}

/// Routes incoming network events for one client
pub struct Dispatcher {
    client_id: String,
    registry: Arc<HandlerRegistry>,
    state: Arc<ConnectionTracker>,
    metrics: Arc<DispatchMetrics>,
    routes: RwLock<Vec<Route>>,
}

impl Dispatcher {
    pub fn new(
        client_id: impl Into<String>,
        registry: Arc<HandlerRegistry>,
        state: Arc<ConnectionTracker>,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            registry,
            state,
            metrics,
            routes: RwLock::new(Vec::new()),
        }
    }

    /// Populate the dispatch table with the base subscription patterns
    ///
    /// Called on every connect; the table is rebuilt, never appended to.
    pub fn install_routes(&self) -> Vec<Route> {
        let routes: Vec<Route> = RECEIVED_KINDS
            .iter()
            .map(|&kind| Route {
                pattern: subscription_pattern(&self.client_id, kind),
                kind,
            })
            .collect();

        *self.routes.write().unwrap_or_else(PoisonError::into_inner) = routes.clone();
        routes
    }

    /// Current dispatch table
    pub fn routes(&self) -> Vec<Route> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn route_for(&self, topic: &str) -> Option<TopicKind> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|route| topic_matches(&route.pattern, topic))
            .map(|route| route.kind)
    }

    /// Handle a message published on `agent/{id}/action_received`
    pub fn on_action_received(&self, message: &RawMessage) {
        if let Err(e) =
            parse_received_topic(&message.topic, &self.client_id, TopicKind::ActionReceived)
        {
            self.drop_message(&message.topic, DropReason::Malformed, &e.to_string());
            return;
        }

        let action = match serde_json::from_slice::<ActionPayload>(&message.payload) {
            Ok(action) if !action.name.is_empty() => action,
            Ok(_) => {
                self.drop_message(&message.topic, DropReason::Malformed, "empty action name");
                return;
            }
            Err(e) => {
                self.drop_message(&message.topic, DropReason::Malformed, &e.to_string());
                return;
            }
        };

        let ActionPayload { name, facts } = action;
        match self.registry.resolve_action(&name) {
            Some(Resolved::Specific(handler)) => {
                self.invoke(TopicKind::ActionReceived, &name, false, || handler(facts))
            }
            Some(Resolved::CatchAll(handler)) => {
                self.invoke(TopicKind::ActionReceived, &name, true, || {
                    handler(&name, facts)
                })
            }
            None => self.drop_message(&message.topic, DropReason::Unhandled, &name),
        }
    }

    /// Handle a message published on `agent/{id}/method/{name}`
    pub fn on_method_invoked(&self, message: &RawMessage) {
        let name = match parse_received_topic(&message.topic, &self.client_id, TopicKind::Method)
        {
            Ok(Some(name)) => name,
            Ok(None) => {
                self.drop_message(&message.topic, DropReason::Malformed, "missing method name");
                return;
            }
            Err(e) => {
                self.drop_message(&message.topic, DropReason::Malformed, &e.to_string());
                return;
            }
        };

        let payload = match serde_json::from_slice::<Value>(&message.payload) {
            Ok(payload) => payload,
            Err(e) => {
                self.drop_message(&message.topic, DropReason::Malformed, &e.to_string());
                return;
            }
        };

        match self.registry.resolve_method(name) {
            Some(Resolved::Specific(handler)) => {
                self.invoke(TopicKind::Method, name, false, || handler(name, payload))
            }
            Some(Resolved::CatchAll(handler)) => {
                self.invoke(TopicKind::Method, name, true, || handler(name, payload))
            }
            None => self.drop_message(&message.topic, DropReason::Unhandled, name),
        }
    }

    /// Run a handler with errors and panics contained
    fn invoke<F>(&self, kind: TopicKind, name: &str, catch_all: bool, handler: F)
    where
        F: FnOnce() -> HandlerResult,
    {
        let _span = crate::dispatch_span!(kind = %kind, name = %name, catch_all).entered();

        match panic::catch_unwind(AssertUnwindSafe(handler)) {
            Ok(Ok(())) => {
                self.metrics.message_dispatched();
                debug!("Handler completed");
            }
            Ok(Err(e)) => {
                self.metrics.handler_failed();
                warn!(error = %e, "Handler returned an error");
            }
            Err(panic) => {
                self.metrics.handler_failed();
                error!(panic = panic_message(panic.as_ref()), "Handler panicked");
            }
        }
    }

    fn drop_message(&self, topic: &str, reason: DropReason, detail: &str) {
        self.metrics.message_dropped(reason);
        match reason {
            DropReason::Malformed => warn!(topic, detail, "Dropping malformed message"),
            DropReason::Unhandled => debug!(topic, name = detail, "No handler registered"),
            DropReason::Unrouted => debug!(topic, "Message matched no dispatch route"),
        }
    }
}

impl NetworkCallbacks for Dispatcher {
    fn on_connect(&self, broker: &dyn BrokerClient, return_code: u8) {
        if return_code != CONNECT_SUCCESS {
            self.metrics.connection_failed();
            warn!(
                client_id = %self.client_id,
                return_code, "Broker refused connection"
            );
            self.state.apply(ConnectionEvent::ConnAck(return_code));
            return;
        }

        for route in self.routes() {
            match broker.subscribe(&route.pattern, QoS::AtLeastOnce) {
                Ok(()) => info!(topic = %route.pattern, "Subscribed"),
                Err(e) => {
                    self.metrics.subscribe_failed();
                    error!(topic = %route.pattern, error = %e, "Failed to subscribe");
                }
            }
        }

        self.metrics.connection_established();
        self.state.apply(ConnectionEvent::ConnAck(return_code));
    }

    fn on_disconnect(&self, broker: &dyn BrokerClient, return_code: u8) {
        if let Err(e) = broker.loop_stop() {
            error!(error = %e, "Failed to stop network loop");
        }

        self.metrics.disconnected();
        if return_code == 0 {
            info!(client_id = %self.client_id, "Disconnected from broker");
        } else {
            warn!(client_id = %self.client_id, return_code, "Unexpected disconnect");
        }
        self.state.apply(ConnectionEvent::Disconnected(return_code));
    }

    fn on_message(&self, _broker: &dyn BrokerClient, message: RawMessage) {
        self.metrics.message_received();
        debug!(topic = %message.topic, bytes = message.payload.len(), "Message received");

        match self.route_for(&message.topic) {
            Some(TopicKind::ActionReceived) => self.on_action_received(&message),
            Some(TopicKind::Method) => self.on_method_invoked(&message),
            _ => self.drop_message(&message.topic, DropReason::Unrouted, ""),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

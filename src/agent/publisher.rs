//! Outgoing envelopes: validate, encode, publish
//!
//! Every publish goes out at QoS 1 without the retain flag. Arguments are
//! validated before anything touches the broker.

use crate::error::AgentResult;
use crate::observability::metrics::DispatchMetrics;
use crate::protocol::{
    validate_fact_map, validate_facts, validate_identifier, validate_non_empty_facts, validate_payload,
    validate_topic_segment, Envelope, Facts, DEFAULT_METHOD_RESPONSE_CODE,
};
use crate::transport::{BrokerClient, QoS};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const PUBLISH_QOS: QoS = QoS::AtLeastOnce;
pub const PUBLISH_RETAIN: bool = false;

/// Publishes the fixed-shape agent messages for one client
pub struct Publisher<B: BrokerClient> {
    client_id: String,
    broker: Arc<B>,
    metrics: Arc<DispatchMetrics>,
}

impl<B: BrokerClient> Publisher<B> {
    pub fn new(client_id: impl Into<String>, broker: Arc<B>, metrics: Arc<DispatchMetrics>) -> Self {
        Self {
            client_id: client_id.into(),
            broker,
            metrics,
        }
    }

    /// `agent/{id}/action_completed`; the `facts` key is omitted when `None`
    pub fn send_action_completed(&self, name: &str, facts: Option<&Facts>) -> AgentResult<()> {
        validate_identifier("action name", name)?;
        let facts = facts.map(validate_fact_map).transpose()?.cloned();
        self.publish(Envelope::action_completed(name, facts))
    }

    /// `agent/{id}/event`, same shape as `action_completed`
    pub fn send_event(&self, name: &str, facts: Option<&Facts>) -> AgentResult<()> {
        validate_identifier("event name", name)?;
        let facts = facts.map(validate_fact_map).transpose()?.cloned();
        self.publish(Envelope::event(name, facts))
    }

    /// `agent/{id}/facts` as a bare, non-empty map
    pub fn send_facts(&self, facts: &Facts) -> AgentResult<()> {
        validate_non_empty_facts(facts)?;
        self.publish(Envelope::Facts(facts.clone()))
    }

    /// Like [`send_facts`](Self::send_facts) for facts built as dynamic JSON
    pub fn send_facts_json(&self, facts: &Value) -> AgentResult<()> {
        let facts = validate_facts(facts)?;
        self.publish(Envelope::Facts(facts))
    }

    pub fn send_method_response(&self, method: &str, payload: Value) -> AgentResult<()> {
        self.send_method_response_with_code(method, payload, DEFAULT_METHOD_RESPONSE_CODE)
    }

    /// `agent/{id}/method_response/{method}` with `{"payload": .., "code": ..}`
    pub fn send_method_response_with_code(
        &self,
        method: &str,
        payload: Value,
        code: u16,
    ) -> AgentResult<()> {
        validate_topic_segment("method name", method)?;
        validate_payload(&payload)?;
        self.publish(Envelope::method_response(method, payload, code))
    }

    fn publish(&self, envelope: Envelope) -> AgentResult<()> {
        let topic = envelope.topic(&self.client_id);
        let _span = crate::mqtt_span!(operation = "publish", topic = %topic).entered();

        let payload = envelope.to_payload().map_err(|e| {
            self.metrics.publish_failed();
            e
        })?;
        let bytes = payload.len();

        if let Err(e) = self
            .broker
            .publish(&topic, payload, PUBLISH_QOS, PUBLISH_RETAIN)
        {
            self.metrics.publish_failed();
            warn!(error = %e, "Publish failed");
            return Err(e.into());
        }

        self.metrics.message_published();
        debug!(bytes, "Published message");
        Ok(())
    }
}

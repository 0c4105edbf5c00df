//! Pure routing of rumqttc events onto network callbacks
//!
//! The event loop owns no policy: each polled event or error is mapped here
//! to an [`EventRoute`], and the loop only performs what the route says.

use crate::transport::RawMessage;
use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet};
use rumqttc::v5::{ConnectionError, Event};
use rumqttc::Outgoing;

/// Return code reported when a connect attempt fails without a ConnAck
pub const CONNECT_FAILED: u8 = 0x80;

/// Return code reported when an established session is lost
pub const CONNECTION_LOST: u8 = 0x80;

/// What the event loop should do with one polled event
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Broker answered the connect request
    ConnectionAcknowledged { return_code: u8 },
    /// Message on a subscribed topic
    MessageReceived(RawMessage),
    /// Broker ended the session
    BrokerDisconnected { reason_code: u8 },
    /// Our own disconnect request went out
    DisconnectSent,
    /// Acks, pings and other protocol traffic
    Infrastructure,
}

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route an MQTT v5 event
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(connack) => EventRoute::ConnectionAcknowledged {
                    return_code: connack.code as u8,
                },
                Packet::Publish(publish) => EventRoute::MessageReceived(RawMessage::new(
                    String::from_utf8_lossy(&publish.topic).into_owned(),
                    publish.payload.to_vec(),
                )),
                Packet::Disconnect(disconnect) => EventRoute::BrokerDisconnected {
                    reason_code: disconnect.reason_code as u8,
                },
                _ => EventRoute::Infrastructure,
            },
            Event::Outgoing(Outgoing::Disconnect) => EventRoute::DisconnectSent,
            Event::Outgoing(_) => EventRoute::Infrastructure,
        }
    }

    /// Return code for a connect attempt that ended in `error`
    pub fn connect_error_code(error: &ConnectionError) -> u8 {
        match error {
            ConnectionError::ConnectionRefused(code) => Self::refusal_code(*code),
            _ => CONNECT_FAILED,
        }
    }

    fn refusal_code(code: ConnectReturnCode) -> u8 {
        match code as u8 {
            // A refusal must never read as success
            0 => CONNECT_FAILED,
            code => code,
        }
    }
}

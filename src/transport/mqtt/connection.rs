//! Pure connection option handling for the MQTT broker client
//!
//! Credentials and TLS are requested before `connect`, as with any
//! paho-style client, so they are collected in [`SessionSettings`] and only
//! turned into rumqttc [`MqttOptions`] once the connect target is known.

use crate::transport::{BrokerError, QoS};
use rumqttc::v5::mqttbytes::QoS as MqttQoS;
use rumqttc::v5::MqttOptions;
use rumqttc::Transport;
use std::time::Duration;

/// Capacity of the request channel between `AsyncClient` and its event loop
pub const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Settings requested before connect
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionSettings {
    pub credentials: Option<(String, String)>,
    pub tls: bool,
}

impl std::fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSettings")
            .field("username", &self.credentials.as_ref().map(|(user, _)| user))
            .field("tls", &self.tls)
            .finish()
    }
}

/// Build rumqttc options for one connect attempt
pub fn build_mqtt_options(
    client_id: &str,
    host: &str,
    port: u16,
    keepalive_secs: u16,
    settings: &SessionSettings,
) -> Result<MqttOptions, BrokerError> {
    if client_id.is_empty() {
        return Err(BrokerError::InvalidOptions("client id cannot be empty".to_string()));
    }
    if host.is_empty() {
        return Err(BrokerError::InvalidOptions("host cannot be empty".to_string()));
    }

    let mut options = MqttOptions::new(client_id, host, port);
    options.set_keep_alive(Duration::from_secs(u64::from(keepalive_secs)));
    options.set_clean_start(true);

    if let Some((username, password)) = &settings.credentials {
        options.set_credentials(username.as_str(), password.as_str());
    }

    if settings.tls {
        options.set_transport(Transport::tls_with_default_config());
    }

    Ok(options)
}

/// Map the transport-neutral QoS onto rumqttc's
pub fn to_mqtt_qos(qos: QoS) -> MqttQoS {
    match qos {
        QoS::AtMostOnce => MqttQoS::AtMostOnce,
        QoS::AtLeastOnce => MqttQoS::AtLeastOnce,
        QoS::ExactlyOnce => MqttQoS::ExactlyOnce,
    }
}

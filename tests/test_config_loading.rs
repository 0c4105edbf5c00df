//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.

use agentwire::config::{AgentConfig, ConfigError, ConnectionConfig, DEFAULT_KEEPALIVE_SECS, DEFAULT_PORT};
use agentwire::testing::MockBroker;
use agentwire::{AgentClient, AgentError};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[agent]
client_id = "test-agent"
key = "agent-key"
secret_key = "inline-secret"

[connection]
host = "broker.example.com"
port = 1884
keepalive = 30
"#,
    );

    let config = AgentConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.agent.client_id, "test-agent");
    assert_eq!(config.agent.key, "agent-key");
    assert_eq!(config.connection.host.as_deref(), Some("broker.example.com"));

    let (identity, connection) = config.into_parts().unwrap();
    assert_eq!(identity.secret_key, "inline-secret");
    assert_eq!(
        connection,
        ConnectionConfig::new("broker.example.com")
            .with_port(1884)
            .with_keepalive(30)
    );
}

#[test]
fn test_config_defaults_port_and_keepalive() {
    let temp_file = write_config(
        r#"
[agent]
client_id = "test-agent"
key = "agent-key"
secret_key = "s"

[connection]
host = "localhost"
"#,
    );

    let (_, connection) = AgentConfig::load_from_file(temp_file.path())
        .unwrap()
        .into_parts()
        .unwrap();

    assert_eq!(connection.port, DEFAULT_PORT);
    assert_eq!(connection.keepalive_secs, DEFAULT_KEEPALIVE_SECS);
}

#[test]
fn test_config_resolves_secret_from_environment() {
    std::env::set_var("AGENTWIRE_IT_SECRET", "secret-from-env");
    let temp_file = write_config(
        r#"
[agent]
client_id = "test-agent"
key = "agent-key"
secret_key_env = "AGENTWIRE_IT_SECRET"

[connection]
broker_url = "mqtts://broker.example.com"
port = 9000
"#,
    );

    let (identity, connection) = AgentConfig::load_from_file(temp_file.path())
        .unwrap()
        .into_parts()
        .unwrap();

    assert_eq!(identity.secret_key, "secret-from-env");
    assert_eq!(connection.host, "broker.example.com");
    assert_eq!(connection.port, 9000);
    std::env::remove_var("AGENTWIRE_IT_SECRET");
}

#[test]
fn test_config_missing_file() {
    let result = AgentConfig::load_from_file(Path::new("/nonexistent/agentwire.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_config_invalid_toml() {
    let temp_file = write_config("[agent\nclient_id = ");
    let result = AgentConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_missing_required_fields() {
    let temp_file = write_config(
        r#"
[agent]
client_id = "test-agent"

[connection]
host = "localhost"
"#,
    );
    let result = AgentConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_rejects_plaintext_broker_url() {
    let temp_file = write_config(
        r#"
[agent]
client_id = "test-agent"
key = "agent-key"
secret_key = "s"

[connection]
broker_url = "mqtt://localhost:1883"
"#,
    );

    let result = AgentConfig::load_from_file(temp_file.path())
        .unwrap()
        .into_parts();
    assert!(matches!(result, Err(ConfigError::InvalidBrokerUrl(_))));
}

#[test]
fn test_config_errors_convert_to_agent_errors() {
    let result: Result<AgentClient<MockBroker>, AgentError> =
        AgentConfig::load_from_file(Path::new("/nonexistent/agentwire.toml"))
            .map_err(AgentError::from)
            .and_then(|config| {
                let (identity, connection) = config.into_parts()?;
                AgentClient::new(identity, connection, MockBroker::new())
            });
    assert!(matches!(result, Err(AgentError::Config(ConfigError::FileRead(_)))));
}

#[test]
fn test_loaded_config_drives_connect() {
    let temp_file = write_config(
        r#"
[agent]
client_id = "test-agent"
key = "agent-key"
secret_key = "agent-secret"

[connection]
host = "broker.example.com"
"#,
    );

    let (identity, connection) = AgentConfig::load_from_file(temp_file.path())
        .unwrap()
        .into_parts()
        .unwrap();
    let client = AgentClient::new(identity, connection, MockBroker::auto_ack(0)).unwrap();
    client.connect().unwrap();

    assert!(client.is_connected());
    assert_eq!(
        client.broker().credentials(),
        Some(("agent-key".to_string(), "agent-secret".to_string()))
    );
    assert_eq!(client.broker().connects()[0].host, "broker.example.com");
}

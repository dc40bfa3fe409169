use crate::channel::{ChannelId, CHANNEL_COUNT};
use crate::error::{MeterError, MeterResult};
use serde::{Deserialize, Serialize};

pub const HOST_MAX: usize = 64;
pub const PATH_MAX: usize = 96;
pub const TOPIC_MAX: usize = 64;

pub type Host = heapless::String<HOST_MAX>;
pub type EndpointPath = heapless::String<PATH_MAX>;
pub type Topic = heapless::String<TOPIC_MAX>;

pub const DEFAULT_MQTT_PORT: u16 = 1883;

#[derive(Debug, Clone)]
pub struct WifiConfig {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

/// Sink endpoints, editable at runtime and persisted with the counters.
///
/// An empty host, path or topic leaves that sink unconfigured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    pub endpoint_host: Host,
    pub endpoint_paths: [EndpointPath; CHANNEL_COUNT],
    pub mqtt_host: Host,
    pub mqtt_port: u16,
    pub mqtt_topics: [Topic; CHANNEL_COUNT],
}

impl SinkConfig {
    pub fn http_configured(&self, channel: ChannelId) -> bool {
        !self.endpoint_host.is_empty() && !self.endpoint_paths[channel.index()].is_empty()
    }

    pub fn mqtt_configured(&self, channel: ChannelId) -> bool {
        !self.mqtt_host.is_empty() && !self.mqtt_topics[channel.index()].is_empty()
    }

    pub fn mqtt_broker_url(&self) -> Option<String> {
        if self.mqtt_host.is_empty() {
            None
        } else {
            Some(format!("mqtt://{}:{}", self.mqtt_host, self.mqtt_port))
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            endpoint_host: Host::new(),
            endpoint_paths: Default::default(),
            mqtt_host: Host::new(),
            mqtt_port: DEFAULT_MQTT_PORT,
            mqtt_topics: Default::default(),
        }
    }
}

impl Default for WifiConfig {
    fn default() -> Self {
        let mut ssid = heapless::String::new();
        let mut password = heapless::String::new();
        let _ = ssid.push_str(option_env!("WIFI_SSID").unwrap_or("YOUR_SSID"));
        let _ = password.push_str(option_env!("WIFI_PASS").unwrap_or("YOUR_PASSWORD"));

        Self { ssid, password }
    }
}

fn bounded<const N: usize>(value: &str, field: &'static str) -> MeterResult<heapless::String<N>> {
    let mut out = heapless::String::new();
    out.push_str(value)
        .map_err(|_| MeterError::FieldTooLong { field, max: N })?;
    Ok(out)
}

/// Hostnames and IPv4 literals: ASCII alphanumerics, '-' and '.'
pub fn validate_host(value: &str) -> MeterResult<Host> {
    let valid = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if !valid {
        return Err(MeterError::InvalidHost);
    }
    bounded(value, "host")
}

pub fn validate_path(value: &str) -> MeterResult<EndpointPath> {
    if !value.is_empty() {
        if !value.starts_with('/') {
            return Err(MeterError::InvalidPath);
        }
        // The path is written verbatim into the request line
        if value.chars().any(|c| !c.is_ascii_graphic()) {
            return Err(MeterError::InvalidPath);
        }
    }
    bounded(value, "path")
}

pub fn validate_topic(value: &str) -> MeterResult<Topic> {
    let valid = value
        .chars()
        .all(|c| c.is_ascii_graphic() && c != '+' && c != '#');
    if !valid {
        return Err(MeterError::InvalidTopic);
    }
    bounded(value, "topic")
}

use crate::channel::CHANNEL_COUNT;
use crate::network_config::{
    validate_host, validate_path, validate_topic, EndpointPath, Host, SinkConfig, Topic,
    DEFAULT_MQTT_PORT,
};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelRecord {
    pub raw_count: u32,
    pub sent_watermark: u32,
    pub endpoint_path: EndpointPath,
    pub mqtt_topic: Topic,
}

/// Everything that survives a power cycle: counters of every channel and the
/// sink configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedRecord {
    pub version: u32,
    pub endpoint_host: Host,
    pub mqtt_host: Host,
    pub mqtt_port: u16,
    pub channels: [ChannelRecord; CHANNEL_COUNT],
}

impl Default for PersistedRecord {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            endpoint_host: Host::new(),
            mqtt_host: Host::new(),
            mqtt_port: DEFAULT_MQTT_PORT,
            channels: Default::default(),
        }
    }
}

impl PersistedRecord {
    pub fn from_parts(
        counts: [u32; CHANNEL_COUNT],
        watermarks: [u32; CHANNEL_COUNT],
        sinks: &SinkConfig,
    ) -> Self {
        let mut record = Self {
            endpoint_host: sinks.endpoint_host.clone(),
            mqtt_host: sinks.mqtt_host.clone(),
            mqtt_port: sinks.mqtt_port,
            ..Default::default()
        };
        for (i, channel) in record.channels.iter_mut().enumerate() {
            channel.raw_count = counts[i];
            channel.sent_watermark = watermarks[i];
            channel.endpoint_path = sinks.endpoint_paths[i].clone();
            channel.mqtt_topic = sinks.mqtt_topics[i].clone();
        }
        record
    }

    pub fn sink_config(&self) -> SinkConfig {
        SinkConfig {
            endpoint_host: self.endpoint_host.clone(),
            endpoint_paths: core::array::from_fn(|i| self.channels[i].endpoint_path.clone()),
            mqtt_host: self.mqtt_host.clone(),
            mqtt_port: self.mqtt_port,
            mqtt_topics: core::array::from_fn(|i| self.channels[i].mqtt_topic.clone()),
        }
    }

    /// Clear endpoint fields that would not pass validation today.
    ///
    /// Storage written by an older firmware or edited by hand can hold
    /// anything that fits the length bound.
    pub fn sanitize(&mut self) {
        if validate_host(&self.endpoint_host).is_err() {
            log::warn!("Persist: dropping invalid endpoint host '{}'", self.endpoint_host);
            self.endpoint_host.clear();
        }
        if validate_host(&self.mqtt_host).is_err() {
            log::warn!("Persist: dropping invalid MQTT host '{}'", self.mqtt_host);
            self.mqtt_host.clear();
        }
        if self.mqtt_port == 0 {
            self.mqtt_port = DEFAULT_MQTT_PORT;
        }
        for channel in self.channels.iter_mut() {
            if validate_path(&channel.endpoint_path).is_err() {
                log::warn!("Persist: dropping invalid path '{}'", channel.endpoint_path);
                channel.endpoint_path.clear();
            }
            if validate_topic(&channel.mqtt_topic).is_err() {
                log::warn!("Persist: dropping invalid topic '{}'", channel.mqtt_topic);
                channel.mqtt_topic.clear();
            }
        }
        self.version = SCHEMA_VERSION;
    }
}

/// Schema 1: the single-meter JSON document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordV1 {
    pub version: u32,
    pub pulses: u32,
    pub sent: u32,
    pub host: Host,
    pub path: EndpointPath,
    pub mqtt_host: Host,
    pub mqtt_port: u16,
    pub mqtt_topic: Topic,
}

impl Default for RecordV1 {
    fn default() -> Self {
        Self {
            version: 1,
            pulses: 0,
            sent: 0,
            host: Host::new(),
            path: EndpointPath::new(),
            mqtt_host: Host::new(),
            mqtt_port: DEFAULT_MQTT_PORT,
            mqtt_topic: Topic::new(),
        }
    }
}

impl From<RecordV1> for PersistedRecord {
    fn from(v1: RecordV1) -> Self {
        let mut record = PersistedRecord {
            endpoint_host: v1.host,
            mqtt_host: v1.mqtt_host,
            mqtt_port: v1.mqtt_port,
            ..Default::default()
        };
        record.channels[0] = ChannelRecord {
            raw_count: v1.pulses,
            sent_watermark: v1.sent,
            endpoint_path: v1.path,
            mqtt_topic: v1.mqtt_topic,
        };
        record
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    // Documents from before versioning carry no field and are schema 1
    #[serde(default = "VersionProbe::unversioned")]
    version: u32,
}

impl VersionProbe {
    fn unversioned() -> u32 {
        1
    }
}

/// Decode any known schema into the current record, with the schema found.
///
/// Unknown versions and malformed documents yield `None` and are treated as
/// absent by the caller.
pub fn decode(bytes: &[u8]) -> Option<(PersistedRecord, u32)> {
    let probe: VersionProbe = serde_json::from_slice(bytes).ok()?;
    let mut record = match probe.version {
        1 => serde_json::from_slice::<RecordV1>(bytes).ok()?.into(),
        SCHEMA_VERSION => serde_json::from_slice::<PersistedRecord>(bytes).ok()?,
        other => {
            log::warn!("Persist: unknown schema version {}", other);
            return None;
        }
    };
    record.sanitize();
    Some((record, probe.version))
}

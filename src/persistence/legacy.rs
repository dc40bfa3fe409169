//! Layouts written by earlier single-meter firmware.
//!
//! Both only ever described one meter; whatever they hold lands in channel 0.

use super::record::PersistedRecord;
use super::storage::Storage;
use crate::network_config::{validate_host, validate_path, validate_topic};
use std::io;

pub const BINARY_MAGIC: [u8; 4] = *b"WMTR";
const BINARY_STRING_LEN: usize = 64;
pub const BINARY_RECORD_LEN: usize = 4 + 4 + 4 + 2 * BINARY_STRING_LEN;

pub const KEY_HOST: &str = "host";
pub const KEY_PATH: &str = "path";
pub const KEY_PULSES: &str = "pulses";
pub const KEY_SENT: &str = "sent";
pub const KEY_MQTT_HOST: &str = "mqtt_host";
pub const KEY_MQTT_PORT: &str = "mqtt_port";
pub const KEY_MQTT_TOPIC: &str = "mqtt_topic";

pub const ALL_KEYS: [&str; 7] = [
    KEY_HOST,
    KEY_PATH,
    KEY_PULSES,
    KEY_SENT,
    KEY_MQTT_HOST,
    KEY_MQTT_PORT,
    KEY_MQTT_TOPIC,
];

fn key_path(dir: &str, key: &str) -> String {
    format!("{}/{}", dir, key)
}

/// One small text file per setting, e.g. `config/host`.
///
/// Returns `None` when none of the known keys exists. Values that fail to
/// parse or validate are left at their defaults.
pub fn read_key_files<S: Storage>(storage: &S, dir: &str) -> io::Result<Option<PersistedRecord>> {
    let mut record = PersistedRecord::default();
    let mut found = false;

    for key in ALL_KEYS {
        let Some(raw) = storage.read(&key_path(dir, key))? else {
            continue;
        };
        found = true;
        let text = String::from_utf8_lossy(&raw);
        let value = text.trim();

        let applied = match key {
            KEY_HOST => validate_host(value).map(|v| record.endpoint_host = v).is_ok(),
            KEY_PATH => validate_path(value)
                .map(|v| record.channels[0].endpoint_path = v)
                .is_ok(),
            KEY_PULSES => value.parse::<u32>().map(|v| record.channels[0].raw_count = v).is_ok(),
            KEY_SENT => value
                .parse::<u32>()
                .map(|v| record.channels[0].sent_watermark = v)
                .is_ok(),
            KEY_MQTT_HOST => validate_host(value).map(|v| record.mqtt_host = v).is_ok(),
            KEY_MQTT_PORT => value
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .map(|v| record.mqtt_port = v)
                .is_some(),
            KEY_MQTT_TOPIC => validate_topic(value)
                .map(|v| record.channels[0].mqtt_topic = v)
                .is_ok(),
            _ => false,
        };
        if !applied {
            log::warn!("Persist: ignoring unreadable legacy value {}='{}'", key, value);
        }
    }

    Ok(found.then_some(record))
}

pub fn write_key_files<S: Storage>(
    storage: &mut S,
    dir: &str,
    record: &PersistedRecord,
) -> io::Result<()> {
    let channel = &record.channels[0];
    let values: [(&str, String); 7] = [
        (KEY_HOST, record.endpoint_host.to_string()),
        (KEY_PATH, channel.endpoint_path.to_string()),
        (KEY_PULSES, channel.raw_count.to_string()),
        (KEY_SENT, channel.sent_watermark.to_string()),
        (KEY_MQTT_HOST, record.mqtt_host.to_string()),
        (KEY_MQTT_PORT, record.mqtt_port.to_string()),
        (KEY_MQTT_TOPIC, channel.mqtt_topic.to_string()),
    ];
    for (key, value) in values {
        storage.write(&key_path(dir, key), value.as_bytes())?;
    }
    Ok(())
}

pub fn remove_key_files<S: Storage>(storage: &mut S, dir: &str) -> io::Result<()> {
    for key in ALL_KEYS {
        storage.remove(&key_path(dir, key))?;
    }
    Ok(())
}

/// Fixed 136-byte record: magic, pulses (u32 LE), sent (u32 LE), then host
/// and path as NUL-padded 64-byte fields.
pub fn decode_binary(bytes: &[u8]) -> Option<PersistedRecord> {
    if bytes.len() < BINARY_RECORD_LEN || bytes[..4] != BINARY_MAGIC {
        return None;
    }

    let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    let field = |at: usize| {
        let raw = &bytes[at..at + BINARY_STRING_LEN];
        let end = raw.iter().position(|b| *b == 0).unwrap_or(BINARY_STRING_LEN);
        std::str::from_utf8(&raw[..end]).ok().map(str::to_owned)
    };

    let mut record = PersistedRecord::default();
    record.channels[0].raw_count = word(4);
    record.channels[0].sent_watermark = word(8);

    let host = field(12).unwrap_or_default();
    match validate_host(&host) {
        Ok(h) => record.endpoint_host = h,
        Err(_) => log::warn!("Persist: ignoring unreadable legacy host"),
    }
    let path = field(12 + BINARY_STRING_LEN).unwrap_or_default();
    match validate_path(&path) {
        Ok(p) => record.channels[0].endpoint_path = p,
        Err(_) => log::warn!("Persist: ignoring unreadable legacy path"),
    }

    Some(record)
}

pub fn encode_binary(record: &PersistedRecord) -> Vec<u8> {
    let channel = &record.channels[0];
    let mut out = Vec::with_capacity(BINARY_RECORD_LEN);
    out.extend_from_slice(&BINARY_MAGIC);
    out.extend_from_slice(&channel.raw_count.to_le_bytes());
    out.extend_from_slice(&channel.sent_watermark.to_le_bytes());
    for text in [record.endpoint_host.as_str(), channel.endpoint_path.as_str()] {
        let mut slot = [0u8; BINARY_STRING_LEN];
        let len = text.len().min(BINARY_STRING_LEN);
        slot[..len].copy_from_slice(&text.as_bytes()[..len]);
        out.extend_from_slice(&slot);
    }
    out
}

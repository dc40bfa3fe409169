//! Boot-time loading against a real directory, one layout per test.

use esp32_pulse_meter::persistence::legacy;
use esp32_pulse_meter::persistence::{PersistedRecord, RecordV1};
use esp32_pulse_meter::sink::{HttpTransport, SinkError};
use esp32_pulse_meter::{ChannelId, Controller, DeviceConfig, FsStorage, LoadSource, Storage};
use std::fs;
use std::path::Path;
use std::time::Duration;

struct Offline;

impl HttpTransport for Offline {
    fn exchange(&mut self, _: &str, _: &[u8], _: Duration) -> Result<String, SinkError> {
        Err(SinkError::Timeout)
    }
}

fn boot(dir: &Path) -> Controller<FsStorage> {
    Controller::new(DeviceConfig::default(), FsStorage::new(dir), Box::new(Offline), 0)
}

fn stored_record(dir: &Path) -> PersistedRecord {
    let bytes = fs::read(dir.join("state.json")).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[test]
fn empty_directory_boots_from_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let controller = boot(dir.path());
    assert_eq!(controller.load_source(), LoadSource::Defaults);
    assert_eq!(controller.channel(ChannelId::Water).count(), 0);
    assert!(!dir.path().join("state.json").exists());
}

#[test]
fn key_files_are_migrated_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config");
    fs::create_dir_all(&config).unwrap();
    fs::write(config.join("host"), "vz.local\n").unwrap();
    fs::write(config.join("path"), "/middleware.php/data/abc.json").unwrap();
    fs::write(config.join("pulses"), "41234").unwrap();
    fs::write(config.join("sent"), "41200").unwrap();
    fs::write(config.join("mqtt_topic"), "home/water").unwrap();

    let controller = boot(dir.path());
    assert_eq!(controller.load_source(), LoadSource::LegacyKeyFiles);
    let water = controller.channel(ChannelId::Water);
    assert_eq!(water.count(), 41_234);
    assert_eq!(water.sent_watermark(), 41_200);
    assert_eq!(controller.sinks().endpoint_host.as_str(), "vz.local");
    assert_eq!(controller.sinks().mqtt_topics[0].as_str(), "home/water");
    assert_eq!(controller.channel(ChannelId::Gas).count(), 0);

    for key in legacy::ALL_KEYS {
        assert!(!config.join(key).exists(), "{} left behind", key);
    }
    assert_eq!(stored_record(dir.path()).channels[0].raw_count, 41_234);

    let rebooted = boot(dir.path());
    assert_eq!(rebooted.load_source(), LoadSource::Current);
    assert_eq!(rebooted.channel(ChannelId::Water).count(), 41_234);
}

#[test]
fn binary_record_is_migrated() {
    let dir = tempfile::tempdir().unwrap();
    let mut old = PersistedRecord::default();
    old.channels[0].raw_count = 7_000;
    old.channels[0].sent_watermark = 6_990;
    fs::write(dir.path().join("eeprom.bin"), legacy::encode_binary(&old)).unwrap();

    let controller = boot(dir.path());
    assert_eq!(controller.load_source(), LoadSource::LegacyBinary);
    assert_eq!(controller.channel(ChannelId::Water).count(), 7_000);
    assert!(!dir.path().join("eeprom.bin").exists());
    assert_eq!(boot(dir.path()).load_source(), LoadSource::Current);
}

#[test]
fn key_files_win_over_binary_record() {
    let dir = tempfile::tempdir().unwrap();
    let mut storage = FsStorage::new(dir.path());
    let mut keys = PersistedRecord::default();
    keys.channels[0].raw_count = 10;
    legacy::write_key_files(&mut storage, "config", &keys).unwrap();
    let mut binary = PersistedRecord::default();
    binary.channels[0].raw_count = 20;
    storage.write("eeprom.bin", &legacy::encode_binary(&binary)).unwrap();

    let controller = boot(dir.path());
    assert_eq!(controller.load_source(), LoadSource::LegacyKeyFiles);
    assert_eq!(controller.channel(ChannelId::Water).count(), 10);
}

#[test]
fn schema_one_document_is_upgraded() {
    let dir = tempfile::tempdir().unwrap();
    let v1 = RecordV1 {
        pulses: 555,
        sent: 550,
        mqtt_port: 1884,
        ..Default::default()
    };
    fs::write(dir.path().join("state.json"), serde_json::to_vec(&v1).unwrap()).unwrap();

    let controller = boot(dir.path());
    assert_eq!(controller.load_source(), LoadSource::OlderSchema(1));
    assert_eq!(controller.channel(ChannelId::Water).count(), 555);
    assert_eq!(controller.sinks().mqtt_port, 1884);

    let stored = stored_record(dir.path());
    assert_eq!(stored.version, 2);
    assert_eq!(stored.channels[0].sent_watermark, 550);
}

#[test]
fn stale_temp_file_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = boot(dir.path());
    controller.override_counter(ChannelId::Gas, 321).unwrap();
    controller.tick(10);
    controller.commit_now().unwrap();

    fs::write(dir.path().join("state.json.tmp"), b"{\"version\":2,\"chan").unwrap();
    let rebooted = boot(dir.path());
    assert_eq!(rebooted.load_source(), LoadSource::Current);
    assert_eq!(rebooted.channel(ChannelId::Gas).count(), 321);
    assert!(!dir.path().join("state.json.tmp").exists());
}

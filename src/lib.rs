//! ESP32 Water/Gas Pulse Meter Library
//!
//! Debounced pulse counting for two meter inputs, reconciliation of the
//! counters with an HTTP accumulation endpoint and an MQTT broker, and
//! crash-safe persistence of counters and sink settings.
//!
//! Everything except the `mqtt` and `wifi` adapters is plain `std` code and
//! runs on the host as well as on the device.

pub mod channel;
pub mod cli;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod error;
#[cfg(target_os = "espidf")]
pub mod mqtt;
pub mod network_config;
pub mod persistence;
pub mod schedule;
pub mod sink;
#[cfg(target_os = "espidf")]
pub mod wifi;

pub use channel::{ChannelId, ChannelSpec, CHANNEL_COUNT};
pub use cli::{CliCommand, CliError, CommandHandler, CommandParser, SerialPort, Terminal};
pub use config::{DeviceConfig, PersistenceConfig};
pub use controller::{ChannelStatus, Controller, DeviceStatus};
pub use debounce::PulseInput;
pub use error::{MeterError, MeterResult};
#[cfg(target_os = "espidf")]
pub use mqtt::MqttClient;
pub use network_config::{SinkConfig, WifiConfig};
pub use persistence::{CommitOutcome, FsStorage, LoadSource, MemStorage, Persistence, Storage};
pub use schedule::{DueFlag, PeriodicTimer};
pub use sink::{HttpTransport, MqttPublisher, SinkError, SinkKind, TcpTransport};
#[cfg(target_os = "espidf")]
pub use wifi::WifiManager;

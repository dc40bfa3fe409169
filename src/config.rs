use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Reconciliation loop period (ms)
    pub tick_ms: u64,

    /// Minimum time between accepted edges on a pulse input (ms)
    pub debounce_window_ms: u32,

    /// Level of a pulse input at rest (reed contact open with pull-down = LOW)
    pub pulse_idle_high: bool,

    /// Push heartbeat per channel per sink (ms)
    pub push_period_ms: u64,

    /// How often dirty counters are committed to storage (ms)
    pub commit_period_ms: u64,

    /// Wait for the first byte of an HTTP response (ms)
    pub http_timeout_ms: u64,

    /// TCP port of the HTTP accumulation endpoint
    pub http_port: u16,

    /// Keep-alive interval announced to the MQTT broker (s)
    pub mqtt_keep_alive_secs: u64,

    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// First serialization buffer size tried (bytes)
    pub initial_capacity: usize,

    /// Growth applied after an overflow (bytes)
    pub grow_step: usize,

    /// Hard limit, a record needing more than this is never written
    pub max_capacity: usize,

    pub state_file: &'static str,
    pub temp_file: &'static str,

    /// Directory of the one-file-per-key legacy layout
    pub legacy_dir: &'static str,

    /// Fixed-size binary legacy record
    pub legacy_binary_file: &'static str,
}

impl DeviceConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            debounce_window_ms: 100,
            pulse_idle_high: false,
            push_period_ms: 60_000,
            commit_period_ms: 60_000,
            http_timeout_ms: 5_000,
            http_port: 80,
            mqtt_keep_alive_secs: 60,
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 512,
            grow_step: 256,
            max_capacity: 4096,
            state_file: "state.json",
            temp_file: "state.json.tmp",
            legacy_dir: "config",
            legacy_binary_file: "eeprom.bin",
        }
    }
}

use crate::channel::{ChannelId, ChannelSpec, CHANNEL_COUNT};
use crate::config::DeviceConfig;
use crate::debounce::PulseInput;
use crate::error::{MeterError, MeterResult};
use crate::network_config::{validate_host, validate_path, validate_topic, SinkConfig};
use crate::persistence::{
    CommitOutcome, LoadSource, Persistence, PersistedRecord, PersistenceStats, Storage,
};
use crate::schedule::PeriodicTimer;
use crate::sink::{HttpSink, HttpTransport, MqttPublisher, MqttSink, SinkError, SinkKind};
use std::fmt;
use std::sync::Arc;

/// Per-channel counter state owned by the reconciliation loop
pub struct ChannelState {
    pub id: ChannelId,
    pub spec: ChannelSpec,
    input: Arc<PulseInput>,
    // raw_count as seen by the last tick
    shadow: u32,
    committed: u32,
    sent_watermark: u32,
    committed_watermark: u32,
    force_push: bool,
    last_push_ms: Option<u64>,
    last_http: Option<Result<u32, SinkError>>,
    push_timers: [PeriodicTimer; 2],
}

impl ChannelState {
    fn new(id: ChannelId, count: u32, watermark: u32, config: &DeviceConfig, now_ms: u64) -> Self {
        Self {
            id,
            spec: ChannelSpec::for_channel(id),
            input: Arc::new(PulseInput::new(
                count,
                config.pulse_idle_high,
                config.debounce_window_ms,
            )),
            shadow: count,
            committed: count,
            sent_watermark: watermark,
            committed_watermark: watermark,
            force_push: false,
            last_push_ms: None,
            last_http: None,
            push_timers: [
                PeriodicTimer::new(config.push_period_ms, now_ms),
                PeriodicTimer::new(config.push_period_ms, now_ms),
            ],
        }
    }

    pub fn count(&self) -> u32 {
        self.input.count()
    }

    pub fn sent_watermark(&self) -> u32 {
        self.sent_watermark
    }

    pub fn committed(&self) -> u32 {
        self.committed
    }

    pub fn push_timer(&self, kind: SinkKind) -> &PeriodicTimer {
        &self.push_timers[kind.index()]
    }

    fn needs_commit(&self) -> bool {
        self.shadow != self.committed || self.sent_watermark != self.committed_watermark
    }

    /// Forward the tick's snapshot to every configured sink that wants it
    fn push(
        &mut self,
        count: u32,
        changed: bool,
        sinks: &SinkConfig,
        http: &mut HttpSink,
        mqtt: &mut MqttSink,
        now_ms: u64,
    ) {
        let i = self.id.index();
        for kind in SinkKind::ALL {
            let due = self.push_timers[kind.index()].take_due();
            let configured = match kind {
                SinkKind::Http => sinks.http_configured(self.id),
                SinkKind::Mqtt => sinks.mqtt_configured(self.id) && mqtt.is_attached(),
            };
            if !configured || !(changed || due) {
                continue;
            }

            let result = match kind {
                SinkKind::Http => {
                    let result = http.push(
                        &sinks.endpoint_host,
                        &sinks.endpoint_paths[i],
                        &self.spec,
                        &mut self.sent_watermark,
                        count,
                    );
                    self.last_http = Some(result.clone());
                    result.map(|_| ())
                }
                SinkKind::Mqtt => mqtt.push(&sinks.mqtt_topics[i], &self.spec, count),
            };

            match result {
                Ok(()) => {
                    self.last_push_ms = Some(now_ms);
                    // A heartbeat push already rescheduled its own timer
                    if !due {
                        self.push_timers[kind.index()].rearm(now_ms);
                    }
                    log::info!(
                        "Push: {} {} = {} {}",
                        self.id,
                        kind,
                        self.spec.format_value(match kind {
                            SinkKind::Http => self.sent_watermark,
                            SinkKind::Mqtt => count,
                        }),
                        self.spec.unit
                    );
                }
                Err(e) => log::warn!("Push: {} {} failed: {}", self.id, kind, e),
            }
        }
    }
}

/// Snapshot of one channel for status displays
#[derive(Debug, Clone)]
pub struct ChannelStatus {
    pub id: ChannelId,
    pub label: &'static str,
    pub unit: &'static str,
    pub count: u32,
    pub value: String,
    pub sent_watermark: u32,
    pub committed: u32,
    pub last_push_ms: Option<u64>,
    pub last_http: Option<Result<u32, SinkError>>,
    pub http_configured: bool,
    pub mqtt_configured: bool,
}

#[derive(Debug, Clone)]
pub struct DeviceStatus {
    pub channels: Vec<ChannelStatus>,
    pub persistence: PersistenceStats,
    pub load_source: LoadSource,
    pub mqtt_attached: bool,
    pub mqtt_publish_count: u32,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for ch in &self.channels {
            write!(f, "{} ({}):\r\n", ch.label, ch.id)?;
            write!(f, "  Reading:   {} {} ({} pulses)\r\n", ch.value, ch.unit, ch.count)?;
            write!(f, "  Sent:      {} pulses\r\n", ch.sent_watermark)?;
            write!(f, "  Committed: {} pulses\r\n", ch.committed)?;
            let http = match (&ch.last_http, ch.http_configured) {
                (_, false) => "not configured".to_string(),
                (None, true) => "no push yet".to_string(),
                (Some(Ok(value)), true) => format!("OK ({})", value),
                (Some(Err(e)), true) => format!("failed: {}", e),
            };
            write!(f, "  HTTP:      {}\r\n", http)?;
            write!(
                f,
                "  MQTT:      {}\r\n",
                if ch.mqtt_configured { "configured" } else { "not configured" }
            )?;
            if let Some(at) = ch.last_push_ms {
                write!(f, "  Last push: {} s after boot\r\n", at / 1000)?;
            }
        }
        write!(
            f,
            "MQTT client: {} ({} published)\r\n",
            if self.mqtt_attached { "attached" } else { "none" },
            self.mqtt_publish_count
        )?;
        write!(
            f,
            "Storage: {} writes, {} skipped, {} faults, buffer {} bytes",
            self.persistence.writes,
            self.persistence.suppressed,
            self.persistence.faults,
            self.persistence.capacity
        )?;
        if let Some(d) = self.persistence.last_write_duration {
            write!(f, ", last write {} ms", d.as_millis())?;
        }
        Ok(())
    }
}

/// Device controller: counters, sinks and persistence driven by `tick`.
///
/// Owned by the main loop. The only state shared with the interrupt path are
/// the `PulseInput`s handed out by `input`.
pub struct Controller<S: Storage> {
    config: DeviceConfig,
    channels: [ChannelState; CHANNEL_COUNT],
    sinks: SinkConfig,
    persistence: Persistence<S>,
    load_source: LoadSource,
    http: HttpSink,
    mqtt: MqttSink,
    commit_timer: PeriodicTimer,
    config_dirty: bool,
    broker_changed: bool,
}

impl<S: Storage> Controller<S> {
    /// Restore state from `storage` and build the controller around it
    pub fn new(
        config: DeviceConfig,
        storage: S,
        http_transport: Box<dyn HttpTransport>,
        now_ms: u64,
    ) -> Self {
        let mut persistence = Persistence::new(storage, config.persistence.clone());
        let (record, load_source) = persistence.load();

        let channels = ChannelId::ALL.map(|id| {
            let stored = &record.channels[id.index()];
            ChannelState::new(id, stored.raw_count, stored.sent_watermark, &config, now_ms)
        });
        for ch in &channels {
            log::info!(
                "Meter: {} restored at {} pulses (sent {})",
                ch.id,
                ch.count(),
                ch.sent_watermark
            );
        }

        Self {
            http: HttpSink::new(http_transport, config.http_timeout()),
            mqtt: MqttSink::default(),
            commit_timer: PeriodicTimer::new(config.commit_period_ms, now_ms),
            sinks: record.sink_config(),
            channels,
            persistence,
            load_source,
            config,
            config_dirty: false,
            broker_changed: false,
        }
    }

    pub fn with_mqtt(mut self, publisher: Box<dyn MqttPublisher>) -> Self {
        self.mqtt.attach(publisher);
        self
    }

    pub fn attach_mqtt(&mut self, publisher: Box<dyn MqttPublisher>) {
        self.mqtt.attach(publisher);
    }

    pub fn detach_mqtt(&mut self) {
        self.mqtt.detach();
    }

    /// Counter cell for the interrupt handler of `channel`
    pub fn input(&self, channel: ChannelId) -> Arc<PulseInput> {
        Arc::clone(&self.channels[channel.index()].input)
    }

    pub fn channel(&self, channel: ChannelId) -> &ChannelState {
        &self.channels[channel.index()]
    }

    pub fn sinks(&self) -> &SinkConfig {
        &self.sinks
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn load_source(&self) -> LoadSource {
        self.load_source
    }

    pub fn persistence(&self) -> &Persistence<S> {
        &self.persistence
    }

    /// One pass of the reconciliation loop
    pub fn tick(&mut self, now_ms: u64) {
        for ch in self.channels.iter_mut() {
            for timer in ch.push_timers.iter_mut() {
                timer.poll(now_ms);
            }

            let count = ch.input.count();
            let changed = count != ch.shadow || ch.force_push;
            ch.push(count, changed, &self.sinks, &mut self.http, &mut self.mqtt, now_ms);

            // Also after a failed push: the next attempt waits for a new
            // change or the heartbeat
            ch.shadow = count;
            ch.force_push = false;
        }

        self.commit_timer.poll(now_ms);
        if self.commit_timer.take_due() && self.needs_commit() {
            if let Err(e) = self.commit() {
                log::warn!("Meter: periodic commit failed: {}", e);
            }
        }
    }

    pub fn needs_commit(&self) -> bool {
        self.config_dirty || self.channels.iter().any(ChannelState::needs_commit)
    }

    fn record(&self) -> PersistedRecord {
        PersistedRecord::from_parts(
            self.channels.each_ref().map(ChannelState::count),
            self.channels.each_ref().map(|ch| ch.sent_watermark),
            &self.sinks,
        )
    }

    fn commit(&mut self) -> MeterResult<CommitOutcome> {
        let record = self.record();
        let outcome = self.persistence.commit(&record)?;
        for (ch, stored) in self.channels.iter_mut().zip(record.channels.iter()) {
            ch.committed = stored.raw_count;
            ch.committed_watermark = stored.sent_watermark;
        }
        self.config_dirty = false;
        Ok(outcome)
    }

    /// Commit right away, outside the periodic schedule.
    ///
    /// Counters are read live, so an override just made is included.
    pub fn commit_now(&mut self) -> MeterResult<CommitOutcome> {
        self.commit()
    }

    /// Replace a counter with a new baseline. Zero is rejected.
    pub fn override_counter(&mut self, channel: ChannelId, value: u32) -> MeterResult<()> {
        if value == 0 {
            return Err(MeterError::InvalidValue);
        }
        let ch = &mut self.channels[channel.index()];
        ch.input.override_count(value);
        ch.force_push = true;
        log::info!("Meter: {} counter set to {}", channel, value);
        Ok(())
    }

    /// Force a push of one channel, or all, on the next tick
    pub fn request_push(&mut self, channel: Option<ChannelId>) {
        for ch in self.channels.iter_mut() {
            if channel.map_or(true, |c| c == ch.id) {
                ch.force_push = true;
            }
        }
    }

    fn sinks_changed(&mut self, channel: Option<ChannelId>) {
        self.config_dirty = true;
        self.request_push(channel);
    }

    pub fn set_endpoint_host(&mut self, host: &str) -> MeterResult<()> {
        self.sinks.endpoint_host = validate_host(host)?;
        log::info!("Meter: HTTP host set to '{}'", host);
        self.sinks_changed(None);
        Ok(())
    }

    pub fn set_endpoint_path(&mut self, channel: ChannelId, path: &str) -> MeterResult<()> {
        self.sinks.endpoint_paths[channel.index()] = validate_path(path)?;
        log::info!("Meter: {} HTTP path set to '{}'", channel, path);
        self.sinks_changed(Some(channel));
        Ok(())
    }

    pub fn set_mqtt_host(&mut self, host: &str) -> MeterResult<()> {
        self.set_mqtt_broker(host, None)
    }

    pub fn set_mqtt_port(&mut self, port: u16) -> MeterResult<()> {
        let host = self.sinks.mqtt_host.clone();
        self.set_mqtt_broker(&host, Some(port))
    }

    /// Host and optionally port in one step, validated before either changes
    pub fn set_mqtt_broker(&mut self, host: &str, port: Option<u16>) -> MeterResult<()> {
        if port == Some(0) {
            return Err(MeterError::InvalidValue);
        }
        let host = validate_host(host)?;
        self.sinks.mqtt_host = host;
        if let Some(port) = port {
            self.sinks.mqtt_port = port;
        }
        log::info!(
            "Meter: MQTT broker set to '{}:{}'",
            self.sinks.mqtt_host,
            self.sinks.mqtt_port
        );
        self.broker_changed = true;
        self.sinks_changed(None);
        Ok(())
    }

    pub fn set_mqtt_topic(&mut self, channel: ChannelId, topic: &str) -> MeterResult<()> {
        self.sinks.mqtt_topics[channel.index()] = validate_topic(topic)?;
        log::info!("Meter: {} MQTT topic set to '{}'", channel, topic);
        self.sinks_changed(Some(channel));
        Ok(())
    }

    /// True once after the broker address changed; the owner of the MQTT
    /// client reconnects using `sinks().mqtt_broker_url()`
    pub fn take_broker_change(&mut self) -> bool {
        std::mem::take(&mut self.broker_changed)
    }

    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            channels: self
                .channels
                .iter()
                .map(|ch| {
                    let count = ch.count();
                    ChannelStatus {
                        id: ch.id,
                        label: ch.spec.label,
                        unit: ch.spec.unit,
                        count,
                        value: ch.spec.format_value(count),
                        sent_watermark: ch.sent_watermark,
                        committed: ch.committed,
                        last_push_ms: ch.last_push_ms,
                        last_http: ch.last_http.clone(),
                        http_configured: self.sinks.http_configured(ch.id),
                        mqtt_configured: self.sinks.mqtt_configured(ch.id),
                    }
                })
                .collect(),
            persistence: self.persistence.stats().clone(),
            load_source: self.load_source,
            mqtt_attached: self.mqtt.is_attached(),
            mqtt_publish_count: self.mqtt.publish_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemStorage;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct EndpointLog {
        status: u16,
        requests: Vec<String>,
    }

    /// Accumulation endpoint answering every request with a fixed status
    #[derive(Clone)]
    struct Endpoint(Arc<Mutex<EndpointLog>>);

    impl Endpoint {
        fn new(status: u16) -> Self {
            Self(Arc::new(Mutex::new(EndpointLog {
                status,
                requests: Vec::new(),
            })))
        }

        fn set_status(&self, status: u16) {
            self.0.lock().unwrap().status = status;
        }

        fn requests(&self) -> Vec<String> {
            self.0.lock().unwrap().requests.clone()
        }
    }

    impl HttpTransport for Endpoint {
        fn exchange(&mut self, _: &str, request: &[u8], _: Duration) -> Result<String, SinkError> {
            let mut log = self.0.lock().unwrap();
            let line = String::from_utf8_lossy(request)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string();
            log.requests.push(line);
            Ok(format!("HTTP/1.1 {} Whatever\r\n", log.status))
        }
    }

    struct Recorder(Arc<Mutex<Vec<(String, String)>>>);

    impl MqttPublisher for Recorder {
        fn publish(&mut self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
            self.0
                .lock()
                .unwrap()
                .push((topic.to_string(), String::from_utf8(payload.to_vec())?));
            Ok(())
        }
    }

    fn controller(storage: &MemStorage, endpoint: &Endpoint) -> Controller<MemStorage> {
        Controller::new(
            DeviceConfig::default(),
            storage.clone(),
            Box::new(endpoint.clone()),
            0,
        )
    }

    /// HTTP sink set up for the water channel and the forced push flushed
    fn configured(storage: &MemStorage, endpoint: &Endpoint) -> Controller<MemStorage> {
        let mut c = controller(storage, endpoint);
        c.set_endpoint_host("meter.local").unwrap();
        c.set_endpoint_path(ChannelId::Water, "/api/water").unwrap();
        c.tick(0);
        c
    }

    fn pulses(input: &PulseInput, n: u32, start_ms: u32) {
        for i in 0..n {
            let t = start_ms + i * 400;
            input.on_edge(true, t);
            input.on_edge(false, t + 200);
        }
    }

    #[test]
    fn failed_push_waits_for_heartbeat() {
        let storage = MemStorage::new();
        let endpoint = Endpoint::new(200);
        let mut c = configured(&storage, &endpoint);
        assert_eq!(endpoint.requests().len(), 1);

        endpoint.set_status(500);
        pulses(&c.input(ChannelId::Water), 1, 1_000);
        c.tick(2_000);
        assert_eq!(endpoint.requests().len(), 2);
        assert_eq!(c.channel(ChannelId::Water).sent_watermark(), 0);

        endpoint.set_status(200);
        for now in (3_000..60_000).step_by(1_000) {
            c.tick(now);
        }
        assert_eq!(endpoint.requests().len(), 2);

        c.tick(60_000);
        let requests = endpoint.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[2].contains("value=0.001"));
        assert_eq!(c.channel(ChannelId::Water).sent_watermark(), 1);
    }

    #[test]
    fn burst_between_ticks_is_one_push() {
        let storage = MemStorage::new();
        let endpoint = Endpoint::new(200);
        let mut c = configured(&storage, &endpoint);

        pulses(&c.input(ChannelId::Water), 3, 100);
        c.tick(2_000);
        let requests = endpoint.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1],
            "GET /api/water?operation=add&value=0.003 HTTP/1.1"
        );
        assert_eq!(c.channel(ChannelId::Water).sent_watermark(), 3);
    }

    #[test]
    fn unconfigured_channel_is_not_pushed() {
        let storage = MemStorage::new();
        let endpoint = Endpoint::new(200);
        let mut c = configured(&storage, &endpoint);

        pulses(&c.input(ChannelId::Gas), 2, 100);
        c.tick(1_000);
        c.tick(60_000);
        assert!(endpoint.requests().iter().all(|r| r.contains("/api/water")));
        assert_eq!(c.channel(ChannelId::Gas).count(), 2);
    }

    #[test]
    fn override_rejects_zero_and_forces_push() {
        let storage = MemStorage::new();
        let endpoint = Endpoint::new(200);
        let mut c = configured(&storage, &endpoint);

        assert!(matches!(
            c.override_counter(ChannelId::Water, 0),
            Err(MeterError::InvalidValue)
        ));

        c.override_counter(ChannelId::Water, 2_500).unwrap();
        c.tick(10);
        assert!(endpoint.requests()[1].contains("value=2.500"));

        // A lower baseline never walks the endpoint backwards
        c.override_counter(ChannelId::Water, 100).unwrap();
        c.tick(20);
        assert!(endpoint.requests()[2].contains("value=2.500"));
        assert_eq!(c.channel(ChannelId::Water).sent_watermark(), 2_500);
        assert_eq!(c.channel(ChannelId::Water).count(), 100);
    }

    #[test]
    fn periodic_commit_skips_unchanged_state() {
        let storage = MemStorage::new();
        let endpoint = Endpoint::new(200);
        let mut c = configured(&storage, &endpoint);
        assert!(c.needs_commit());
        assert_eq!(storage.write_count(), 0);

        c.tick(60_000);
        assert_eq!(storage.write_count(), 1);
        assert!(!c.needs_commit());

        c.tick(120_000);
        assert_eq!(storage.write_count(), 1);

        pulses(&c.input(ChannelId::Water), 4, 120_100);
        c.tick(125_000);
        assert!(c.needs_commit());
        c.tick(180_000);
        assert_eq!(storage.write_count(), 2);

        let rebooted = controller(&storage, &endpoint);
        assert_eq!(rebooted.load_source(), LoadSource::Current);
        assert_eq!(rebooted.channel(ChannelId::Water).count(), 4);
        assert_eq!(rebooted.channel(ChannelId::Water).sent_watermark(), 4);
        assert_eq!(rebooted.sinks().endpoint_host.as_str(), "meter.local");
    }

    #[test]
    fn mqtt_publishes_on_change() {
        let storage = MemStorage::new();
        let endpoint = Endpoint::new(200);
        let published = Arc::new(Mutex::new(Vec::new()));
        let mut c = controller(&storage, &endpoint)
            .with_mqtt(Box::new(Recorder(published.clone())));

        c.set_mqtt_broker("broker.local", None).unwrap();
        c.set_mqtt_topic(ChannelId::Gas, "home/gas").unwrap();
        assert!(c.take_broker_change());
        assert!(!c.take_broker_change());
        assert_eq!(
            c.sinks().mqtt_broker_url().as_deref(),
            Some("mqtt://broker.local:1883")
        );

        c.tick(0);
        pulses(&c.input(ChannelId::Gas), 12, 100);
        c.tick(6_000);

        let published = published.lock().unwrap();
        assert_eq!(
            *published,
            vec![
                ("home/gas".to_string(), "0.00".to_string()),
                ("home/gas".to_string(), "0.12".to_string()),
            ]
        );
        assert!(endpoint.requests().is_empty());
        assert_eq!(c.status().mqtt_publish_count, 2);
    }

    #[test]
    fn broker_port_and_host_separately() {
        let storage = MemStorage::new();
        let endpoint = Endpoint::new(200);
        let mut c = controller(&storage, &endpoint);

        c.set_mqtt_host("10.0.0.5").unwrap();
        c.set_mqtt_port(1884).unwrap();
        assert!(c.set_mqtt_port(0).is_err());
        assert_eq!(
            c.sinks().mqtt_broker_url().as_deref(),
            Some("mqtt://10.0.0.5:1884")
        );
        assert!(c.take_broker_change());
    }

    #[test]
    fn rejected_settings_leave_config_untouched() {
        let storage = MemStorage::new();
        let endpoint = Endpoint::new(200);
        let mut c = controller(&storage, &endpoint);

        assert!(c.set_endpoint_host("bad host").is_err());
        assert!(c.set_endpoint_path(ChannelId::Water, "no-slash").is_err());
        assert!(c.set_mqtt_topic(ChannelId::Water, "home/#").is_err());
        assert!(matches!(
            c.set_mqtt_broker("broker", Some(0)),
            Err(MeterError::InvalidValue)
        ));
        assert_eq!(c.sinks(), &SinkConfig::default());
        assert!(!c.needs_commit());
        assert!(!c.take_broker_change());
    }

    #[test]
    fn commit_now_includes_fresh_override() {
        let storage = MemStorage::new();
        let endpoint = Endpoint::new(200);
        let mut c = controller(&storage, &endpoint);

        c.override_counter(ChannelId::Water, 5_000).unwrap();
        c.commit_now().unwrap();
        assert_eq!(c.channel(ChannelId::Water).committed(), 5_000);

        let rebooted = controller(&storage, &endpoint);
        assert_eq!(rebooted.channel(ChannelId::Water).count(), 5_000);
    }

    /// Endpoint that stalls like an unreachable host while edges keep arriving
    struct StallingEndpoint(Arc<PulseInput>);

    impl HttpTransport for StallingEndpoint {
        fn exchange(&mut self, _: &str, _: &[u8], _: Duration) -> Result<String, SinkError> {
            pulses(&self.0, 3, 10_000);
            Err(SinkError::Timeout)
        }
    }

    #[test]
    fn edges_during_a_stalled_push_are_counted() {
        let storage = MemStorage::new();
        let mut c = Controller::new(
            DeviceConfig::default(),
            storage.clone(),
            Box::new(Endpoint::new(200)),
            0,
        );
        let input = c.input(ChannelId::Water);
        c.http = HttpSink::new(
            Box::new(StallingEndpoint(Arc::clone(&input))),
            Duration::from_secs(5),
        );
        c.set_endpoint_host("unreachable.local").unwrap();
        c.set_endpoint_path(ChannelId::Water, "/water").unwrap();

        c.tick(0);
        assert_eq!(input.count(), 3);
        assert_eq!(c.channel(ChannelId::Water).sent_watermark(), 0);

        // Counted while the loop was blocked, so the next tick sees a change
        c.http = HttpSink::new(Box::new(Endpoint::new(200)), Duration::from_secs(5));
        c.tick(100);
        assert_eq!(c.channel(ChannelId::Water).sent_watermark(), 3);
    }

    #[test]
    fn status_reports_last_http_result() {
        let storage = MemStorage::new();
        let endpoint = Endpoint::new(404);
        let mut c = configured(&storage, &endpoint);

        let status = c.status();
        let water = &status.channels[ChannelId::Water.index()];
        assert_eq!(water.last_http, Some(Err(SinkError::Status(404))));
        assert!(water.http_configured);
        assert!(!status.channels[ChannelId::Gas.index()].http_configured);

        endpoint.set_status(200);
        c.request_push(Some(ChannelId::Water));
        c.tick(100);
        let text = c.status().to_string();
        assert!(text.contains("HTTP:      OK (0)"));
        assert!(text.contains("Gas (gas):"));
    }
}

//! ESP-IDF MQTT client behind the `MqttPublisher` contract.

use crate::sink::MqttPublisher;
use embedded_svc::mqtt::client::QoS;
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const ERROR_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Link state shared between the client and its event thread
#[derive(Debug, Default)]
struct BrokerLink {
    url: String,
    connected: AtomicBool,
    closing: AtomicBool,
}

/// Publishing only enqueues; the IDF client task delivers, and the event
/// thread tracks whether the broker is reachable.
pub struct MqttClient {
    client: EspMqttClient<'static>,
    link: Arc<BrokerLink>,
}

impl MqttClient {
    pub fn new(broker_url: &str, client_id: &str, keep_alive: Duration) -> anyhow::Result<Self> {
        log::info!("MQTT: connecting to {} as '{}'", broker_url, client_id);

        let config = MqttClientConfiguration {
            client_id: Some(client_id),
            keep_alive_interval: Some(keep_alive),
            reconnect_timeout: Some(RECONNECT_DELAY),
            ..Default::default()
        };
        let (client, connection) = EspMqttClient::new(broker_url, &config)?;

        let link = Arc::new(BrokerLink {
            url: broker_url.to_string(),
            ..Default::default()
        });
        let events_link = Arc::clone(&link);
        std::thread::Builder::new()
            .stack_size(6144)
            .name("mqtt_events".to_string())
            .spawn(move || watch_events(connection, &events_link))?;

        Ok(Self { client, link })
    }

    pub fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::Relaxed)
    }
}

fn watch_events(mut connection: EspMqttConnection, link: &BrokerLink) {
    let mut last_error_log: Option<Instant> = None;

    while !link.closing.load(Ordering::Relaxed) {
        let event = match connection.next() {
            Ok(event) => event,
            // Queue gone: the client was dropped
            Err(_) => break,
        };
        match event.payload() {
            EventPayload::Connected(_) => {
                log::info!("✅ MQTT: connected to {}", link.url);
                link.connected.store(true, Ordering::Relaxed);
            }
            EventPayload::Disconnected => {
                log::info!("🔌 MQTT: disconnected from {}", link.url);
                link.connected.store(false, Ordering::Relaxed);
            }
            EventPayload::Error(e) => {
                if last_error_log.map_or(true, |at| at.elapsed() >= ERROR_LOG_INTERVAL) {
                    log::warn!("❌ MQTT: {:?}", e);
                    last_error_log = Some(Instant::now());
                }
            }
            _ => {}
        }
    }

    link.connected.store(false, Ordering::Relaxed);
    log::info!("MQTT: event thread for {} stopped", link.url);
}

impl MqttPublisher for MqttClient {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
        if !self.is_connected() {
            anyhow::bail!("not connected to {}", self.link.url);
        }
        self.client.enqueue(topic, QoS::AtMostOnce, false, payload)?;
        Ok(())
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        self.link.closing.store(true, Ordering::Relaxed);
        self.link.connected.store(false, Ordering::Relaxed);
    }
}

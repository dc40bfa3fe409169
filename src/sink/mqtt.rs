use super::SinkError;
use crate::channel::ChannelSpec;

/// Fire-and-forget publish contract of the MQTT client.
///
/// `Ok` means the client accepted the message, not that the broker got it.
pub trait MqttPublisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> anyhow::Result<()>;
}

/// MQTT sink: publishes the scaled reading of a channel to its topic
#[derive(Default)]
pub struct MqttSink {
    publisher: Option<Box<dyn MqttPublisher>>,
    publish_count: u32,
}

impl MqttSink {
    pub fn new(publisher: Option<Box<dyn MqttPublisher>>) -> Self {
        Self {
            publisher,
            publish_count: 0,
        }
    }

    pub fn attach(&mut self, publisher: Box<dyn MqttPublisher>) {
        self.publisher = Some(publisher);
    }

    pub fn detach(&mut self) {
        self.publisher = None;
    }

    pub fn is_attached(&self) -> bool {
        self.publisher.is_some()
    }

    pub fn publish_count(&self) -> u32 {
        self.publish_count
    }

    pub fn push(&mut self, topic: &str, spec: &ChannelSpec, count: u32) -> Result<(), SinkError> {
        let publisher = self
            .publisher
            .as_mut()
            .ok_or_else(|| SinkError::Publish("no MQTT client".to_string()))?;

        let payload = spec.format_value(count);
        publisher
            .publish(topic, payload.as_bytes())
            .map_err(|e| SinkError::Publish(e.to_string()))?;

        self.publish_count = self.publish_count.wrapping_add(1);
        log::debug!("Push: MQTT '{}' <- {}", topic, payload);
        Ok(())
    }
}

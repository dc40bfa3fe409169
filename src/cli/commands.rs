use super::{CliCommand, CliError};
use crate::controller::Controller;
use crate::persistence::{CommitOutcome, Storage};
use std::time::Instant;

pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct CommandHandler {
    start_time: Instant,
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHandler {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Run one command against the controller and return the text to print.
    ///
    /// Rejected arguments come back as an "Error: ..." response, the
    /// controller is left untouched in that case.
    pub fn execute_command<S: Storage>(
        &mut self,
        command: CliCommand,
        controller: &mut Controller<S>,
    ) -> Result<String, CliError> {
        let mut response = String::new();

        match command {
            CliCommand::Empty => {
                // Empty command - just return empty response (no error)
            }
            CliCommand::Help => {
                // Help is handled in terminal.rs
                response.push_str("Help displayed");
            }
            CliCommand::Version => {
                log::info!("CLI: Version requested");
                response.push_str(&format!("ESP32 Pulse Meter v{}\r\n", FIRMWARE_VERSION));
                response.push_str("Built with ESP-IDF");
            }
            CliCommand::Status => {
                log::info!("CLI: Status requested");
                response.push_str(&controller.status().to_string());
            }
            CliCommand::Uptime => {
                log::info!("CLI: Uptime requested");
                let uptime_secs = self.start_time.elapsed().as_secs();
                let hours = uptime_secs / 3600;
                let minutes = (uptime_secs % 3600) / 60;
                let seconds = uptime_secs % 60;

                response.push_str("Uptime: ");
                if hours > 0 {
                    response.push_str(&format!("{}h ", hours));
                }
                if minutes > 0 || hours > 0 {
                    response.push_str(&format!("{}m ", minutes));
                }
                response.push_str(&format!("{}s", seconds));
            }
            CliCommand::Clear => {
                // Clear is handled in terminal.rs
                response.push_str("Screen cleared");
            }
            CliCommand::Reset => {
                log::info!("CLI: Reset requested");
                // Counters since the last periodic commit would be lost otherwise
                if let Err(e) = controller.commit_now() {
                    response.push_str(&format!("Warning: final commit failed: {}\r\n", e));
                }
                // The restart itself is issued by the main loop after printing
                response.push_str("Resetting system...");
            }
            CliCommand::CounterSet(channel, value) => {
                log::info!("CLI: Counter override requested for {}", channel);
                match controller.override_counter(channel, value) {
                    Ok(()) => response.push_str(&format!(
                        "{} counter set to {} ({} {})",
                        channel,
                        value,
                        controller.channel(channel).spec.format_value(value),
                        controller.channel(channel).spec.unit
                    )),
                    Err(e) => response.push_str(&format!("Error: {}", e)),
                }
            }
            CliCommand::HttpHost(host) => match controller.set_endpoint_host(&host) {
                Ok(()) => response.push_str(&format!("HTTP host set to '{}'", host)),
                Err(e) => response.push_str(&format!("Error: {}", e)),
            },
            CliCommand::HttpPath(channel, path) => {
                match controller.set_endpoint_path(channel, &path) {
                    Ok(()) => response.push_str(&format!("{} HTTP path set to '{}'", channel, path)),
                    Err(e) => response.push_str(&format!("Error: {}", e)),
                }
            }
            CliCommand::MqttHost(host, port) => match controller.set_mqtt_broker(&host, port) {
                Ok(()) => response.push_str(&format!(
                    "MQTT broker set to {}",
                    controller.sinks().mqtt_broker_url().unwrap_or_default()
                )),
                Err(e) => response.push_str(&format!("Error: {}", e)),
            },
            CliCommand::MqttTopic(channel, topic) => {
                match controller.set_mqtt_topic(channel, &topic) {
                    Ok(()) => {
                        response.push_str(&format!("{} MQTT topic set to '{}'", channel, topic))
                    }
                    Err(e) => response.push_str(&format!("Error: {}", e)),
                }
            }
            CliCommand::Push(channel) => {
                controller.request_push(channel);
                match channel {
                    Some(channel) => response.push_str(&format!("Push of {} scheduled", channel)),
                    None => response.push_str("Push of all channels scheduled"),
                }
            }
            CliCommand::Commit => match controller.commit_now() {
                Ok(CommitOutcome::Written { bytes, duration }) => response.push_str(&format!(
                    "Committed {} bytes in {} ms",
                    bytes,
                    duration.as_millis()
                )),
                Ok(CommitOutcome::Unchanged) => {
                    response.push_str("Stored state already up to date")
                }
                Err(e) => response.push_str(&format!("Error: {}", e)),
            },
            CliCommand::Unknown(cmd) => {
                log::warn!("CLI: Unknown command: {}", cmd);
                response.push_str(&format!("Unknown command: {}", cmd));
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelId;
    use crate::cli::CommandParser;
    use crate::config::DeviceConfig;
    use crate::persistence::MemStorage;
    use crate::sink::{HttpTransport, SinkError};
    use std::time::Duration;

    struct Offline;

    impl HttpTransport for Offline {
        fn exchange(&mut self, _: &str, _: &[u8], _: Duration) -> Result<String, SinkError> {
            Err(SinkError::Connect("offline".into()))
        }
    }

    fn run(handler: &mut CommandHandler, controller: &mut Controller<MemStorage>, line: &str) -> String {
        handler
            .execute_command(CommandParser::parse_command(line), controller)
            .unwrap()
    }

    #[test]
    fn counter_set_rejects_zero() {
        let mut controller =
            Controller::new(DeviceConfig::default(), MemStorage::new(), Box::new(Offline), 0);
        let mut handler = CommandHandler::new();

        let reply = run(&mut handler, &mut controller, "counter_set water 0");
        assert_eq!(reply, "Error: Invalid value");
        assert_eq!(controller.channel(ChannelId::Water).count(), 0);

        let reply = run(&mut handler, &mut controller, "counter_set water 2500");
        assert_eq!(reply, "water counter set to 2500 (2.500 m³)");
        assert_eq!(controller.channel(ChannelId::Water).count(), 2500);
    }

    #[test]
    fn invalid_endpoint_leaves_config() {
        let mut controller =
            Controller::new(DeviceConfig::default(), MemStorage::new(), Box::new(Offline), 0);
        let mut handler = CommandHandler::new();

        let reply = run(&mut handler, &mut controller, "http_path gas data.json");
        assert!(reply.starts_with("Error: Invalid path"));
        assert!(controller.sinks().endpoint_paths[1].is_empty());
        assert!(!controller.needs_commit());

        run(&mut handler, &mut controller, "http_host vz.local");
        assert_eq!(controller.sinks().endpoint_host.as_str(), "vz.local");
        assert!(controller.needs_commit());
    }

    #[test]
    fn commit_reports_suppressed_write() {
        let storage = MemStorage::new();
        let mut controller =
            Controller::new(DeviceConfig::default(), storage.clone(), Box::new(Offline), 0);
        let mut handler = CommandHandler::new();

        assert!(run(&mut handler, &mut controller, "commit").starts_with("Committed"));
        assert_eq!(
            run(&mut handler, &mut controller, "commit"),
            "Stored state already up to date"
        );
        assert_eq!(storage.write_count(), 1);
    }
}

use super::CliCommand;
use crate::channel::ChannelId;

pub struct CommandParser;

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandParser {
    pub fn new() -> Self {
        Self
    }

    pub fn get_available_commands() -> &'static [&'static str] {
        &[
            "help",
            "version",
            "status",
            "uptime",
            "clear",
            "reset",
            "counter_set",
            "http_host",
            "http_path",
            "mqtt_host",
            "mqtt_topic",
            "push",
            "commit",
        ]
    }

    pub fn autocomplete(partial: &str) -> Vec<&'static str> {
        let commands = Self::get_available_commands();
        commands
            .iter()
            .filter(|&&cmd| cmd.starts_with(partial))
            .copied()
            .collect()
    }

    fn channel_arg(cmd: &str, arg: Option<&str>) -> Result<ChannelId, CliCommand> {
        match arg {
            Some(name) => name.parse().map_err(|_| {
                CliCommand::Unknown(format!("{}: unknown channel '{}' (water|gas)", cmd, name))
            }),
            None => Err(CliCommand::Unknown(format!("{}: channel required (water|gas)", cmd))),
        }
    }

    pub fn parse_command(input: &str) -> CliCommand {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return CliCommand::Empty;
        }

        let mut parts = trimmed.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => CliCommand::Help,
            "version" => CliCommand::Version,
            "status" => CliCommand::Status,
            "uptime" => CliCommand::Uptime,
            "clear" => CliCommand::Clear,
            "reset" => CliCommand::Reset,
            "commit" => CliCommand::Commit,
            "counter_set" => {
                let channel = match Self::channel_arg(cmd, parts.next()) {
                    Ok(channel) => channel,
                    Err(unknown) => return unknown,
                };
                match parts.next().map(str::parse::<u32>) {
                    Some(Ok(value)) => CliCommand::CounterSet(channel, value),
                    Some(Err(_)) => CliCommand::Unknown("counter_set: invalid value".to_string()),
                    None => CliCommand::Unknown("counter_set: value required".to_string()),
                }
            }
            "http_host" => match parts.next() {
                Some(host) => CliCommand::HttpHost(host.to_string()),
                None => CliCommand::Unknown("http_host: host required".to_string()),
            },
            "http_path" => {
                let channel = match Self::channel_arg(cmd, parts.next()) {
                    Ok(channel) => channel,
                    Err(unknown) => return unknown,
                };
                match parts.next() {
                    Some(path) => CliCommand::HttpPath(channel, path.to_string()),
                    None => CliCommand::Unknown("http_path: path required".to_string()),
                }
            }
            "mqtt_host" => {
                let Some(host) = parts.next() else {
                    return CliCommand::Unknown("mqtt_host: host required".to_string());
                };
                match parts.next().map(str::parse::<u16>) {
                    None => CliCommand::MqttHost(host.to_string(), None),
                    Some(Ok(port)) if port > 0 => CliCommand::MqttHost(host.to_string(), Some(port)),
                    Some(_) => CliCommand::Unknown("mqtt_host: port must be 1-65535".to_string()),
                }
            }
            "mqtt_topic" => {
                let channel = match Self::channel_arg(cmd, parts.next()) {
                    Ok(channel) => channel,
                    Err(unknown) => return unknown,
                };
                match parts.next() {
                    Some(topic) => CliCommand::MqttTopic(channel, topic.to_string()),
                    None => CliCommand::Unknown("mqtt_topic: topic required".to_string()),
                }
            }
            "push" => match parts.next() {
                None => CliCommand::Push(None),
                Some(name) => match name.parse() {
                    Ok(channel) => CliCommand::Push(Some(channel)),
                    Err(_) => CliCommand::Unknown(format!("push: unknown channel '{}'", name)),
                },
            },
            _ => CliCommand::Unknown(cmd.to_string()),
        }
    }
}

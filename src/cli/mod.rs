pub mod commands;
pub mod parser;
pub mod terminal;

pub use commands::CommandHandler;
pub use parser::CommandParser;
pub use terminal::{SerialPort, Terminal};

use crate::channel::ChannelId;

// CLI-related types and constants
pub const CLI_BUFFER_SIZE: usize = 128;
pub const MAX_HISTORY_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Help,
    Version,
    Status,
    Uptime,
    Clear,
    Reset,
    CounterSet(ChannelId, u32),
    HttpHost(String),
    HttpPath(ChannelId, String),
    MqttHost(String, Option<u16>), // host, port (None = keep current)
    MqttTopic(ChannelId, String),
    Push(Option<ChannelId>), // None = all channels
    Commit,
    Empty,
    Unknown(String),
}

#[derive(Debug)]
pub enum CliError {
    UartError,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CliError::UartError => write!(f, "UART error"),
        }
    }
}

impl std::error::Error for CliError {}

//! Outbound forwarding of channel readings.
//!
//! Both sinks are best effort. A failed push changes nothing and is retried on
//! the next value change or the next heartbeat of that sink.

pub mod http;
pub mod mqtt;

pub use http::{build_request, parse_status_code, HttpSink, HttpTransport, TcpTransport};
pub use mqtt::{MqttPublisher, MqttSink};

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Http,
    Mqtt,
}

impl SinkKind {
    pub const ALL: [SinkKind; 2] = [SinkKind::Http, SinkKind::Mqtt];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SinkKind::Http => f.write_str("http"),
            SinkKind::Mqtt => f.write_str("mqtt"),
        }
    }
}

/// Soft push failures. None of them is fatal, all are only logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    Connect(String),
    Timeout,
    Io(String),
    MalformedStatus,
    Status(u16),
    Publish(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SinkError::Connect(e) => write!(f, "connect failed: {}", e),
            SinkError::Timeout => write!(f, "timed out waiting for response"),
            SinkError::Io(e) => write!(f, "I/O error: {}", e),
            SinkError::MalformedStatus => write!(f, "malformed status line"),
            SinkError::Status(code) => write!(f, "HTTP status {}", code),
            SinkError::Publish(e) => write!(f, "publish rejected: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

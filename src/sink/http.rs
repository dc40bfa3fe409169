use super::SinkError;
use crate::channel::ChannelSpec;
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

const STATUS_PREFIX: &str = "HTTP/1.";
const STATUS_CODE_OFFSET: usize = 9;
// Only the status line is read; a peer that never sends a newline is cut off
const MAX_STATUS_LINE: u64 = 256;

/// Request/response contract of the HTTP transport.
///
/// `exchange` sends a complete request to `host` and returns the first line
/// of the response, waiting at most `timeout` for it.
pub trait HttpTransport {
    fn exchange(&mut self, host: &str, request: &[u8], timeout: Duration)
        -> Result<String, SinkError>;
}

/// Plain TCP transport over std networking (host and ESP-IDF lwIP alike)
pub struct TcpTransport {
    port: u16,
}

impl TcpTransport {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl HttpTransport for TcpTransport {
    fn exchange(
        &mut self,
        host: &str,
        request: &[u8],
        timeout: Duration,
    ) -> Result<String, SinkError> {
        let addr = (host, self.port)
            .to_socket_addrs()
            .map_err(|e| SinkError::Connect(e.to_string()))?
            .next()
            .ok_or_else(|| SinkError::Connect(format!("no address for {}", host)))?;

        let mut stream = TcpStream::connect_timeout(&addr, timeout).map_err(|e| match e.kind() {
            ErrorKind::TimedOut => SinkError::Timeout,
            _ => SinkError::Connect(e.to_string()),
        })?;
        stream
            .set_read_timeout(Some(timeout))
            .and_then(|_| stream.set_write_timeout(Some(timeout)))
            .map_err(|e| SinkError::Io(e.to_string()))?;

        stream
            .write_all(request)
            .map_err(|e| SinkError::Io(e.to_string()))?;

        let mut reader = BufReader::new(stream.take(MAX_STATUS_LINE));
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => Err(SinkError::MalformedStatus),
            Ok(_) => Ok(line),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Err(SinkError::Timeout)
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => Err(SinkError::MalformedStatus),
            Err(e) => Err(SinkError::Io(e.to_string())),
        }
    }
}

pub fn build_request(host: &str, path: &str, value: &str) -> String {
    format!(
        "GET {}?operation=add&value={} HTTP/1.1\r\n\
         Host: {}\r\n\
         Content-Type: application/json\r\n\
         Connection: keep-alive\r\n\
         Accept: */*\r\n\
         \r\n",
        path, value, host
    )
}

/// Status code of an `HTTP/1.x NNN ...` line, read from byte 9 onwards
pub fn parse_status_code(line: &str) -> Result<u16, SinkError> {
    if !line.starts_with(STATUS_PREFIX) {
        return Err(SinkError::MalformedStatus);
    }
    let digits: String = line
        .get(STATUS_CODE_OFFSET..)
        .ok_or(SinkError::MalformedStatus)?
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().map_err(|_| SinkError::MalformedStatus)
}

/// HTTP accumulation sink.
///
/// Always reports `max(sent_watermark, count)` so the endpoint never sees a
/// lower reading than one it already acknowledged.
pub struct HttpSink {
    transport: Box<dyn HttpTransport>,
    timeout: Duration,
}

impl HttpSink {
    pub fn new(transport: Box<dyn HttpTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Push one reading. On a 200 the watermark advances to the value sent,
    /// which is returned; any other outcome leaves it untouched.
    pub fn push(
        &mut self,
        host: &str,
        path: &str,
        spec: &ChannelSpec,
        sent_watermark: &mut u32,
        count: u32,
    ) -> Result<u32, SinkError> {
        let value = (*sent_watermark).max(count);
        let rendered = spec.format_value(value);
        let request = build_request(host, path, &rendered);

        log::debug!("Push: GET http://{}{} value={}", host, path, rendered);
        let status_line = self
            .transport
            .exchange(host, request.as_bytes(), self.timeout)?;

        match parse_status_code(&status_line)? {
            200 => {
                *sent_watermark = (*sent_watermark).max(value);
                Ok(value)
            }
            code => Err(SinkError::Status(code)),
        }
    }
}

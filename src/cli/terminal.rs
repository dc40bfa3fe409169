use super::{parser::CommandParser, CliError, CLI_BUFFER_SIZE, MAX_HISTORY_SIZE};

/// Byte-level serial link underneath the terminal
pub trait SerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), CliError>;

    /// Non-blocking read of a single byte
    fn read_byte(&mut self) -> Result<Option<u8>, CliError>;
}

/// UART0 (USB-C) split into its transmit and receive drivers
#[cfg(target_os = "espidf")]
pub struct UartPort<'d> {
    pub uart_tx: esp_idf_hal::uart::UartTxDriver<'d>,
    pub uart_rx: esp_idf_hal::uart::UartRxDriver<'d>,
}

#[cfg(target_os = "espidf")]
impl SerialPort for UartPort<'_> {
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), CliError> {
        self.uart_tx.write(data).map_err(|_| CliError::UartError)?;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, CliError> {
        let mut buf = [0u8; 1];
        match self.uart_rx.read(&mut buf, 0) {
            Ok(1) => Ok(Some(buf[0])),
            Ok(_) => Ok(None),
            Err(_) => Err(CliError::UartError),
        }
    }
}

/// Line editor with history (UP/DOWN) and TAB completion of command names
pub struct Terminal<P: SerialPort> {
    port: P,
    line_buffer: String,
    history: History,
    escape_state: EscapeState,
}

#[derive(Clone, Copy, PartialEq)]
enum EscapeState {
    Normal,
    Escape,
    Csi,
}

/// Bounded list of entered lines with a browsing cursor
#[derive(Debug, Default)]
struct History {
    entries: Vec<String>,
    // None while editing a fresh line
    cursor: Option<usize>,
}

impl History {
    fn record(&mut self, line: &str) {
        self.cursor = None;
        if line.is_empty() || self.entries.last().map(String::as_str) == Some(line) {
            return;
        }
        if self.entries.len() >= MAX_HISTORY_SIZE {
            self.entries.remove(0);
        }
        self.entries.push(line.to_string());
    }

    /// Step back; stays on the oldest entry once reached
    fn older(&mut self) -> Option<&str> {
        let index = match self.cursor {
            None => self.entries.len().checked_sub(1)?,
            Some(i) => i.saturating_sub(1),
        };
        self.cursor = Some(index);
        Some(self.entries[index].as_str())
    }

    /// Step forward; past the newest entry yields the empty fresh line
    fn newer(&mut self) -> Option<&str> {
        let next = self.cursor? + 1;
        if next < self.entries.len() {
            self.cursor = Some(next);
            Some(self.entries[next].as_str())
        } else {
            self.cursor = None;
            Some("")
        }
    }
}

impl<P: SerialPort> Terminal<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            line_buffer: String::new(),
            history: History::default(),
            escape_state: EscapeState::Normal,
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn write_str(&mut self, s: &str) -> Result<(), CliError> {
        self.port.write_bytes(s.as_bytes())
    }

    pub fn write_line(&mut self, s: &str) -> Result<(), CliError> {
        self.write_str(s)?;
        self.write_str("\r\n")
    }

    pub fn print_prompt(&mut self) -> Result<(), CliError> {
        self.write_str("meter> ")
    }

    pub fn read_char(&mut self) -> Result<Option<u8>, CliError> {
        self.port.read_byte()
    }

    /// Feed one received byte; returns the command line once Enter is pressed
    pub fn handle_char(&mut self, ch: u8) -> Result<Option<String>, CliError> {
        match self.escape_state {
            EscapeState::Normal => match ch {
                b'\r' | b'\n' => {
                    self.write_str("\r\n")?;
                    let command = std::mem::take(&mut self.line_buffer);
                    self.history.record(&command);
                    Ok(Some(command))
                }
                b'\x1b' => {
                    self.escape_state = EscapeState::Escape;
                    Ok(None)
                }
                b'\x08' | b'\x7f' => {
                    if self.line_buffer.pop().is_some() {
                        self.write_str("\x08 \x08")?;
                    }
                    Ok(None)
                }
                b'\t' => {
                    self.handle_tab_completion()?;
                    Ok(None)
                }
                0x20..=0x7E => {
                    if self.line_buffer.len() < CLI_BUFFER_SIZE - 1 {
                        self.line_buffer.push(ch as char);
                        self.port.write_bytes(&[ch])?;
                    }
                    Ok(None)
                }
                _ => Ok(None),
            },
            EscapeState::Escape => {
                self.escape_state = if ch == b'[' {
                    EscapeState::Csi
                } else {
                    EscapeState::Normal
                };
                Ok(None)
            }
            EscapeState::Csi => {
                self.escape_state = EscapeState::Normal;
                let recalled = match ch {
                    b'A' => self.history.older().map(str::to_owned),
                    b'B' => self.history.newer().map(str::to_owned),
                    // Cursor movement inside the line is not supported
                    _ => None,
                };
                if let Some(line) = recalled {
                    self.replace_current_line(&line)?;
                }
                Ok(None)
            }
        }
    }

    pub fn clear_screen(&mut self) -> Result<(), CliError> {
        // ANSI escape sequence to clear screen and move cursor to top
        self.write_str("\x1b[2J\x1b[H")
    }

    fn handle_tab_completion(&mut self) -> Result<(), CliError> {
        // Only the command word is completed
        if self.line_buffer.contains(' ') {
            return Ok(());
        }
        let partial = self.line_buffer.clone();
        let matches = CommandParser::autocomplete(&partial);

        match matches.as_slice() {
            [] => {}
            [single] => {
                let rest = &single[partial.len()..];
                self.line_buffer.push_str(rest);
                self.line_buffer.push(' ');
                self.write_str(rest)?;
                self.write_str(" ")?;
            }
            several => {
                self.write_str("\r\n")?;
                self.write_str(&several.join("  "))?;
                self.write_str("\r\n")?;
                self.print_prompt()?;
                self.write_str(&partial)?;
            }
        }
        Ok(())
    }

    pub fn show_help(&mut self) -> Result<(), CliError> {
        self.write_line("Available commands:")?;
        self.write_line("  help        - Show this help")?;
        self.write_line("  version     - Show firmware version")?;
        self.write_line("  status      - Show counters, sinks and storage")?;
        self.write_line("  uptime      - Show system uptime")?;
        self.write_line("  clear       - Clear terminal")?;
        self.write_line("  reset       - Commit counters and reset system")?;
        self.write_line("  counter_set <water|gas> <value> - Replace a counter (value > 0)")?;
        self.write_line("  http_host <host> - Set HTTP accumulation host")?;
        self.write_line("  http_path <water|gas> <path> - Set HTTP path (starts with /)")?;
        self.write_line("  mqtt_host <host> [port] - Set MQTT broker (default port 1883)")?;
        self.write_line("  mqtt_topic <water|gas> <topic> - Set MQTT topic")?;
        self.write_line("  push [water|gas] - Push now (default: all channels)")?;
        self.write_line("  commit      - Write counters to flash now")?;
        self.write_line("")?;
        self.write_line("Use TAB to autocomplete commands")?;
        self.write_line("Use UP/DOWN arrows to navigate command history")?;
        Ok(())
    }

    fn replace_current_line(&mut self, new_line: &str) -> Result<(), CliError> {
        let erase = "\x08 \x08".repeat(self.line_buffer.len());
        self.line_buffer = new_line.to_string();
        self.write_str(&erase)?;
        self.write_str(new_line)
    }
}

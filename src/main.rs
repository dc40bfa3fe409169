#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    inspect::run()
}

#[cfg(target_os = "espidf")]
mod firmware {
    use esp32_pulse_meter::cli::{CliCommand, CommandHandler, CommandParser, Terminal};
    use esp32_pulse_meter::cli::terminal::UartPort;
    use esp32_pulse_meter::{
        ChannelId, Controller, DeviceConfig, FsStorage, MqttClient, PeriodicTimer, PulseInput,
        Storage, TcpTransport, WifiConfig, WifiManager,
    };
    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_hal::gpio::{Input, InputPin, InterruptType, OutputPin, PinDriver, Pull};
    use esp_idf_hal::peripheral::Peripheral;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_hal::uart::{config::Config as UartConfig, UartDriver};
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::sys;
    use std::sync::Arc;
    use std::time::Duration;

    const SPIFFS_BASE: &str = "/spiffs";
    const MQTT_CLIENT_ID: &str = "esp32-pulse-meter";
    const WIFI_CHECK_PERIOD_MS: u64 = 30_000;

    fn now_ms() -> u64 {
        (unsafe { sys::esp_timer_get_time() } / 1000) as u64
    }

    fn mount_spiffs() -> anyhow::Result<()> {
        let conf = sys::esp_vfs_spiffs_conf_t {
            base_path: c"/spiffs".as_ptr(),
            partition_label: core::ptr::null(),
            max_files: 4,
            format_if_mount_failed: true,
        };
        esp_idf_sys::esp!(unsafe { sys::esp_vfs_spiffs_register(&conf) })?;
        log::info!("✅ SPIFFS mounted at {}", SPIFFS_BASE);
        Ok(())
    }

    /// Configure a reed-contact input and route its edges into `input`.
    ///
    /// The HAL masks a pin interrupt after it fires; the handler re-arms it
    /// itself, so a main loop stuck in a push or commit loses no edges.
    fn pulse_pin<T: InputPin + OutputPin>(
        pin: impl Peripheral<P = T> + 'static,
        input: Arc<PulseInput>,
        idle_high: bool,
    ) -> anyhow::Result<PinDriver<'static, T, Input>> {
        let mut driver = PinDriver::input(pin)?;
        driver.set_pull(if idle_high { Pull::Up } else { Pull::Down })?;
        driver.set_interrupt_type(InterruptType::AnyEdge)?;

        let gpio = driver.pin();
        // Safety: the closure only touches atomics and ISR-safe IDF calls
        unsafe {
            driver.subscribe(move || {
                let level = sys::gpio_get_level(gpio) != 0;
                let now = (sys::esp_timer_get_time() / 1000) as u32;
                input.on_interrupt(level, now, || {
                    sys::gpio_intr_enable(gpio);
                });
            })?;
        }
        driver.enable_interrupt()?;
        Ok(driver)
    }

    /// (Re)create the MQTT client for the currently configured broker
    fn connect_mqtt<S: Storage>(controller: &mut Controller<S>) {
        controller.detach_mqtt();
        let Some(url) = controller.sinks().mqtt_broker_url() else {
            log::info!("MQTT: no broker configured");
            return;
        };
        let keep_alive = Duration::from_secs(controller.config().mqtt_keep_alive_secs);
        match MqttClient::new(&url, MQTT_CLIENT_ID, keep_alive) {
            Ok(client) => controller.attach_mqtt(Box::new(client)),
            Err(e) => log::warn!("❌ MQTT: client for {} not created: {:?}", url, e),
        }
    }

    pub fn run() -> anyhow::Result<()> {
        // Initialize ESP-IDF system services
        sys::link_patches();

        // Initialize logging
        esp_idf_svc::log::EspLogger::initialize_default();

        log::info!("ESP32 Water/Gas Pulse Meter");
        log::info!("Initializing...");

        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;

        if let Err(e) = mount_spiffs() {
            log::error!("❌ SPIFFS mount failed, state will not survive a reset: {:?}", e);
        }

        let config = DeviceConfig::default();
        let http_port = config.http_port;
        let idle_high = config.pulse_idle_high;
        let tick_ms = config.tick_ms as u32;

        let mut controller = Controller::new(
            config,
            FsStorage::new(SPIFFS_BASE),
            Box::new(TcpTransport::new(http_port)),
            now_ms(),
        );
        log::info!("✅ State loaded ({:?})", controller.load_source());

        // Pulse inputs go live before the network so no pulse waits on WiFi
        log::info!("Initializing pulse inputs...");
        log::info!("  Water: GPIO4");
        log::info!("  Gas:   GPIO5");
        let _water_pin = pulse_pin(
            peripherals.pins.gpio4,
            controller.input(ChannelId::Water),
            idle_high,
        )?;
        let _gas_pin = pulse_pin(
            peripherals.pins.gpio5,
            controller.input(ChannelId::Gas),
            idle_high,
        )?;
        log::info!("✅ Pulse inputs armed");

        let mut wifi = WifiManager::new(peripherals.modem, sysloop, nvs, &WifiConfig::default())?;
        connect_mqtt(&mut controller);

        // Initialize UART0 for CLI (USB-C connection)
        log::info!("Initializing UART0 for CLI (USB-C)...");
        let uart_config = UartConfig::new().baudrate(115200.into());
        let mut uart = UartDriver::new(
            peripherals.uart0,
            peripherals.pins.gpio1, // TX (U0TXD)
            peripherals.pins.gpio3, // RX (U0RXD)
            Option::<esp_idf_hal::gpio::Gpio0>::None,
            Option::<esp_idf_hal::gpio::Gpio0>::None,
            &uart_config,
        )?;
        let (uart_tx, uart_rx) = uart.split();
        log::info!("✅ UART0 initialized (115200 baud)");

        let mut terminal = Terminal::new(UartPort { uart_tx, uart_rx });
        let mut command_handler = CommandHandler::new();

        terminal.write_line("")?;
        terminal.write_line("ESP32 Water/Gas Pulse Meter")?;
        terminal.write_line("Type 'help' for available commands")?;
        terminal.write_line("Use TAB for command autocompletion")?;
        terminal.print_prompt()?;

        let mut wifi_check = PeriodicTimer::new(WIFI_CHECK_PERIOD_MS, now_ms());

        log::info!("Entering main loop...");
        loop {
            let now = now_ms();
            controller.tick(now);

            if controller.take_broker_change() {
                connect_mqtt(&mut controller);
            }

            wifi_check.poll(now);
            if wifi_check.take_due() {
                wifi.ensure_connected();
            }

            // Drain whatever arrived on the UART since the last tick
            while let Ok(Some(ch)) = terminal.read_char() {
                let command_line = match terminal.handle_char(ch) {
                    Ok(Some(line)) => line,
                    Ok(None) => continue,
                    Err(_) => {
                        log::warn!("Terminal input error");
                        let _ = terminal.write_line("Input error");
                        let _ = terminal.print_prompt();
                        continue;
                    }
                };

                let command = CommandParser::parse_command(&command_line);
                let command_clone = command.clone();

                match command_handler.execute_command(command, &mut controller) {
                    Ok(response) => {
                        if !response.is_empty() {
                            let _ = terminal.write_line(&response);
                        }
                    }
                    Err(_) => {
                        log::warn!("CLI command execution error");
                        let _ = terminal.write_line("Command execution error.");
                    }
                }

                // Handle special commands that need terminal interaction
                match command_clone {
                    CliCommand::Help => {
                        let _ = terminal.show_help();
                    }
                    CliCommand::Clear => {
                        let _ = terminal.clear_screen();
                    }
                    CliCommand::Reset => {
                        FreeRtos::delay_ms(100);
                        unsafe { sys::esp_restart() };
                    }
                    _ => {}
                }

                let _ = terminal.print_prompt();
            }

            FreeRtos::delay_ms(tick_ms);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod inspect {
    use esp32_pulse_meter::sink::{HttpTransport, SinkError};
    use esp32_pulse_meter::{Controller, DeviceConfig, FsStorage};
    use std::time::Duration;

    /// The inspection tool never ticks, so it never talks to the endpoint
    struct NoNetwork;

    impl HttpTransport for NoNetwork {
        fn exchange(&mut self, host: &str, _: &[u8], _: Duration) -> Result<String, SinkError> {
            Err(SinkError::Connect(format!("offline inspection, {} not contacted", host)))
        }
    }

    /// Load a state directory the way the firmware does at boot and print it.
    ///
    /// Usage: `pulse_meter [STATE_DIR]`. A legacy layout found there is
    /// migrated in place, exactly as on the device.
    pub fn run() -> anyhow::Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        let dir = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());
        log::info!("CLI: inspecting state in '{}'", dir);

        let controller = Controller::new(
            DeviceConfig::default(),
            FsStorage::new(&dir),
            Box::new(NoNetwork),
            0,
        );

        println!("Loaded from: {:?}", controller.load_source());
        println!("Sinks:\n{}", serde_json::to_string_pretty(controller.sinks())?);
        println!("{}", controller.status().to_string().replace("\r\n", "\n"));
        Ok(())
    }
}

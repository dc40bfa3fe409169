use crate::network_config::WifiConfig;
use anyhow::Result;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{info, warn};

/// Station-mode WiFi link carrying both sinks
pub struct WifiManager {
    wifi: Box<BlockingWifi<EspWifi<'static>>>,
}

impl WifiManager {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        config: &WifiConfig,
    ) -> Result<Self> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;

        info!("🌐 WiFi: Configuring for SSID '{}'...", config.ssid);
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: config.ssid.clone(),
            auth_method: AuthMethod::WPA2Personal,
            password: config.password.clone(),
            ..Default::default()
        }))?;
        wifi.start()?;

        let mut manager = Self {
            wifi: Box::new(wifi),
        };
        // Counting must start even without a network; sinks just fail softly
        if let Err(e) = manager.connect() {
            warn!("❌ WiFi: initial connect failed: {:?}", e);
        }
        Ok(manager)
    }

    pub fn connect(&mut self) -> Result<()> {
        self.wifi.connect()?;
        self.wifi.wait_netif_up()?;
        let ip_info = self.wifi.wifi().sta_netif().get_ip_info()?;
        info!("✅ WiFi: Connected, IP address: {}", ip_info.ip);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    /// Reconnect when the link dropped; called from the main loop
    pub fn ensure_connected(&mut self) {
        if !self.is_connected() {
            info!("🔄 WiFi: link down, reconnecting...");
            if let Err(e) = self.connect() {
                warn!("❌ WiFi: reconnect failed: {:?}", e);
            }
        }
    }
}

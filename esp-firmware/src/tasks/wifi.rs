// WiFi Task - Verbindet mit WLAN und managed Connection
use defmt::{Debug2Format, error, info, warn};
use embassy_net::{Runner, Stack};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice};

use esp_core::{NetworkLink, WifiCredentials};

use crate::config::WIFI_RETRY_DELAY_SECS;

/// Zugangsdaten vom Hauptablauf an den Connection Task
pub type CredentialsSignal = Signal<CriticalSectionRawMutex, WifiCredentials>;

/// WLAN-Verbindung aus Sicht des Hauptablaufs
///
/// `begin()` übergibt die Zugangsdaten an `connection_task`, der Status
/// kommt direkt vom embassy-net Stack (Link + DHCP-Adresse).
pub struct WifiLink {
    stack: Stack<'static>,
    credentials: &'static CredentialsSignal,
}

impl WifiLink {
    pub fn new(stack: Stack<'static>, credentials: &'static CredentialsSignal) -> Self {
        Self { stack, credentials }
    }
}

impl NetworkLink for WifiLink {
    fn begin(&mut self, credentials: &WifiCredentials) {
        self.credentials.signal(*credentials);
    }

    fn is_associated(&self) -> bool {
        self.stack.is_link_up() && self.stack.config_v4().is_some()
    }
}

/// WiFi Connection Task
///
/// Managed die WiFi-Verbindung:
/// - Wartet auf Zugangsdaten (`WifiLink::begin`)
/// - Verbindet mit Access Point
/// - Überwacht Verbindung und reconnected bei Bedarf
#[embassy_executor::task]
pub async fn connection_task(
    mut controller: WifiController<'static>,
    credentials: &'static CredentialsSignal,
) {
    info!("WiFi: Starting connection task");
    let credentials = credentials.wait().await;

    loop {
        if matches!(controller.is_started(), Ok(false)) {
            info!("WiFi: Configuring and starting...");

            // Configure WiFi station mode
            let client_config = ModeConfig::Client(
                ClientConfig::default()
                    .with_ssid(credentials.ssid.into())
                    .with_password(credentials.password.into()),
            );

            if let Err(e) = controller.set_config(&client_config) {
                error!("WiFi: Failed to set configuration: {}", Debug2Format(&e));
                Timer::after(Duration::from_secs(WIFI_RETRY_DELAY_SECS)).await;
                continue;
            }

            if let Err(e) = controller.start_async().await {
                error!("WiFi: Failed to start: {}", Debug2Format(&e));
                Timer::after(Duration::from_secs(WIFI_RETRY_DELAY_SECS)).await;
                continue;
            }

            info!("WiFi: Started successfully");
        }

        // Connect to AP
        info!("WiFi: Connecting to '{}'...", credentials.ssid);
        match controller.connect_async().await {
            Ok(_) => {
                info!("WiFi: Connected successfully!");
            }
            Err(e) => {
                error!("WiFi: Connection failed: {}", Debug2Format(&e));
                Timer::after(Duration::from_secs(WIFI_RETRY_DELAY_SECS)).await;
                continue;
            }
        }

        // Wait for disconnect
        controller
            .wait_for_event(esp_radio::wifi::WifiEvent::StaDisconnected)
            .await;
        warn!("WiFi: Disconnected from AP, will retry...");

        Timer::after(Duration::from_secs(2)).await;
    }
}

/// Network Task
///
/// Prozessiert Netzwerk-Pakete für den embassy-net Stack
#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

/// DHCP Monitor Task
///
/// Wartet bis eine IP-Adresse vom DHCP-Server erhalten wurde
/// und loggt dann die Netzwerk-Konfiguration
#[embassy_executor::task]
pub async fn dhcp_task(stack: Stack<'static>) {
    stack.wait_link_up().await;
    info!("WiFi: Link is up, waiting for IP address...");

    stack.wait_config_up().await;
    if let Some(config) = stack.config_v4() {
        info!("WiFi: Got IP address!");
        info!("  IP:      {}", Debug2Format(&config.address.address()));
        info!("  Gateway: {}", Debug2Format(&config.gateway));
        info!("  DNS:     {}", Debug2Format(&config.dns_servers));
    }
}

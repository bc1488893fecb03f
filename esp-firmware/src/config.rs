// Projekt-Konfiguration: Konstanten und Compile-Zeit-Werte aus .env
//
// Es gibt keine Laufzeit-Konfiguration: alles hier wird beim Build eingebacken.

use esp_core::{BrokerProfile, ChannelTopics, LastWill, OtaConfig, WifiCredentials};

/// Topic unterhalb von `<MQTT_ROOT><MQTT_DEVICE>` (zur Compile-Zeit zusammengesetzt)
macro_rules! device_topic {
    ($suffix:literal) => {
        concat!(env!("MQTT_ROOT"), env!("MQTT_DEVICE"), $suffix)
    };
}

// ============================================================================
// Firmware
// ============================================================================

/// Firmware-Version, wird retained auf dem Version-Topic published
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PWM Konfiguration
// ============================================================================
//
// Pin-Zuordnung (siehe main.rs): GPIO4 = Rot, GPIO5 = Grün, GPIO6 = Blau

/// PWM-Frequenz der LEDC-Kanäle in kHz
/// 1 kHz bei 10 Bit Auflösung (Duty 0..=1023)
pub const PWM_FREQUENCY_KHZ: u32 = 1;

// ============================================================================
// WiFi Konfiguration
// ============================================================================

/// WiFi SSID (Netzwerk-Name)
/// Wird zur Build-Zeit aus der Environment Variable WIFI_SSID geladen
/// Setze diese in .env file (siehe .env.example)
pub const WIFI_SSID: &str = env!(
    "WIFI_SSID",
    "WiFi SSID nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

/// WiFi Passwort
/// Wird zur Build-Zeit aus der Environment Variable WIFI_PASSWORD geladen
pub const WIFI_PASSWORD: &str = env!(
    "WIFI_PASSWORD",
    "WiFi Password nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

pub const WIFI_CREDENTIALS: WifiCredentials = WifiCredentials {
    ssid: WIFI_SSID,
    password: WIFI_PASSWORD,
};

/// Wartezeit nach fehlgeschlagenem Connect/Start des WiFi-Controllers
pub const WIFI_RETRY_DELAY_SECS: u64 = 5;

/// Heap-Größe für WiFi (Bytes)
/// WiFi benötigt dynamischen Speicher für Pakete
pub const WIFI_HEAP_SIZE: usize = 65536; // 64 KB

/// Zusätzliche Heap-Größe (Bytes)
pub const EXTRA_HEAP_SIZE: usize = 36864; // 36 KB

/// Anzahl Sockets im embassy-net Stack
/// MQTT (1) + OTA (1) + mDNS (1) + DNS/DHCP
pub const NET_SOCKET_COUNT: usize = 6;

// ============================================================================
// MQTT Konfiguration
// ============================================================================

/// MQTT Broker Hostname oder IP-Adresse
/// Wird zur Build-Zeit aus der Environment Variable MQTT_BROKER geladen
pub const MQTT_BROKER: &str = env!(
    "MQTT_BROKER",
    "MQTT Broker nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

// MQTT_PORT (Standard: 1883) und OTA_PORT (Standard: 8266),
// von build.rs geprüft und als u16-Konstanten erzeugt
include!(concat!(env!("OUT_DIR"), "/ports.rs"));

/// MQTT Client ID (Gerätename, z.B. "MediaLight/")
pub const MQTT_CLIENT_ID: &str = env!("MQTT_DEVICE");

/// Last Will: Broker meldet "Offline" retained, wenn wir verschwinden
pub const MQTT_WILL: LastWill = LastWill {
    topic: device_topic!("LWT"),
    message: "Offline",
    retain: true,
    qos: 0,
};

/// Payload für das Will-Topic nach jedem erfolgreichen Connect
pub const MQTT_ANNOUNCEMENT: &str = "Online";

pub const MQTT_VERSION_TOPIC: &str = device_topic!("version");

/// Eingehende Kanal-Topics (Payload: "0".."100")
pub const MQTT_CHANNEL_TOPICS: ChannelTopics = ChannelTopics {
    red: device_topic!("RED"),
    green: device_topic!("GREEN"),
    blue: device_topic!("BLUE"),
};

pub const BROKER_PROFILE: BrokerProfile = BrokerProfile {
    client_id: MQTT_CLIENT_ID,
    will: MQTT_WILL,
    announcement: MQTT_ANNOUNCEMENT,
    version_topic: MQTT_VERSION_TOPIC,
    version: VERSION,
    channels: MQTT_CHANNEL_TOPICS,
};

/// MQTT Keep-Alive in Sekunden
/// Ping wird nach halber Keep-Alive-Zeit ohne Verkehr gesendet
pub const MQTT_KEEP_ALIVE_SECS: u16 = 15;

/// MQTT Buffer-Größe in Bytes
/// Muss groß genug für MQTT-Pakete sein
pub const MQTT_BUFFER_SIZE: usize = 512;

/// TCP RX/TX Buffer-Größe für die Broker-Verbindung
pub const MQTT_SOCKET_BUFFER_SIZE: usize = 2048;

/// Socket-Timeout für die Broker-Verbindung in Sekunden
pub const MQTT_SOCKET_TIMEOUT_SECS: u64 = 10;

/// DNS Query Timeout in Sekunden
pub const DNS_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// OTA Konfiguration
// ============================================================================

/// OTA Hostname (auch mDNS-Name: <OTA_HOSTNAME>.local)
pub const OTA_HOSTNAME: &str = env!("OTA_HOSTNAME");

/// OTA Passwort
/// Wird zur Build-Zeit aus der Environment Variable OTA_PASSWORD geladen
pub const OTA_PASSWORD: &str = env!(
    "OTA_PASSWORD",
    "OTA Password nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

pub const OTA_CONFIG: OtaConfig = OtaConfig {
    port: OTA_PORT,
    hostname: OTA_HOSTNAME,
    password: OTA_PASSWORD,
};

/// TCP RX/TX Buffer-Größe für den OTA-Listener
pub const OTA_SOCKET_BUFFER_SIZE: usize = 4096;

/// Socket-Timeout: so lange darf der OTA-Client schweigen, dann Abbruch
pub const OTA_READ_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// mDNS-Konfiguration
// ============================================================================

/// mDNS TTL (Time To Live) in Sekunden
/// Gibt an, wie lange andere Geräte die mDNS-Antwort cachen dürfen
pub const MDNS_TTL_SECS: u32 = 120;

/// mDNS Reconnect Delay in Sekunden
pub const MDNS_RECONNECT_DELAY_SECS: u64 = 5;

/// mDNS Port (Standard: 5353)
/// Multicast DNS nutzt Port 5353 laut RFC 6762
pub const MDNS_PORT: u16 = 5353;

/// mDNS IPv4 Multicast-Adresse (224.0.0.251)
pub const MDNS_MULTICAST_ADDR: [u8; 4] = [224, 0, 0, 251];

/// UDP Buffer-Größen für mDNS (TX, RX in Bytes)
pub const MDNS_UDP_BUFFER_SIZE: usize = 512;

/// mDNS Receive/Send Buffer-Größen in Bytes
/// 1500 Bytes = Standard MTU für Ethernet/WiFi
pub const MDNS_PACKET_BUFFER_SIZE: usize = 1500;

//! Core Types für die MediaLight-Steuerung
//!
//! Datenstrukturen ohne Hardware-Dependencies. Alle Werte stammen aus
//! Compile-Zeit-Konstanten, deshalb durchgehend `&'static str`.

use rgb::RGB16;

/// Zuletzt geschriebene Duty-Cycles der drei Kanäle (0..=1023)
pub type ChannelLevels = RGB16;

/// Einer der drei Farbkanäle des RGB-Streifens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChannel {
    Red,
    Green,
    Blue,
}

impl ColorChannel {
    /// Alle Kanäle in Subscribe-Reihenfolge
    pub const ALL: [ColorChannel; 3] = [ColorChannel::Red, ColorChannel::Green, ColorChannel::Blue];

    /// Topic-Suffix unterhalb von `<root><device>`
    pub fn suffix(self) -> &'static str {
        match self {
            ColorChannel::Red => "RED",
            ColorChannel::Green => "GREEN",
            ColorChannel::Blue => "BLUE",
        }
    }
}

/// WLAN-Zugangsdaten (SSID + Pre-Shared Key)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: &'static str,
    pub password: &'static str,
}

/// Last Will and Testament
///
/// Wird beim CONNECT an den Broker übergeben. Der Broker published
/// `message` auf `topic`, wenn die Verbindung ohne DISCONNECT abreißt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastWill {
    pub topic: &'static str,
    pub message: &'static str,
    pub retain: bool,
    pub qos: u8,
}

/// Feste Zuordnung Topic → Farbkanal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelTopics {
    pub red: &'static str,
    pub green: &'static str,
    pub blue: &'static str,
}

impl ChannelTopics {
    /// Topic eines Kanals
    pub fn topic(&self, channel: ColorChannel) -> &'static str {
        match channel {
            ColorChannel::Red => self.red,
            ColorChannel::Green => self.green,
            ColorChannel::Blue => self.blue,
        }
    }

    /// Sucht den Kanal zu einem Topic (exakter String-Vergleich)
    ///
    /// ```
    /// # use esp_core::{ChannelTopics, ColorChannel};
    /// let topics = ChannelTopics { red: "Home/L/RED", green: "Home/L/GREEN", blue: "Home/L/BLUE" };
    /// assert_eq!(topics.channel_for("Home/L/GREEN"), Some(ColorChannel::Green));
    /// assert_eq!(topics.channel_for("Home/L/green"), None);
    /// ```
    pub fn channel_for(&self, topic: &str) -> Option<ColorChannel> {
        ColorChannel::ALL
            .into_iter()
            .find(|channel| self.topic(*channel) == topic)
    }
}

/// Alles, was der Broker über dieses Gerät wissen muss
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerProfile {
    /// Feste MQTT Client ID
    pub client_id: &'static str,
    pub will: LastWill,
    /// Payload für das Will-Topic nach erfolgreichem Connect ("Online")
    pub announcement: &'static str,
    pub version_topic: &'static str,
    pub version: &'static str,
    pub channels: ChannelTopics,
}

/// OTA-Listener Konfiguration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtaConfig {
    pub port: u16,
    pub hostname: &'static str,
    pub password: &'static str,
}

/// Beobachtbarer Zustand der Broker-Verbindung
///
/// Die Codes entsprechen den klassischen Client-State-Codes
/// (negativ = Transportproblem, positiv = CONNACK-Ablehnung).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    ConnectionTimeout,
    ConnectionLost,
    ConnectFailed,
    Disconnected,
    Connected,
    /// Broker hat CONNECT abgelehnt
    Rejected,
}

impl BrokerState {
    /// Numerischer Diagnose-Code für Logs
    pub fn code(self) -> i8 {
        match self {
            BrokerState::ConnectionTimeout => -4,
            BrokerState::ConnectionLost => -3,
            BrokerState::ConnectFailed => -2,
            BrokerState::Disconnected => -1,
            BrokerState::Connected => 0,
            BrokerState::Rejected => 5,
        }
    }
}

// ============================================================================
// defmt::Format Implementations (optional feature)
// ============================================================================

#[cfg(feature = "defmt")]
impl defmt::Format for ColorChannel {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.suffix())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BrokerState {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "rc={}", self.code())
    }
}

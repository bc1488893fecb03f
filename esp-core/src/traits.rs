//! Hardware Abstraction Traits
//!
//! Diese Traits definieren Schnittstellen für Hardware- und Netzwerk-Zugriff
//! ohne konkrete Implementierung.
//!
//! # Implementierungen
//! - **Production:** esp-firmware (LEDC, esp-radio, rust-mqtt, Flash-OTA)
//! - **Testing:** Mocks in esp-tests

use crate::ota::OtaError;
use crate::types::{BrokerState, LastWill, OtaConfig, WifiCredentials};

/// Fehler-Typ für PWM-Operationen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmError {
    WriteFailed,
}

/// Fehler-Typ für Broker-Operationen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// Kein Transport (DNS, TCP, Socket geschlossen)
    Network,
    /// Broker hat CONNECT abgelehnt
    Rejected,
    /// Unerwartetes Paket oder Protokollfehler
    Protocol,
    /// Aktion erfordert eine bestehende Verbindung
    NotConnected,
}

/// Trait für einen PWM-Ausgang (ein Pin pro Farbkanal)
pub trait PwmOutput {
    /// Setzt den Duty-Cycle (0..=1023)
    ///
    /// # Fehlerbehandlung
    /// Gibt `PwmError::WriteFailed` zurück wenn Hardware-Zugriff fehlschlägt
    fn set_duty(&mut self, duty: u16) -> Result<(), PwmError>;
}

/// Wartezeiten (Timer auf dem Target, Aufzeichnung im Test)
#[allow(async_fn_in_trait)]
pub trait Delay {
    async fn delay_ms(&mut self, millis: u64);
}

/// WLAN-Verbindung
pub trait NetworkLink {
    /// Startet die Assoziierung; kehrt sofort zurück
    fn begin(&mut self, credentials: &WifiCredentials);

    /// Assoziiert und mit IP-Adresse versorgt?
    fn is_associated(&self) -> bool;
}

/// Empfänger für eingehende MQTT-Nachrichten
///
/// Wird synchron aus `MessageBroker::service` heraus aufgerufen und darf
/// deshalb nicht blockieren.
pub trait MessageHandler {
    fn on_message(&mut self, topic: &str, payload: &[u8]);
}

/// MQTT-Client (Publish/Subscribe mit Last Will)
#[allow(async_fn_in_trait)]
pub trait MessageBroker {
    fn is_connected(&self) -> bool;

    /// Zustand für Diagnose-Logs
    fn state(&self) -> BrokerState;

    /// Baut Transport + MQTT-Session auf und hinterlegt den Last Will
    async fn connect(&mut self, client_id: &'static str, will: &LastWill)
    -> Result<(), BrokerError>;

    async fn publish(&mut self, topic: &str, payload: &[u8], retain: bool)
    -> Result<(), BrokerError>;

    async fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    /// Verarbeitet anstehenden Verkehr (eingehende Nachrichten, Keep-Alive)
    ///
    /// Kehrt sofort zurück, wenn nichts ansteht.
    async fn service<H: MessageHandler>(&mut self, handler: &mut H) -> Result<(), BrokerError>;
}

/// Lifecycle-Callbacks eines Firmware-Updates (nur Diagnose)
pub trait UpdateObserver {
    fn on_start(&mut self) {}
    fn on_end(&mut self) {}
    fn on_progress(&mut self, _progress: u32, _total: u32) {}
    fn on_error(&mut self, _error: OtaError) {}
}

/// OTA-Dienst, der in jeder Loop-Iteration gepollt wird
#[allow(async_fn_in_trait)]
pub trait UpdateService {
    /// Übernimmt Port, Hostname, Passwort und öffnet den Listener
    fn begin(&mut self, config: &OtaConfig) -> Result<(), OtaError>;

    /// Bedient anstehende Update-Anfragen
    ///
    /// Blockiert für die Dauer einer Übertragung, sonst sofort zurück.
    async fn handle(&mut self);
}

#[cfg(feature = "defmt")]
impl defmt::Format for PwmError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            PwmError::WriteFailed => defmt::write!(fmt, "PWM write failed"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BrokerError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            BrokerError::Network => defmt::write!(fmt, "Network error"),
            BrokerError::Rejected => defmt::write!(fmt, "Connection rejected"),
            BrokerError::Protocol => defmt::write!(fmt, "Protocol error"),
            BrokerError::NotConnected => defmt::write!(fmt, "Not connected"),
        }
    }
}

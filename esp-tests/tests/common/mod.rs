//! Mock-Implementierungen der esp-core Traits
//!
//! Laufen auf dem Host (x86_64), zeichnen alle Aufrufe auf.

#![allow(dead_code)]

use std::collections::VecDeque;

use embedded_io_async::{ErrorKind, ErrorType, Read, Write};
use embedded_storage::nor_flash::{NorFlash, NorFlashErrorKind, ReadNorFlash};

use esp_core::{
    BrokerError, BrokerProfile, BrokerState, ChannelTopics, Delay, LastWill, MessageBroker,
    MessageHandler, NetworkLink, OtaConfig, OtaError, PwmError, PwmOutput, UpdateService,
    WifiCredentials,
};

// ============================================================================
// Fixtures
// ============================================================================

pub const TOPICS: ChannelTopics = ChannelTopics {
    red: "Home/MediaLight/RED",
    green: "Home/MediaLight/GREEN",
    blue: "Home/MediaLight/BLUE",
};

pub const PROFILE: BrokerProfile = BrokerProfile {
    client_id: "MediaLight/",
    will: LastWill {
        topic: "Home/MediaLight/LWT",
        message: "Offline",
        retain: true,
        qos: 0,
    },
    announcement: "Online",
    version_topic: "Home/MediaLight/version",
    version: "0.1",
    channels: TOPICS,
};

pub const CREDENTIALS: WifiCredentials = WifiCredentials {
    ssid: "testnet",
    password: "hunter22",
};

pub const OTA: OtaConfig = OtaConfig {
    port: 8266,
    hostname: "MEDIALIGHT",
    password: "PASSWORD",
};

// ============================================================================
// Mock PWM Output
// ============================================================================

#[derive(Default)]
pub struct MockPwm {
    pub last_duty: Option<u16>,
    pub write_count: usize,
    pub fail_next_write: bool,
}

impl MockPwm {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PwmOutput for MockPwm {
    fn set_duty(&mut self, duty: u16) -> Result<(), PwmError> {
        if self.fail_next_write {
            self.fail_next_write = false;
            return Err(PwmError::WriteFailed);
        }

        self.last_duty = Some(duty);
        self.write_count += 1;
        Ok(())
    }
}

// ============================================================================
// Mock Delay
// ============================================================================

#[derive(Default)]
pub struct MockDelay {
    pub waits: Vec<u64>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wartezeiten ohne die Idle-Pause der Event-Pump
    pub fn waits_except(&self, idle_ms: u64) -> Vec<u64> {
        self.waits.iter().copied().filter(|ms| *ms != idle_ms).collect()
    }
}

impl Delay for MockDelay {
    async fn delay_ms(&mut self, millis: u64) {
        self.waits.push(millis);
    }
}

// ============================================================================
// Mock Network Link
// ============================================================================

/// Assoziiert nach `polls_until_up` Abfragen von `is_associated()`
pub struct MockLink {
    pub begun_with: Option<WifiCredentials>,
    pub polls_until_up: usize,
    polls: core::cell::Cell<usize>,
}

impl MockLink {
    pub fn new(polls_until_up: usize) -> Self {
        Self {
            begun_with: None,
            polls_until_up,
            polls: core::cell::Cell::new(0),
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.get()
    }
}

impl NetworkLink for MockLink {
    fn begin(&mut self, credentials: &WifiCredentials) {
        self.begun_with = Some(*credentials);
    }

    fn is_associated(&self) -> bool {
        let polls = self.polls.get();
        self.polls.set(polls + 1);
        self.begun_with.is_some() && polls >= self.polls_until_up
    }
}

// ============================================================================
// Mock Broker
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Connect(String),
    Publish {
        topic: String,
        payload: String,
        retain: bool,
    },
    Subscribe(String),
}

#[derive(Default)]
pub struct MockBroker {
    pub connected: bool,
    /// Ergebnisse der nächsten connect()-Aufrufe, danach immer Ok
    pub connect_results: VecDeque<Result<(), BrokerError>>,
    pub last_will: Option<LastWill>,
    pub events: Vec<BrokerEvent>,
    /// Nachrichten, die beim nächsten service() zugestellt werden
    pub inbox: VecDeque<(String, Vec<u8>)>,
    /// Nächstes service() meldet Verbindungsabbruch
    pub drop_on_next_service: bool,
    /// Verbindung reißt beim n-ten subscribe() ab (0-basiert, zählt über alle Sessions)
    pub drop_on_subscribe: Option<usize>,
    /// Retained Werte: werden nach dem Abonnieren beim nächsten service() zugestellt
    pub retained: Vec<(String, Vec<u8>)>,
    subscribe_calls: usize,
    pub service_count: usize,
    state: Option<BrokerState>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    pub fn deliver(&mut self, topic: &str, payload: &[u8]) {
        self.inbox.push_back((topic.to_string(), payload.to_vec()));
    }

    pub fn retain(&mut self, topic: &str, payload: &[u8]) {
        self.retained.push((topic.to_string(), payload.to_vec()));
    }

    pub fn connects(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, BrokerEvent::Connect(_)))
            .count()
    }

    pub fn subscriptions(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                BrokerEvent::Subscribe(topic) => Some(topic.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn publishes(&self) -> Vec<(&str, &str, bool)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                BrokerEvent::Publish {
                    topic,
                    payload,
                    retain,
                } => Some((topic.as_str(), payload.as_str(), *retain)),
                _ => None,
            })
            .collect()
    }
}

impl MessageBroker for MockBroker {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn state(&self) -> BrokerState {
        self.state.unwrap_or(if self.connected {
            BrokerState::Connected
        } else {
            BrokerState::Disconnected
        })
    }

    async fn connect(
        &mut self,
        client_id: &'static str,
        will: &LastWill,
    ) -> Result<(), BrokerError> {
        self.events.push(BrokerEvent::Connect(client_id.to_string()));
        self.last_will = Some(*will);

        match self.connect_results.pop_front().unwrap_or(Ok(())) {
            Ok(()) => {
                self.connected = true;
                self.state = Some(BrokerState::Connected);
                Ok(())
            }
            Err(e) => {
                self.state = Some(BrokerState::ConnectFailed);
                Err(e)
            }
        }
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        self.events.push(BrokerEvent::Publish {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            retain,
        });
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }

        let call = self.subscribe_calls;
        self.subscribe_calls += 1;
        if self.drop_on_subscribe == Some(call) {
            self.connected = false;
            self.state = Some(BrokerState::ConnectionLost);
            return Err(BrokerError::Network);
        }

        self.events.push(BrokerEvent::Subscribe(topic.to_string()));
        for (retained_topic, payload) in &self.retained {
            if retained_topic == topic {
                self.inbox.push_back((retained_topic.clone(), payload.clone()));
            }
        }
        Ok(())
    }

    async fn service<H: MessageHandler>(&mut self, handler: &mut H) -> Result<(), BrokerError> {
        self.service_count += 1;
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        if self.drop_on_next_service {
            self.drop_on_next_service = false;
            self.connected = false;
            self.state = Some(BrokerState::ConnectionLost);
            // Nachrichten während des Ausfalls gehen verloren
            self.inbox.clear();
            return Err(BrokerError::Network);
        }

        while let Some((topic, payload)) = self.inbox.pop_front() {
            handler.on_message(&topic, &payload);
        }
        Ok(())
    }
}

// ============================================================================
// Mock Update Service
// ============================================================================

#[derive(Default)]
pub struct MockUpdater {
    pub config: Option<OtaConfig>,
    pub fail_begin: Option<OtaError>,
    pub handle_count: usize,
}

impl MockUpdater {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UpdateService for MockUpdater {
    fn begin(&mut self, config: &OtaConfig) -> Result<(), OtaError> {
        if let Some(error) = self.fail_begin {
            return Err(error);
        }
        self.config = Some(*config);
        Ok(())
    }

    async fn handle(&mut self) {
        self.handle_count += 1;
    }
}

// ============================================================================
// Mock OTA Socket
// ============================================================================

/// Liefert `inbound` in Stücken von höchstens `chunk` Bytes, zeichnet Antworten auf
pub struct MockSocket {
    inbound: Vec<u8>,
    pos: usize,
    pub chunk: usize,
    pub outbound: Vec<u8>,
    /// Lesefehler sobald so viele Bytes gelesen wurden
    pub fail_read_at: Option<usize>,
}

impl MockSocket {
    pub fn new(inbound: &[u8], chunk: usize) -> Self {
        Self {
            inbound: inbound.to_vec(),
            pos: 0,
            chunk,
            outbound: Vec::new(),
            fail_read_at: None,
        }
    }

    /// Kopfzeile + Image als ein Datenstrom
    pub fn with_upload(password: &str, image: &[u8], chunk: usize) -> Self {
        let mut inbound = format!("{} {}\n", password, image.len()).into_bytes();
        inbound.extend_from_slice(image);
        Self::new(&inbound, chunk)
    }

    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn replies(&self) -> String {
        String::from_utf8_lossy(&self.outbound).into_owned()
    }
}

impl ErrorType for MockSocket {
    type Error = ErrorKind;
}

impl Read for MockSocket {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.fail_read_at.is_some_and(|at| self.pos >= at) {
            return Err(ErrorKind::ConnectionReset);
        }
        let n = buf.len().min(self.chunk).min(self.inbound.len() - self.pos);
        buf[..n].copy_from_slice(&self.inbound[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for MockSocket {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// ============================================================================
// Mock NOR Flash
// ============================================================================

/// Verhält sich wie NOR-Flash: Schreiben nur aligned und nur auf gelöschte Bytes
pub struct MockFlash {
    pub data: Vec<u8>,
    pub erases: Vec<(u32, u32)>,
    pub writes: Vec<(u32, usize)>,
    pub fail_erase: bool,
}

impl MockFlash {
    pub const SECTOR: usize = 4096;

    /// Region mit `sectors` * 4 KB, anfangs mit Altdaten (0x00) belegt
    pub fn new(sectors: usize) -> Self {
        Self {
            data: vec![0x00; sectors * Self::SECTOR],
            erases: Vec::new(),
            writes: Vec::new(),
            fail_erase: false,
        }
    }
}

impl embedded_storage::nor_flash::ErrorType for MockFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for MockFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start + bytes.len();
        if end > self.data.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        bytes.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl NorFlash for MockFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = Self::SECTOR;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if self.fail_erase {
            return Err(NorFlashErrorKind::Other);
        }
        let (from, to) = (from as usize, to as usize);
        if from % Self::ERASE_SIZE != 0 || to % Self::ERASE_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        if to > self.data.len() || from > to {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        self.data[from..to].fill(0xFF);
        self.erases.push((from as u32, to as u32));
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        if start % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        let end = start + bytes.len();
        if end > self.data.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        if self.data[start..end].iter().any(|&b| b != 0xFF) {
            return Err(NorFlashErrorKind::Other);
        }
        self.data[start..end].copy_from_slice(bytes);
        self.writes.push((offset, bytes.len()));
        Ok(())
    }
}

// MQTT Broker-Adapter - rust-mqtt RawMqttClient über einen embassy-net TcpSocket
//
// Der Socket und die Paket-Buffer gehören dem Adapter. Für jede Operation
// wird ein kurzlebiger RawMqttClient über geliehene Felder gebaut, dadurch
// bleibt der Adapter ohne selbst-referenzierende Struktur.
//
// Nur CONNECT wartet auf seine Antwort (CONNACK). SUBSCRIBE und PINGREQ
// werden abgeschickt, SUBACK und PINGRESP kommen später in `service()` an,
// zwischen beliebigen PUBLISH-Paketen (z.B. retained Kanalwerten).

use defmt::{Debug2Format, debug, info, warn};
use embassy_net::tcp::{State, TcpSocket};
use embassy_net::{IpAddress, Ipv4Address, Stack, dns::DnsQueryType};
use embassy_time::{Duration, Instant, with_timeout};
use heapless::Vec;

use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::client::raw_client::{Event, RawMqttClient};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::packet::v5::reason_codes::ReasonCode;
use rust_mqtt::utils::rng_generator::CountingRng;

use esp_core::{BrokerError, BrokerState, LastWill, MessageBroker, MessageHandler};

use crate::config::{
    DNS_TIMEOUT_SECS, MQTT_BUFFER_SIZE, MQTT_KEEP_ALIVE_SECS, MQTT_SOCKET_TIMEOUT_SECS,
};

/// Maximale Anzahl MQTTv5-Properties pro Paket
const MAX_PROPERTIES: usize = 5;

/// Topic-Filter pro SUBSCRIBE (einer pro Kanal)
const TOPICS_PER_SUBSCRIBE: usize = 1;

/// Startwert für Paket-IDs
const RNG_SEED: u64 = 20000;

/// Client-Typ einer einzelnen Operation
type Client<'c, 'a> = RawMqttClient<'c, &'c mut TcpSocket<'a>, MAX_PROPERTIES, CountingRng>;

/// MQTT-Client mit Last Will, Reconnect-fähig
pub struct MqttBroker<'a> {
    stack: Stack<'static>,
    host: &'static str,
    port: u16,
    socket: TcpSocket<'a>,
    send_buffer: &'a mut [u8; MQTT_BUFFER_SIZE],
    recv_buffer: &'a mut [u8; MQTT_BUFFER_SIZE],
    client_id: &'static str,
    will: Option<LastWill>,
    connected: bool,
    state: BrokerState,
    /// Letztes gesendetes Paket (Basis für den Ping-Zeitpunkt)
    last_sent: Instant,
    /// Gesendeter PINGREQ ohne PINGRESP
    ping_sent: Option<Instant>,
    rng_seed: u64,
}

impl<'a> MqttBroker<'a> {
    /// Erstellt den Adapter (noch ohne Verbindung)
    ///
    /// # Parameter
    /// - `socket_rx`/`socket_tx`: TCP-Buffer für den Socket
    /// - `send_buffer`/`recv_buffer`: MQTT-Paket-Buffer
    pub fn new(
        stack: Stack<'static>,
        host: &'static str,
        port: u16,
        socket_rx: &'a mut [u8],
        socket_tx: &'a mut [u8],
        send_buffer: &'a mut [u8; MQTT_BUFFER_SIZE],
        recv_buffer: &'a mut [u8; MQTT_BUFFER_SIZE],
    ) -> Self {
        let mut socket = TcpSocket::new(stack, socket_rx, socket_tx);
        socket.set_timeout(Some(Duration::from_secs(MQTT_SOCKET_TIMEOUT_SECS)));

        Self {
            stack,
            host,
            port,
            socket,
            send_buffer,
            recv_buffer,
            client_id: "",
            will: None,
            connected: false,
            state: BrokerState::Disconnected,
            last_sent: Instant::now(),
            ping_sent: None,
            rng_seed: RNG_SEED,
        }
    }

    /// Baut einen Client über Socket und Buffer (lebt nur für eine Operation)
    fn client(&mut self) -> Client<'_, 'a> {
        self.rng_seed = self.rng_seed.wrapping_add(1);

        let mut config =
            ClientConfig::<MAX_PROPERTIES, _>::new(MqttVersion::MQTTv5, CountingRng(self.rng_seed));
        config.add_client_id(self.client_id);
        if let Some(will) = &self.will {
            config.add_will(will.topic, will.message.as_bytes(), will.retain);
        }
        config.keep_alive = MQTT_KEEP_ALIVE_SECS;
        config.max_packet_size = MQTT_BUFFER_SIZE as u32;

        RawMqttClient::new(
            &mut self.socket,
            &mut self.send_buffer[..],
            MQTT_BUFFER_SIZE,
            &mut self.recv_buffer[..],
            MQTT_BUFFER_SIZE,
            config,
        )
    }

    /// Wartet auf das CONNACK zum gerade gesendeten CONNECT
    async fn await_connack(&mut self) -> Result<(), MqttError> {
        loop {
            let result = self
                .client()
                .poll::<TOPICS_PER_SUBSCRIBE>()
                .await
                .map(|event| matches!(event, Event::Connack));
            match result {
                Ok(true) => return Ok(()),
                Ok(false) => continue,
                Err(ReasonCode::NetworkError) => return Err(MqttError::ConnectionFailed),
                Err(code) => return Err(MqttError::Rejected(code)),
            }
        }
    }

    /// Liest genau ein Paket und reicht Nachrichten an den Handler weiter
    async fn receive_one<H: MessageHandler>(&mut self, handler: &mut H) -> Result<(), MqttError> {
        let mut client = self.client();
        let inbound = match client.poll::<TOPICS_PER_SUBSCRIBE>().await {
            Ok(Event::Message(topic, payload)) => {
                handler.on_message(topic, payload);
                Inbound::Handled
            }
            Ok(Event::Pingresp) => Inbound::Pong,
            Ok(Event::Suback(_)) => {
                debug!("MQTT: Subscription acknowledged");
                Inbound::Handled
            }
            Ok(Event::Disconnect(code)) => Inbound::Closed(code),
            Ok(_) => Inbound::Handled,
            Err(code) => Inbound::Failed(code),
        };
        drop(client);

        match inbound {
            Inbound::Handled => Ok(()),
            Inbound::Pong => {
                self.ping_sent = None;
                Ok(())
            }
            Inbound::Closed(code) => Err(MqttError::Disconnected(code)),
            Inbound::Failed(code) if is_fatal(&code) => Err(MqttError::Protocol(code)),
            // Abgelehnte Subscription: Verbindung bleibt, nächster Reconnect abonniert neu
            Inbound::Failed(code) => {
                warn!("MQTT: Broker refused request: {}", Debug2Format(&code));
                Ok(())
            }
        }
    }

    /// Verbindung als verloren markieren und Socket zurücksetzen
    fn drop_connection(&mut self, error: MqttError) -> BrokerError {
        warn!("MQTT: {}", error);
        self.connected = false;
        self.ping_sent = None;
        self.state = error.state();
        self.socket.abort();
        error.into()
    }

    fn sent(&mut self) {
        self.last_sent = Instant::now();
    }
}

/// Ergebnis eines gelesenen Pakets, ohne Borrow auf den Client
enum Inbound {
    Handled,
    Pong,
    Closed(ReasonCode),
    Failed(ReasonCode),
}

/// Fehler, nach denen der Paketstrom nicht mehr lesbar ist
fn is_fatal(code: &ReasonCode) -> bool {
    matches!(
        code,
        ReasonCode::NetworkError
            | ReasonCode::BuffError
            | ReasonCode::ProtocolError
            | ReasonCode::ImplementationSpecificError
    )
}

impl MessageBroker for MqttBroker<'_> {
    fn is_connected(&self) -> bool {
        self.connected && self.socket.state() == State::Established
    }

    fn state(&self) -> BrokerState {
        if self.connected && self.socket.state() != State::Established {
            return BrokerState::ConnectionLost;
        }
        self.state
    }

    async fn connect(
        &mut self,
        client_id: &'static str,
        will: &LastWill,
    ) -> Result<(), BrokerError> {
        self.client_id = client_id;
        self.will = Some(*will);
        self.connected = false;
        self.ping_sent = None;

        // Reste einer alten Verbindung verwerfen
        if self.socket.state() != State::Closed {
            self.socket.abort();
        }

        info!("MQTT: Resolving '{}'...", self.host);
        let broker_ip = match resolve_hostname(self.stack, self.host).await {
            Ok(ip) => ip,
            Err(e) => return Err(self.drop_connection(e)),
        };
        debug!("MQTT: Resolved to {}", Debug2Format(&broker_ip));

        let connect = self.socket.connect((broker_ip, self.port));
        match with_timeout(Duration::from_secs(MQTT_SOCKET_TIMEOUT_SECS), connect).await {
            Ok(Ok(())) => info!("MQTT: TCP connected"),
            Ok(Err(_)) => return Err(self.drop_connection(MqttError::ConnectionFailed)),
            Err(_) => return Err(self.drop_connection(MqttError::ConnectionTimeout)),
        }

        let result = self.client().connect_to_broker().await;
        match result {
            Ok(()) => {}
            Err(ReasonCode::NetworkError) => {
                return Err(self.drop_connection(MqttError::ConnectionFailed));
            }
            Err(code) => return Err(self.drop_connection(MqttError::Protocol(code))),
        }

        let connack = with_timeout(
            Duration::from_secs(MQTT_SOCKET_TIMEOUT_SECS),
            self.await_connack(),
        )
        .await;
        match connack {
            Ok(Ok(())) => {
                self.connected = true;
                self.state = BrokerState::Connected;
                self.sent();
                Ok(())
            }
            Ok(Err(e)) => Err(self.drop_connection(e)),
            Err(_) => Err(self.drop_connection(MqttError::ConnectionTimeout)),
        }
    }

    async fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }

        let result = self
            .client()
            .send_message(topic, payload, QualityOfService::QoS0, retain)
            .await;

        match result {
            Ok(_) => {
                self.sent();
                Ok(())
            }
            Err(code) => Err(self.drop_connection(MqttError::Protocol(code))),
        }
    }

    /// Sendet SUBSCRIBE; das SUBACK wird in `service()` verarbeitet
    async fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }

        let mut topics: Vec<&str, TOPICS_PER_SUBSCRIBE> = Vec::new();
        if topics.push(topic).is_err() {
            return Err(BrokerError::Protocol);
        }

        let result = self.client().subscribe_to_topics(&topics).await;
        match result {
            Ok(_) => {
                self.sent();
                Ok(())
            }
            Err(code) => Err(self.drop_connection(MqttError::Protocol(code))),
        }
    }

    async fn service<H: MessageHandler>(&mut self, handler: &mut H) -> Result<(), BrokerError> {
        if !self.is_connected() {
            if self.connected {
                return Err(self.drop_connection(MqttError::ConnectionLost));
            }
            return Err(BrokerError::NotConnected);
        }

        // Nur lesen wenn Daten anstehen, sonst würde poll() blockieren
        if self.socket.can_recv() {
            if let Err(e) = self.receive_one(handler).await {
                return Err(self.drop_connection(e));
            }
        }

        let keep_alive = Duration::from_secs(u64::from(MQTT_KEEP_ALIVE_SECS));
        if let Some(sent_at) = self.ping_sent {
            // Broker antwortet nicht mehr
            if sent_at.elapsed() >= keep_alive {
                return Err(self.drop_connection(MqttError::KeepAliveTimeout));
            }
        } else if self.last_sent.elapsed() >= keep_alive / 2 {
            debug!("MQTT: Sending keep-alive ping");
            let result = self.client().send_ping().await;
            match result {
                Ok(()) => {
                    self.sent();
                    self.ping_sent = Some(Instant::now());
                }
                Err(code) => return Err(self.drop_connection(MqttError::Protocol(code))),
            }
        }

        Ok(())
    }
}

/// Löst Hostname zu IPv4-Adresse auf
///
/// Nutzt embassy-net DNS-Stack mit konfigurierbarem Timeout.
async fn resolve_hostname(stack: Stack<'static>, hostname: &str) -> Result<Ipv4Address, MqttError> {
    let result = with_timeout(
        Duration::from_secs(DNS_TIMEOUT_SECS),
        stack.dns_query(hostname, DnsQueryType::A),
    )
    .await;

    match result {
        Ok(Ok(addrs)) => {
            for addr in addrs {
                if let IpAddress::Ipv4(ipv4) = addr {
                    return Ok(ipv4);
                }
            }
            Err(MqttError::DnsResolutionFailed)
        }
        Ok(Err(_)) => Err(MqttError::DnsResolutionFailed),
        Err(_) => Err(MqttError::DnsTimeout),
    }
}

/// MQTT Fehler-Typen
///
/// Interne Fehlerursachen, nach außen als `BrokerError` + `BrokerState`.
#[derive(Debug)]
enum MqttError {
    DnsResolutionFailed,
    DnsTimeout,
    ConnectionFailed,
    ConnectionTimeout,
    ConnectionLost,
    KeepAliveTimeout,
    /// Broker hat die Session mit DISCONNECT beendet
    Disconnected(ReasonCode),
    Rejected(ReasonCode),
    Protocol(ReasonCode),
}

impl MqttError {
    fn state(&self) -> BrokerState {
        match self {
            MqttError::DnsResolutionFailed | MqttError::ConnectionFailed => {
                BrokerState::ConnectFailed
            }
            MqttError::DnsTimeout | MqttError::ConnectionTimeout => BrokerState::ConnectionTimeout,
            MqttError::ConnectionLost
            | MqttError::KeepAliveTimeout
            | MqttError::Disconnected(_)
            | MqttError::Protocol(_) => BrokerState::ConnectionLost,
            MqttError::Rejected(_) => BrokerState::Rejected,
        }
    }
}

impl From<MqttError> for BrokerError {
    fn from(error: MqttError) -> Self {
        match error {
            MqttError::Rejected(_) => BrokerError::Rejected,
            MqttError::Protocol(ReasonCode::NetworkError) => BrokerError::Network,
            MqttError::Protocol(_) => BrokerError::Protocol,
            _ => BrokerError::Network,
        }
    }
}

impl defmt::Format for MqttError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            MqttError::DnsResolutionFailed => defmt::write!(fmt, "DNS failed"),
            MqttError::DnsTimeout => defmt::write!(fmt, "DNS timeout"),
            MqttError::ConnectionFailed => defmt::write!(fmt, "Connection failed"),
            MqttError::ConnectionTimeout => defmt::write!(fmt, "Connection timeout"),
            MqttError::ConnectionLost => defmt::write!(fmt, "Connection lost"),
            MqttError::KeepAliveTimeout => defmt::write!(fmt, "No PINGRESP within keep-alive"),
            MqttError::Disconnected(code) => {
                defmt::write!(fmt, "Disconnected by broker: {}", Debug2Format(code))
            }
            MqttError::Rejected(code) => {
                defmt::write!(fmt, "Rejected by broker: {}", Debug2Format(code))
            }
            MqttError::Protocol(code) => defmt::write!(fmt, "Protocol error: {}", Debug2Format(code)),
        }
    }
}

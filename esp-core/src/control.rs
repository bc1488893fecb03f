//! Steuerlogik: Bring-up, Reconnect und Event-Pump
//!
//! Alles generisch über die Traits aus `traits.rs`, damit die
//! Reconnect- und Callback-Logik ohne Hardware getestet werden kann.

use crate::logic::duty_from_payload;
use crate::ota::OtaError;
use crate::traits::{Delay, MessageBroker, MessageHandler, NetworkLink, PwmOutput, UpdateService};
use crate::types::{
    BrokerProfile, ChannelLevels, ChannelTopics, ColorChannel, OtaConfig, WifiCredentials,
};

/// Poll-Intervall beim Warten auf die WLAN-Assoziierung
pub const WIFI_POLL_INTERVAL_MS: u64 = 500;

/// Wartezeit zwischen zwei Broker-Verbindungsversuchen
pub const BROKER_RETRY_DELAY_MS: u64 = 5_000;

/// Pause am Ende jeder Loop-Iteration, damit Netzwerk-Tasks laufen können
pub const PUMP_IDLE_MS: u64 = 10;

/// Message-Callback: schreibt Kanalwerte auf die drei PWM-Ausgänge
///
/// Jede Nachricht überschreibt den Duty-Cycle des zugehörigen Kanals
/// sofort ("last write wins"). Unbekannte Topics werden ignoriert.
pub struct ChannelController<P: PwmOutput> {
    topics: ChannelTopics,
    red: P,
    green: P,
    blue: P,
    levels: ChannelLevels,
}

impl<P: PwmOutput> ChannelController<P> {
    pub fn new(topics: ChannelTopics, red: P, green: P, blue: P) -> Self {
        Self {
            topics,
            red,
            green,
            blue,
            levels: ChannelLevels::default(),
        }
    }

    /// Zuletzt erfolgreich geschriebene Duty-Cycles
    pub fn levels(&self) -> ChannelLevels {
        self.levels
    }

    pub fn output(&self, channel: ColorChannel) -> &P {
        match channel {
            ColorChannel::Red => &self.red,
            ColorChannel::Green => &self.green,
            ColorChannel::Blue => &self.blue,
        }
    }

    fn output_mut(&mut self, channel: ColorChannel) -> &mut P {
        match channel {
            ColorChannel::Red => &mut self.red,
            ColorChannel::Green => &mut self.green,
            ColorChannel::Blue => &mut self.blue,
        }
    }

    fn apply(&mut self, channel: ColorChannel, duty: u16) {
        if self.output_mut(channel).set_duty(duty).is_err() {
            #[cfg(feature = "defmt")]
            defmt::error!("PWM: Failed to write duty {} to {}", duty, channel);
            return;
        }
        match channel {
            ColorChannel::Red => self.levels.r = duty,
            ColorChannel::Green => self.levels.g = duty,
            ColorChannel::Blue => self.levels.b = duty,
        }
    }
}

impl<P: PwmOutput> MessageHandler for ChannelController<P> {
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        let Some(channel) = self.topics.channel_for(topic) else {
            #[cfg(feature = "defmt")]
            defmt::debug!("MQTT: Ignoring message on [{}]", topic);
            return;
        };

        let duty = duty_from_payload(payload);
        #[cfg(feature = "defmt")]
        defmt::debug!("MQTT: Message arrived [{}] {=[u8]:a} -> duty {}", topic, payload, duty);
        self.apply(channel, duty);
    }
}

/// Startet die WLAN-Assoziierung und wartet, bis sie steht
///
/// Kein Timeout, kein Fehlerpfad: ohne Netzwerk gibt es nichts zu tun.
pub async fn bring_up_network<N: NetworkLink, D: Delay>(
    link: &mut N,
    credentials: &WifiCredentials,
    delay: &mut D,
) {
    #[cfg(feature = "defmt")]
    defmt::info!("WiFi: Connecting to '{}'...", credentials.ssid);
    link.begin(credentials);

    while !link.is_associated() {
        delay.delay_ms(WIFI_POLL_INTERVAL_MS).await;
    }

    #[cfg(feature = "defmt")]
    defmt::info!("WiFi: Network ready");
}

/// Übernimmt die OTA-Konfiguration, bevor die Event-Pump startet
pub fn configure_updates<U: UpdateService>(
    service: &mut U,
    config: &OtaConfig,
) -> Result<(), OtaError> {
    service.begin(config)?;

    #[cfg(feature = "defmt")]
    defmt::info!(
        "OTA: Listening on port {} as '{}'",
        config.port,
        config.hostname
    );
    Ok(())
}

/// Verbindet (falls nötig) und erneuert die Subscriptions
///
/// 1. Solange keine Verbindung besteht: Connect mit Client ID + Last Will.
///    Bei Erfolg "Online" und Version (beide retained) publishen, sonst
///    `BROKER_RETRY_DELAY_MS` warten und erneut versuchen, unbegrenzt.
/// 2. Alle drei Kanal-Topics (erneut) abonnieren. Reißt die Verbindung
///    dabei ab, wird abgebrochen.
/// 3. Verbindungsstatus zurückgeben.
///
/// Bei bestehender Verbindung wird nur neu abonniert, nichts angekündigt.
pub async fn reconnect<B: MessageBroker, D: Delay>(
    broker: &mut B,
    profile: &BrokerProfile,
    delay: &mut D,
) -> bool {
    while !broker.is_connected() {
        match broker.connect(profile.client_id, &profile.will).await {
            Ok(()) => {
                #[cfg(feature = "defmt")]
                defmt::info!("MQTT: Connected to broker");
                announce(broker, profile).await;
            }
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "MQTT: Connect failed, {}, try again in {}s",
                    broker.state(),
                    BROKER_RETRY_DELAY_MS / 1000
                );
                delay.delay_ms(BROKER_RETRY_DELAY_MS).await;
            }
        }
    }

    for channel in ColorChannel::ALL {
        let topic = profile.channels.topic(channel);
        match broker.subscribe(topic).await {
            Ok(()) => {
                #[cfg(feature = "defmt")]
                defmt::info!("MQTT: Subscribed to {}", topic);
            }
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("MQTT: Subscribe to {} failed", topic);
                // Verbindung weg: die Event-Pump verbindet neu und abonniert alle Kanäle
                if !broker.is_connected() {
                    break;
                }
            }
        }
    }

    broker.is_connected()
}

/// "Online" und Firmware-Version retained publishen
async fn announce<B: MessageBroker>(broker: &mut B, profile: &BrokerProfile) {
    let announcements = [
        (profile.will.topic, profile.announcement),
        (profile.version_topic, profile.version),
    ];

    for (topic, payload) in announcements {
        if broker
            .publish(topic, payload.as_bytes(), profile.will.retain)
            .await
            .is_err()
        {
            #[cfg(feature = "defmt")]
            defmt::warn!("MQTT: Publish to {} failed", topic);
        }
    }
}

/// Eine Iteration der Event-Pump
///
/// Reconnect falls getrennt, dann MQTT und OTA bedienen.
/// Endet mit `PUMP_IDLE_MS` Pause (der Executor ist kooperativ).
pub async fn pump_once<B, U, H, D>(
    broker: &mut B,
    updates: &mut U,
    handler: &mut H,
    profile: &BrokerProfile,
    delay: &mut D,
) where
    B: MessageBroker,
    U: UpdateService,
    H: MessageHandler,
    D: Delay,
{
    if !broker.is_connected() {
        reconnect(broker, profile, delay).await;
    }

    if broker.service(handler).await.is_err() {
        #[cfg(feature = "defmt")]
        defmt::warn!("MQTT: Connection lost, {}", broker.state());
    }

    updates.handle().await;

    delay.delay_ms(PUMP_IDLE_MS).await;
}

/// Event-Pump: läuft bis Power-Off oder Reset nach OTA
pub async fn run<B, U, H, D>(
    broker: &mut B,
    updates: &mut U,
    handler: &mut H,
    profile: &BrokerProfile,
    delay: &mut D,
) -> !
where
    B: MessageBroker,
    U: UpdateService,
    H: MessageHandler,
    D: Delay,
{
    loop {
        pump_once(broker, updates, handler, profile, delay).await;
    }
}

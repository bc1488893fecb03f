// Keine Standard-Bibliothek verwenden (Embedded System)
#![no_std]
// Kein normaler main() Einstiegspunkt (wird von esp_rtos bereitgestellt)
#![no_main]
// Verbiete mem::forget - gefährlich bei ESP HAL Types mit DMA-Buffern
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
// Verbiete große Stack-Frames (Stack ist auf Embedded Systemen begrenzt)
#![deny(clippy::large_stack_frames)]

// Heap Allocator (WiFi benötigt dynamischen Speicher)
extern crate alloc;

// Embassy Async Runtime
use defmt::{error, info};
use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, StackResources};
use static_cell::StaticCell;

// ESP32-C6 HAL
use esp_bootloader_esp_idf::partitions::PARTITION_TABLE_MAX_LEN;
use esp_hal::clock::CpuClock;
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed, channel, timer};
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_storage::FlashStorage;

// Backtrace bei Panic und println!() Support
use {esp_backtrace as _, esp_println as _};

// Plattformunabhängige Logik
use esp_core::{ChannelController, bring_up_network, configure_updates, reconnect, run};

// Projekt-Module und Konfiguration
use esp_medialight::config::{
    BROKER_PROFILE, EXTRA_HEAP_SIZE, MQTT_BROKER, MQTT_BUFFER_SIZE, MQTT_CHANNEL_TOPICS, MQTT_PORT,
    MQTT_SOCKET_BUFFER_SIZE, NET_SOCKET_COUNT, OTA_CONFIG, OTA_SOCKET_BUFFER_SIZE, VERSION,
    WIFI_CREDENTIALS, WIFI_HEAP_SIZE,
};
use esp_medialight::hal::{EmbassyDelay, LedcPwm, configure_timer};
use esp_medialight::services::{LogObserver, MqttBroker, OtaListener};
use esp_medialight::tasks::{
    CredentialsSignal, WifiLink, connection_task, dhcp_task, mdns_responder_task, net_task,
};

// ESP-IDF App Descriptor - erforderlich für den Bootloader!
// Ohne diesen schlägt das Flashen mit "ESP-IDF App Descriptor missing" fehl
esp_bootloader_esp_idf::esp_app_desc!();

/// Zugangsdaten-Übergabe an den WiFi Connection Task
static WIFI_CREDENTIALS_SIGNAL: CredentialsSignal = CredentialsSignal::new();

/// Main Entry Point
///
/// Initialisiert Hardware und Netzwerk-Tasks, bringt WLAN, OTA und MQTT
/// hoch und läuft danach für immer in der Event-Pump (`esp_core::run`).
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    // ESP32-C6 Konfiguration: CPU auf maximale Taktfrequenz (160 MHz)
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    info!("MediaLight {} booting", VERSION);

    // Heap Allocator initialisieren (WiFi braucht dynamischen Speicher!)
    // Zwei Bereiche: reclaimed RAM (64 KB) + extra (36 KB) = 100 KB total
    esp_alloc::heap_allocator!(
        #[esp_hal::ram(reclaimed)]
        size: WIFI_HEAP_SIZE
    );
    esp_alloc::heap_allocator!(size: EXTRA_HEAP_SIZE);

    // Embassy Runtime initialisieren (Timer + Software Interrupt)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_interrupt =
        esp_hal::interrupt::software::SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_interrupt.software_interrupt0);

    // ------------------------------------------------------------------
    // PWM: ein Timer, drei Kanäle (GPIO4 = Rot, GPIO5 = Grün, GPIO6 = Blau)
    // ------------------------------------------------------------------
    let mut ledc = Ledc::new(peripherals.LEDC);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);

    static PWM_TIMER: StaticCell<timer::Timer<'static, LowSpeed>> = StaticCell::new();
    let pwm_timer: &'static timer::Timer<'static, LowSpeed> = PWM_TIMER.init(
        configure_timer(&ledc, timer::Number::Timer0).expect("Failed to configure PWM timer"),
    );

    let red = LedcPwm::new(
        ledc.channel(channel::Number::Channel0, peripherals.GPIO4),
        pwm_timer,
    )
    .expect("Failed to configure RED channel");
    let green = LedcPwm::new(
        ledc.channel(channel::Number::Channel1, peripherals.GPIO5),
        pwm_timer,
    )
    .expect("Failed to configure GREEN channel");
    let blue = LedcPwm::new(
        ledc.channel(channel::Number::Channel2, peripherals.GPIO6),
        pwm_timer,
    )
    .expect("Failed to configure BLUE channel");

    let mut channels = ChannelController::new(MQTT_CHANNEL_TOPICS, red, green, blue);

    // ------------------------------------------------------------------
    // WiFi + Netzwerk-Stack
    // ------------------------------------------------------------------
    static RADIO_INIT: StaticCell<esp_radio::Controller> = StaticCell::new();
    let radio_init =
        RADIO_INIT.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));

    let (wifi_controller, wifi_interface) =
        esp_radio::wifi::new(radio_init, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi");

    // Random seed für TCP/IP Stack (von Hardware RNG)
    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    // Static resources für embassy-net: MQTT (1) + OTA (1) + mDNS (1) + DNS/DHCP
    static RESOURCES: StaticCell<StackResources<NET_SOCKET_COUNT>> = StaticCell::new();
    let resources = RESOURCES.init(StackResources::new());

    // embassy-net erstellt Stack + Runner (nutzt STA interface für Client-Modus)
    let (stack, runner) = embassy_net::new(
        wifi_interface.sta,
        NetConfig::dhcpv4(Default::default()),
        resources,
        seed,
    );

    spawner
        .spawn(connection_task(wifi_controller, &WIFI_CREDENTIALS_SIGNAL))
        .unwrap();
    spawner.spawn(net_task(runner)).unwrap();
    spawner.spawn(dhcp_task(stack)).unwrap();

    let mut delay = EmbassyDelay;
    let mut link = WifiLink::new(stack, &WIFI_CREDENTIALS_SIGNAL);
    bring_up_network(&mut link, &WIFI_CREDENTIALS, &mut delay).await;

    // mDNS Responder für <OTA_HOSTNAME>.local
    spawner.spawn(mdns_responder_task(stack)).unwrap();

    // ------------------------------------------------------------------
    // OTA Listener
    // ------------------------------------------------------------------
    static OTA_RX: StaticCell<[u8; OTA_SOCKET_BUFFER_SIZE]> = StaticCell::new();
    static OTA_TX: StaticCell<[u8; OTA_SOCKET_BUFFER_SIZE]> = StaticCell::new();
    static OTA_TABLE: StaticCell<[u8; PARTITION_TABLE_MAX_LEN]> = StaticCell::new();

    let mut updates = OtaListener::new(
        stack,
        OTA_RX.init([0; OTA_SOCKET_BUFFER_SIZE]),
        OTA_TX.init([0; OTA_SOCKET_BUFFER_SIZE]),
        FlashStorage::new(peripherals.FLASH),
        OTA_TABLE.init([0; PARTITION_TABLE_MAX_LEN]),
        LogObserver::default(),
    );
    if let Err(e) = configure_updates(&mut updates, &OTA_CONFIG) {
        error!("OTA: Setup failed: {}", e);
    }

    // ------------------------------------------------------------------
    // MQTT
    // ------------------------------------------------------------------
    static MQTT_RX: StaticCell<[u8; MQTT_SOCKET_BUFFER_SIZE]> = StaticCell::new();
    static MQTT_TX: StaticCell<[u8; MQTT_SOCKET_BUFFER_SIZE]> = StaticCell::new();
    static MQTT_SEND: StaticCell<[u8; MQTT_BUFFER_SIZE]> = StaticCell::new();
    static MQTT_RECV: StaticCell<[u8; MQTT_BUFFER_SIZE]> = StaticCell::new();

    let mut broker = MqttBroker::new(
        stack,
        MQTT_BROKER,
        MQTT_PORT,
        MQTT_RX.init([0; MQTT_SOCKET_BUFFER_SIZE]),
        MQTT_TX.init([0; MQTT_SOCKET_BUFFER_SIZE]),
        MQTT_SEND.init([0; MQTT_BUFFER_SIZE]),
        MQTT_RECV.init([0; MQTT_BUFFER_SIZE]),
    );
    reconnect(&mut broker, &BROKER_PROFILE, &mut delay).await;

    // Event-Pump: Reconnect, MQTT und OTA bedienen (kehrt nie zurück)
    run(
        &mut broker,
        &mut updates,
        &mut channels,
        &BROKER_PROFILE,
        &mut delay,
    )
    .await
}

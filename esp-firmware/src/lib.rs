// Library-Root: Hardware-Adapter, Dienste und Tasks der MediaLight-Firmware
// Keine Standard-Bibliothek (Embedded System)
#![no_std]

// Module
pub mod config;
pub mod hal;
pub mod services;
pub mod tasks;

// ============================================================================
// Aufteilung
// ============================================================================
//
// Die testbare Logik (Payload → Duty, Reconnect, Event-Pump) liegt in
// esp-core und wird in esp-tests gegen Mocks getestet. Dieses Crate
// enthält nur die Implementierungen der esp-core Traits:
//
// - hal::LedcPwm          → PwmOutput      (LEDC, 10 Bit)
// - hal::EmbassyDelay     → Delay          (embassy-time)
// - tasks::WifiLink       → NetworkLink    (esp-radio + embassy-net)
// - services::MqttBroker  → MessageBroker  (rust-mqtt über TcpSocket)
// - services::OtaListener → UpdateService  (TCP + esp-bootloader-esp-idf)

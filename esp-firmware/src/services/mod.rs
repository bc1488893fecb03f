// Dienste, die von der Event-Pump in main.rs gepollt werden
//
// Im Gegensatz zu den Tasks laufen diese nicht selbstständig, sondern
// implementieren die esp-core Traits MessageBroker und UpdateService.

pub mod mqtt;
pub mod ota;

pub use mqtt::MqttBroker;
pub use ota::{LogObserver, OtaListener};

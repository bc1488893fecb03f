// Task-Modul: Hintergrund-Tasks des Netzwerk-Stacks
//
// Diese Tasks laufen unabhängig von der Event-Pump in main.rs
// (WiFi-Verbindung, embassy-net Runner, DHCP-Log, mDNS).

pub mod mdns;
pub mod wifi;

// Re-export Tasks für einfachen Import
pub use mdns::mdns_responder_task;
pub use wifi::{CredentialsSignal, WifiLink, connection_task, dhcp_task, net_task};

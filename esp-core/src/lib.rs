//! ESP Core - Platform-agnostic Logic and Traits
//!
//! Diese Crate enthält KEINE Hardware-Dependencies.
//! Sie definiert Traits, Pure Functions und die Event-Pump,
//! die esp-firmware mit echter Hardware und esp-tests mit Mocks betreibt.

#![no_std]

pub mod control;
pub mod logic;
pub mod ota;
pub mod traits;
pub mod types;

// Re-exports für einfachen Zugriff
pub use control::{
    BROKER_RETRY_DELAY_MS, ChannelController, PUMP_IDLE_MS, WIFI_POLL_INTERVAL_MS,
    bring_up_network, configure_updates, pump_once, reconnect, run,
};
pub use logic::{MAX_DUTY, duty_from_payload, parse_level, saturate_duty, scale_to_duty};
pub use ota::{
    ERASE_CHUNK_SIZE, ERASE_YIELD_MS, IMAGE_CHUNK_SIZE, MAX_HEADER_LEN, OtaError, REPLY_OK,
    UpdateProgress, erase_region, parse_update_header, progress_percent, read_header,
    receive_image, send_reply, write_image,
};
pub use traits::{
    BrokerError, Delay, MessageBroker, MessageHandler, NetworkLink, PwmError, PwmOutput,
    UpdateObserver, UpdateService,
};
pub use types::{
    BrokerProfile, BrokerState, ChannelLevels, ChannelTopics, ColorChannel, LastWill, OtaConfig,
    WifiCredentials,
};

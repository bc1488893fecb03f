// Hardware Abstraction Layer (HAL) Module
//
// Implementiert die Traits aus esp-core für die echte Hardware.

pub mod delay;
pub mod pwm;

pub use delay::EmbassyDelay;
pub use pwm::{LedcPwm, configure_timer};

// Wartezeiten über den Embassy-Timer (gibt den Executor frei)

use embassy_time::{Duration, Timer};
use esp_core::Delay;

pub struct EmbassyDelay;

impl Delay for EmbassyDelay {
    async fn delay_ms(&mut self, millis: u64) {
        Timer::after(Duration::from_millis(millis)).await;
    }
}

// LEDC PWM-Ausgang für einen Farbkanal
//
// Ein gemeinsamer Low-Speed-Timer (10 Bit, PWM_FREQUENCY_KHZ) treibt
// drei Kanäle. Der Duty-Cycle wird als Rohwert 0..=1023 geschrieben,
// nicht als Prozent, damit die volle Auflösung erhalten bleibt.

use esp_core::{MAX_DUTY, PwmError, PwmOutput};
use esp_hal::gpio::DriveMode;
use esp_hal::ledc::channel::{self, ChannelHW, ChannelIFace};
use esp_hal::ledc::timer::{self, TimerIFace};
use esp_hal::ledc::{Ledc, LowSpeed};
use esp_hal::time::Rate;

use crate::config::PWM_FREQUENCY_KHZ;

/// Konfiguriert den gemeinsamen PWM-Timer
///
/// Der Timer muss `'static` sein, weil die Kanäle ihn referenzieren.
pub fn configure_timer(
    ledc: &Ledc<'static>,
    number: timer::Number,
) -> Result<timer::Timer<'static, LowSpeed>, PwmError> {
    let mut lstimer = ledc.timer::<LowSpeed>(number);
    lstimer
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty10Bit,
            clock_source: timer::LSClockSource::APBClk,
            frequency: Rate::from_khz(PWM_FREQUENCY_KHZ),
        })
        .map_err(|_| PwmError::WriteFailed)?;
    Ok(lstimer)
}

/// PWM-Ausgang auf einem LEDC-Kanal
pub struct LedcPwm {
    channel: channel::Channel<'static, LowSpeed>,
}

impl LedcPwm {
    /// Bindet den Kanal an den Timer und startet mit Duty 0 (aus)
    pub fn new(
        mut channel: channel::Channel<'static, LowSpeed>,
        lstimer: &'static timer::Timer<'static, LowSpeed>,
    ) -> Result<Self, PwmError> {
        channel
            .configure(channel::config::Config {
                timer: lstimer,
                duty_pct: 0,
                drive_mode: DriveMode::PushPull,
            })
            .map_err(|_| PwmError::WriteFailed)?;
        Ok(Self { channel })
    }
}

impl PwmOutput for LedcPwm {
    fn set_duty(&mut self, duty: u16) -> Result<(), PwmError> {
        if duty > MAX_DUTY {
            return Err(PwmError::WriteFailed);
        }
        self.channel.set_duty_hw(u32::from(duty));
        Ok(())
    }
}

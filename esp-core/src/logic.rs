//! Pure Business Logic Functions
//!
//! Funktionen ohne Hardware-Dependencies (testbar!)

/// Maximaler Duty-Cycle der PWM-Ausgänge (10 Bit)
pub const MAX_DUTY: u16 = 1023;

/// Obergrenze des Eingabebereichs (Prozent)
pub const MAX_LEVEL: i32 = 100;

/// Liest eine Dezimalzahl aus dem rohen Payload
///
/// Jedes Byte wird blind als Ziffer behandelt:
/// `value = value * 10 + (byte - '0')`. Es gibt weder Vorzeichen- noch
/// Zeichenklassen-Prüfung, Fremdzeichen verfälschen den Wert still.
/// Überläufe wrappen wie 32-Bit-Arithmetik auf dem Zielsystem.
/// Bytes ab `0x80` zählen vorzeichenlos (`0xFF` ergibt die Ziffer 207),
/// so wie `char` auf RISC-V und Xtensa ohne Vorzeichen ist.
///
/// ```
/// # use esp_core::parse_level;
/// assert_eq!(parse_level(b"42"), 42);
/// assert_eq!(parse_level(b""), 0);
/// assert_eq!(parse_level(&[0xFF]), 207);
/// ```
pub fn parse_level(payload: &[u8]) -> i32 {
    payload.iter().fold(0i32, |value, &byte| {
        value
            .wrapping_mul(10)
            .wrapping_add(i32::from(byte) - i32::from(b'0'))
    })
}

/// Skaliert 0..=100 auf den Duty-Bereich 0..=1023
///
/// Multiplizieren, dann dividieren: abgeschnitten, nicht gerundet.
///
/// ```
/// # use esp_core::scale_to_duty;
/// assert_eq!(scale_to_duty(50), 511);
/// assert_eq!(scale_to_duty(100), 1023);
/// ```
pub fn scale_to_duty(value: i32) -> i32 {
    value.wrapping_mul(i32::from(MAX_DUTY)) / MAX_LEVEL
}

/// Begrenzt einen berechneten Wert auf das, was der Treiber annimmt
pub fn saturate_duty(value: i32) -> u16 {
    value.clamp(0, i32::from(MAX_DUTY)) as u16
}

/// Payload → Duty-Cycle für den PWM-Ausgang
pub fn duty_from_payload(payload: &[u8]) -> u16 {
    saturate_duty(scale_to_duty(parse_level(payload)))
}

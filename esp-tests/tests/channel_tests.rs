//! Integration Tests für den Message-Callback
//!
//! Diese Tests laufen auf dem Host (x86_64) und nutzen MockPwm

mod common;

use common::{MockPwm, TOPICS};
use esp_core::{
    ChannelController, ChannelLevels, ColorChannel, MAX_DUTY, MessageHandler, PwmError,
    PwmOutput, duty_from_payload,
};

fn controller() -> ChannelController<MockPwm> {
    ChannelController::new(TOPICS, MockPwm::new(), MockPwm::new(), MockPwm::new())
}

// ============================================================================
// Tests: MockPwm
// ============================================================================

#[test]
fn test_mock_pwm_write() {
    let mut mock = MockPwm::new();
    assert_eq!(mock.write_count, 0);
    assert_eq!(mock.last_duty, None);

    mock.set_duty(512).unwrap();

    assert_eq!(mock.write_count, 1);
    assert_eq!(mock.last_duty, Some(512));
}

#[test]
fn test_mock_pwm_fail() {
    let mut mock = MockPwm::new();
    mock.fail_next_write = true;

    assert_eq!(mock.set_duty(10), Err(PwmError::WriteFailed));
    assert_eq!(mock.write_count, 0);

    // Zweiter Versuch klappt wieder
    assert!(mock.set_duty(20).is_ok());
    assert_eq!(mock.last_duty, Some(20));
}

// ============================================================================
// Tests: Skalierung
// ============================================================================

#[test]
fn test_every_percent_maps_to_truncated_duty() {
    for v in 0..=100u32 {
        let payload = v.to_string();
        let expected = (v * 1023 / 100) as u16;
        assert_eq!(duty_from_payload(payload.as_bytes()), expected, "payload {payload}");
    }
}

#[test]
fn test_reference_points() {
    assert_eq!(duty_from_payload(b"0"), 0);
    assert_eq!(duty_from_payload(b"50"), 511);
    assert_eq!(duty_from_payload(b"100"), 1023);
    assert_eq!(duty_from_payload(b""), 0);
}

// ============================================================================
// Tests: Dispatch
// ============================================================================

#[test]
fn test_red_75_sets_red_pin_to_767() {
    let mut lights = controller();

    lights.on_message(TOPICS.red, b"75");

    assert_eq!(lights.output(ColorChannel::Red).last_duty, Some(767));
    assert_eq!(lights.output(ColorChannel::Green).write_count, 0);
    assert_eq!(lights.output(ColorChannel::Blue).write_count, 0);
    assert_eq!(lights.levels(), ChannelLevels { r: 767, g: 0, b: 0 });
}

#[test]
fn test_each_topic_drives_only_its_pin() {
    for channel in ColorChannel::ALL {
        let mut lights = controller();
        lights.on_message(TOPICS.topic(channel), b"40");

        for other in ColorChannel::ALL {
            let writes = lights.output(other).write_count;
            if other == channel {
                assert_eq!(writes, 1);
                assert_eq!(lights.output(other).last_duty, Some(409));
            } else {
                assert_eq!(writes, 0, "{other:?} touched by {channel:?}");
            }
        }
    }
}

#[test]
fn test_unknown_topic_touches_no_pin() {
    let mut lights = controller();

    lights.on_message("Home/MediaLight/WHITE", b"100");
    lights.on_message("Home/MediaLight/red", b"100");
    lights.on_message("Home/MediaLight/RED/", b"100");

    for channel in ColorChannel::ALL {
        assert_eq!(lights.output(channel).write_count, 0);
    }
    assert_eq!(lights.levels(), ChannelLevels::default());
}

#[test]
fn test_last_write_wins() {
    let mut lights = controller();

    lights.on_message(TOPICS.green, b"10");
    lights.on_message(TOPICS.green, b"90");

    let green = lights.output(ColorChannel::Green);
    assert_eq!(green.write_count, 2);
    assert_eq!(green.last_duty, Some(920));
}

#[test]
fn test_malformed_payload_is_written_not_rejected() {
    let mut lights = controller();

    // "7a" → 119 → 1217 → am Treiber auf 1023 begrenzt
    lights.on_message(TOPICS.blue, b"7a");
    assert_eq!(lights.output(ColorChannel::Blue).last_duty, Some(MAX_DUTY));

    // "-5" → negativ → 0
    lights.on_message(TOPICS.blue, b"-5");
    assert_eq!(lights.output(ColorChannel::Blue).last_duty, Some(0));
    assert_eq!(lights.output(ColorChannel::Blue).write_count, 2);
}

#[test]
fn test_failed_write_keeps_previous_level() {
    let mut lights = controller();
    lights.on_message(TOPICS.red, b"20");

    // Fehler injizieren über einen frischen Controller mit vorbereitetem Pin
    let mut red = MockPwm::new();
    red.fail_next_write = true;
    let mut failing = ChannelController::new(TOPICS, red, MockPwm::new(), MockPwm::new());
    failing.on_message(TOPICS.red, b"20");

    assert_eq!(lights.levels().r, 204);
    assert_eq!(failing.levels().r, 0);
    assert_eq!(failing.output(ColorChannel::Red).write_count, 0);
}

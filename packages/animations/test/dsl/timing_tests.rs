//! Timing Parser Tests
//!
//! Timing strings accepted by `animate()`, `stagger()` and `wait()`.

use angular_animations::util::{resolve_timing, AnimateTimings};
use angular_animations::TimingInput;
use pretty_assertions::assert_eq;

fn resolve(value: impl Into<TimingInput>) -> (AnimateTimings, Vec<String>) {
    let mut errors = Vec::new();
    let timings = resolve_timing(&value.into(), &mut errors, false);
    (timings, errors)
}

#[test]
fn should_convert_seconds_to_milliseconds() {
    let (timings, errors) = resolve("1s");
    assert!(errors.is_empty());
    assert_eq!(timings, AnimateTimings::new(1000.0, 0.0, None));
}

#[test]
fn should_parse_duration_delay_and_easing() {
    let (timings, errors) = resolve("100ms 50ms ease-in");
    assert!(errors.is_empty());
    assert_eq!(timings, AnimateTimings::new(100.0, 50.0, Some("ease-in".to_string())));
}

#[test]
fn should_keep_cubic_bezier_easing_intact() {
    let (timings, _) = resolve("0.5s 1s cubic-bezier(0.1, 0.7, 1.0, 0.1)");
    assert_eq!(timings.duration, 500.0);
    assert_eq!(timings.delay, 1000.0);
    assert_eq!(timings.easing.as_deref(), Some("cubic-bezier(0.1, 0.7, 1.0, 0.1)"));
}

#[test]
fn should_treat_numbers_as_milliseconds() {
    let (timings, errors) = resolve(250);
    assert!(errors.is_empty());
    assert_eq!(timings, AnimateTimings::new(250.0, 0.0, None));
}

#[test]
fn should_reject_malformed_timing_strings() {
    let (timings, errors) = resolve("fast");
    assert_eq!(errors, vec!["The provided timing value \"fast\" is invalid.".to_string()]);
    assert_eq!(timings, AnimateTimings::new(0.0, 0.0, None));
}

#[test]
fn should_reject_time_values_without_digits() {
    for value in [".", ".ms", "1s .ms"] {
        let (timings, errors) = resolve(value);
        assert_eq!(errors, vec![format!("The provided timing value \"{}\" is invalid.", value)]);
        assert_eq!(timings, AnimateTimings::new(0.0, 0.0, None));
    }
}

#[test]
fn should_flag_negative_durations_with_a_leading_summary() {
    let (timings, errors) = resolve("-10ms");
    assert_eq!(timings.duration, -10.0);
    assert_eq!(
        errors,
        vec![
            "The provided timing value \"-10ms\" is invalid.".to_string(),
            "Duration values below 0 are not allowed for this animation step.".to_string(),
        ]
    );
}

#[test]
fn should_report_negative_duration_and_delay_separately() {
    let (_, errors) = resolve("-10ms -5ms");
    assert_eq!(errors.len(), 3);
    assert!(errors[2].starts_with("Delay values below 0"));
}

#[test]
fn should_allow_negative_values_when_asked() {
    let mut errors = Vec::new();
    let timings = resolve_timing(&"-100ms".into(), &mut errors, true);
    assert!(errors.is_empty());
    assert_eq!(timings.duration, -100.0);
}

//! Utility Functions
//!
//! Shared constants, timing parsing and `{{ param }}` interpolation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::metadata::{AnimationParams, TimingInput};

pub const ONE_SECOND: f64 = 1000.0;

pub const SUBSTITUTION_EXPR_START: &str = "{{";
pub const SUBSTITUTION_EXPR_END: &str = "}}";

pub const ENTER_CLASSNAME: &str = "ng-enter";
pub const LEAVE_CLASSNAME: &str = "ng-leave";
pub const ENTER_SELECTOR: &str = ".ng-enter";
pub const LEAVE_SELECTOR: &str = ".ng-leave";
pub const NG_TRIGGER_CLASSNAME: &str = "ng-trigger";
pub const NG_TRIGGER_SELECTOR: &str = ".ng-trigger";
pub const NG_ANIMATING_CLASSNAME: &str = "ng-animating";
pub const NG_ANIMATING_SELECTOR: &str = ".ng-animating";

static DASH_CASE_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+([a-z0-9])").unwrap());
static CAMEL_CASE_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z])([A-Z])").unwrap());
static TIME_EXPR_REGEXP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(-?[.\d]+)(m?s)(?:\s+(-?[.\d]+)(m?s))?(?:\s+([-a-z]+(?:\(.+?\))?))?$")
        .unwrap()
});
static TIME_VALUE_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(-?[.\d]+)(m?s)").unwrap());
static PARAM_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*(.+?)\s*\}\}").unwrap());

/// Resolved `{duration, delay, easing}` triple, all times in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimateTimings {
    pub duration: f64,
    pub delay: f64,
    pub easing: Option<String>,
}

impl AnimateTimings {
    pub fn new(duration: f64, delay: f64, easing: Option<String>) -> Self {
        AnimateTimings { duration, delay, easing }
    }
}

/// Convert dash-case to camelCase
pub fn dash_case_to_camel_case(input: &str) -> String {
    DASH_CASE_REGEXP
        .replace_all(input, |caps: &regex::Captures| caps[1].to_uppercase())
        .to_string()
}

/// Convert camelCase to dash-case
pub fn camel_case_to_dash_case(input: &str) -> String {
    CAMEL_CASE_REGEXP
        .replace_all(input, "$1-$2")
        .to_lowercase()
}

fn convert_time_value_to_ms(value: f64, unit: &str) -> f64 {
    if unit.eq_ignore_ascii_case("s") {
        (value * ONE_SECOND).floor()
    } else {
        value.floor()
    }
}

/// Reads a leading time value out of `value` (`"1s"`, `"200ms ease"`).
///
/// Empty values and values still holding `{{ param }}` placeholders resolve
/// to 0. Anything else without a parsable time prefix (`"."`, `".ms"`) is
/// reported as an invalid timing value.
pub fn resolve_timing_value(value: &TimingInput, errors: &mut Vec<String>) -> f64 {
    let expr = match value {
        TimingInput::Millis(ms) => return *ms,
        TimingInput::Expr(expr) => expr.trim(),
    };
    if expr.is_empty() || contains_substitution(expr) {
        return 0.0;
    }
    let amount = TIME_VALUE_REGEXP
        .captures(expr)
        .and_then(|caps| Some((caps[1].parse::<f64>().ok()?, caps[2].to_string())));
    match amount {
        Some((amount, unit)) => convert_time_value_to_ms(amount, &unit),
        None => {
            // options are resolved once per sub context; report each value once
            let message = invalid_timing_value(value);
            if !errors.contains(&message) {
                errors.push(message);
            }
            0.0
        }
    }
}

/// Parses a timing expression such as `"100ms 50ms ease-in"`.
///
/// Invalid strings push `The provided timing value "<v>" is invalid.` and
/// yield zero timings. Unless `allow_negative_values` is set, negative
/// durations and delays each push their own error, preceded by one
/// invalid-value summary.
pub fn resolve_timing(
    exp: &TimingInput,
    errors: &mut Vec<String>,
    allow_negative_values: bool,
) -> AnimateTimings {
    let mut delay = 0.0;
    let mut easing = None;
    let duration = match exp {
        TimingInput::Millis(ms) => *ms,
        TimingInput::Expr(expr) => {
            let Some(caps) = TIME_EXPR_REGEXP.captures(expr.trim()) else {
                errors.push(invalid_timing_value(exp));
                return AnimateTimings::new(0.0, 0.0, None);
            };
            let Ok(amount) = caps[1].parse::<f64>() else {
                errors.push(invalid_timing_value(exp));
                return AnimateTimings::new(0.0, 0.0, None);
            };
            let duration = convert_time_value_to_ms(amount, &caps[2]);
            if let (Some(amount), Some(unit)) = (caps.get(3), caps.get(4)) {
                let Ok(amount) = amount.as_str().parse::<f64>() else {
                    errors.push(invalid_timing_value(exp));
                    return AnimateTimings::new(0.0, 0.0, None);
                };
                delay = convert_time_value_to_ms(amount, unit.as_str());
            }
            easing = caps.get(5).map(|m| m.as_str().to_string());
            duration
        }
    };

    if !allow_negative_values {
        let start_index = errors.len();
        let mut contains_errors = false;
        if duration < 0.0 {
            errors.push("Duration values below 0 are not allowed for this animation step.".to_string());
            contains_errors = true;
        }
        if delay < 0.0 {
            errors.push("Delay values below 0 are not allowed for this animation step.".to_string());
            contains_errors = true;
        }
        if contains_errors {
            errors.insert(start_index, invalid_timing_value(exp));
        }
    }

    AnimateTimings::new(duration, delay, easing)
}

fn invalid_timing_value(exp: &TimingInput) -> String {
    format!("The provided timing value \"{}\" is invalid.", exp)
}

/// Names of every `{{ param }}` placeholder inside `value`.
pub fn extract_style_params(value: &str) -> Vec<String> {
    PARAM_REGEXP
        .captures_iter(value)
        .map(|caps| caps[1].to_string())
        .collect()
}

pub fn contains_substitution(value: &str) -> bool {
    value.contains(SUBSTITUTION_EXPR_START)
}

/// Replaces each `{{ name }}` with its value from `params`; a missing value
/// pushes an error and is substituted with an empty string.
pub fn interpolate_params(value: &str, params: &AnimationParams, errors: &mut Vec<String>) -> String {
    if !contains_substitution(value) {
        return value.to_string();
    }
    PARAM_REGEXP
        .replace_all(value, |caps: &regex::Captures| match params.get(&caps[1]) {
            Some(local) => local.clone(),
            None => {
                errors.push(format!(
                    "Please provide a value for the animation param {}",
                    &caps[1]
                ));
                String::new()
            }
        })
        .to_string()
}

/// `defaults` overridden by whatever the caller supplied.
pub fn apply_param_defaults(user_params: &AnimationParams, defaults: &AnimationParams) -> AnimationParams {
    let mut result = defaults.clone();
    for (key, value) in user_params {
        result.insert(key.clone(), value.clone());
    }
    result
}

/// Rounds a keyframe offset to `decimal_points - 1` decimals.
pub fn round_offset(offset: f64, decimal_points: i32) -> f64 {
    let mult = 10f64.powi(decimal_points - 1);
    (offset * mult).round() / mult
}

//! Animation Style Normalizer
//!
//! Maps user-written style properties and values onto what the platform
//! animates: camelCase property names and unit-suffixed pixel dimensions.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::util::dash_case_to_camel_case;

static NUMBER_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)$").unwrap());
static VALUE_AND_SUFFIX_REGEXP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[\d\.]+([a-z]*)$").unwrap());

pub trait AnimationStyleNormalizer {
    fn normalize_property_name(&self, prop: &str, errors: &mut Vec<String>) -> String;

    fn normalize_style_value(
        &self,
        user_provided_property: &str,
        normalized_property: &str,
        value: &str,
        errors: &mut Vec<String>,
    ) -> String;
}

/// Leaves properties and values untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnimationStyleNormalizer;

impl AnimationStyleNormalizer for NoopAnimationStyleNormalizer {
    fn normalize_property_name(&self, prop: &str, _errors: &mut Vec<String>) -> String {
        prop.to_string()
    }

    fn normalize_style_value(
        &self,
        _user_provided_property: &str,
        _normalized_property: &str,
        value: &str,
        _errors: &mut Vec<String>,
    ) -> String {
        value.to_string()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WebAnimationsStyleNormalizer;

impl AnimationStyleNormalizer for WebAnimationsStyleNormalizer {
    fn normalize_property_name(&self, prop: &str, _errors: &mut Vec<String>) -> String {
        dash_case_to_camel_case(prop)
    }

    fn normalize_style_value(
        &self,
        user_provided_property: &str,
        normalized_property: &str,
        value: &str,
        errors: &mut Vec<String>,
    ) -> String {
        let str_val = value.trim();
        let mut unit = "";

        // a plain decimal number is a pixel count; any other run of digits
        // and dots without a unit cannot be animated
        if is_pixel_dimension_style(normalized_property) && str_val != "0" && !str_val.is_empty() {
            if NUMBER_REGEXP.is_match(str_val) {
                unit = "px";
            } else if let Some(caps) = VALUE_AND_SUFFIX_REGEXP.captures(str_val) {
                if caps.get(1).map_or(true, |m| m.as_str().is_empty()) {
                    errors.push(format!(
                        "Please provide a CSS unit value for {}:{}",
                        user_provided_property, str_val
                    ));
                }
            }
        }

        format!("{}{}", str_val, unit)
    }
}

fn is_pixel_dimension_style(prop: &str) -> bool {
    matches!(
        prop,
        "width"
            | "height"
            | "minWidth"
            | "minHeight"
            | "maxWidth"
            | "maxHeight"
            | "left"
            | "top"
            | "bottom"
            | "right"
            | "fontSize"
            | "outlineWidth"
            | "outlineOffset"
            | "paddingTop"
            | "paddingLeft"
            | "paddingBottom"
            | "paddingRight"
            | "marginTop"
            | "marginLeft"
            | "marginBottom"
            | "marginRight"
            | "borderRadius"
            | "borderWidth"
            | "borderTopWidth"
            | "borderLeftWidth"
            | "borderRightWidth"
            | "borderBottomWidth"
            | "textIndent"
            | "perspective"
    )
}

//! Timeline Instructions
//!
//! The resolved keyframes for one element over one absolute time window.

use serde::{Deserialize, Serialize};

use crate::driver::ElementId;
use crate::style::StyleMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyframe {
    pub offset: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub easing: Option<String>,
    pub styles: StyleMap,
}

impl Keyframe {
    pub fn new(offset: f64, styles: StyleMap) -> Self {
        Keyframe {
            offset,
            easing: None,
            styles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationTimelineInstruction {
    pub element: ElementId,
    pub keyframes: Vec<Keyframe>,
    /// Properties whose value must be read before the animation starts.
    pub pre_style_props: Vec<String>,
    /// Properties resolved to their computed value once the element settles.
    pub post_style_props: Vec<String>,
    pub duration: f64,
    pub delay: f64,
    pub total_time: f64,
    pub easing: Option<String>,
    pub sub_timeline: bool,
    /// Fold the delay into the first keyframe when replayed as a child.
    pub stretch_starting_keyframe: bool,
}

#[allow(clippy::too_many_arguments)]
pub fn create_timeline_instruction(
    element: ElementId,
    keyframes: Vec<Keyframe>,
    pre_style_props: Vec<String>,
    post_style_props: Vec<String>,
    duration: f64,
    delay: f64,
    easing: Option<String>,
    sub_timeline: bool,
) -> AnimationTimelineInstruction {
    AnimationTimelineInstruction {
        element,
        keyframes,
        pre_style_props,
        post_style_props,
        duration,
        delay,
        total_time: duration + delay,
        easing,
        sub_timeline,
        stretch_starting_keyframe: false,
    }
}

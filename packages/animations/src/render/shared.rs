//! Shared Render Helpers
//!
//! Event payloads, listener wiring and keyframe normalization used by both
//! the transition engine and the timeline engine.

use std::rc::Rc;

use serde::Serialize;

use crate::driver::ElementId;
use crate::dsl::timeline_instruction::{AnimationTimelineInstruction, Keyframe};
use crate::error::{AnimationError, Result};
use crate::normalizer::AnimationStyleNormalizer;
use crate::players::{register_callback, AnimationPlayer, PlayerPhase};
use crate::style::{StyleMap, AUTO_STYLE, PRE_STYLE};

/// Payload handed to `listen` callbacks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationEvent {
    pub element: ElementId,
    pub trigger_name: String,
    pub from_state: String,
    pub to_state: String,
    pub phase_name: String,
    pub total_time: f64,
    pub disabled: bool,
}

pub type ListenerCallback = Rc<dyn Fn(&AnimationEvent)>;

/// Decides when a listener runs once its player reaches the phase.
pub type Dispatch = Rc<dyn Fn(Box<dyn FnOnce()>)>;

pub fn make_animation_event(
    element: ElementId,
    trigger_name: &str,
    from_state: &str,
    to_state: &str,
    phase_name: &str,
    total_time: f64,
    disabled: bool,
) -> AnimationEvent {
    AnimationEvent {
        element,
        trigger_name: trigger_name.to_string(),
        from_state: from_state.to_string(),
        to_state: to_state.to_string(),
        phase_name: phase_name.to_string(),
        total_time,
        disabled,
    }
}

fn copy_animation_event(event: &AnimationEvent, phase: PlayerPhase, player: Option<&dyn AnimationPlayer>) -> AnimationEvent {
    let mut copy = event.clone();
    copy.phase_name = phase.as_str().to_string();
    if let Some(player) = player {
        copy.total_time = player.total_time();
        copy.disabled = player.disabled();
    }
    copy
}

/// Calls `callback` with a copy of `event` once `player` reaches `phase`.
/// Total time and the disabled flag are read from the player when it fires.
pub fn listen_on_player(
    player: &Rc<dyn AnimationPlayer>,
    phase: PlayerPhase,
    event: AnimationEvent,
    callback: ListenerCallback,
    dispatch: Dispatch,
) {
    let weak = Rc::downgrade(player);
    register_callback(
        player.as_ref(),
        phase,
        Box::new(move || {
            let source = weak.upgrade();
            let event = copy_animation_event(&event, phase, source.as_deref());
            dispatch(Box::new(move || callback(&event)));
        }),
    );
}

/// Resolves `!`/`*` placeholders against the measured pre/post styles and
/// runs every other value through the normalizer. Keyframes sharing an
/// offset are merged.
pub fn normalize_keyframes(
    normalizer: &dyn AnimationStyleNormalizer,
    keyframes: &[Keyframe],
    pre_styles: Option<&StyleMap>,
    post_styles: Option<&StyleMap>,
) -> Result<Vec<Keyframe>> {
    let mut errors = Vec::new();
    let mut normalized: Vec<Keyframe> = Vec::new();
    let mut previous_offset: Option<f64> = None;

    for kf in keyframes {
        let is_same_offset = previous_offset == Some(kf.offset);
        if !is_same_offset {
            normalized.push(Keyframe {
                offset: kf.offset,
                easing: kf.easing.clone(),
                styles: StyleMap::new(),
            });
        }
        let Some(target) = normalized.last_mut() else {
            continue;
        };
        if kf.easing.is_some() {
            target.easing = kf.easing.clone();
        }
        for (prop, value) in &kf.styles {
            let normalized_prop = normalizer.normalize_property_name(prop, &mut errors);
            let normalized_value = match value.as_str() {
                PRE_STYLE => pre_styles
                    .and_then(|s| s.get(prop))
                    .cloned()
                    .unwrap_or_default(),
                AUTO_STYLE => post_styles
                    .and_then(|s| s.get(prop))
                    .cloned()
                    .unwrap_or_default(),
                _ => normalizer.normalize_style_value(prop, &normalized_prop, value, &mut errors),
            };
            target.styles.insert(normalized_prop, normalized_value);
        }
        previous_offset = Some(kf.offset);
    }

    if !errors.is_empty() {
        return Err(AnimationError::Animate(errors));
    }
    Ok(normalized)
}

/// Problems the normalizer reports for the literal values of `timelines`.
/// `!`/`*` placeholders are resolved later against measured styles and are
/// never reported here.
pub fn keyframe_normalization_errors(
    normalizer: &dyn AnimationStyleNormalizer,
    timelines: &[AnimationTimelineInstruction],
) -> Vec<String> {
    timelines
        .iter()
        .filter_map(|tl| normalize_keyframes(normalizer, &tl.keyframes, None, None).err())
        .flat_map(|err| err.messages())
        .collect()
}

/// Splits `@id:action` into `(id, action)`.
pub fn parse_timeline_command(command: &str) -> Option<(&str, &str)> {
    let body = command.strip_prefix('@').unwrap_or(command);
    body.split_once(':')
}

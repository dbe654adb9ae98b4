#![deny(clippy::all)]

/**
 * Angular Animations Engine
 *
 * Declarative animation metadata is validated into an AST, expanded into
 * per-element keyframe timelines, and played through a pluggable driver
 * while the transition engine coordinates triggers across a live DOM.
 */

pub mod config;
pub mod driver;
pub mod dsl;
pub mod error;
pub mod metadata;
pub mod normalizer;
pub mod players;
pub mod render;
pub mod style;
pub mod testing;
pub mod util;

// Re-exports
pub use config::{AnimationEngineConfig, StyleNormalizerKind};
pub use driver::{AnimationDriver, ElementId};
pub use dsl::animation::Animation;
pub use dsl::timeline_instruction::{AnimationTimelineInstruction, Keyframe};
pub use error::{AnimationError, Result};
pub use metadata::*;
pub use normalizer::{
    AnimationStyleNormalizer, NoopAnimationStyleNormalizer, WebAnimationsStyleNormalizer,
};
pub use players::{AnimationGroupPlayer, AnimationPlayer, NoopAnimationPlayer};
pub use render::engine::{
    AnimationEngine, PropertyValue, RemovalContext, TimelineCommandArg, TriggerValue,
};
pub use render::shared::AnimationEvent;
pub use style::{StyleMap, AUTO_STYLE, PRE_STYLE};

//! Animation Metadata
//!
//! The declarative description a component hands to the engine, plus the
//! builder functions (`trigger`, `state`, `transition`, `animate`, ...)
//! used to write it.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::driver::ElementId;
use crate::style::{StyleEntry, StyleMap};

/// Named `{{ param }}` values.
pub type AnimationParams = IndexMap<String, String>;

/// Custom transition predicate: `(from, to, element, params) -> matches`.
pub type TransitionMatcherFn = Rc<dyn Fn(&str, &str, Option<ElementId>, &AnimationParams) -> bool>;

/// A timing argument: plain milliseconds or an expression such as
/// `"200ms 100ms ease-out"` (which may contain `{{ param }}` references).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TimingInput {
    Millis(f64),
    Expr(String),
}

impl fmt::Display for TimingInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingInput::Millis(ms) if ms.fract() == 0.0 => write!(f, "{}", *ms as i64),
            TimingInput::Millis(ms) => write!(f, "{}", ms),
            TimingInput::Expr(expr) => f.write_str(expr),
        }
    }
}

impl From<f64> for TimingInput {
    fn from(value: f64) -> Self {
        TimingInput::Millis(value)
    }
}

impl From<i32> for TimingInput {
    fn from(value: i32) -> Self {
        TimingInput::Millis(value as f64)
    }
}

impl From<&str> for TimingInput {
    fn from(value: &str) -> Self {
        TimingInput::Expr(value.to_string())
    }
}

impl From<String> for TimingInput {
    fn from(value: String) -> Self {
        TimingInput::Expr(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnimationOptions {
    pub delay: Option<TimingInput>,
    pub params: Option<AnimationParams>,
    /// Only read by `animateChild()`: overrides the child timelines' duration.
    pub duration: Option<TimingInput>,
}

impl AnimationOptions {
    pub fn with_params<K, V, I>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        AnimationOptions {
            params: Some(params.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
            ..Default::default()
        }
    }

    pub fn with_delay(delay: impl Into<TimingInput>) -> Self {
        AnimationOptions {
            delay: Some(delay.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnimationQueryOptions {
    /// Zero matches is not an error.
    pub optional: bool,
    /// Positive keeps the first N matches, negative the last N.
    pub limit: Option<i32>,
    pub delay: Option<TimingInput>,
    pub params: Option<AnimationParams>,
}

impl AnimationQueryOptions {
    pub fn as_options(&self) -> AnimationOptions {
        AnimationOptions {
            delay: self.delay.clone(),
            params: self.params.clone(),
            duration: None,
        }
    }
}

#[derive(Clone)]
pub enum TransitionExpr {
    Str(String),
    Matcher(TransitionMatcherFn),
}

impl fmt::Debug for TransitionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionExpr::Str(expr) => f.debug_tuple("Str").field(expr).finish(),
            TransitionExpr::Matcher(_) => f.write_str("Matcher(<fn>)"),
        }
    }
}

impl From<&str> for TransitionExpr {
    fn from(value: &str) -> Self {
        TransitionExpr::Str(value.to_string())
    }
}

impl From<String> for TransitionExpr {
    fn from(value: String) -> Self {
        TransitionExpr::Str(value)
    }
}

#[derive(Debug, Clone)]
pub enum AnimationMetadata {
    Trigger {
        name: String,
        definitions: Vec<AnimationMetadata>,
        options: Option<AnimationOptions>,
    },
    State {
        name: String,
        styles: Box<AnimationMetadata>,
        options: Option<AnimationOptions>,
    },
    Transition {
        expr: TransitionExpr,
        animation: Box<AnimationMetadata>,
        options: Option<AnimationOptions>,
    },
    Sequence {
        steps: Vec<AnimationMetadata>,
        options: Option<AnimationOptions>,
    },
    Group {
        steps: Vec<AnimationMetadata>,
        options: Option<AnimationOptions>,
    },
    Animate {
        timings: TimingInput,
        styles: Option<Box<AnimationMetadata>>,
    },
    Style {
        styles: Vec<StyleEntry>,
        offset: Option<f64>,
    },
    Keyframes {
        steps: Vec<AnimationMetadata>,
    },
    Reference {
        animation: Box<AnimationMetadata>,
        options: Option<AnimationOptions>,
    },
    AnimateChild {
        animation: Option<Box<AnimationMetadata>>,
        options: Option<AnimationOptions>,
    },
    AnimateRef {
        animation: Box<AnimationMetadata>,
        options: Option<AnimationOptions>,
    },
    Query {
        selector: String,
        animation: Box<AnimationMetadata>,
        options: Option<AnimationQueryOptions>,
    },
    Stagger {
        timings: TimingInput,
        animation: Box<AnimationMetadata>,
    },
    Wait {
        timings: TimingInput,
    },
}

impl AnimationMetadata {
    /// Attaches `options` to the nodes that carry them; others are returned as is.
    pub fn with_options(mut self, new_options: AnimationOptions) -> Self {
        match &mut self {
            AnimationMetadata::Trigger { options, .. }
            | AnimationMetadata::State { options, .. }
            | AnimationMetadata::Transition { options, .. }
            | AnimationMetadata::Sequence { options, .. }
            | AnimationMetadata::Group { options, .. }
            | AnimationMetadata::Reference { options, .. }
            | AnimationMetadata::AnimateChild { options, .. }
            | AnimationMetadata::AnimateRef { options, .. } => *options = Some(new_options),
            AnimationMetadata::Query { options, .. } => {
                let query_options = options.get_or_insert_with(AnimationQueryOptions::default);
                query_options.delay = new_options.delay;
                query_options.params = new_options.params;
            }
            _ => {}
        }
        self
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            AnimationMetadata::Trigger { .. } => "trigger",
            AnimationMetadata::State { .. } => "state",
            AnimationMetadata::Transition { .. } => "transition",
            AnimationMetadata::Sequence { .. } => "sequence",
            AnimationMetadata::Group { .. } => "group",
            AnimationMetadata::Animate { .. } => "animate",
            AnimationMetadata::Style { .. } => "style",
            AnimationMetadata::Keyframes { .. } => "keyframes",
            AnimationMetadata::Reference { .. } => "animation",
            AnimationMetadata::AnimateChild { .. } => "animateChild",
            AnimationMetadata::AnimateRef { .. } => "useAnimation",
            AnimationMetadata::Query { .. } => "query",
            AnimationMetadata::Stagger { .. } => "stagger",
            AnimationMetadata::Wait { .. } => "wait",
        }
    }
}

/// A list of steps is shorthand for `sequence(steps)`.
impl From<Vec<AnimationMetadata>> for AnimationMetadata {
    fn from(steps: Vec<AnimationMetadata>) -> Self {
        sequence(steps)
    }
}

pub fn trigger(name: &str, definitions: Vec<AnimationMetadata>) -> AnimationMetadata {
    AnimationMetadata::Trigger {
        name: name.to_string(),
        definitions,
        options: None,
    }
}

pub fn state(name: &str, styles: AnimationMetadata) -> AnimationMetadata {
    AnimationMetadata::State {
        name: name.to_string(),
        styles: Box::new(styles),
        options: None,
    }
}

pub fn transition(
    expr: impl Into<TransitionExpr>,
    steps: impl Into<AnimationMetadata>,
) -> AnimationMetadata {
    AnimationMetadata::Transition {
        expr: expr.into(),
        animation: Box::new(steps.into()),
        options: None,
    }
}

pub fn sequence(steps: Vec<AnimationMetadata>) -> AnimationMetadata {
    AnimationMetadata::Sequence { steps, options: None }
}

pub fn group(steps: Vec<AnimationMetadata>) -> AnimationMetadata {
    AnimationMetadata::Group { steps, options: None }
}

/// `animate(timings)` with no target styles.
pub fn animate(timings: impl Into<TimingInput>) -> AnimationMetadata {
    AnimationMetadata::Animate {
        timings: timings.into(),
        styles: None,
    }
}

/// `animate(timings, style(...) | keyframes(...))`.
pub fn animate_with(timings: impl Into<TimingInput>, styles: AnimationMetadata) -> AnimationMetadata {
    AnimationMetadata::Animate {
        timings: timings.into(),
        styles: Some(Box::new(styles)),
    }
}

/// `style({...})` from property pairs. An `offset` pair positions the
/// step inside `keyframes()`.
pub fn style<K, V, I>(pairs: I) -> AnimationMetadata
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let map: StyleMap = pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    style_tokens(vec![StyleEntry::Map(map)])
}

/// `style('*')`
pub fn style_auto() -> AnimationMetadata {
    style_tokens(vec![StyleEntry::Wildcard])
}

pub fn style_tokens(styles: Vec<StyleEntry>) -> AnimationMetadata {
    AnimationMetadata::Style { styles, offset: None }
}

pub fn keyframes(steps: Vec<AnimationMetadata>) -> AnimationMetadata {
    AnimationMetadata::Keyframes { steps }
}

/// A reusable `animation()`, played through `use_animation`.
pub fn animation(steps: impl Into<AnimationMetadata>) -> AnimationMetadata {
    AnimationMetadata::Reference {
        animation: Box::new(steps.into()),
        options: None,
    }
}

pub fn use_animation(reference: AnimationMetadata, options: Option<AnimationOptions>) -> AnimationMetadata {
    AnimationMetadata::AnimateRef {
        animation: Box::new(reference),
        options,
    }
}

pub fn animate_child() -> AnimationMetadata {
    AnimationMetadata::AnimateChild {
        animation: None,
        options: None,
    }
}

/// `animateChild` that plays `steps` on the element instead of the child
/// instructions.
pub fn animate_child_inline(steps: impl Into<AnimationMetadata>) -> AnimationMetadata {
    AnimationMetadata::AnimateChild {
        animation: Some(Box::new(steps.into())),
        options: None,
    }
}

pub fn query(selector: &str, steps: impl Into<AnimationMetadata>) -> AnimationMetadata {
    AnimationMetadata::Query {
        selector: selector.to_string(),
        animation: Box::new(steps.into()),
        options: None,
    }
}

pub fn query_with(
    selector: &str,
    steps: impl Into<AnimationMetadata>,
    options: AnimationQueryOptions,
) -> AnimationMetadata {
    AnimationMetadata::Query {
        selector: selector.to_string(),
        animation: Box::new(steps.into()),
        options: Some(options),
    }
}

pub fn stagger(timings: impl Into<TimingInput>, steps: impl Into<AnimationMetadata>) -> AnimationMetadata {
    AnimationMetadata::Stagger {
        timings: timings.into(),
        animation: Box::new(steps.into()),
    }
}

/// A pause of `timings` on the current element.
pub fn wait(timings: impl Into<TimingInput>) -> AnimationMetadata {
    AnimationMetadata::Wait {
        timings: timings.into(),
    }
}

//! Animation AST
//!
//! Validated form of the animation metadata, produced once per trigger or
//! `animation()` and read by the timeline builder on every transition.

use crate::dsl::transition_expr::TransitionMatcher;
use crate::metadata::AnimationOptions;
use crate::style::StyleEntry;

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerAst {
    pub name: String,
    pub states: Vec<StateAst>,
    pub transitions: Vec<TransitionAst>,
    pub query_count: usize,
    pub dep_count: usize,
    pub options: Option<AnimationOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateAst {
    pub name: String,
    pub style: StyleAst,
    pub options: Option<AnimationOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionAst {
    pub matchers: Vec<TransitionMatcher>,
    pub animation: Box<Ast>,
    pub query_count: usize,
    pub dep_count: usize,
    pub options: Option<AnimationOptions>,
}

/// Animation step nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Sequence(SequenceAst),
    Group(GroupAst),
    Animate(AnimateAst),
    Style(StyleAst),
    Keyframes(KeyframesAst),
    Reference(ReferenceAst),
    AnimateChild(AnimateChildAst),
    AnimateRef(AnimateRefAst),
    Query(QueryAst),
    Stagger(StaggerAst),
    Wait(WaitAst),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceAst {
    pub steps: Vec<Ast>,
    pub options: Option<AnimationOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupAst {
    pub steps: Vec<Ast>,
    pub options: Option<AnimationOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimateAst {
    pub timings: TimingAst,
    pub style: AnimateStyleAst,
}

/// What an `animate()` step animates towards.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimateStyleAst {
    Style(StyleAst),
    Keyframes(KeyframesAst),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleAst {
    pub styles: Vec<StyleEntry>,
    pub easing: Option<String>,
    pub offset: Option<f64>,
    pub contains_dynamic_styles: bool,
    /// Synthesized for an `animate()` without styles.
    pub is_empty_step: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyframesAst {
    pub styles: Vec<StyleAst>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceAst {
    pub animation: Box<Ast>,
    pub options: Option<AnimationOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimateChildAst {
    pub animation: Option<Box<Ast>>,
    pub options: Option<AnimationOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimateRefAst {
    pub animation: ReferenceAst,
    pub options: Option<AnimationOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryAst {
    pub selector: String,
    pub original_selector: String,
    /// 0 means unlimited.
    pub limit: i32,
    pub optional: bool,
    pub include_self: bool,
    pub animation: Box<Ast>,
    pub options: Option<AnimationOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaggerAst {
    pub timings: TimingAst,
    pub animation: Box<Ast>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaitAst {
    pub timings: TimingAst,
}

/// Timing of a step, either resolved at build time or kept as a
/// `{{ param }}` expression resolved per timeline build.
#[derive(Debug, Clone, PartialEq)]
pub enum TimingAst {
    Static {
        duration: f64,
        delay: f64,
        easing: Option<String>,
    },
    Dynamic {
        value: String,
    },
}

impl TimingAst {
    pub fn duration(&self) -> f64 {
        match self {
            TimingAst::Static { duration, .. } => *duration,
            TimingAst::Dynamic { .. } => 0.0,
        }
    }

    pub fn delay(&self) -> f64 {
        match self {
            TimingAst::Static { delay, .. } => *delay,
            TimingAst::Dynamic { .. } => 0.0,
        }
    }

    pub fn easing(&self) -> Option<&str> {
        match self {
            TimingAst::Static { easing, .. } => easing.as_deref(),
            TimingAst::Dynamic { .. } => None,
        }
    }
}

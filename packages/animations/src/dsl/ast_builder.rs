//! Animation AST Builder
//!
//! Walks animation metadata into the typed AST, validating timings, style
//! overlaps, keyframe offsets and step placement on the way. Problems are
//! pushed onto the caller's error list; the walk always finishes so every
//! problem is reported in one pass.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::driver::AnimationDriver;
use crate::dsl::ast::*;
use crate::dsl::transition_expr::parse_transition_expr;
use crate::metadata::{AnimationMetadata, AnimationOptions, TimingInput, TransitionExpr};
use crate::style::{StyleEntry, StyleMap};
use crate::util::{
    contains_substitution, extract_style_params, resolve_timing, AnimateTimings,
    NG_ANIMATING_SELECTOR, NG_TRIGGER_SELECTOR,
};

const ROOT_SELECTOR: &str = "";
const SELF_TOKEN: &str = ":self";
const AMPERSAND_TOKEN: &str = "&";
const STAGGER_FULL: &str = "full";

static SELF_TOKEN_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*(:self|&)\s*,?").unwrap());
static SELECTOR_SEPARATOR_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*").unwrap());
static ANY_TRIGGER_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\*").unwrap());
static NAMED_TRIGGER_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(\w+)").unwrap());
static ANIMATING_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r":animating").unwrap());
static ENTER_TOKEN_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r":enter").unwrap());
static LEAVE_TOKEN_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r":leave").unwrap());
static WHITESPACE_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Builds the AST of a `trigger()` definition.
pub fn build_trigger_ast(
    driver: &dyn AnimationDriver,
    metadata: &AnimationMetadata,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) -> TriggerAst {
    let visitor = AnimationAstBuilderVisitor { driver };
    let mut context = AstBuilderContext::new(errors);
    let ast = match metadata {
        AnimationMetadata::Trigger {
            name,
            definitions,
            options,
        } => visitor.visit_trigger(name, definitions, options, &mut context),
        other => {
            context.errors.push(unresolved_node(other));
            TriggerAst {
                name: String::new(),
                states: Vec::new(),
                transitions: Vec::new(),
                query_count: 0,
                dep_count: 0,
                options: None,
            }
        }
    };
    context.report_unsupported(warnings);
    ast
}

/// Builds the AST of a standalone animation (a step or list of steps).
pub fn build_animation_ast(
    driver: &dyn AnimationDriver,
    metadata: &AnimationMetadata,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) -> Ast {
    let visitor = AnimationAstBuilderVisitor { driver };
    let mut context = AstBuilderContext::new(errors);
    context.reset_style_timing_state();
    let ast = visitor.visit_dsl_node(metadata, &mut context);
    context.report_unsupported(warnings);
    ast
}

#[derive(Debug, Clone, Copy)]
struct StyleTimeTuple {
    start_time: f64,
    end_time: f64,
    /// `animate()` step that recorded the window.
    step: usize,
}

struct AstBuilderContext<'e> {
    errors: &'e mut Vec<String>,
    query_count: usize,
    dep_count: usize,
    in_query: bool,
    current_query_selector: String,
    collected_styles: HashMap<String, IndexMap<String, StyleTimeTuple>>,
    current_time: f64,
    current_animate_timings: Option<AnimateTimings>,
    animate_step: usize,
    unsupported_properties: IndexSet<String>,
}

impl<'e> AstBuilderContext<'e> {
    fn new(errors: &'e mut Vec<String>) -> Self {
        AstBuilderContext {
            errors,
            query_count: 0,
            dep_count: 0,
            in_query: false,
            current_query_selector: ROOT_SELECTOR.to_string(),
            collected_styles: HashMap::new(),
            current_time: 0.0,
            current_animate_timings: None,
            animate_step: 0,
            unsupported_properties: IndexSet::new(),
        }
    }

    fn reset_style_timing_state(&mut self) {
        self.current_query_selector = ROOT_SELECTOR.to_string();
        self.collected_styles = HashMap::new();
        self.collected_styles
            .insert(ROOT_SELECTOR.to_string(), IndexMap::new());
        self.current_time = 0.0;
    }

    fn report_unsupported(&self, warnings: &mut Vec<String>) {
        if !self.unsupported_properties.is_empty() {
            let props: Vec<&str> = self.unsupported_properties.iter().map(String::as_str).collect();
            warnings.push(format!(
                "The following provided properties are not recognized: {}",
                props.join(", ")
            ));
        }
    }
}

struct AnimationAstBuilderVisitor<'d> {
    driver: &'d dyn AnimationDriver,
}

impl<'d> AnimationAstBuilderVisitor<'d> {
    fn visit_trigger(
        &self,
        name: &str,
        definitions: &[AnimationMetadata],
        options: &Option<AnimationOptions>,
        context: &mut AstBuilderContext,
    ) -> TriggerAst {
        context.query_count = 0;
        context.dep_count = 0;
        let mut query_count = 0;
        let mut dep_count = 0;
        let mut states = Vec::new();
        let mut transitions = Vec::new();

        if name.starts_with('@') {
            context.errors.push(
                "animation triggers cannot be prefixed with an `@` sign (e.g. trigger('@foo', [...]))"
                    .to_string(),
            );
        }

        for def in definitions {
            context.reset_style_timing_state();
            match def {
                AnimationMetadata::State {
                    name,
                    styles,
                    options,
                } => {
                    for state_name in SELECTOR_SEPARATOR_REGEXP.split(name) {
                        states.push(self.visit_state(state_name, styles, options, context));
                    }
                }
                AnimationMetadata::Transition {
                    expr,
                    animation,
                    options,
                } => {
                    let transition = self.visit_transition(expr, animation, options, context);
                    query_count += transition.query_count;
                    dep_count += transition.dep_count;
                    transitions.push(transition);
                }
                _ => context.errors.push(
                    "only state() and transition() definitions can sit inside of a trigger()"
                        .to_string(),
                ),
            }
        }

        TriggerAst {
            name: name.to_string(),
            states,
            transitions,
            query_count,
            dep_count,
            options: options.clone(),
        }
    }

    fn visit_state(
        &self,
        name: &str,
        styles: &AnimationMetadata,
        options: &Option<AnimationOptions>,
        context: &mut AstBuilderContext,
    ) -> StateAst {
        let style = match styles {
            AnimationMetadata::Style { .. } => self.visit_style(styles, context),
            other => {
                context.errors.push(unresolved_node(other));
                empty_style_ast()
            }
        };
        let params = options.as_ref().and_then(|o| o.params.clone());

        if style.contains_dynamic_styles {
            let mut missing_subs: IndexSet<String> = IndexSet::new();
            for entry in &style.styles {
                if let StyleEntry::Map(map) = entry {
                    for value in map.values() {
                        for sub in extract_style_params(value) {
                            let provided = params.as_ref().is_some_and(|p| p.contains_key(&sub));
                            if !provided {
                                missing_subs.insert(sub);
                            }
                        }
                    }
                }
            }
            if !missing_subs.is_empty() {
                let subs: Vec<&str> = missing_subs.iter().map(String::as_str).collect();
                context.errors.push(format!(
                    "state(\"{}\", ...) must define default values for all the following style substitutions: {}",
                    name,
                    subs.join(", ")
                ));
            }
        }

        StateAst {
            name: name.to_string(),
            style,
            options: params.map(|params| AnimationOptions {
                params: Some(params),
                ..Default::default()
            }),
        }
    }

    fn visit_transition(
        &self,
        expr: &TransitionExpr,
        animation: &AnimationMetadata,
        options: &Option<AnimationOptions>,
        context: &mut AstBuilderContext,
    ) -> TransitionAst {
        context.query_count = 0;
        context.dep_count = 0;
        let animation = self.visit_dsl_node(animation, context);
        let matchers = parse_transition_expr(expr, context.errors);
        TransitionAst {
            matchers,
            animation: Box::new(animation),
            query_count: context.query_count,
            dep_count: context.dep_count,
            options: options.clone(),
        }
    }

    fn visit_dsl_node(&self, metadata: &AnimationMetadata, context: &mut AstBuilderContext) -> Ast {
        match metadata {
            AnimationMetadata::Sequence { steps, options } => Ast::Sequence(SequenceAst {
                steps: steps.iter().map(|s| self.visit_dsl_node(s, context)).collect(),
                options: options.clone(),
            }),
            AnimationMetadata::Group { steps, options } => self.visit_group(steps, options, context),
            AnimationMetadata::Animate { timings, styles } => {
                self.visit_animate(timings, styles.as_deref(), context)
            }
            AnimationMetadata::Style { .. } => Ast::Style(self.visit_style(metadata, context)),
            AnimationMetadata::Keyframes { steps } => {
                Ast::Keyframes(self.visit_keyframes(steps, context))
            }
            AnimationMetadata::Reference { animation, options } => {
                Ast::Reference(self.visit_reference(animation, options, context))
            }
            AnimationMetadata::AnimateChild { animation, options } => {
                context.dep_count += 1;
                Ast::AnimateChild(AnimateChildAst {
                    animation: animation
                        .as_ref()
                        .map(|a| Box::new(self.visit_dsl_node(a, context))),
                    options: options.clone(),
                })
            }
            AnimationMetadata::AnimateRef { animation, options } => {
                self.visit_animate_ref(animation, options, context)
            }
            AnimationMetadata::Query {
                selector,
                animation,
                options,
            } => {
                let limit = options.as_ref().and_then(|o| o.limit).unwrap_or(0);
                let optional = options.as_ref().is_some_and(|o| o.optional);
                let ast_options = options.as_ref().map(|o| o.as_options());
                self.visit_query(selector, animation, limit, optional, ast_options, context)
            }
            AnimationMetadata::Stagger { timings, animation } => {
                self.visit_stagger(timings, animation, context)
            }
            AnimationMetadata::Wait { timings } => self.visit_wait(timings, context),
            other => {
                context.errors.push(unresolved_node(other));
                Ast::Sequence(SequenceAst {
                    steps: Vec::new(),
                    options: None,
                })
            }
        }
    }

    fn visit_group(
        &self,
        steps: &[AnimationMetadata],
        options: &Option<AnimationOptions>,
        context: &mut AstBuilderContext,
    ) -> Ast {
        let current_time = context.current_time;
        let mut furthest_time = 0.0f64;
        let steps = steps
            .iter()
            .map(|step| {
                context.current_time = current_time;
                let inner = self.visit_dsl_node(step, context);
                furthest_time = furthest_time.max(context.current_time);
                inner
            })
            .collect();
        context.current_time = furthest_time;
        Ast::Group(GroupAst {
            steps,
            options: options.clone(),
        })
    }

    fn visit_animate(
        &self,
        timings: &TimingInput,
        styles: Option<&AnimationMetadata>,
        context: &mut AstBuilderContext,
    ) -> Ast {
        let timing_ast = construct_timing_ast(timings, context.errors);
        context.animate_step += 1;
        context.current_animate_timings = Some(AnimateTimings::new(
            timing_ast.duration(),
            timing_ast.delay(),
            timing_ast.easing().map(str::to_string),
        ));

        let style = match styles {
            Some(AnimationMetadata::Keyframes { steps }) => {
                AnimateStyleAst::Keyframes(self.visit_keyframes(steps, context))
            }
            Some(metadata @ AnimationMetadata::Style { .. }) => {
                context.current_time += timing_ast.duration() + timing_ast.delay();
                AnimateStyleAst::Style(self.visit_style(metadata, context))
            }
            Some(other) => {
                context.errors.push(unresolved_node(other));
                AnimateStyleAst::Style(empty_style_ast())
            }
            None => {
                let mut data = StyleMap::new();
                if let Some(easing) = timing_ast.easing() {
                    data.insert("easing".to_string(), easing.to_string());
                }
                let synthesized = AnimationMetadata::Style {
                    styles: vec![StyleEntry::Map(data)],
                    offset: None,
                };
                context.current_time += timing_ast.duration() + timing_ast.delay();
                let mut style = self.visit_style(&synthesized, context);
                style.is_empty_step = true;
                AnimateStyleAst::Style(style)
            }
        };

        context.current_animate_timings = None;
        Ast::Animate(AnimateAst {
            timings: timing_ast,
            style,
        })
    }

    fn visit_style(&self, metadata: &AnimationMetadata, context: &mut AstBuilderContext) -> StyleAst {
        let mut ast = self.make_style_ast(metadata, context);
        self.validate_style_ast(&mut ast, context);
        ast
    }

    fn make_style_ast(&self, metadata: &AnimationMetadata, context: &mut AstBuilderContext) -> StyleAst {
        let (entries, offset) = match metadata {
            AnimationMetadata::Style { styles, offset } => (styles.clone(), *offset),
            other => {
                context.errors.push(unresolved_node(other));
                (Vec::new(), None)
            }
        };

        let mut styles = Vec::with_capacity(entries.len());
        let mut contains_dynamic_styles = false;
        let mut collected_easing = None;
        for entry in entries {
            match entry {
                StyleEntry::Wildcard => styles.push(StyleEntry::Wildcard),
                StyleEntry::Map(mut map) => {
                    if let Some(easing) = map.shift_remove("easing") {
                        collected_easing = Some(easing);
                    }
                    if !contains_dynamic_styles {
                        contains_dynamic_styles = map.values().any(|v| contains_substitution(v));
                    }
                    styles.push(StyleEntry::Map(map));
                }
            }
        }

        StyleAst {
            styles,
            easing: collected_easing,
            offset,
            contains_dynamic_styles,
            is_empty_step: false,
        }
    }

    fn validate_style_ast(&self, ast: &mut StyleAst, context: &mut AstBuilderContext) {
        let end_time = context.current_time;
        let mut start_time = context.current_time;
        if let Some(timings) = &context.current_animate_timings {
            if start_time > 0.0 {
                start_time -= timings.duration + timings.delay;
            }
        }

        for entry in ast.styles.iter_mut() {
            let StyleEntry::Map(tuple) = entry else {
                continue;
            };
            let props: Vec<String> = tuple.keys().cloned().collect();
            for prop in props {
                if !self.driver.validate_style_property(&prop) {
                    tuple.shift_remove(&prop);
                    context.unsupported_properties.insert(prop);
                    continue;
                }

                let collected_styles = context
                    .collected_styles
                    .entry(context.current_query_selector.clone())
                    .or_default();
                let mut update_collected_style = true;
                if let Some(entry) = collected_styles.get(&prop).copied() {
                    // keyframes of one animate() step share their window
                    if start_time != end_time
                        && entry.step != context.animate_step
                        && start_time < entry.end_time
                        && end_time > entry.start_time
                    {
                        context.errors.push(format!(
                            "The CSS property \"{}\" that exists between the times of \"{}ms\" and \"{}ms\" is also being animated in a parallel animation between the times of \"{}ms\" and \"{}ms\"",
                            prop, entry.start_time, entry.end_time, start_time, end_time
                        ));
                        update_collected_style = false;
                    }
                    // the window keeps the earliest start seen for this property
                    start_time = entry.start_time;
                }
                if update_collected_style {
                    collected_styles.insert(
                        prop,
                        StyleTimeTuple {
                            start_time,
                            end_time,
                            step: context.animate_step,
                        },
                    );
                }
            }
        }
    }

    fn visit_keyframes(&self, steps: &[AnimationMetadata], context: &mut AstBuilderContext) -> KeyframesAst {
        let mut ast = KeyframesAst { styles: Vec::new() };
        let Some(current_animate_timings) = context.current_animate_timings.clone() else {
            context
                .errors
                .push("keyframes() must be placed inside of a call to animate()".to_string());
            return ast;
        };

        const MAX_KEYFRAME_OFFSET: f64 = 1.0;
        let mut total_keyframes_with_offsets = 0;
        let mut offsets = Vec::with_capacity(steps.len());
        let mut offsets_out_of_order = false;
        let mut keyframes_out_of_range = false;
        let mut previous_offset = 0.0;

        let mut keyframes: Vec<StyleAst> = steps
            .iter()
            .map(|step| {
                let mut style = self.make_style_ast(step, context);
                let offset_val = style.offset.or_else(|| consume_offset(&mut style.styles));
                let mut offset = 0.0;
                if let Some(value) = offset_val {
                    total_keyframes_with_offsets += 1;
                    offset = value;
                    style.offset = Some(value);
                }
                keyframes_out_of_range = keyframes_out_of_range || !(0.0..=1.0).contains(&offset);
                offsets_out_of_order = offsets_out_of_order || offset < previous_offset;
                previous_offset = offset;
                offsets.push(offset);
                style
            })
            .collect();

        if keyframes_out_of_range {
            context
                .errors
                .push("Please ensure that all keyframe offsets are between 0 and 1".to_string());
        }
        if offsets_out_of_order {
            context
                .errors
                .push("Please ensure that all keyframe offsets are in order".to_string());
        }

        let length = steps.len();
        let mut generated_offset = 0.0;
        if total_keyframes_with_offsets > 0 && total_keyframes_with_offsets < length {
            context.errors.push(
                "Not all style() steps within the declared keyframes() contain offsets".to_string(),
            );
        } else if total_keyframes_with_offsets == 0 && length > 1 {
            generated_offset = MAX_KEYFRAME_OFFSET / (length - 1) as f64;
        } else if total_keyframes_with_offsets == 0 {
            // a lone keyframe is the target of the step, like animate(style())
            generated_offset = MAX_KEYFRAME_OFFSET;
        }

        let limit = length.saturating_sub(1);
        let current_time = context.current_time;
        let animate_duration = current_animate_timings.duration;
        for (i, mut kf) in keyframes.drain(..).enumerate() {
            let offset = if generated_offset > 0.0 {
                if i == limit {
                    1.0
                } else {
                    generated_offset * i as f64
                }
            } else {
                offsets[i]
            };
            let duration_up_to_this_frame = offset * animate_duration;
            context.current_time =
                current_time + current_animate_timings.delay + duration_up_to_this_frame;
            if let Some(timings) = context.current_animate_timings.as_mut() {
                timings.duration = duration_up_to_this_frame;
            }
            self.validate_style_ast(&mut kf, context);
            kf.offset = Some(offset);
            ast.styles.push(kf);
        }

        ast
    }

    fn visit_reference(
        &self,
        animation: &AnimationMetadata,
        options: &Option<AnimationOptions>,
        context: &mut AstBuilderContext,
    ) -> ReferenceAst {
        ReferenceAst {
            animation: Box::new(self.visit_dsl_node(animation, context)),
            options: options.clone(),
        }
    }

    fn visit_animate_ref(
        &self,
        reference: &AnimationMetadata,
        options: &Option<AnimationOptions>,
        context: &mut AstBuilderContext,
    ) -> Ast {
        let animation = match reference {
            AnimationMetadata::Reference {
                animation,
                options: ref_options,
            } => self.visit_reference(animation, ref_options, context),
            other => ReferenceAst {
                animation: Box::new(self.visit_dsl_node(other, context)),
                options: None,
            },
        };
        Ast::AnimateRef(AnimateRefAst {
            animation,
            options: options.clone(),
        })
    }

    fn visit_query(
        &self,
        original_selector: &str,
        animation: &AnimationMetadata,
        limit: i32,
        optional: bool,
        options: Option<AnimationOptions>,
        context: &mut AstBuilderContext,
    ) -> Ast {
        let parent_selector = context.current_query_selector.clone();
        let parent_in_query = context.in_query;
        context.query_count += 1;
        context.in_query = true;

        let (selector, include_self) = normalize_selector(original_selector);
        context.current_query_selector = if parent_selector.is_empty() {
            selector.clone()
        } else {
            format!("{} {}", parent_selector, selector)
        };
        context
            .collected_styles
            .entry(context.current_query_selector.clone())
            .or_default();

        let animation = self.visit_dsl_node(animation, context);
        context.in_query = parent_in_query;
        context.current_query_selector = parent_selector;

        Ast::Query(QueryAst {
            selector,
            original_selector: original_selector.to_string(),
            limit,
            optional,
            include_self,
            animation: Box::new(animation),
            options,
        })
    }

    fn visit_stagger(
        &self,
        timings: &TimingInput,
        animation: &AnimationMetadata,
        context: &mut AstBuilderContext,
    ) -> Ast {
        if !context.in_query {
            context
                .errors
                .push("stagger() can only be used inside of queryAll()".to_string());
        }
        let timings = match timings {
            TimingInput::Expr(expr) if expr.trim() == STAGGER_FULL => TimingAst::Static {
                duration: 0.0,
                delay: 0.0,
                easing: Some(STAGGER_FULL.to_string()),
            },
            other => {
                let resolved = resolve_timing(other, context.errors, true);
                TimingAst::Static {
                    duration: resolved.duration,
                    delay: resolved.delay,
                    easing: resolved.easing,
                }
            }
        };
        Ast::Stagger(StaggerAst {
            timings,
            animation: Box::new(self.visit_dsl_node(animation, context)),
        })
    }

    fn visit_wait(&self, timings: &TimingInput, context: &mut AstBuilderContext) -> Ast {
        let timings = construct_timing_ast(timings, context.errors);
        if timings.duration() > 0.0 && timings.delay() > 0.0 {
            context.errors.push(
                "wait() can only be given a duration or a delay, not both".to_string(),
            );
        }
        if timings.easing().is_some() {
            context
                .errors
                .push("wait() cannot be given an easing value".to_string());
        }
        context.current_time += timings.duration() + timings.delay();
        Ast::Wait(WaitAst { timings })
    }
}

fn unresolved_node(metadata: &AnimationMetadata) -> String {
    format!(
        "Unable to resolve animation metadata node \"{}\" in this position",
        metadata.kind_name()
    )
}

fn empty_style_ast() -> StyleAst {
    StyleAst {
        styles: Vec::new(),
        easing: None,
        offset: None,
        contains_dynamic_styles: false,
        is_empty_step: false,
    }
}

/// Pulls the `offset` entry out of the step's style maps.
fn consume_offset(styles: &mut [StyleEntry]) -> Option<f64> {
    let mut offset = None;
    for entry in styles.iter_mut() {
        if let StyleEntry::Map(map) = entry {
            if let Some(value) = map.shift_remove("offset") {
                offset = Some(value.trim().parse::<f64>().unwrap_or(f64::NAN));
            }
        }
    }
    offset
}

/// Resolves a timing argument. Strings carrying a `{{ param }}` token stay
/// dynamic and are resolved against the params of each build.
pub fn construct_timing_ast(value: &TimingInput, errors: &mut Vec<String>) -> TimingAst {
    if let TimingInput::Expr(expr) = value {
        let is_dynamic = WHITESPACE_REGEXP
            .split(expr.trim())
            .any(|token| token.starts_with("{{"));
        if is_dynamic {
            return TimingAst::Dynamic {
                value: expr.clone(),
            };
        }
    }
    let timings = resolve_timing(value, errors, false);
    TimingAst::Static {
        duration: timings.duration,
        delay: timings.delay,
        easing: timings.easing,
    }
}

/// Rewrites query pseudo tokens into the class selectors the runtime
/// tags elements with. Returns the selector and whether the queried
/// element itself is included (`:self` or `&`).
pub fn normalize_selector(selector: &str) -> (String, bool) {
    let has_self = SELECTOR_SEPARATOR_REGEXP
        .split(selector.trim())
        .any(|token| token == SELF_TOKEN || token == AMPERSAND_TOKEN);
    let mut selector = selector.to_string();
    if has_self {
        selector = SELF_TOKEN_REGEXP.replace_all(&selector, "").trim().to_string();
    }
    let selector = ANY_TRIGGER_REGEXP.replace_all(&selector, NG_TRIGGER_SELECTOR);
    let selector = NAMED_TRIGGER_REGEXP.replace_all(&selector, |caps: &regex::Captures| {
        format!("{}-{}", NG_TRIGGER_SELECTOR, &caps[1])
    });
    let selector = ANIMATING_REGEXP.replace_all(&selector, NG_ANIMATING_SELECTOR);
    let selector = ENTER_TOKEN_REGEXP.replace_all(&selector, crate::util::ENTER_SELECTOR);
    let selector = LEAVE_TOKEN_REGEXP.replace_all(&selector, crate::util::LEAVE_SELECTOR);
    (selector.into_owned(), has_self)
}

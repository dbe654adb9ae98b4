//! Animation Timeline Builder
//!
//! Expands an animation AST into per-element keyframe timelines.
//!
//! Every context owns a cursor into a timeline; forking a context forks
//! its timeline at the current time. All timelines built for one element
//! share that element's "global" style table so a later fork can backfill
//! properties set by an earlier one. Contexts and timelines live in arenas
//! owned by the builder and refer to each other by index.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::driver::{AnimationDriver, ElementId};
use crate::dsl::ast::*;
use crate::dsl::element_instruction_map::ElementInstructionMap;
use crate::dsl::timeline_instruction::{
    create_timeline_instruction, AnimationTimelineInstruction, Keyframe,
};
use crate::metadata::{AnimationOptions, AnimationParams, TimingInput};
use crate::style::{flatten_styles, StyleEntry, StyleMap, AUTO_STYLE, PRE_STYLE};
use crate::util::{
    interpolate_params, resolve_timing, resolve_timing_value, round_offset, AnimateTimings,
};

pub const ONE_FRAME_IN_MILLISECONDS: f64 = 1.0;

const EASING_KEY: &str = "easing";

static ENTER_CLASS_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.ng-enter([^\w-]|$)").unwrap());
static LEAVE_CLASS_REGEXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.ng-leave([^\w-]|$)").unwrap());

type ElementStylesLookup = HashMap<ElementId, StyleMap>;

/// Builds every timeline `ast` produces when played on `root_element`,
/// starting from `starting_styles` and ending on `final_styles`.
///
/// Problems (missing params, empty queries) are pushed onto `errors`; the
/// returned timelines are meaningless when any were pushed.
#[allow(clippy::too_many_arguments)]
pub fn build_animation_timelines(
    driver: &dyn AnimationDriver,
    root_element: ElementId,
    ast: &Ast,
    enter_class_name: &str,
    leave_class_name: &str,
    starting_styles: &StyleMap,
    final_styles: &StyleMap,
    options: &AnimationOptions,
    sub_instructions: &mut ElementInstructionMap,
    errors: &mut Vec<String>,
) -> Vec<AnimationTimelineInstruction> {
    let mut builder = AnimationTimelineBuilder {
        driver,
        sub_instructions,
        enter_class_name,
        leave_class_name,
        errors,
        builders: Vec::new(),
        sub_timelines: Vec::new(),
        order: Vec::new(),
        contexts: Vec::new(),
        element_styles: HashMap::new(),
    };
    builder.build_keyframes(root_element, ast, starting_styles, final_styles, options)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PreviousNode {
    Noop,
    Style,
    Other,
}

#[derive(Debug, Clone, Copy)]
enum TimelineRef {
    Builder(usize),
    Sub(usize),
}

#[derive(Debug, Clone, Default)]
struct ContextOptions {
    duration: Option<f64>,
    delay: Option<f64>,
    params: Option<AnimationParams>,
}

#[derive(Debug, Clone)]
struct TimelineContext {
    parent: Option<usize>,
    element: ElementId,
    timeline: usize,
    current_animate_timings: Option<AnimateTimings>,
    previous_node: PreviousNode,
    sub_context_count: usize,
    options: ContextOptions,
    current_query_index: usize,
    current_query_total: usize,
    current_stagger_time: f64,
}

struct AnimationTimelineBuilder<'a> {
    driver: &'a dyn AnimationDriver,
    sub_instructions: &'a mut ElementInstructionMap,
    enter_class_name: &'a str,
    leave_class_name: &'a str,
    errors: &'a mut Vec<String>,
    builders: Vec<TimelineBuilder>,
    sub_timelines: Vec<SubTimelineBuilder>,
    order: Vec<TimelineRef>,
    contexts: Vec<TimelineContext>,
    element_styles: ElementStylesLookup,
}

impl<'a> AnimationTimelineBuilder<'a> {
    fn build_keyframes(
        &mut self,
        root_element: ElementId,
        ast: &Ast,
        starting_styles: &StyleMap,
        final_styles: &StyleMap,
        options: &AnimationOptions,
    ) -> Vec<AnimationTimelineInstruction> {
        let duration = options
            .duration
            .as_ref()
            .map(|value| resolve_timing_value(value, self.errors));
        let delay = options
            .delay
            .as_ref()
            .map(|value| resolve_timing_value(value, self.errors));
        let root_timeline = self.new_timeline(root_element, 0.0);
        let root = self.push_context(TimelineContext {
            parent: None,
            element: root_element,
            timeline: root_timeline,
            current_animate_timings: None,
            previous_node: PreviousNode::Noop,
            sub_context_count: 0,
            options: ContextOptions {
                duration,
                delay,
                params: options.params.clone(),
            },
            current_query_index: 0,
            current_query_total: 0,
            current_stagger_time: 0.0,
        });

        self.builders[root_timeline].delay_next_step(delay.unwrap_or(0.0), &mut self.element_styles);
        let params = self.contexts[root].options.params.clone();
        self.builders[root_timeline].set_styles(
            &[StyleEntry::Map(starting_styles.clone())],
            None,
            self.errors,
            params.as_ref(),
            &mut self.element_styles,
        );

        self.visit(ast, root);

        let surviving: Vec<TimelineRef> = self
            .order
            .iter()
            .copied()
            .filter(|r| match r {
                TimelineRef::Builder(i) => self.builders[*i].contains_animation(),
                TimelineRef::Sub(i) => self.sub_timelines[*i].contains_animation(),
            })
            .collect();

        if !surviving.is_empty() && !final_styles.is_empty() {
            let last_root = surviving.iter().rev().find(|r| match r {
                TimelineRef::Builder(i) => self.builders[*i].element == root_element,
                TimelineRef::Sub(i) => self.sub_timelines[*i].element == root_element,
            });
            if let Some(TimelineRef::Builder(i)) = last_root {
                if !self.builders[*i].allow_only_timeline_styles() {
                    self.builders[*i].set_styles(
                        &[StyleEntry::Map(final_styles.clone())],
                        None,
                        self.errors,
                        params.as_ref(),
                        &mut self.element_styles,
                    );
                }
            }
        }

        if surviving.is_empty() {
            return vec![create_timeline_instruction(
                root_element,
                Vec::new(),
                Vec::new(),
                Vec::new(),
                0.0,
                delay.unwrap_or(0.0),
                None,
                false,
            )];
        }

        surviving
            .into_iter()
            .map(|r| match r {
                TimelineRef::Builder(i) => self.builders[i].build_keyframes(&self.element_styles),
                TimelineRef::Sub(i) => self.sub_timelines[i].build_keyframes(),
            })
            .collect()
    }

    // ---- arena helpers ----

    fn new_timeline(&mut self, element: ElementId, start_time: f64) -> usize {
        let builder = TimelineBuilder::new(element, start_time, &mut self.element_styles);
        self.builders.push(builder);
        let index = self.builders.len() - 1;
        self.order.push(TimelineRef::Builder(index));
        index
    }

    fn fork_timeline(&mut self, from: usize, element: ElementId, new_time: Option<f64>) -> usize {
        self.builders[from].apply_styles_to_keyframe(&self.element_styles);
        let start_time = new_time
            .filter(|t| *t != 0.0)
            .unwrap_or_else(|| self.builders[from].current_time());
        self.new_timeline(element, start_time)
    }

    fn push_context(&mut self, context: TimelineContext) -> usize {
        self.contexts.push(context);
        self.contexts.len() - 1
    }

    fn timeline_of(&self, ctx: usize) -> usize {
        self.contexts[ctx].timeline
    }

    fn current_time(&self, ctx: usize) -> f64 {
        self.builders[self.timeline_of(ctx)].current_time()
    }

    fn create_sub_context(
        &mut self,
        ctx: usize,
        options: Option<&AnimationOptions>,
        element: Option<ElementId>,
        new_time: Option<f64>,
    ) -> usize {
        let parent = self.contexts[ctx].clone();
        let target = element.unwrap_or(parent.element);
        let timeline = self.fork_timeline(parent.timeline, target, new_time);
        let sub = self.push_context(TimelineContext {
            parent: Some(ctx),
            element: target,
            timeline,
            current_animate_timings: parent.current_animate_timings,
            previous_node: parent.previous_node,
            sub_context_count: 0,
            options: ContextOptions {
                duration: None,
                delay: None,
                params: parent.options.params,
            },
            current_query_index: parent.current_query_index,
            current_query_total: parent.current_query_total,
            current_stagger_time: 0.0,
        });
        self.update_options(sub, options, false);
        self.contexts[ctx].sub_context_count += 1;
        sub
    }

    fn transform_into_new_timeline(&mut self, ctx: usize, new_time: Option<f64>) -> usize {
        self.contexts[ctx].previous_node = PreviousNode::Noop;
        let element = self.contexts[ctx].element;
        let timeline = self.fork_timeline(self.contexts[ctx].timeline, element, new_time);
        self.contexts[ctx].timeline = timeline;
        timeline
    }

    fn update_options(&mut self, ctx: usize, options: Option<&AnimationOptions>, skip_if_exists: bool) {
        let Some(options) = options else {
            return;
        };
        let context_options = &mut self.contexts[ctx].options;
        if let Some(duration) = &options.duration {
            context_options.duration = Some(resolve_timing_value(duration, self.errors));
        }
        if let Some(delay) = &options.delay {
            context_options.delay = Some(resolve_timing_value(delay, self.errors));
        }
        if let Some(new_params) = &options.params {
            let params = context_options.params.get_or_insert_with(AnimationParams::new);
            for (name, value) in new_params {
                if !skip_if_exists || !params.contains_key(name) {
                    let value = interpolate_params(value, params, self.errors);
                    params.insert(name.clone(), value);
                }
            }
        }
    }

    fn increment_time(&mut self, ctx: usize, time: f64) {
        let timeline = &mut self.builders[self.contexts[ctx].timeline];
        let target = timeline.duration + time;
        timeline.forward_time(target, &mut self.element_styles);
    }

    fn delay_next_step(&mut self, ctx: usize, delay: f64) {
        if delay > 0.0 {
            let timeline = self.contexts[ctx].timeline;
            self.builders[timeline].delay_next_step(delay, &mut self.element_styles);
        }
    }

    fn merge_timeline_collected_styles(&mut self, into: usize, from: usize) {
        let summary = self.builders[from].style_summary.clone();
        self.builders[into].merge_timeline_collected_styles(&summary, &mut self.element_styles);
    }

    fn snapshot_current_styles(&mut self, timeline: usize) {
        self.builders[timeline].snapshot_current_styles(&mut self.element_styles);
    }

    fn apply_styles_to_keyframe(&mut self, timeline: usize) {
        self.builders[timeline].apply_styles_to_keyframe(&self.element_styles);
    }

    fn append_instruction_to_timeline(
        &mut self,
        ctx: usize,
        instruction: &AnimationTimelineInstruction,
        duration: Option<f64>,
        delay: Option<f64>,
    ) -> AnimateTimings {
        let updated = AnimateTimings::new(
            duration.unwrap_or(instruction.duration),
            self.current_time(ctx) + delay.unwrap_or(0.0) + instruction.delay,
            None,
        );
        self.sub_timelines.push(SubTimelineBuilder {
            element: instruction.element,
            keyframes: instruction.keyframes.clone(),
            pre_style_props: instruction.pre_style_props.clone(),
            post_style_props: instruction.post_style_props.clone(),
            duration: updated.duration,
            delay: updated.delay,
            easing: None,
            stretch_starting_keyframe: instruction.stretch_starting_keyframe,
        });
        self.order.push(TimelineRef::Sub(self.sub_timelines.len() - 1));
        updated
    }

    fn invoke_query(
        &mut self,
        ctx: usize,
        selector: &str,
        original_selector: &str,
        limit: i32,
        include_self: bool,
        optional: bool,
    ) -> Vec<ElementId> {
        let element = self.contexts[ctx].element;
        let mut results = Vec::new();
        if include_self {
            results.push(element);
        }
        if !selector.is_empty() {
            let enter = format!(".{}$1", self.enter_class_name);
            let leave = format!(".{}$1", self.leave_class_name);
            let selector = ENTER_CLASS_REGEXP.replace_all(selector, enter.as_str());
            let selector = LEAVE_CLASS_REGEXP.replace_all(&selector, leave.as_str());
            let multi = limit != 1;
            let mut elements = self.driver.query(element, &selector, multi);
            if limit < 0 {
                let keep = limit.unsigned_abs() as usize;
                elements = elements.split_off(elements.len().saturating_sub(keep));
            } else if limit > 0 {
                elements.truncate(limit as usize);
            }
            results.extend(elements);
        }
        if !optional && results.is_empty() {
            self.errors.push(format!(
                "`query(\"{}\")` returned zero elements. (Use `query(\"{}\", {{ optional: true }})` if you wish to allow this.)",
                original_selector, original_selector
            ));
        }
        results
    }

    fn visit_timing(&mut self, timings: &TimingAst, ctx: usize) -> AnimateTimings {
        match timings {
            TimingAst::Static {
                duration,
                delay,
                easing,
            } => AnimateTimings::new(*duration, *delay, easing.clone()),
            TimingAst::Dynamic { value } => {
                let value = match &self.contexts[ctx].options.params {
                    Some(params) => interpolate_params(value, params, self.errors),
                    None => value.clone(),
                };
                resolve_timing(&TimingInput::Expr(value), self.errors, false)
            }
        }
    }

    // ---- visitors ----

    fn visit(&mut self, ast: &Ast, ctx: usize) {
        match ast {
            Ast::Sequence(ast) => self.visit_sequence(ast, ctx),
            Ast::Group(ast) => self.visit_group(ast, ctx),
            Ast::Animate(ast) => self.visit_animate(ast, ctx),
            Ast::Style(ast) => self.visit_style(ast, ctx),
            Ast::Keyframes(ast) => self.visit_keyframes(ast, ctx),
            Ast::Reference(ast) => self.visit_reference(ast, ctx),
            Ast::AnimateChild(ast) => self.visit_animate_child(ast, ctx),
            Ast::AnimateRef(ast) => self.visit_animate_ref(ast, ctx),
            Ast::Query(ast) => self.visit_query(ast, ctx),
            Ast::Stagger(ast) => self.visit_stagger(ast, ctx),
            Ast::Wait(ast) => self.visit_wait(ast, ctx),
        }
    }

    fn visit_animate_child(&mut self, ast: &AnimateChildAst, ctx: usize) {
        if let Some(animation) = &ast.animation {
            let inner = self.create_sub_context(ctx, ast.options.as_ref(), None, None);
            self.transform_into_new_timeline(inner, None);
            self.visit(animation, inner);
            let end_time = self.current_time(inner);
            self.transform_into_new_timeline(ctx, Some(end_time));
        } else {
            let element = self.contexts[ctx].element;
            let instructions = self.sub_instructions.claim(element);
            if !instructions.is_empty() {
                let inner = self.create_sub_context(ctx, ast.options.as_ref(), None, None);
                let start_time = self.current_time(ctx);
                let end_time = self.visit_sub_instructions(&instructions, inner);
                if start_time != end_time {
                    // the children ran on a sub context; move the parent past them
                    self.transform_into_new_timeline(ctx, Some(end_time));
                }
            }
        }
        self.contexts[ctx].previous_node = PreviousNode::Other;
    }

    fn visit_sub_instructions(&mut self, instructions: &[AnimationTimelineInstruction], ctx: usize) -> f64 {
        let start_time = self.current_time(ctx);
        let mut furthest_time = start_time;
        let duration = self.contexts[ctx].options.duration;
        let delay = self.contexts[ctx].options.delay;
        if duration != Some(0.0) {
            for instruction in instructions {
                let timings = self.append_instruction_to_timeline(ctx, instruction, duration, delay);
                furthest_time = furthest_time.max(timings.duration + timings.delay);
            }
        }
        furthest_time
    }

    fn visit_animate_ref(&mut self, ast: &AnimateRefAst, ctx: usize) {
        let inner = self.create_sub_context(ctx, ast.options.as_ref(), None, None);
        self.transform_into_new_timeline(inner, None);
        self.apply_animation_ref_delays(&[ast.options.as_ref(), ast.animation.options.as_ref()], inner);
        self.visit_reference(&ast.animation, inner);
        let end_time = self.current_time(inner);
        self.transform_into_new_timeline(ctx, Some(end_time));
        self.contexts[ctx].previous_node = PreviousNode::Other;
    }

    fn apply_animation_ref_delays(&mut self, options: &[Option<&AnimationOptions>], inner: usize) {
        for ref_options in options.iter().flatten() {
            let Some(delay) = &ref_options.delay else {
                continue;
            };
            let value = match delay {
                TimingInput::Millis(ms) => *ms,
                TimingInput::Expr(expr) => {
                    let empty = AnimationParams::new();
                    let params = ref_options.params.as_ref().unwrap_or(&empty);
                    let expr = interpolate_params(expr, params, self.errors);
                    resolve_timing_value(&TimingInput::Expr(expr), self.errors)
                }
            };
            self.delay_next_step(inner, value);
        }
    }

    fn visit_reference(&mut self, ast: &ReferenceAst, ctx: usize) {
        self.update_options(ctx, ast.options.as_ref(), true);
        self.visit(&ast.animation, ctx);
        self.contexts[ctx].previous_node = PreviousNode::Other;
    }

    fn visit_sequence(&mut self, ast: &SequenceAst, ctx: usize) {
        let sub_context_count = self.contexts[ctx].sub_context_count;
        let mut inner = ctx;
        if let Some(options) = &ast.options {
            if options.params.is_some() || options.delay.is_some() {
                inner = self.create_sub_context(ctx, Some(options), None, None);
                self.transform_into_new_timeline(inner, None);
                if let Some(delay) = &options.delay {
                    let delay = resolve_timing_value(delay, self.errors);
                    self.delay_next_step(inner, delay);
                }
            }
        }

        if !ast.steps.is_empty() {
            for step in &ast.steps {
                self.visit(step, inner);
            }
            self.apply_styles_to_keyframe(self.timeline_of(inner));
            // a child spawned a sub context: later steps must not overlap it
            if self.contexts[inner].sub_context_count > sub_context_count {
                self.transform_into_new_timeline(inner, None);
            }
        }
        self.contexts[ctx].previous_node = PreviousNode::Other;
    }

    fn visit_group(&mut self, ast: &GroupAst, ctx: usize) {
        let mut inner_timelines = Vec::with_capacity(ast.steps.len());
        let mut furthest_time = self.current_time(ctx);
        let delay = ast
            .options
            .as_ref()
            .and_then(|o| o.delay.as_ref())
            .map(|value| resolve_timing_value(value, self.errors))
            .unwrap_or(0.0);

        for step in &ast.steps {
            let inner = self.create_sub_context(ctx, ast.options.as_ref(), None, None);
            if delay != 0.0 {
                self.delay_next_step(inner, delay);
            }
            self.visit(step, inner);
            furthest_time = furthest_time.max(self.current_time(inner));
            inner_timelines.push(self.timeline_of(inner));
        }

        let timeline = self.timeline_of(ctx);
        for inner_timeline in inner_timelines {
            self.merge_timeline_collected_styles(timeline, inner_timeline);
        }
        self.transform_into_new_timeline(ctx, Some(furthest_time));
        self.contexts[ctx].previous_node = PreviousNode::Other;
    }

    fn visit_animate(&mut self, ast: &AnimateAst, ctx: usize) {
        let timings = self.visit_timing(&ast.timings, ctx);
        self.contexts[ctx].current_animate_timings = Some(timings.clone());
        let timeline = self.timeline_of(ctx);
        if timings.delay != 0.0 {
            self.increment_time(ctx, timings.delay);
            self.snapshot_current_styles(timeline);
        }

        match &ast.style {
            AnimateStyleAst::Keyframes(keyframes) => self.visit_keyframes(keyframes, ctx),
            AnimateStyleAst::Style(style) => {
                self.increment_time(ctx, timings.duration);
                self.visit_style(style, ctx);
                self.apply_styles_to_keyframe(timeline);
            }
        }

        self.contexts[ctx].current_animate_timings = None;
        self.contexts[ctx].previous_node = PreviousNode::Other;
    }

    fn visit_style(&mut self, ast: &StyleAst, ctx: usize) {
        let timeline = self.timeline_of(ctx);
        let timings = self.contexts[ctx].current_animate_timings.clone();

        // a style() right after an animate() (not inside one) starts a new frame
        if timings.is_none() && self.builders[timeline].has_current_style_properties() {
            self.builders[timeline].forward_frame();
        }

        let easing = timings.and_then(|t| t.easing).or_else(|| ast.easing.clone());
        if ast.is_empty_step {
            self.builders[timeline].apply_empty_step(easing.as_deref(), &self.element_styles);
        } else {
            let params = self.contexts[ctx].options.params.clone();
            self.builders[timeline].set_styles(
                &ast.styles,
                easing.as_deref(),
                self.errors,
                params.as_ref(),
                &mut self.element_styles,
            );
        }
        self.contexts[ctx].previous_node = PreviousNode::Style;
    }

    fn visit_keyframes(&mut self, ast: &KeyframesAst, ctx: usize) {
        let Some(timings) = self.contexts[ctx].current_animate_timings.clone() else {
            return;
        };
        let start_time = self.current_time(ctx);
        let duration = timings.duration;
        let inner = self.create_sub_context(ctx, None, None, None);
        let inner_timeline = self.timeline_of(inner);
        self.builders[inner_timeline].easing = timings.easing.clone();
        let params = self.contexts[ctx].options.params.clone();

        for step in &ast.styles {
            let offset = step.offset.unwrap_or(0.0);
            let builder = &mut self.builders[inner_timeline];
            builder.forward_time(offset * duration, &mut self.element_styles);
            builder.set_styles(
                &step.styles,
                step.easing.as_deref(),
                self.errors,
                params.as_ref(),
                &mut self.element_styles,
            );
            builder.apply_styles_to_keyframe(&self.element_styles);
        }

        // the parent keeps every style the keyframes touched
        let timeline = self.timeline_of(ctx);
        self.merge_timeline_collected_styles(timeline, inner_timeline);
        self.transform_into_new_timeline(ctx, Some(start_time + duration));
        self.contexts[ctx].previous_node = PreviousNode::Other;
    }

    fn visit_query(&mut self, ast: &QueryAst, ctx: usize) {
        let start_time = self.current_time(ctx);
        let delay = ast
            .options
            .as_ref()
            .and_then(|o| o.delay.as_ref())
            .map(|value| resolve_timing_value(value, self.errors))
            .unwrap_or(0.0);
        let timeline = self.timeline_of(ctx);

        if delay != 0.0
            && (self.contexts[ctx].previous_node == PreviousNode::Style
                || (start_time == 0.0 && self.builders[timeline].has_current_style_properties()))
        {
            self.snapshot_current_styles(timeline);
            self.contexts[ctx].previous_node = PreviousNode::Noop;
        }

        let mut furthest_time = start_time;
        let elements = self.invoke_query(
            ctx,
            &ast.selector,
            &ast.original_selector,
            ast.limit,
            ast.include_self,
            ast.optional,
        );

        self.contexts[ctx].current_query_total = elements.len();
        let mut same_element_timeline = None;
        let own_element = self.contexts[ctx].element;
        for (i, element) in elements.iter().enumerate() {
            self.contexts[ctx].current_query_index = i;
            let inner = self.create_sub_context(ctx, ast.options.as_ref(), Some(*element), None);
            if delay != 0.0 {
                self.delay_next_step(inner, delay);
            }
            if *element == own_element {
                same_element_timeline = Some(self.timeline_of(inner));
            }
            self.visit(&ast.animation, inner);
            let inner_timeline = self.timeline_of(inner);
            self.apply_styles_to_keyframe(inner_timeline);
            furthest_time = furthest_time.max(self.builders[inner_timeline].current_time());
        }

        self.contexts[ctx].current_query_index = 0;
        self.contexts[ctx].current_query_total = 0;
        let timeline = self.transform_into_new_timeline(ctx, Some(furthest_time));

        if let Some(same) = same_element_timeline {
            self.merge_timeline_collected_styles(timeline, same);
            self.snapshot_current_styles(timeline);
        }
        self.contexts[ctx].previous_node = PreviousNode::Other;
    }

    fn visit_stagger(&mut self, ast: &StaggerAst, ctx: usize) {
        let parent = self.contexts[ctx].parent.unwrap_or(ctx);
        let timeline = self.timeline_of(ctx);
        let raw_duration = ast.timings.duration();
        let duration = raw_duration.abs();
        let query_total = self.contexts[ctx].current_query_total as f64;
        let max_time = duration * (query_total - 1.0);
        let mut delay = duration * self.contexts[ctx].current_query_index as f64;

        let transformer = if raw_duration < 0.0 {
            Some("reverse")
        } else {
            ast.timings.easing()
        };
        match transformer {
            Some("reverse") => delay = max_time - delay,
            Some("full") => delay = self.contexts[parent].current_stagger_time,
            _ => {}
        }

        if delay != 0.0 {
            self.builders[timeline].delay_next_step(delay, &mut self.element_styles);
        }
        let starting_time = self.builders[timeline].current_time();
        self.visit(&ast.animation, ctx);
        self.contexts[ctx].previous_node = PreviousNode::Other;

        // the inner timeline carries either a delay or a stretched keyframe
        let parent_timeline = self.timeline_of(parent);
        let stagger_time = (self.builders[timeline].current_time() - starting_time)
            + (self.builders[timeline].start_time - self.builders[parent_timeline].start_time);
        self.contexts[parent].current_stagger_time = stagger_time;
    }

    fn visit_wait(&mut self, ast: &WaitAst, ctx: usize) {
        let timings = self.visit_timing(&ast.timings, ctx);
        let timeline = self.timeline_of(ctx);
        self.increment_time(ctx, timings.duration + timings.delay);
        self.snapshot_current_styles(timeline);
        self.contexts[ctx].previous_node = PreviousNode::Other;
    }
}

#[derive(Debug, Clone)]
struct StyleAtTime {
    time: f64,
    value: String,
}

fn time_key(time: f64) -> u64 {
    if time == 0.0 {
        0f64.to_bits()
    } else {
        time.to_bits()
    }
}

/// A cursor over one element's keyframes.
#[derive(Debug)]
struct TimelineBuilder {
    element: ElementId,
    start_time: f64,
    /// Relative to `start_time`.
    duration: f64,
    easing: Option<String>,
    previous_keyframe: Option<u64>,
    current_keyframe: u64,
    keyframes: IndexMap<u64, StyleMap>,
    style_summary: IndexMap<String, StyleAtTime>,
    local_styles: StyleMap,
    /// The first timeline built for an element owns its global table.
    local_is_global: bool,
    pending_styles: StyleMap,
    back_fill: StyleMap,
    current_empty_step_keyframe: Option<u64>,
}

impl TimelineBuilder {
    fn new(element: ElementId, start_time: f64, globals: &mut ElementStylesLookup) -> Self {
        let local_is_global = !globals.contains_key(&element);
        if local_is_global {
            globals.insert(element, StyleMap::new());
        }
        let mut keyframes = IndexMap::new();
        keyframes.insert(time_key(0.0), StyleMap::new());
        TimelineBuilder {
            element,
            start_time,
            duration: 0.0,
            easing: None,
            previous_keyframe: None,
            current_keyframe: time_key(0.0),
            keyframes,
            style_summary: IndexMap::new(),
            local_styles: StyleMap::new(),
            local_is_global,
            pending_styles: StyleMap::new(),
            back_fill: StyleMap::new(),
            current_empty_step_keyframe: None,
        }
    }

    fn local_styles<'g>(&'g self, globals: &'g ElementStylesLookup) -> &'g StyleMap {
        if self.local_is_global {
            globals.get(&self.element).unwrap_or(&self.local_styles)
        } else {
            &self.local_styles
        }
    }

    fn contains_animation(&self) -> bool {
        match self.keyframes.len() {
            0 => false,
            1 => self.has_current_style_properties(),
            _ => true,
        }
    }

    fn has_current_style_properties(&self) -> bool {
        self.keyframes
            .get(&self.current_keyframe)
            .is_some_and(|kf| !kf.is_empty())
    }

    fn current_time(&self) -> f64 {
        self.start_time + self.duration
    }

    fn delay_next_step(&mut self, delay: f64, globals: &mut ElementStylesLookup) {
        // styles set before the first step must hold until the delay ends
        let has_pre_style_step = self.keyframes.len() == 1 && !self.pending_styles.is_empty();
        if self.duration != 0.0 || has_pre_style_step {
            self.forward_time(self.current_time() + delay, globals);
            if has_pre_style_step {
                self.snapshot_current_styles(globals);
            }
        } else {
            self.start_time += delay;
        }
    }

    fn load_keyframe(&mut self) {
        self.previous_keyframe = Some(self.current_keyframe);
        let key = time_key(self.duration);
        self.keyframes.entry(key).or_default();
        self.current_keyframe = key;
    }

    fn forward_frame(&mut self) {
        self.duration += ONE_FRAME_IN_MILLISECONDS;
        self.load_keyframe();
    }

    fn forward_time(&mut self, time: f64, globals: &ElementStylesLookup) {
        self.apply_styles_to_keyframe(globals);
        self.duration = time;
        self.load_keyframe();
    }

    fn update_style(&mut self, prop: &str, value: &str, globals: &mut ElementStylesLookup) {
        if !self.local_is_global {
            self.local_styles.insert(prop.to_string(), value.to_string());
        }
        globals
            .entry(self.element)
            .or_default()
            .insert(prop.to_string(), value.to_string());
        self.style_summary.insert(
            prop.to_string(),
            StyleAtTime {
                time: self.current_time(),
                value: value.to_string(),
            },
        );
    }

    fn allow_only_timeline_styles(&self) -> bool {
        self.current_empty_step_keyframe != Some(self.current_keyframe)
    }

    fn set_previous_easing(&mut self, easing: Option<&str>) {
        if let (Some(easing), Some(previous)) = (easing, self.previous_keyframe) {
            if let Some(keyframe) = self.keyframes.get_mut(&previous) {
                keyframe.insert(EASING_KEY.to_string(), easing.to_string());
            }
        }
    }

    fn apply_empty_step(&mut self, easing: Option<&str>, globals: &ElementStylesLookup) {
        self.set_previous_easing(easing);
        if let Some(global) = globals.get(&self.element) {
            let current = self.keyframes.entry(self.current_keyframe).or_default();
            for (prop, value) in global {
                let fill = if value.is_empty() { AUTO_STYLE } else { value.as_str() };
                self.back_fill.insert(prop.clone(), fill.to_string());
                current.insert(prop.clone(), AUTO_STYLE.to_string());
            }
        }
        self.current_empty_step_keyframe = Some(self.current_keyframe);
    }

    fn set_styles(
        &mut self,
        input: &[StyleEntry],
        easing: Option<&str>,
        errors: &mut Vec<String>,
        params: Option<&AnimationParams>,
        globals: &mut ElementStylesLookup,
    ) {
        self.set_previous_easing(easing);
        let empty = AnimationParams::new();
        let params = params.unwrap_or(&empty);
        let snapshot = globals.get(&self.element).cloned().unwrap_or_default();
        let styles = flatten_styles(input, &snapshot);
        for (prop, value) in styles {
            let val = interpolate_params(&value, params, errors);
            self.pending_styles.insert(prop.clone(), val.clone());
            if !self.local_styles(globals).contains_key(&prop) {
                let fill = globals
                    .get(&self.element)
                    .and_then(|g| g.get(&prop))
                    .cloned()
                    .unwrap_or_else(|| AUTO_STYLE.to_string());
                self.back_fill.insert(prop.clone(), fill);
            }
            self.update_style(&prop, &val, globals);
        }
    }

    fn apply_styles_to_keyframe(&mut self, globals: &ElementStylesLookup) {
        if self.pending_styles.is_empty() {
            return;
        }
        let local = if self.local_is_global {
            globals.get(&self.element).unwrap_or(&self.local_styles)
        } else {
            &self.local_styles
        };
        let current = self.keyframes.entry(self.current_keyframe).or_default();
        for (prop, value) in self.pending_styles.drain(..) {
            current.insert(prop, value);
        }
        for (prop, value) in local {
            if !current.contains_key(prop) {
                current.insert(prop.clone(), value.clone());
            }
        }
    }

    fn snapshot_current_styles(&mut self, globals: &mut ElementStylesLookup) {
        let local = self.local_styles(globals).clone();
        for (prop, value) in local {
            self.pending_styles.insert(prop.clone(), value.clone());
            self.update_style(&prop, &value, globals);
        }
    }

    fn merge_timeline_collected_styles(
        &mut self,
        summary: &IndexMap<String, StyleAtTime>,
        globals: &mut ElementStylesLookup,
    ) {
        for (prop, details1) in summary {
            let newer = match self.style_summary.get(prop) {
                Some(details0) => details1.time > details0.time,
                None => true,
            };
            if newer {
                self.update_style(prop, &details1.value, globals);
            }
        }
    }

    fn build_keyframes(&mut self, globals: &ElementStylesLookup) -> AnimationTimelineInstruction {
        self.apply_styles_to_keyframe(globals);
        let mut pre_style_props = IndexSet::new();
        let mut post_style_props = IndexSet::new();
        let is_empty = self.keyframes.len() == 1 && self.duration == 0.0;

        let mut final_keyframes = Vec::with_capacity(self.keyframes.len());
        for (time, keyframe) in &self.keyframes {
            let mut styles = self.back_fill.clone();
            for (prop, value) in keyframe {
                styles.insert(prop.clone(), value.clone());
            }
            let easing = styles.shift_remove(EASING_KEY);
            for (prop, value) in &styles {
                if value == PRE_STYLE {
                    pre_style_props.insert(prop.clone());
                } else if value == AUTO_STYLE {
                    post_style_props.insert(prop.clone());
                }
            }
            let offset = if is_empty || self.duration == 0.0 {
                0.0
            } else {
                f64::from_bits(*time) / self.duration
            };
            final_keyframes.push(Keyframe {
                offset,
                easing,
                styles,
            });
        }

        // a zero-duration animation just places styles on screen
        if is_empty {
            if let Some(first) = final_keyframes.first().cloned() {
                let mut last = first;
                last.offset = 1.0;
                final_keyframes.push(last);
            }
        }

        create_timeline_instruction(
            self.element,
            final_keyframes,
            pre_style_props.into_iter().collect(),
            post_style_props.into_iter().collect(),
            self.duration,
            self.start_time,
            self.easing.clone(),
            false,
        )
    }
}

/// Replays an already built child timeline inside a parent animation.
#[derive(Debug)]
struct SubTimelineBuilder {
    element: ElementId,
    keyframes: Vec<Keyframe>,
    pre_style_props: Vec<String>,
    post_style_props: Vec<String>,
    duration: f64,
    delay: f64,
    easing: Option<String>,
    stretch_starting_keyframe: bool,
}

impl SubTimelineBuilder {
    fn contains_animation(&self) -> bool {
        self.keyframes.len() > 1
    }

    fn build_keyframes(&self) -> AnimationTimelineInstruction {
        let mut keyframes = self.keyframes.clone();
        let mut duration = self.duration;
        let mut delay = self.delay;
        let mut easing = self.easing.clone();

        if self.stretch_starting_keyframe && delay != 0.0 && !keyframes.is_empty() {
            // fold the delay into the animation: the first keyframe holds
            // until `delay` and every later offset is rescaled
            let total_time = duration + delay;
            let starting_gap = delay / total_time;
            let mut stretched = Vec::with_capacity(keyframes.len() + 1);

            let mut new_first = keyframes[0].clone();
            new_first.offset = 0.0;
            stretched.push(new_first);

            let mut old_first = keyframes[0].clone();
            old_first.offset = round_offset(starting_gap, 3);
            stretched.push(old_first);

            for keyframe in keyframes.iter().skip(1) {
                let mut kf = keyframe.clone();
                let time_at_keyframe = delay + kf.offset * duration;
                kf.offset = round_offset(time_at_keyframe / total_time, 3);
                stretched.push(kf);
            }

            duration = total_time;
            delay = 0.0;
            easing = None;
            keyframes = stretched;
        }

        create_timeline_instruction(
            self.element,
            keyframes,
            self.pre_style_props.clone(),
            self.post_style_props.clone(),
            duration,
            delay,
            easing,
            true,
        )
    }
}

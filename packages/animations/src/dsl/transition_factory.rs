//! Transition Factory
//!
//! One declared `transition()` of a trigger: matches state pairs and turns
//! a match into a transition instruction for a concrete element.

use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::driver::{AnimationDriver, ElementId};
use crate::dsl::ast::{StyleAst, TransitionAst};
use crate::dsl::element_instruction_map::ElementInstructionMap;
use crate::dsl::timeline_builder::build_animation_timelines;
use crate::dsl::timeline_instruction::AnimationTimelineInstruction;
use crate::metadata::{AnimationOptions, AnimationParams};
use crate::normalizer::AnimationStyleNormalizer;
use crate::style::{StyleEntry, StyleMap};
use crate::util::{apply_param_defaults, interpolate_params};

pub const VOID_VALUE: &str = "void";
pub const ANY_STATE_VALUE: &str = "*";

/// Everything needed to play one trigger transition on one element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationTransitionInstruction {
    pub element: ElementId,
    pub trigger_name: String,
    pub is_removal_transition: bool,
    pub from_state: String,
    pub from_styles: StyleMap,
    pub to_state: String,
    pub to_styles: StyleMap,
    pub timelines: Vec<AnimationTimelineInstruction>,
    pub queried_elements: Vec<ElementId>,
    pub pre_style_props: IndexMap<ElementId, IndexSet<String>>,
    pub post_style_props: IndexMap<ElementId, IndexSet<String>>,
    pub total_time: f64,
    pub errors: Vec<String>,
}

/// Styles of a named `state()`, resolved against params on demand.
pub struct AnimationStateStyles {
    styles: StyleAst,
    default_params: AnimationParams,
    normalizer: Rc<dyn AnimationStyleNormalizer>,
}

impl AnimationStateStyles {
    pub fn new(
        styles: StyleAst,
        default_params: AnimationParams,
        normalizer: Rc<dyn AnimationStyleNormalizer>,
    ) -> Self {
        AnimationStateStyles {
            styles,
            default_params,
            normalizer,
        }
    }

    pub fn build_styles(&self, params: &AnimationParams, errors: &mut Vec<String>) -> StyleMap {
        let mut final_styles = StyleMap::new();
        let combined_params = apply_param_defaults(params, &self.default_params);
        for entry in &self.styles.styles {
            if let StyleEntry::Map(map) = entry {
                for (prop, value) in map {
                    let mut val = value.clone();
                    if !val.is_empty() {
                        val = interpolate_params(&val, &combined_params, errors);
                    }
                    let normalized_prop = self.normalizer.normalize_property_name(prop, errors);
                    let val = self
                        .normalizer
                        .normalize_style_value(prop, &normalized_prop, &val, errors);
                    final_styles.insert(prop.clone(), val);
                }
            }
        }
        final_styles
    }
}

pub type StateStylesMap = IndexMap<String, Rc<AnimationStateStyles>>;

pub struct AnimationTransitionFactory {
    trigger_name: String,
    pub ast: TransitionAst,
    state_styles: Rc<StateStylesMap>,
}

impl AnimationTransitionFactory {
    pub fn new(trigger_name: &str, ast: TransitionAst, state_styles: Rc<StateStylesMap>) -> Self {
        AnimationTransitionFactory {
            trigger_name: trigger_name.to_string(),
            ast,
            state_styles,
        }
    }

    pub fn matches(
        &self,
        current_state: &str,
        next_state: &str,
        element: Option<ElementId>,
        params: &AnimationParams,
    ) -> bool {
        self.ast
            .matchers
            .iter()
            .any(|m| m.matches(current_state, next_state, element, params))
    }

    /// Styles of `state_name`, or of the `*` state when it declares none.
    pub fn build_styles(&self, state_name: &str, params: &AnimationParams, errors: &mut Vec<String>) -> StyleMap {
        let styler = self
            .state_styles
            .get(state_name)
            .or_else(|| self.state_styles.get(ANY_STATE_VALUE));
        match styler {
            Some(styler) => styler.build_styles(params, errors),
            None => StyleMap::new(),
        }
    }

    /// Builds the instruction for `current_state -> next_state` on `element`.
    /// Build problems come back in `errors` of an otherwise empty instruction.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &self,
        driver: &dyn AnimationDriver,
        element: ElementId,
        current_state: &str,
        next_state: &str,
        enter_class_name: &str,
        leave_class_name: &str,
        current_options: Option<&AnimationOptions>,
        next_options: Option<&AnimationOptions>,
        sub_instructions: &mut ElementInstructionMap,
        skip_ast_build: bool,
    ) -> AnimationTransitionInstruction {
        let mut errors = Vec::new();
        let empty = AnimationParams::new();
        let transition_params = self
            .ast
            .options
            .as_ref()
            .and_then(|o| o.params.as_ref())
            .unwrap_or(&empty);
        let current_params = current_options.and_then(|o| o.params.as_ref()).unwrap_or(&empty);
        let current_state_styles = self.build_styles(current_state, current_params, &mut errors);
        let next_params = next_options.and_then(|o| o.params.as_ref()).unwrap_or(&empty);
        let next_state_styles = self.build_styles(next_state, next_params, &mut errors);

        let animation_options = AnimationOptions {
            params: Some(apply_param_defaults(next_params, transition_params)),
            delay: self.ast.options.as_ref().and_then(|o| o.delay.clone()),
            duration: None,
        };

        let timelines = if skip_ast_build {
            Vec::new()
        } else {
            build_animation_timelines(
                driver,
                element,
                &self.ast.animation,
                enter_class_name,
                leave_class_name,
                &current_state_styles,
                &next_state_styles,
                &animation_options,
                sub_instructions,
                &mut errors,
            )
        };

        let total_time = timelines
            .iter()
            .fold(0.0f64, |acc, tl| acc.max(tl.duration + tl.delay));

        let mut instruction = AnimationTransitionInstruction {
            element,
            trigger_name: self.trigger_name.clone(),
            is_removal_transition: next_state == VOID_VALUE,
            from_state: current_state.to_string(),
            from_styles: current_state_styles,
            to_state: next_state.to_string(),
            to_styles: next_state_styles,
            timelines: Vec::new(),
            queried_elements: Vec::new(),
            pre_style_props: IndexMap::new(),
            post_style_props: IndexMap::new(),
            total_time,
            errors: Vec::new(),
        };

        if !errors.is_empty() {
            instruction.errors = errors;
            return instruction;
        }

        let mut queried_elements = IndexSet::new();
        for tl in &timelines {
            let pre_props = instruction.pre_style_props.entry(tl.element).or_default();
            pre_props.extend(tl.pre_style_props.iter().cloned());
            let post_props = instruction.post_style_props.entry(tl.element).or_default();
            post_props.extend(tl.post_style_props.iter().cloned());
            if tl.element != element {
                queried_elements.insert(tl.element);
            }
        }
        instruction.timelines = timelines;
        instruction.queried_elements = queried_elements.into_iter().collect();
        instruction
    }
}

//! Animation Trigger
//!
//! A compiled `trigger()`: its state styles, declared transitions in
//! declaration order and the fallback used when none of them match.

use std::rc::Rc;

use crate::driver::ElementId;
use crate::dsl::ast::{Ast, SequenceAst, TransitionAst, TriggerAst};
use crate::dsl::transition_expr::TransitionMatcher;
use crate::dsl::transition_factory::{
    AnimationStateStyles, AnimationTransitionFactory, StateStylesMap,
};
use crate::metadata::AnimationParams;
use crate::normalizer::AnimationStyleNormalizer;
use crate::style::StyleMap;

pub struct AnimationTrigger {
    pub name: String,
    pub ast: TriggerAst,
    pub transition_factories: Vec<Rc<AnimationTransitionFactory>>,
    pub fallback_transition: Rc<AnimationTransitionFactory>,
    pub states: Rc<StateStylesMap>,
}

pub fn build_trigger(name: &str, ast: TriggerAst, normalizer: Rc<dyn AnimationStyleNormalizer>) -> AnimationTrigger {
    AnimationTrigger::new(name, ast, normalizer)
}

impl AnimationTrigger {
    pub fn new(name: &str, ast: TriggerAst, normalizer: Rc<dyn AnimationStyleNormalizer>) -> Self {
        let mut states = StateStylesMap::new();
        for state in &ast.states {
            let default_params = state
                .options
                .as_ref()
                .and_then(|o| o.params.clone())
                .unwrap_or_default();
            // last declaration of a state name wins
            states.insert(
                state.name.clone(),
                Rc::new(AnimationStateStyles::new(
                    state.style.clone(),
                    default_params,
                    normalizer.clone(),
                )),
            );
        }
        balance_properties(&mut states, "true", "1");
        balance_properties(&mut states, "false", "0");
        let states = Rc::new(states);

        let transition_factories = ast
            .transitions
            .iter()
            .map(|t| Rc::new(AnimationTransitionFactory::new(name, t.clone(), states.clone())))
            .collect();
        let fallback_transition = Rc::new(create_fallback_transition(name, states.clone()));

        AnimationTrigger {
            name: name.to_string(),
            ast,
            transition_factories,
            fallback_transition,
            states,
        }
    }

    pub fn contains_queries(&self) -> bool {
        self.ast.query_count > 0
    }

    /// First declared transition matching `current_state -> next_state`.
    pub fn match_transition(
        &self,
        current_state: &str,
        next_state: &str,
        element: Option<ElementId>,
        params: &AnimationParams,
    ) -> Option<&Rc<AnimationTransitionFactory>> {
        self.transition_factories
            .iter()
            .find(|f| f.matches(current_state, next_state, element, params))
    }

    pub fn match_styles(&self, current_state: &str, params: &AnimationParams, errors: &mut Vec<String>) -> StyleMap {
        self.fallback_transition
            .build_styles(current_state, params, errors)
    }
}

fn create_fallback_transition(trigger_name: &str, states: Rc<StateStylesMap>) -> AnimationTransitionFactory {
    let transition = TransitionAst {
        matchers: vec![TransitionMatcher::always()],
        animation: Box::new(Ast::Sequence(SequenceAst {
            steps: Vec::new(),
            options: None,
        })),
        query_count: 0,
        dep_count: 0,
        options: None,
    };
    AnimationTransitionFactory::new(trigger_name, transition, states)
}

fn balance_properties(states: &mut StateStylesMap, key1: &str, key2: &str) {
    if let Some(styles) = states.get(key1).cloned() {
        if !states.contains_key(key2) {
            states.insert(key2.to_string(), styles);
        }
    } else if let Some(styles) = states.get(key2).cloned() {
        states.insert(key1.to_string(), styles);
    }
}

//! Animation Trigger Tests
//!
//! Transition matching, state style lookup and building a transition
//! instruction from a compiled trigger.

use std::rc::Rc;

use angular_animations::dsl::animation_trigger::{build_trigger, AnimationTrigger};
use angular_animations::dsl::ast_builder::build_trigger_ast;
use angular_animations::dsl::element_instruction_map::ElementInstructionMap;
use angular_animations::metadata::AnimationParams;
use angular_animations::testing::MockAnimationDriver;
use angular_animations::*;
use pretty_assertions::assert_eq;

fn compile(driver: &MockAnimationDriver, metadata: AnimationMetadata) -> AnimationTrigger {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let ast = build_trigger_ast(driver, &metadata, &mut errors, &mut warnings);
    assert!(errors.is_empty(), "{:?}", errors);
    let name = ast.name.clone();
    build_trigger(&name, ast, Rc::new(NoopAnimationStyleNormalizer))
}

fn open_closed() -> AnimationMetadata {
    trigger(
        "openClose",
        vec![
            state("open", style([("opacity", "1")])),
            state("closed", style([("opacity", "0")])),
            transition("open => closed", animate(300)),
            transition("* => *", animate(100)),
        ],
    )
}

#[test]
fn should_pick_the_first_declared_matching_transition() {
    let driver = MockAnimationDriver::new();
    let trigger = compile(&driver, open_closed());
    let params = AnimationParams::new();

    let open_to_closed = trigger.match_transition("open", "closed", None, &params).unwrap();
    assert!(Rc::ptr_eq(open_to_closed, &trigger.transition_factories[0]));

    let closed_to_open = trigger.match_transition("closed", "open", None, &params).unwrap();
    assert!(Rc::ptr_eq(closed_to_open, &trigger.transition_factories[1]));
}

#[test]
fn should_return_none_when_nothing_matches() {
    let driver = MockAnimationDriver::new();
    let trigger = compile(
        &driver,
        trigger(
            "t",
            vec![transition("a => b", animate(100))],
        ),
    );
    assert!(trigger
        .match_transition("b", "a", None, &AnimationParams::new())
        .is_none());
}

#[test]
fn should_let_the_last_state_declaration_win() {
    let driver = MockAnimationDriver::new();
    let trigger = compile(
        &driver,
        trigger(
            "t",
            vec![
                state("open", style([("opacity", "1")])),
                state("open", style([("opacity", "0.5")])),
            ],
        ),
    );
    let mut errors = Vec::new();
    let styles = trigger.match_styles("open", &AnimationParams::new(), &mut errors);
    assert!(errors.is_empty());
    assert_eq!(styles.get("opacity").map(String::as_str), Some("0.5"));
}

#[test]
fn should_fall_back_to_the_star_state_styles() {
    let driver = MockAnimationDriver::new();
    let trigger = compile(
        &driver,
        trigger(
            "t",
            vec![
                state("*", style([("color", "red")])),
                state("open", style([("color", "blue")])),
            ],
        ),
    );
    let mut errors = Vec::new();
    let styles = trigger.match_styles("unknown", &AnimationParams::new(), &mut errors);
    assert_eq!(styles.get("color").map(String::as_str), Some("red"));
}

#[test]
fn should_share_styles_between_boolean_aliases() {
    let driver = MockAnimationDriver::new();
    let trigger = compile(
        &driver,
        trigger(
            "t",
            vec![
                state("true", style([("height", "*")])),
                state("0", style([("height", "0px")])),
            ],
        ),
    );
    let mut errors = Vec::new();
    let params = AnimationParams::new();
    assert_eq!(
        trigger.match_styles("1", &params, &mut errors).get("height").map(String::as_str),
        Some("*")
    );
    assert_eq!(
        trigger.match_styles("false", &params, &mut errors).get("height").map(String::as_str),
        Some("0px")
    );
}

#[test]
fn should_build_a_transition_instruction() {
    let driver = MockAnimationDriver::new();
    let el = driver.create_element("div", driver.body());
    let trigger = compile(&driver, open_closed());
    let factory = trigger
        .match_transition("open", "closed", Some(el), &AnimationParams::new())
        .unwrap()
        .clone();

    let mut sub_instructions = ElementInstructionMap::new();
    let instruction = factory.build(
        &driver,
        el,
        "open",
        "closed",
        "ng-enter",
        "ng-leave",
        None,
        None,
        &mut sub_instructions,
        false,
    );

    assert!(instruction.errors.is_empty(), "{:?}", instruction.errors);
    assert_eq!(instruction.trigger_name, "openClose");
    assert_eq!(instruction.from_styles.get("opacity").map(String::as_str), Some("1"));
    assert_eq!(instruction.to_styles.get("opacity").map(String::as_str), Some("0"));
    assert_eq!(instruction.timelines.len(), 1);
    assert_eq!(instruction.timelines[0].duration, 300.0);
    assert_eq!(instruction.total_time, 300.0);
    assert!(!instruction.is_removal_transition);
    assert!(instruction.queried_elements.is_empty());
}

#[test]
fn should_resolve_transition_params_from_the_next_state() {
    let driver = MockAnimationDriver::new();
    let el = driver.create_element("div", driver.body());
    let trigger = compile(
        &driver,
        trigger(
            "t",
            vec![transition(
                "* => *",
                animate_with("{{ time }}", style([("opacity", "1")])),
            )],
        ),
    );
    let factory = trigger.transition_factories[0].clone();
    let mut sub_instructions = ElementInstructionMap::new();

    let with_params = AnimationOptions::with_params([("time", "150ms")]);
    let instruction = factory.build(
        &driver, el, "a", "b", "ng-enter", "ng-leave", None, Some(&with_params),
        &mut sub_instructions, false,
    );
    assert!(instruction.errors.is_empty());
    assert_eq!(instruction.total_time, 150.0);

    let instruction = factory.build(
        &driver, el, "a", "b", "ng-enter", "ng-leave", None, None,
        &mut sub_instructions, false,
    );
    assert!(instruction
        .errors
        .contains(&"Please provide a value for the animation param time".to_string()));
    assert!(instruction.timelines.is_empty());
}

#[test]
fn should_flag_transitions_into_void_as_removals() {
    let driver = MockAnimationDriver::new();
    let el = driver.create_element("div", driver.body());
    let trigger = compile(
        &driver,
        trigger("t", vec![transition(":leave", animate(100))]),
    );
    let params = AnimationParams::new();
    assert!(trigger.match_transition("open", "void", Some(el), &params).is_some());
    let mut sub_instructions = ElementInstructionMap::new();
    let instruction = trigger.transition_factories[0].build(
        &driver, el, "open", "void", "ng-enter", "ng-leave", None, None,
        &mut sub_instructions, false,
    );
    assert!(instruction.is_removal_transition);
}

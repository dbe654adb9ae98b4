//! AST Builder Tests
//!
//! Validation of animation metadata and the shape of the resulting AST.

use angular_animations::dsl::ast::{AnimateStyleAst, Ast};
use angular_animations::dsl::ast_builder::{build_animation_ast, build_trigger_ast};
use angular_animations::testing::MockAnimationDriver;
use angular_animations::*;
use pretty_assertions::assert_eq;

fn build(metadata: &AnimationMetadata) -> (Ast, Vec<String>) {
    let driver = MockAnimationDriver::new();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let ast = build_animation_ast(&driver, metadata, &mut errors, &mut warnings);
    (ast, errors)
}

fn errors_of(metadata: AnimationMetadata) -> Vec<String> {
    build(&metadata).1
}

fn keyframe_offsets(ast: &Ast) -> Vec<Option<f64>> {
    match ast {
        Ast::Animate(animate) => match &animate.style {
            AnimateStyleAst::Keyframes(kf) => kf.styles.iter().map(|s| s.offset).collect(),
            AnimateStyleAst::Style(_) => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[test]
fn should_build_identical_asts_for_identical_metadata() {
    let metadata = sequence(vec![
        style([("opacity", "0")]),
        group(vec![
            animate_with("1s", style([("opacity", "1")])),
            animate_with("500ms 100ms ease-out", style([("width", "100px")])),
        ]),
        query(".item", stagger(50, animate_with(200, style([("height", "*")])))),
    ]);
    let (first, first_errors) = build(&metadata);
    let (second, second_errors) = build(&metadata);
    assert!(first_errors.is_empty(), "{:?}", first_errors);
    assert!(second_errors.is_empty());
    assert_eq!(first, second);
}

#[test]
fn should_distribute_keyframe_offsets_evenly() {
    let (ast, errors) = build(&animate_with(
        "1s",
        keyframes(vec![
            style([("opacity", "0")]),
            style([("opacity", "0.5")]),
            style([("opacity", "1")]),
        ]),
    ));
    assert!(errors.is_empty());
    assert_eq!(keyframe_offsets(&ast), vec![Some(0.0), Some(0.5), Some(1.0)]);
}

#[test]
fn should_place_a_lone_keyframe_at_the_end() {
    let (ast, errors) = build(&animate_with("1s", keyframes(vec![style([("opacity", "1")])])));
    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(keyframe_offsets(&ast), vec![Some(1.0)]);
}

#[test]
fn should_keep_explicit_keyframe_offsets() {
    let (ast, errors) = build(&animate_with(
        "1s",
        keyframes(vec![
            style([("opacity", "0"), ("offset", "0")]),
            style([("opacity", "0.2"), ("offset", "0.8")]),
            style([("opacity", "1"), ("offset", "1")]),
        ]),
    ));
    assert!(errors.is_empty());
    assert_eq!(keyframe_offsets(&ast), vec![Some(0.0), Some(0.8), Some(1.0)]);
}

#[test]
fn should_require_offsets_on_every_keyframe_or_none() {
    let errors = errors_of(animate_with(
        "1s",
        keyframes(vec![
            style([("opacity", "0"), ("offset", "0")]),
            style([("opacity", "1")]),
        ]),
    ));
    assert!(errors.contains(
        &"Not all style() steps within the declared keyframes() contain offsets".to_string()
    ));
}

#[test]
fn should_reject_out_of_order_and_out_of_range_offsets() {
    let errors = errors_of(animate_with(
        "1s",
        keyframes(vec![
            style([("opacity", "0"), ("offset", "0.7")]),
            style([("opacity", "1"), ("offset", "1.5")]),
            style([("opacity", "1"), ("offset", "0.2")]),
        ]),
    ));
    assert!(errors.contains(&"Please ensure that all keyframe offsets are between 0 and 1".to_string()));
    assert!(errors.contains(&"Please ensure that all keyframe offsets are in order".to_string()));
}

#[test]
fn should_require_keyframes_inside_animate() {
    let errors = errors_of(keyframes(vec![style([("opacity", "0")])]));
    assert!(!errors.is_empty());
}

#[test]
fn should_detect_parallel_animations_of_the_same_property() {
    let errors = errors_of(group(vec![
        animate_with("1s", style([("width", "100px")])),
        animate_with("1s", style([("width", "200px")])),
    ]));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("The CSS property \"width\""));
}

#[test]
fn should_detect_overlap_when_the_shorter_branch_comes_first() {
    let errors = errors_of(group(vec![
        animate_with("500ms", style([("width", "10px")])),
        animate_with("1000ms", style([("width", "20px")])),
    ]));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("is also being animated in a parallel animation"));
}

#[test]
fn should_detect_partially_overlapping_branches() {
    let errors = errors_of(group(vec![
        animate_with("500ms", style([("height", "10px")])),
        sequence(vec![
            animate_with("300ms", style([("opacity", "0")])),
            animate_with("400ms", style([("height", "20px")])),
        ]),
    ]));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("The CSS property \"height\""));
}

#[test]
fn should_allow_keyframes_of_one_animate_step_to_share_a_property() {
    let errors = errors_of(group(vec![
        animate_with(
            "1s",
            keyframes(vec![
                style([("width", "0px")]),
                style([("width", "50px")]),
                style([("width", "100px")]),
            ]),
        ),
        animate_with("1s", style([("opacity", "1")])),
    ]));
    assert!(errors.is_empty(), "{:?}", errors);
}

#[test]
fn should_allow_sequential_animations_of_the_same_property() {
    let errors = errors_of(sequence(vec![
        animate_with("1s", style([("width", "100px")])),
        animate_with("1s", style([("width", "200px")])),
    ]));
    assert!(errors.is_empty(), "{:?}", errors);
}

#[test]
fn should_require_stagger_to_sit_inside_a_query() {
    let errors = errors_of(stagger(100, animate(100)));
    assert_eq!(errors, vec!["stagger() can only be used inside of queryAll()".to_string()]);
}

#[test]
fn should_validate_wait_arguments() {
    assert!(errors_of(wait("100ms")).is_empty());
    assert!(errors_of(wait("100ms 50ms")).contains(
        &"wait() can only be given a duration or a delay, not both".to_string()
    ));
    assert!(errors_of(wait("100ms ease-in"))
        .contains(&"wait() cannot be given an easing value".to_string()));
    assert!(!errors_of(wait("-100ms")).is_empty());
}

#[test]
fn should_rewrite_query_pseudo_selectors() {
    let (ast, errors) = build(&query(":enter, @child", animate(100)));
    assert!(errors.is_empty());
    match ast {
        Ast::Query(q) => {
            assert_eq!(q.selector, ".ng-enter, .ng-trigger-child");
            assert_eq!(q.original_selector, ":enter, @child");
            assert!(!q.include_self);
        }
        other => panic!("expected a query, got {:?}", other),
    }
}

#[test]
fn should_mark_self_queries() {
    let (ast, _) = build(&query(":self, .item", animate(100)));
    match ast {
        Ast::Query(q) => {
            assert!(q.include_self);
            assert_eq!(q.selector, ".item");
        }
        other => panic!("expected a query, got {:?}", other),
    }
}

#[test]
fn should_expand_state_name_lists() {
    let driver = MockAnimationDriver::new();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let ast = build_trigger_ast(
        &driver,
        &trigger(
            "panel",
            vec![
                state("open, expanded", style([("height", "*")])),
                state("closed", style([("height", "0px")])),
                transition("open <=> closed", animate(300)),
            ],
        ),
        &mut errors,
        &mut warnings,
    );
    assert!(errors.is_empty());
    let names: Vec<&str> = ast.states.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["open", "expanded", "closed"]);
    assert_eq!(ast.transitions.len(), 1);
}

#[test]
fn should_reject_foreign_definitions_inside_a_trigger() {
    let driver = MockAnimationDriver::new();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    build_trigger_ast(
        &driver,
        &trigger("panel", vec![animate(100)]),
        &mut errors,
        &mut warnings,
    );
    assert_eq!(
        errors,
        vec!["only state() and transition() definitions can sit inside of a trigger()".to_string()]
    );
}

#[test]
fn should_count_queries_on_the_trigger() {
    let driver = MockAnimationDriver::new();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let ast = build_trigger_ast(
        &driver,
        &trigger(
            "list",
            vec![transition(
                "* => *",
                vec![query(".a", animate(100)), query(".b", animate(100))],
            )],
        ),
        &mut errors,
        &mut warnings,
    );
    assert_eq!(ast.query_count, 2);
    assert_eq!(ast.transitions[0].query_count, 2);
}

#[test]
fn should_warn_about_unsupported_properties() {
    let driver = MockAnimationDriver::new();
    driver.reject_style_property("glow");
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    build_animation_ast(
        &driver,
        &animate_with(100, style([("glow", "1"), ("opacity", "1")])),
        &mut errors,
        &mut warnings,
    );
    assert!(errors.is_empty());
    assert_eq!(
        warnings,
        vec!["The following provided properties are not recognized: glow".to_string()]
    );
}

#[test]
fn should_report_every_problem_in_one_pass() {
    let result = Animation::new(
        std::rc::Rc::new(MockAnimationDriver::new()),
        &sequence(vec![animate("fast"), stagger(10, animate(1))]),
    );
    match result {
        Err(AnimationError::Validation(errors)) => assert_eq!(errors.len(), 2),
        Err(other) => panic!("unexpected error {}", other),
        Ok(_) => panic!("expected validation to fail"),
    }
}

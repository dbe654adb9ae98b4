//! Timeline Builder Tests
//!
//! Expansion of validated animations into per-element keyframe timelines.

use std::rc::Rc;

use angular_animations::dsl::element_instruction_map::ElementInstructionMap;
use angular_animations::dsl::timeline_instruction::create_timeline_instruction;
use angular_animations::style::style_map;
use angular_animations::testing::MockAnimationDriver;
use angular_animations::*;
use pretty_assertions::assert_eq;

fn timelines(
    driver: &Rc<MockAnimationDriver>,
    element: ElementId,
    metadata: AnimationMetadata,
    options: AnimationOptions,
) -> Result<Vec<AnimationTimelineInstruction>> {
    let animation = Animation::new(driver.clone(), &metadata)?;
    animation.build_timelines(element, &[], &[], &options, None)
}

fn list_with_items(driver: &MockAnimationDriver, count: usize) -> (ElementId, Vec<ElementId>) {
    let list = driver.create_element("ul", driver.body());
    let items = (0..count)
        .map(|_| {
            let item = driver.create_element("li", list);
            driver.add_class(item, "item");
            item
        })
        .collect();
    (list, items)
}

#[test]
fn should_build_a_single_timeline_for_a_simple_animation() {
    let driver = Rc::new(MockAnimationDriver::new());
    let el = driver.create_element("div", driver.body());
    let result = timelines(
        &driver,
        el,
        sequence(vec![
            style([("opacity", "0")]),
            animate_with(1000, style([("opacity", "1")])),
        ]),
        AnimationOptions::default(),
    )
    .unwrap();

    assert_eq!(result.len(), 1);
    let timeline = &result[0];
    assert_eq!(timeline.element, el);
    assert_eq!(timeline.duration, 1000.0);
    assert_eq!(timeline.delay, 0.0);
    let offsets: Vec<f64> = timeline.keyframes.iter().map(|k| k.offset).collect();
    assert_eq!(offsets, vec![0.0, 1.0]);
    assert_eq!(timeline.keyframes[0].styles.get("opacity").map(String::as_str), Some("0"));
    assert_eq!(timeline.keyframes[1].styles.get("opacity").map(String::as_str), Some("1"));
}

#[test]
fn should_apply_the_option_delay_to_the_root_timeline() {
    let driver = Rc::new(MockAnimationDriver::new());
    let el = driver.create_element("div", driver.body());
    let result = timelines(
        &driver,
        el,
        animate_with(500, style([("width", "10px")])),
        AnimationOptions::with_delay(250),
    )
    .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].delay, 250.0);
    assert_eq!(result[0].duration, 500.0);
}

#[test]
fn should_stagger_queried_elements_forwards() {
    let driver = Rc::new(MockAnimationDriver::new());
    let (list, items) = list_with_items(&driver, 3);
    let result = timelines(
        &driver,
        list,
        query(".item", stagger(100, animate_with(1000, style([("opacity", "1")])))),
        AnimationOptions::default(),
    )
    .unwrap();

    let elements: Vec<ElementId> = result.iter().map(|t| t.element).collect();
    assert_eq!(elements, items);
    let delays: Vec<f64> = result.iter().map(|t| t.delay).collect();
    assert_eq!(delays, vec![0.0, 100.0, 200.0]);
    assert!(result.iter().all(|t| t.duration == 1000.0));
}

#[test]
fn should_stagger_queried_elements_in_reverse() {
    let driver = Rc::new(MockAnimationDriver::new());
    let (list, _) = list_with_items(&driver, 3);
    let result = timelines(
        &driver,
        list,
        query(".item", stagger(-100, animate_with(1000, style([("opacity", "1")])))),
        AnimationOptions::default(),
    )
    .unwrap();
    let delays: Vec<f64> = result.iter().map(|t| t.delay).collect();
    assert_eq!(delays, vec![200.0, 100.0, 0.0]);
}

#[test]
fn should_limit_query_results() {
    let driver = Rc::new(MockAnimationDriver::new());
    let (list, items) = list_with_items(&driver, 3);
    let step = || animate_with(100, style([("opacity", "1")]));

    let first_two = timelines(
        &driver,
        list,
        query_with(
            ".item",
            step(),
            AnimationQueryOptions {
                limit: Some(2),
                ..Default::default()
            },
        ),
        AnimationOptions::default(),
    )
    .unwrap();
    let elements: Vec<ElementId> = first_two.iter().map(|t| t.element).collect();
    assert_eq!(elements, items[..2].to_vec());

    let last_one = timelines(
        &driver,
        list,
        query_with(
            ".item",
            step(),
            AnimationQueryOptions {
                limit: Some(-1),
                ..Default::default()
            },
        ),
        AnimationOptions::default(),
    )
    .unwrap();
    let elements: Vec<ElementId> = last_one.iter().map(|t| t.element).collect();
    assert_eq!(elements, vec![items[2]]);
}

#[test]
fn should_fail_when_a_required_query_matches_nothing() {
    let driver = Rc::new(MockAnimationDriver::new());
    let el = driver.create_element("div", driver.body());
    let result = timelines(
        &driver,
        el,
        query(".missing", animate(100)),
        AnimationOptions::default(),
    );
    match result {
        Err(AnimationError::Timeline(errors)) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].starts_with("`query(\".missing\")` returned zero elements."));
        }
        other => panic!("expected a timeline error, got {:?}", other.map(|t| t.len())),
    }
}

#[test]
fn should_allow_optional_queries_to_match_nothing() {
    let driver = Rc::new(MockAnimationDriver::new());
    let el = driver.create_element("div", driver.body());
    let result = timelines(
        &driver,
        el,
        query_with(
            ".missing",
            animate(100),
            AnimationQueryOptions {
                optional: true,
                ..Default::default()
            },
        ),
        AnimationOptions::default(),
    )
    .unwrap();
    // nothing animated: a single empty instruction for the root element
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].element, el);
    assert!(result[0].keyframes.is_empty());
}

#[test]
fn should_interpolate_params_into_timings_and_styles() {
    let driver = Rc::new(MockAnimationDriver::new());
    let el = driver.create_element("div", driver.body());
    let result = timelines(
        &driver,
        el,
        sequence(vec![
            style([("width", "0px")]),
            animate_with("{{ time }}", style([("width", "{{ size }}")])),
        ]),
        AnimationOptions::with_params([("time", "500ms"), ("size", "120px")]),
    )
    .unwrap();
    assert_eq!(result[0].duration, 500.0);
    let last = result[0].keyframes.last().unwrap();
    assert_eq!(last.styles.get("width").map(String::as_str), Some("120px"));
}

#[test]
fn should_report_missing_params() {
    let driver = Rc::new(MockAnimationDriver::new());
    let el = driver.create_element("div", driver.body());
    let result = timelines(
        &driver,
        el,
        animate_with("{{ time }}", style([("width", "10px")])),
        AnimationOptions::with_params([("other", "1")]),
    );
    match result {
        Err(AnimationError::Timeline(errors)) => assert!(errors
            .contains(&"Please provide a value for the animation param time".to_string())),
        other => panic!("expected a timeline error, got {:?}", other.map(|t| t.len())),
    }
}

#[test]
fn should_advance_time_across_waits() {
    let driver = Rc::new(MockAnimationDriver::new());
    let el = driver.create_element("div", driver.body());
    let result = timelines(
        &driver,
        el,
        sequence(vec![
            style([("opacity", "0")]),
            wait(200),
            animate_with(300, style([("opacity", "1")])),
        ]),
        AnimationOptions::default(),
    )
    .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].duration, 500.0);
}

#[test]
fn should_not_fork_the_timeline_when_animate_child_has_nothing_to_play() {
    let driver = Rc::new(MockAnimationDriver::new());
    let el = driver.create_element("div", driver.body());
    let result = timelines(
        &driver,
        el,
        sequence(vec![animate_child(), animate_with(300, style([("opacity", "1")]))]),
        AnimationOptions::default(),
    )
    .unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].element, el);
    assert_eq!(result[0].duration, 300.0);
    assert_eq!(result[0].delay, 0.0);
}

#[test]
fn should_replay_child_instructions_for_every_animate_child() {
    let driver = Rc::new(MockAnimationDriver::new());
    let parent = driver.create_element("div", driver.body());
    let child = driver.create_element("section", parent);
    driver.add_class(child, "child");

    let mut sub_instructions = ElementInstructionMap::new();
    sub_instructions.append(
        child,
        &[create_timeline_instruction(
            child,
            vec![
                Keyframe::new(0.0, style_map([("opacity", "0")])),
                Keyframe::new(1.0, style_map([("opacity", "1")])),
            ],
            Vec::new(),
            Vec::new(),
            100.0,
            0.0,
            None,
            false,
        )],
    );

    let animation = Animation::new(
        driver.clone(),
        &sequence(vec![
            query(".child", animate_child()),
            query(".child", animate_child()),
        ]),
    )
    .unwrap();
    let result = animation
        .build_timelines(parent, &[], &[], &AnimationOptions::default(), Some(&mut sub_instructions))
        .unwrap();

    let replayed: Vec<&AnimationTimelineInstruction> =
        result.iter().filter(|tl| tl.element == child).collect();
    assert_eq!(replayed.len(), 2);
    assert!(replayed.iter().all(|tl| tl.duration == 100.0));
    assert_eq!(sub_instructions.get(child).len(), 1);
    assert!(!sub_instructions.is_unclaimed(child));
}

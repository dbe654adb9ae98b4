//! Animation Engine Tests
//!
//! End to end behaviour of the engine surface against the in-memory driver.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use angular_animations::render::engine::RemovalContext;
use angular_animations::testing::MockAnimationDriver;
use angular_animations::*;
use pretty_assertions::assert_eq;

const NS: &str = "ns1";

struct Fixture {
    driver: Rc<MockAnimationDriver>,
    engine: AnimationEngine,
    host: ElementId,
    element: ElementId,
}

fn setup(trigger_metadata: AnimationMetadata) -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let driver = Rc::new(MockAnimationDriver::new());
    let engine = AnimationEngine::new(driver.clone());
    let host = driver.create_element("app-root", driver.body());
    let element = driver.create_element("div", host);
    let name = match &trigger_metadata {
        AnimationMetadata::Trigger { name, .. } => name.clone(),
        _ => String::new(),
    };
    engine
        .register_trigger("cmp", NS, host, &name, &trigger_metadata)
        .unwrap();
    Fixture {
        driver,
        engine,
        host,
        element,
    }
}

fn open_close() -> AnimationMetadata {
    trigger(
        "openClose",
        vec![
            state("open", style([("opacity", "1")])),
            state("closed", style([("opacity", "0")])),
            transition("open => closed", animate(300)),
        ],
    )
}

fn record(events: &Rc<RefCell<Vec<AnimationEvent>>>) -> impl Fn(&AnimationEvent) + 'static {
    let events = events.clone();
    move |event: &AnimationEvent| events.borrow_mut().push(event.clone())
}

#[test]
fn should_animate_between_two_declared_states() {
    let f = setup(open_close());
    f.engine.set_property(NS, f.element, "openClose", "open").unwrap();
    f.engine.flush().unwrap();
    // nothing matched `void => open`: styles only
    assert!(f.driver.players().is_empty());
    assert_eq!(f.driver.inline_style(f.element, "opacity").as_deref(), Some("1"));

    f.engine.set_property(NS, f.element, "openClose", "closed").unwrap();
    f.engine.flush().unwrap();

    let players = f.driver.players();
    assert_eq!(players.len(), 1);
    let player = &players[0];
    assert_eq!(player.element_id(), f.element);
    assert_eq!(player.duration(), 300.0);
    let first = &player.keyframes()[0];
    let last = player.keyframes().last().unwrap();
    assert_eq!(first.styles.get("opacity").map(String::as_str), Some("1"));
    assert_eq!(last.styles.get("opacity").map(String::as_str), Some("0"));
    assert_eq!(f.engine.players().len(), 1);

    player.finish();
    assert!(f.engine.players().is_empty());
    assert_eq!(f.driver.inline_style(f.element, "opacity").as_deref(), Some("0"));
}

#[test]
fn should_tag_elements_with_queued_transitions() {
    let f = setup(open_close());
    f.engine.set_property(NS, f.element, "openClose", "open").unwrap();
    f.engine.flush().unwrap();

    f.engine.set_property(NS, f.element, "openClose", "closed").unwrap();
    assert!(f.driver.has_class(f.element, "ng-animate-queued"));
    assert!(f.driver.has_class(f.element, "ng-trigger"));
    assert!(f.driver.has_class(f.element, "ng-trigger-openClose"));

    f.engine.flush().unwrap();
    assert!(!f.driver.has_class(f.element, "ng-animate-queued"));
}

#[test]
fn should_deliver_start_and_done_events() {
    let f = setup(open_close());
    let events = Rc::new(RefCell::new(Vec::new()));
    f.engine
        .listen(NS, f.element, "openClose", "start", record(&events))
        .unwrap();
    f.engine
        .listen(NS, f.element, "openClose", "done", record(&events))
        .unwrap();

    f.engine.set_property(NS, f.element, "openClose", "open").unwrap();
    f.engine.flush().unwrap();
    events.borrow_mut().clear();

    f.engine.set_property(NS, f.element, "openClose", "closed").unwrap();
    f.engine.flush().unwrap();
    {
        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].phase_name, "start");
        assert_eq!(events[0].trigger_name, "openClose");
        assert_eq!(events[0].from_state, "open");
        assert_eq!(events[0].to_state, "closed");
        assert_eq!(events[0].total_time, 300.0);
        assert_eq!(events[0].element, f.element);
        assert!(!events[0].disabled);
    }

    f.driver.players()[0].finish();
    let events = events.borrow();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].phase_name, "done");
    assert_eq!(events[1].to_state, "closed");
}

#[test]
fn should_skip_animations_on_disabled_elements() {
    let f = setup(open_close());
    let events = Rc::new(RefCell::new(Vec::new()));
    f.engine
        .listen(NS, f.element, "openClose", "done", record(&events))
        .unwrap();
    f.engine.set_property(NS, f.element, "openClose", "open").unwrap();
    f.engine.flush().unwrap();
    events.borrow_mut().clear();

    f.engine.set_property(NS, f.element, ".disabled", true).unwrap();
    assert!(f.driver.has_class(f.element, "ng-animate-disabled"));
    f.engine.set_property(NS, f.element, "openClose", "closed").unwrap();
    f.engine.flush().unwrap();

    assert!(f.driver.players().is_empty());
    let events = events.borrow();
    assert_eq!(events.len(), 1);
    assert!(events[0].disabled);
    assert_eq!(events[0].total_time, 300.0);
    assert_eq!(f.driver.inline_style(f.element, "opacity").as_deref(), Some("0"));
}

#[test]
fn should_fail_the_whole_flush_when_a_transition_cannot_be_built() {
    let f = setup(trigger(
        "size",
        vec![transition(
            "* => big",
            animate_with("{{ time }}", style([("width", "100px")])),
        )],
    ));
    let other_host = f.driver.create_element("section", f.driver.body());
    let other = f.driver.create_element("div", other_host);
    f.engine
        .register_trigger(
            "cmp2",
            "ns2",
            other_host,
            "fade",
            &trigger("fade", vec![transition("* => *", animate(100))]),
        )
        .unwrap();

    f.engine.set_property(NS, f.element, "size", "big").unwrap();
    f.engine.set_property("ns2", other, "fade", "in").unwrap();
    match f.engine.flush() {
        Err(AnimationError::Flush { errors }) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].0, "size");
            assert!(errors[0]
                .1
                .contains(&"Please provide a value for the animation param time".to_string()));
        }
        other => panic!("expected a flush error, got {:?}", other),
    }
    assert!(f.driver.players().is_empty());
    assert!(f.engine.players().is_empty());
}

#[test]
fn should_fail_the_flush_when_a_style_value_lacks_a_unit() {
    let f = setup(trigger(
        "size",
        vec![transition(
            "* => big",
            animate_with(300, style([("width", "1.2.3")])),
        )],
    ));
    let other_host = f.driver.create_element("section", f.driver.body());
    let other = f.driver.create_element("div", other_host);
    f.engine
        .register_trigger(
            "cmp2",
            "ns2",
            other_host,
            "fade",
            &trigger("fade", vec![transition("* => *", animate(100))]),
        )
        .unwrap();

    f.engine.set_property(NS, f.element, "size", "big").unwrap();
    f.engine.set_property("ns2", other, "fade", "in").unwrap();
    match f.engine.flush() {
        Err(AnimationError::Flush { errors }) => assert_eq!(
            errors,
            vec![(
                "size".to_string(),
                vec!["Please provide a CSS unit value for width:1.2.3".to_string()]
            )]
        ),
        other => panic!("expected a flush error, got {:?}", other),
    }
    assert!(f.driver.players().is_empty());
    assert!(f.engine.players().is_empty());
}

#[test]
fn should_reject_duplicate_triggers_in_one_namespace() {
    let f = setup(open_close());
    let result = f.engine.register_trigger("cmp", NS, f.host, "openClose", &open_close());
    assert_eq!(result, Err(AnimationError::DuplicateTrigger("openClose".to_string())));
}

#[test]
fn should_report_invalid_trigger_metadata() {
    let driver = Rc::new(MockAnimationDriver::new());
    let engine = AnimationEngine::new(driver.clone());
    let host = driver.create_element("div", driver.body());
    let result = engine.register_trigger(
        "cmp",
        NS,
        host,
        "broken",
        &trigger("broken", vec![transition("* => *", animate("fast"))]),
    );
    assert!(matches!(result, Err(AnimationError::TriggerBuild { ref name, .. }) if name == "broken"));
}

#[test]
fn should_validate_listener_registrations() {
    let f = setup(open_close());
    assert!(matches!(
        f.engine.listen(NS, f.element, "missing", "done", |_| {}),
        Err(AnimationError::MissingTrigger { .. })
    ));
    assert!(matches!(
        f.engine.listen(NS, f.element, "openClose", "", |_| {}),
        Err(AnimationError::MissingEventPhase { .. })
    ));
    assert!(matches!(
        f.engine.listen(NS, f.element, "openClose", "middle", |_| {}),
        Err(AnimationError::UnsupportedPhase { .. })
    ));
}

#[test]
fn should_defer_removal_until_the_leave_animation_is_done() {
    let f = setup(trigger(
        "fade",
        vec![transition(":leave", animate_with(200, style([("opacity", "0")])))],
    ));
    let removed = Rc::new(RefCell::new(Vec::new()));
    let log = removed.clone();
    f.engine
        .set_removal_listener(move |element, _| log.borrow_mut().push(element));

    f.engine.set_property(NS, f.element, "fade", "in").unwrap();
    f.engine.flush().unwrap();

    f.engine
        .on_remove(NS, f.element, RemovalContext::default())
        .unwrap();
    f.engine.flush().unwrap();
    assert!(f.driver.is_attached(f.element));
    assert!(removed.borrow().is_empty());

    let players = f.driver.players();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].duration(), 200.0);
    players[0].finish();

    assert!(!f.driver.is_attached(f.element));
    assert_eq!(*removed.borrow(), vec![f.element]);
}

#[test]
fn should_remove_elements_without_a_leave_animation_right_away() {
    let f = setup(trigger("fade", vec![transition("a => b", animate(100))]));
    f.engine.set_property(NS, f.element, "fade", "a").unwrap();
    f.engine.flush().unwrap();

    f.engine
        .on_remove(NS, f.element, RemovalContext::default())
        .unwrap();
    assert!(!f.driver.is_attached(f.element));
    f.engine.flush().unwrap();
    assert!(f.driver.players().is_empty());
}

#[test]
fn should_fire_done_for_listeners_of_removed_elements() {
    let f = setup(trigger("fade", vec![transition("a => b", animate(100))]));
    let events = Rc::new(RefCell::new(Vec::new()));
    f.engine
        .listen(NS, f.element, "fade", "done", record(&events))
        .unwrap();
    f.engine.set_property(NS, f.element, "fade", "a").unwrap();
    f.engine.flush().unwrap();
    events.borrow_mut().clear();

    f.engine
        .on_remove(NS, f.element, RemovalContext::default())
        .unwrap();
    f.engine.flush().unwrap();

    let events = events.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].phase_name, "done");
    assert_eq!(events[0].to_state, "void");
}

#[test]
fn should_play_enter_animations_for_inserted_elements() {
    let f = setup(trigger(
        "fade",
        vec![transition(
            ":enter",
            vec![style([("opacity", "0")]), animate_with(250, style([("opacity", "1")]))],
        )],
    ));
    let child = f.driver.create_element("div", f.host);
    f.engine.on_insert(NS, child, f.host, true);
    f.engine.set_property(NS, child, "fade", "in").unwrap();
    f.engine.flush().unwrap();

    let players = f.driver.players();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].element_id(), child);
    assert_eq!(players[0].duration(), 250.0);
    // enter classes only exist while the flush runs
    assert!(f
        .driver
        .class_names(child)
        .iter()
        .all(|class| !class.starts_with("ng-enter")));
}

#[test]
fn should_hand_running_players_to_the_next_transition() {
    let f = setup(trigger(
        "openClose",
        vec![
            state("open", style([("height", "100px")])),
            state("closed", style([("height", "0px")])),
            transition("open <=> closed", animate(300)),
        ],
    ));
    f.engine.set_property(NS, f.element, "openClose", "open").unwrap();
    f.engine.flush().unwrap();
    f.engine.set_property(NS, f.element, "openClose", "closed").unwrap();
    f.engine.flush().unwrap();
    f.engine.set_property(NS, f.element, "openClose", "open").unwrap();
    f.engine.flush().unwrap();

    let players = f.driver.players();
    assert_eq!(players.len(), 2);
    assert!(players[0].is_destroyed());
    assert!(players[0].captured_before_destroy());
    assert_eq!(players[1].previous_players().len(), 1);
    assert_eq!(f.engine.players().len(), 1);
}

#[test]
fn should_call_when_rendering_done_once_players_finish() {
    let f = setup(open_close());
    let calls = Rc::new(Cell::new(0));

    let counter = calls.clone();
    f.engine.when_rendering_done(move || counter.set(counter.get() + 1));
    assert_eq!(calls.get(), 1);

    f.engine.set_property(NS, f.element, "openClose", "open").unwrap();
    f.engine.flush().unwrap();
    f.engine.set_property(NS, f.element, "openClose", "closed").unwrap();
    f.engine.flush().unwrap();

    let counter = calls.clone();
    f.engine.when_rendering_done(move || counter.set(counter.get() + 1));
    assert_eq!(calls.get(), 1);
    f.driver.players()[0].finish();
    assert_eq!(calls.get(), 2);
}

#[test]
fn should_drive_timeline_animations_through_commands() {
    let f = setup(open_close());
    let fade = sequence(vec![
        style([("opacity", "0")]),
        animate_with(400, style([("opacity", "1")])),
    ]);
    f.engine
        .set_property(
            NS,
            f.element,
            "@fade:register",
            PropertyValue::Command(vec![TimelineCommandArg::Metadata(fade)]),
        )
        .unwrap();
    f.engine
        .set_property(NS, f.element, "@fade:create", PropertyValue::Command(Vec::new()))
        .unwrap();

    let events = Rc::new(RefCell::new(Vec::new()));
    f.engine
        .listen(NS, f.element, "@fade", "done", record(&events))
        .unwrap();

    let players = f.driver.players();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].duration(), 400.0);
    assert_eq!(f.engine.players().len(), 1);

    f.engine
        .set_property(NS, f.element, "@fade:play", PropertyValue::Command(Vec::new()))
        .unwrap();
    assert!(players[0].is_initialized());
    f.engine
        .set_property(NS, f.element, "@fade:finish", PropertyValue::Command(Vec::new()))
        .unwrap();
    assert_eq!(events.borrow().len(), 1);
    assert_eq!(events.borrow()[0].phase_name, "done");

    f.engine
        .set_property(NS, f.element, "@fade:destroy", PropertyValue::Command(Vec::new()))
        .unwrap();
    assert!(f.engine.players().is_empty());
}

#[test]
fn should_reject_commands_for_unknown_timeline_animations() {
    let f = setup(open_close());
    assert!(matches!(
        f.engine.set_property(NS, f.element, "@missing:create", PropertyValue::Command(Vec::new())),
        Err(AnimationError::Create(_))
    ));
    assert!(matches!(
        f.engine.set_property(NS, f.element, "@missing:play", PropertyValue::Command(Vec::new())),
        Err(AnimationError::MissingPlayer(_))
    ));
}

#[test]
fn should_disable_everything_from_the_config() {
    let driver = Rc::new(MockAnimationDriver::new());
    let config = AnimationEngineConfig {
        disable_animations: true,
        ..Default::default()
    };
    let engine = AnimationEngine::with_config(driver.clone(), &config);
    let host = driver.create_element("div", driver.body());
    let el = driver.create_element("div", host);
    engine.register_trigger("cmp", NS, host, "openClose", &open_close()).unwrap();
    engine.set_property(NS, el, "openClose", "open").unwrap();
    engine.flush().unwrap();
    engine.set_property(NS, el, "openClose", "closed").unwrap();
    engine.flush().unwrap();
    assert!(driver.has_class(driver.body(), "ng-animate-disabled"));
    assert!(driver.players().is_empty());
}

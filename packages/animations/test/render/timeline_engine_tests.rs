//! Timeline Engine Tests

use std::cell::RefCell;
use std::rc::Rc;

use angular_animations::render::timeline_engine::TimelineAnimationEngine;
use angular_animations::testing::MockAnimationDriver;
use angular_animations::*;
use pretty_assertions::assert_eq;

fn setup() -> (Rc<MockAnimationDriver>, TimelineAnimationEngine, ElementId) {
    let driver = Rc::new(MockAnimationDriver::new());
    let engine = TimelineAnimationEngine::new(driver.clone(), Rc::new(NoopAnimationStyleNormalizer));
    let element = driver.create_element("div", driver.body());
    (driver, engine, element)
}

fn grow() -> AnimationMetadata {
    sequence(vec![
        style([("height", "0px")]),
        animate_with(100, style([("height", "*")])),
    ])
}

#[test]
fn should_resolve_auto_styles_from_the_element() {
    let (driver, engine, el) = setup();
    driver.set_computed_style(el, "height", "120px");
    engine.register("grow", &grow()).unwrap();
    engine.create("grow", el, &AnimationOptions::default()).unwrap();

    let players = driver.players();
    assert_eq!(players.len(), 1);
    let keyframes = players[0].keyframes();
    assert_eq!(keyframes[0].styles.get("height").map(String::as_str), Some("0px"));
    assert_eq!(
        keyframes.last().unwrap().styles.get("height").map(String::as_str),
        Some("120px")
    );
}

#[test]
fn should_not_start_created_players() {
    let (driver, engine, el) = setup();
    engine.register("grow", &grow()).unwrap();
    engine.create("grow", el, &AnimationOptions::default()).unwrap();
    assert!(!driver.players()[0].is_initialized());

    engine.command("grow", el, "play", &[]).unwrap();
    assert!(driver.players()[0].is_initialized());
}

#[test]
fn should_reject_invalid_animations_at_registration() {
    let (_, engine, _) = setup();
    let result = engine.register("bad", &animate("fast"));
    match result {
        Err(AnimationError::Register(errors)) => {
            assert!(errors.contains(&"The provided timing value \"fast\" is invalid.".to_string()))
        }
        other => panic!("expected a registration error, got {:?}", other),
    }
}

#[test]
fn should_report_unknown_animations_on_create() {
    let (_, engine, el) = setup();
    match engine.create("missing", el, &AnimationOptions::default()) {
        Err(AnimationError::Create(errors)) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("missing"));
        }
        Err(other) => panic!("unexpected error {}", other),
        Ok(_) => panic!("expected create to fail"),
    }
}

#[test]
fn should_replace_the_player_of_a_recreated_id() {
    let (driver, engine, el) = setup();
    engine.register("grow", &grow()).unwrap();
    engine.create("grow", el, &AnimationOptions::default()).unwrap();
    engine.create("grow", el, &AnimationOptions::default()).unwrap();

    let players = driver.players();
    assert_eq!(players.len(), 2);
    assert!(players[0].is_destroyed());
    assert!(!players[1].is_destroyed());
    assert_eq!(engine.players().len(), 1);
}

#[test]
fn should_pass_params_to_created_animations() {
    let (driver, engine, el) = setup();
    engine
        .register("slide", &animate_with("{{ time }}", style([("left", "{{ to }}")])))
        .unwrap();
    engine
        .create(
            "slide",
            el,
            &AnimationOptions::with_params([("time", "250ms"), ("to", "40px")]),
        )
        .unwrap();
    let player = &driver.players()[0];
    assert_eq!(player.duration(), 250.0);
    assert_eq!(
        player.keyframes().last().unwrap().styles.get("left").map(String::as_str),
        Some("40px")
    );
}

#[test]
fn should_notify_listeners_when_the_player_finishes() {
    let (_, engine, el) = setup();
    engine.register("grow", &grow()).unwrap();
    engine.create("grow", el, &AnimationOptions::default()).unwrap();

    let phases = Rc::new(RefCell::new(Vec::new()));
    for phase in ["start", "done"] {
        let phases = phases.clone();
        engine
            .listen(
                "grow",
                el,
                phase,
                Rc::new(move |event: &AnimationEvent| phases.borrow_mut().push(event.phase_name.clone())),
            )
            .unwrap();
    }

    engine.command("grow", el, "play", &[]).unwrap();
    engine.command("grow", el, "finish", &[]).unwrap();
    assert_eq!(*phases.borrow(), vec!["start".to_string(), "done".to_string()]);
}

#[test]
fn should_validate_listeners() {
    let (_, engine, el) = setup();
    assert!(matches!(
        engine.listen("grow", el, "done", Rc::new(|_: &AnimationEvent| {})),
        Err(AnimationError::MissingPlayer(_))
    ));

    engine.register("grow", &grow()).unwrap();
    engine.create("grow", el, &AnimationOptions::default()).unwrap();
    assert!(matches!(
        engine.listen("grow", el, "later", Rc::new(|_: &AnimationEvent| {})),
        Err(AnimationError::UnsupportedPhase { .. })
    ));
}

#[test]
fn should_require_a_position_for_set_position() {
    let (driver, engine, el) = setup();
    engine.register("grow", &grow()).unwrap();
    engine.create("grow", el, &AnimationOptions::default()).unwrap();

    assert!(matches!(
        engine.command("grow", el, "setPosition", &[]),
        Err(AnimationError::MissingCommandArgument { .. })
    ));
    engine
        .command("grow", el, "setPosition", &[TimelineCommandArg::Position(0.5)])
        .unwrap();
    assert_eq!(driver.players()[0].get_position(), 0.5);
}

#[test]
fn should_register_through_commands() {
    let (driver, engine, el) = setup();
    engine
        .command("grow", el, "register", &[TimelineCommandArg::Metadata(grow())])
        .unwrap();
    engine.command("grow", el, "create", &[]).unwrap();
    assert_eq!(driver.players().len(), 1);

    engine.command("grow", el, "destroy", &[]).unwrap();
    assert!(driver.players()[0].is_destroyed());
    assert!(engine.players().is_empty());
}

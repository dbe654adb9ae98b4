//! Transition Engine Tests
//!
//! Namespace bookkeeping, queueing and flush behaviour of the transition
//! engine driven directly, without the engine surface.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use angular_animations::dsl::animation_trigger::{build_trigger, AnimationTrigger};
use angular_animations::dsl::ast_builder::build_trigger_ast;
use angular_animations::render::transition_engine::{
    RemovalContext, TransitionAnimationEngine, TriggerValue,
};
use angular_animations::testing::MockAnimationDriver;
use angular_animations::*;
use pretty_assertions::assert_eq;

const NS: &str = "ns1";

struct Fixture {
    driver: Rc<MockAnimationDriver>,
    engine: Rc<RefCell<TransitionAnimationEngine>>,
    host: ElementId,
    element: ElementId,
}

impl Fixture {
    /// Runs `f` on the engine, then the work its players deferred.
    fn with<T>(&self, f: impl FnOnce(&mut TransitionAnimationEngine) -> T) -> T {
        let result = f(&mut *self.engine.borrow_mut());
        let queue = self.engine.borrow().queue();
        queue.drain();
        result
    }
}

fn compile(driver: &MockAnimationDriver, metadata: &AnimationMetadata) -> Rc<AnimationTrigger> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let ast = build_trigger_ast(driver, metadata, &mut errors, &mut warnings);
    assert!(errors.is_empty(), "{:?}", errors);
    let name = ast.name.clone();
    Rc::new(build_trigger(&name, ast, Rc::new(NoopAnimationStyleNormalizer)))
}

fn setup(metadata: AnimationMetadata) -> Fixture {
    let driver = Rc::new(MockAnimationDriver::new());
    let engine = TransitionAnimationEngine::new(driver.clone(), Rc::new(NoopAnimationStyleNormalizer));
    let host = driver.create_element("app-root", driver.body());
    let element = driver.create_element("div", host);
    let trigger = compile(&driver, &metadata);
    let fixture = Fixture {
        driver,
        engine,
        host,
        element,
    };
    fixture
        .with(|engine| {
            engine.register(NS, host);
            let name = trigger.name.clone();
            engine.register_trigger(NS, &name, trigger)
        })
        .unwrap();
    fixture
}

fn fade() -> AnimationMetadata {
    trigger(
        "fade",
        vec![
            transition("* => *", animate_with(100, style([("opacity", "1")]))),
            transition(":leave", animate_with(100, style([("opacity", "0")]))),
        ],
    )
}

#[test]
fn should_tag_namespace_hosts() {
    let f = setup(fade());
    assert!(f.driver.has_class(f.host, "ng-tns-ns1"));
}

#[test]
fn should_queue_players_until_flush() {
    let f = setup(fade());
    let updated = f
        .with(|engine| engine.trigger(NS, f.element, "fade", TriggerValue::new("in")))
        .unwrap();
    assert!(updated);
    assert_eq!(f.with(|engine| engine.queued_players().len()), 1);
    assert!(f.with(|engine| engine.players().is_empty()));

    f.with(|engine| engine.flush()).unwrap();
    assert!(f.with(|engine| engine.queued_players().is_empty()));
    assert_eq!(f.with(|engine| engine.players().len()), 1);
    assert_eq!(f.driver.players().len(), 1);
}

#[test]
fn should_ignore_triggers_of_unknown_namespaces() {
    let f = setup(fade());
    let updated = f
        .with(|engine| engine.trigger("missing", f.element, "fade", TriggerValue::new("in")))
        .unwrap();
    assert!(!updated);
}

#[test]
fn should_reject_unregistered_trigger_names() {
    let f = setup(fade());
    let result = f.with(|engine| engine.trigger(NS, f.element, "slide", TriggerValue::new("in")));
    assert_eq!(result, Err(AnimationError::UnregisteredTrigger("slide".to_string())));
}

#[test]
fn should_not_queue_a_transition_for_an_unchanged_value() {
    let f = setup(fade());
    f.with(|engine| engine.trigger(NS, f.element, "fade", TriggerValue::new("in")))
        .unwrap();
    f.with(|engine| engine.flush()).unwrap();
    f.driver.players()[0].finish();

    f.with(|engine| engine.trigger(NS, f.element, "fade", TriggerValue::new("in")))
        .unwrap();
    assert!(f.with(|engine| engine.queued_players().is_empty()));
}

#[test]
fn should_replace_a_queued_player_for_the_same_trigger() {
    let f = setup(fade());
    f.with(|engine| engine.trigger(NS, f.element, "fade", TriggerValue::new("a")))
        .unwrap();
    f.with(|engine| engine.trigger(NS, f.element, "fade", TriggerValue::new("b")))
        .unwrap();
    assert_eq!(f.with(|engine| engine.queued_players().len()), 1);

    f.with(|engine| engine.flush()).unwrap();
    assert_eq!(f.driver.players().len(), 1);
}

#[test]
fn should_run_after_flush_callbacks_once() {
    let f = setup(fade());
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    f.with(|engine| engine.after_flush(move |_| counter.set(counter.get() + 1)));
    f.with(|engine| engine.flush()).unwrap();
    f.with(|engine| engine.flush()).unwrap();
    assert_eq!(calls.get(), 1);
}

#[test]
fn should_wait_for_players_before_running_quiet_callbacks() {
    let f = setup(fade());
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    f.with(|engine| {
        engine.after_flush_animations_done(move |_| counter.set(counter.get() + 1));
        engine.trigger(NS, f.element, "fade", TriggerValue::new("in"))
    })
    .unwrap();
    f.with(|engine| engine.flush()).unwrap();
    assert_eq!(calls.get(), 0);

    f.driver.players()[0].finish();
    assert_eq!(calls.get(), 1);
}

#[test]
fn should_toggle_the_disabled_class() {
    let f = setup(fade());
    f.with(|engine| engine.mark_element_as_disabled(f.element, true));
    assert!(f.driver.has_class(f.element, "ng-animate-disabled"));
    f.with(|engine| engine.mark_element_as_disabled(f.element, false));
    assert!(!f.driver.has_class(f.element, "ng-animate-disabled"));
}

#[test]
fn should_treat_a_reinsertion_before_flush_as_a_move() {
    let f = setup(fade());
    f.with(|engine| engine.trigger(NS, f.element, "fade", TriggerValue::new("in")))
        .unwrap();
    f.with(|engine| engine.flush()).unwrap();
    f.driver.players()[0].finish();
    f.driver.clear_log();

    f.with(|engine| engine.remove_node(NS, f.element, RemovalContext::default()))
        .unwrap();
    f.with(|engine| engine.insert_node(NS, f.element, f.host, true));
    f.with(|engine| engine.flush()).unwrap();

    assert!(f.driver.is_attached(f.element));
    assert!(f.driver.players().is_empty());

    // the element kept its previous value
    f.with(|engine| engine.trigger(NS, f.element, "fade", TriggerValue::new("in")))
        .unwrap();
    assert!(f.with(|engine| engine.queued_players().is_empty()));
}

#[test]
fn should_destroy_namespace_players_after_the_next_flush() {
    let f = setup(fade());
    f.with(|engine| engine.trigger(NS, f.element, "fade", TriggerValue::new("in")))
        .unwrap();
    f.with(|engine| engine.flush()).unwrap();
    let player = f.driver.players()[0].clone();

    f.with(|engine| engine.destroy(NS, RemovalContext::default()));
    assert!(!player.is_destroyed());
    f.with(|engine| engine.flush()).unwrap();
    assert!(player.is_destroyed());
    assert!(f.with(|engine| engine.players().is_empty()));

    // the namespace is gone
    let updated = f
        .with(|engine| engine.trigger(NS, f.element, "fade", TriggerValue::new("out")))
        .unwrap();
    assert!(!updated);
}

#[test]
fn should_skip_inner_leave_animations_when_a_plain_parent_is_removed() {
    let f = setup(fade());
    let removed = Rc::new(RefCell::new(Vec::new()));
    let log = removed.clone();
    let listener = move |element: ElementId, _: RemovalContext| log.borrow_mut().push(element);
    f.with(|engine| engine.set_removal_listener(Some(Rc::new(listener))));
    let container = f.driver.create_element("section", f.host);
    let child = f.driver.create_element("div", container);
    f.with(|engine| engine.trigger(NS, child, "fade", TriggerValue::new("in")))
        .unwrap();
    f.with(|engine| engine.flush()).unwrap();
    f.driver.players()[0].finish();
    f.driver.clear_log();

    // nothing above the container animates, so it goes right away and
    // takes the queued child leave animation with it
    f.with(|engine| engine.remove_node(NS, container, RemovalContext::default()))
        .unwrap();
    assert!(!f.driver.is_attached(container));
    assert_eq!(*removed.borrow(), vec![container]);

    f.with(|engine| engine.flush()).unwrap();
    assert!(f.driver.players().is_empty());
}

//! Animation Engine
//!
//! The surface a host renderer talks to. Trigger writes, DOM insertions and
//! removals and listener registrations go to the transition engine;
//! `@id:command` properties go to the timeline engine. Compiled triggers
//! are cached per component so every instance shares them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{trace, warn};

use crate::config::AnimationEngineConfig;
use crate::driver::{AnimationDriver, ElementId};
use crate::dsl::animation_trigger::{build_trigger, AnimationTrigger};
use crate::dsl::ast_builder::build_trigger_ast;
use crate::error::{AnimationError, Result};
use crate::metadata::AnimationMetadata;
use crate::normalizer::AnimationStyleNormalizer;
use crate::players::AnimationPlayer;
use crate::render::shared::{parse_timeline_command, AnimationEvent, ListenerCallback};
use crate::render::task_queue::TaskQueue;
use crate::render::timeline_engine::TimelineAnimationEngine;
use crate::render::transition_engine::TransitionAnimationEngine;

pub use crate::render::timeline_engine::TimelineCommandArg;
pub use crate::render::transition_engine::{RemovalContext, TriggerValue};

const DISABLE_ANIMATIONS_FLAG: &str = ".disabled";

/// Value written through `set_property`.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    /// New value of a trigger.
    Trigger(TriggerValue),
    /// Arguments of an `@id:command` write.
    Command(Vec<TimelineCommandArg>),
    /// Value of the `.disabled` flag.
    Flag(bool),
}

impl From<TriggerValue> for PropertyValue {
    fn from(value: TriggerValue) -> Self {
        PropertyValue::Trigger(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Trigger(value.into())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Flag(value)
    }
}

pub struct AnimationEngine {
    transition_engine: Rc<RefCell<TransitionAnimationEngine>>,
    queue: TaskQueue<TransitionAnimationEngine>,
    timeline_engine: TimelineAnimationEngine,
    driver: Rc<dyn AnimationDriver>,
    normalizer: Rc<dyn AnimationStyleNormalizer>,
    trigger_cache: RefCell<HashMap<String, Rc<AnimationTrigger>>>,
}

impl AnimationEngine {
    pub fn new(driver: Rc<dyn AnimationDriver>) -> Self {
        Self::with_config(driver, &AnimationEngineConfig::default())
    }

    pub fn with_config(driver: Rc<dyn AnimationDriver>, config: &AnimationEngineConfig) -> Self {
        let normalizer = config.style_normalizer.create();
        let transition_engine = TransitionAnimationEngine::new(driver.clone(), normalizer.clone());
        let queue = transition_engine.borrow().queue();
        let engine = AnimationEngine {
            timeline_engine: TimelineAnimationEngine::new(driver.clone(), normalizer.clone()),
            transition_engine,
            queue,
            driver,
            normalizer,
            trigger_cache: RefCell::new(HashMap::new()),
        };
        if config.disable_animations {
            if let Some(body) = engine.driver.get_body_node() {
                engine.disable_animations(body, true);
            }
        }
        engine
    }

    /// Runs `f` against the transition engine, then whatever work its
    /// players deferred while it was borrowed.
    fn with_engine<T>(&self, f: impl FnOnce(&mut TransitionAnimationEngine) -> T) -> T {
        let result = f(&mut *self.transition_engine.borrow_mut());
        self.queue.drain();
        result
    }

    /// Compiles `metadata` (once per component) and registers it on the
    /// namespace, creating the namespace on `host_element` if needed.
    pub fn register_trigger(
        &self,
        component_id: &str,
        namespace_id: &str,
        host_element: ElementId,
        name: &str,
        metadata: &AnimationMetadata,
    ) -> Result<()> {
        let cache_key = format!("{}-{}", component_id, name);
        let cached = self.trigger_cache.borrow().get(&cache_key).cloned();
        let trigger = match cached {
            Some(trigger) => trigger,
            None => {
                let mut errors = Vec::new();
                let mut warnings = Vec::new();
                let ast = build_trigger_ast(self.driver.as_ref(), metadata, &mut errors, &mut warnings);
                if !errors.is_empty() {
                    return Err(AnimationError::TriggerBuild {
                        name: name.to_string(),
                        errors,
                    });
                }
                for warning in &warnings {
                    warn!("the animation trigger \"{}\" is built with warnings: {}", name, warning);
                }
                let trigger = Rc::new(build_trigger(name, ast, self.normalizer.clone()));
                trace!("compiled trigger {}", cache_key);
                self.trigger_cache
                    .borrow_mut()
                    .insert(cache_key, trigger.clone());
                trigger
            }
        };
        self.with_engine(|engine| {
            engine.register(namespace_id, host_element);
            engine.register_trigger(namespace_id, name, trigger)
        })
    }

    pub fn register(&self, namespace_id: &str, host_element: ElementId) {
        self.with_engine(|engine| engine.register(namespace_id, host_element));
    }

    pub fn destroy(&self, namespace_id: &str, context: RemovalContext) {
        self.with_engine(|engine| engine.destroy(namespace_id, context));
    }

    pub fn on_insert(&self, namespace_id: &str, element: ElementId, parent: ElementId, insert_before: bool) {
        self.with_engine(|engine| engine.insert_node(namespace_id, element, parent, insert_before));
    }

    pub fn on_remove(&self, namespace_id: &str, element: ElementId, context: RemovalContext) -> Result<()> {
        self.with_engine(|engine| engine.remove_node(namespace_id, element, context))
    }

    pub fn disable_animations(&self, element: ElementId, disable: bool) {
        self.with_engine(|engine| engine.mark_element_as_disabled(element, disable));
    }

    /// Writes an animation property. `.disabled` toggles animations on the
    /// element subtree, `@id:command` controls a timeline animation and any
    /// other name is a trigger. Returns whether a trigger was updated.
    pub fn set_property(
        &self,
        namespace_id: &str,
        element: ElementId,
        property: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<bool> {
        let value = value.into();
        if property == DISABLE_ANIMATIONS_FLAG || property.strip_prefix('@') == Some(DISABLE_ANIMATIONS_FLAG) {
            let disable = match value {
                PropertyValue::Flag(flag) => flag,
                PropertyValue::Trigger(v) => !matches!(v.value.as_str(), "" | "0" | "false"),
                PropertyValue::Command(_) => true,
            };
            self.disable_animations(element, disable);
            return Ok(false);
        }

        if property.starts_with('@') {
            let (id, action) = parse_timeline_command(property)
                .ok_or_else(|| AnimationError::UnknownCommand(property.to_string()))?;
            let args = match value {
                PropertyValue::Command(args) => args,
                _ => Vec::new(),
            };
            self.timeline_engine.command(id, element, action, &args)?;
            self.queue.drain();
            return Ok(false);
        }

        let value = match value {
            PropertyValue::Trigger(value) => value,
            PropertyValue::Flag(flag) => TriggerValue::from(flag),
            PropertyValue::Command(_) => TriggerValue::default(),
        };
        self.with_engine(|engine| engine.trigger(namespace_id, element, property, value))
    }

    /// Registers `callback` for `phase` of `event_name`, which is a trigger
    /// name or an `@id` timeline animation. The returned closure removes
    /// the listener.
    pub fn listen(
        &self,
        namespace_id: &str,
        element: ElementId,
        event_name: &str,
        phase: &str,
        callback: impl Fn(&AnimationEvent) + 'static,
    ) -> Result<Box<dyn FnOnce()>> {
        let callback: ListenerCallback = Rc::new(callback);
        if let Some(id) = event_name.strip_prefix('@') {
            // `@id:phase` or `@id` with the phase given separately
            let (id, action) = parse_timeline_command(event_name).unwrap_or((id, phase));
            let action = if action.is_empty() { phase } else { action };
            return self.timeline_engine.listen(id, element, action, callback);
        }
        self.with_engine(|engine| engine.listen(namespace_id, element, event_name, phase, callback))
    }

    /// Turns everything queued since the previous flush into players.
    pub fn flush(&self) -> Result<()> {
        self.with_engine(|engine| engine.flush())
    }

    /// Running transition players followed by timeline players.
    pub fn players(&self) -> Vec<Rc<dyn AnimationPlayer>> {
        let mut players: Vec<Rc<dyn AnimationPlayer>> = self
            .transition_engine
            .borrow()
            .players()
            .into_iter()
            .map(|p| p as Rc<dyn AnimationPlayer>)
            .collect();
        players.extend(self.timeline_engine.players());
        players
    }

    /// Calls `callback` once the currently running transitions are done.
    pub fn when_rendering_done(&self, callback: impl FnOnce() + 'static) {
        self.with_engine(|engine| engine.when_rendering_done(Box::new(callback)));
    }

    pub fn after_flush_animations_done(&self, callback: impl FnOnce() + 'static) {
        let queue = self.queue.clone();
        self.with_engine(|engine| {
            engine.after_flush_animations_done(move |_| queue.schedule_callback(callback))
        });
    }

    /// Called with every element the engine detached once its leave
    /// animations are over.
    pub fn set_removal_listener(&self, listener: impl Fn(ElementId, RemovalContext) + 'static) {
        self.with_engine(|engine| engine.set_removal_listener(Some(Rc::new(listener))));
    }
}

//! Transition Animation Engine
//!
//! Tracks trigger state per element, queues the transitions that state
//! changes cause, and turns the whole queue into real players on `flush`.
//!
//! Each component instance owns a namespace holding its triggers, queued
//! transitions and listeners. Namespaces are kept ordered top-down by host
//! element so that a flush can build parent animations after the child
//! animations they query.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use indexmap::{IndexMap, IndexSet};
use log::{debug, trace};

use crate::driver::{is_element_attached, AnimationDriver, ElementId};
use crate::dsl::animation_trigger::AnimationTrigger;
use crate::dsl::element_instruction_map::ElementInstructionMap;
use crate::dsl::timeline_instruction::{AnimationTimelineInstruction, Keyframe};
use crate::dsl::transition_factory::{
    AnimationTransitionFactory, AnimationTransitionInstruction, VOID_VALUE,
};
use crate::error::{AnimationError, Result};
use crate::metadata::{AnimationOptions, AnimationParams};
use crate::normalizer::AnimationStyleNormalizer;
use crate::players::{
    flatten_group_players, optimize_group_player, AnimationPlayer, NoopAnimationPlayer,
    PlayerPhase,
};
use crate::render::shared::{
    keyframe_normalization_errors, listen_on_player, make_animation_event, normalize_keyframes,
    Dispatch, ListenerCallback,
};
use crate::render::task_queue::TaskQueue;
use crate::render::transition_player::TransitionAnimationPlayer;
use crate::style::{copy_styles, erase_styles, set_styles, StyleMap, AUTO_STYLE, PRE_STYLE};
use crate::util::{
    ENTER_CLASSNAME, LEAVE_CLASSNAME, NG_ANIMATING_CLASSNAME, NG_ANIMATING_SELECTOR,
    NG_TRIGGER_CLASSNAME, NG_TRIGGER_SELECTOR,
};

pub const QUEUED_CLASSNAME: &str = "ng-animate-queued";
pub const QUEUED_SELECTOR: &str = ".ng-animate-queued";
pub const DISABLED_CLASSNAME: &str = "ng-animate-disabled";
pub const DISABLED_SELECTOR: &str = ".ng-animate-disabled";
pub const STAR_CLASSNAME: &str = "ng-star-inserted";
pub const STAR_SELECTOR: &str = ".ng-star-inserted";
const ALL_DESCENDANTS_SELECTOR: &str = "*";

type EngineTask = Box<dyn FnOnce(&mut TransitionAnimationEngine)>;

/// Called once an element has been detached after its leave animations.
pub type RemovalListener = Rc<dyn Fn(ElementId, RemovalContext)>;

/// Value bound to a trigger, optionally with params for its transitions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TriggerValue {
    pub value: String,
    pub params: Option<AnimationParams>,
}

impl TriggerValue {
    pub fn new(value: impl Into<String>) -> Self {
        TriggerValue {
            value: value.into(),
            params: None,
        }
    }

    pub fn with_params(value: impl Into<String>, params: AnimationParams) -> Self {
        TriggerValue {
            value: value.into(),
            params: Some(params),
        }
    }
}

impl From<&str> for TriggerValue {
    fn from(value: &str) -> Self {
        TriggerValue::new(value)
    }
}

impl From<String> for TriggerValue {
    fn from(value: String) -> Self {
        TriggerValue::new(value)
    }
}

impl From<bool> for TriggerValue {
    fn from(value: bool) -> Self {
        TriggerValue::new(if value { "1" } else { "0" })
    }
}

impl From<i32> for TriggerValue {
    fn from(value: i32) -> Self {
        TriggerValue::new(value.to_string())
    }
}

/// Host-provided details about a removal, handed back on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemovalContext {
    pub is_host_element: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct StateValue {
    value: String,
    params: AnimationParams,
    has_options: bool,
    namespace_id: String,
}

impl StateValue {
    fn new(input: TriggerValue, namespace_id: &str) -> Self {
        StateValue {
            value: input.value,
            has_options: input.params.is_some(),
            params: input.params.unwrap_or_default(),
            namespace_id: namespace_id.to_string(),
        }
    }

    fn void() -> Self {
        StateValue::new(TriggerValue::new(VOID_VALUE), "")
    }

    /// Fills params this value does not set from `params`.
    fn absorb_options(&mut self, params: &AnimationParams) {
        for (key, value) in params {
            self.params
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    fn options(&self) -> AnimationOptions {
        AnimationOptions {
            params: Some(self.params.clone()),
            ..Default::default()
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct RemovalFlags: u8 {
        const SET_FOR_MOVE = 1 << 0;
        const HAS_ANIMATION = 1 << 1;
        const REMOVED_BEFORE_QUERIED = 1 << 2;
    }
}

/// Removal bookkeeping for one element. The all-empty value marks an
/// element whose removal already completed.
#[derive(Debug, Clone, Default)]
struct RemovalState {
    namespace_id: String,
    set_for_removal: Option<RemovalContext>,
    flags: RemovalFlags,
    previous_triggers_values: Option<IndexMap<String, String>>,
}

impl RemovalState {
    fn null() -> Self {
        RemovalState::default()
    }

    fn removed_before_queried() -> Self {
        RemovalState {
            flags: RemovalFlags::REMOVED_BEFORE_QUERIED,
            ..Default::default()
        }
    }

    fn is_null(&self) -> bool {
        self.namespace_id.is_empty()
            && self.set_for_removal.is_none()
            && self.flags.is_empty()
            && self.previous_triggers_values.is_none()
    }
}

struct TriggerListener {
    id: u64,
    name: String,
    phase: PlayerPhase,
    callback: ListenerCallback,
}

struct QueueInstruction {
    element: ElementId,
    trigger_name: String,
    transition: Rc<AnimationTransitionFactory>,
    from_state: StateValue,
    to_state: StateValue,
    player: Rc<TransitionAnimationPlayer>,
    is_fallback_transition: bool,
}

struct QueuedTransition {
    element: ElementId,
    player: Rc<TransitionAnimationPlayer>,
    instruction: AnimationTransitionInstruction,
}

struct AnimationTransitionNamespace {
    id: String,
    host_element: ElementId,
    host_class_name: String,
    players: Vec<Rc<TransitionAnimationPlayer>>,
    triggers: IndexMap<String, Rc<AnimationTrigger>>,
    queue: Vec<QueueInstruction>,
    element_listeners: IndexMap<ElementId, Vec<TriggerListener>>,
}

impl AnimationTransitionNamespace {
    fn new(id: &str, host_element: ElementId) -> Self {
        AnimationTransitionNamespace {
            id: id.to_string(),
            host_element,
            host_class_name: format!("ng-tns-{}", id),
            players: Vec::new(),
            triggers: IndexMap::new(),
            queue: Vec::new(),
            element_listeners: IndexMap::new(),
        }
    }
}

/// Enter/leave bookkeeping a flush must undo however it ends.
#[derive(Default)]
struct FlushCleanup {
    enter_node_map: IndexMap<ElementId, Vec<ElementId>>,
    enter_class_names: HashMap<ElementId, String>,
    leave_node_map: IndexMap<ElementId, Vec<ElementId>>,
    leave_class_names: HashMap<ElementId, String>,
    all_leave_nodes: Vec<ElementId>,
}

pub struct TransitionAnimationEngine {
    driver: Rc<dyn AnimationDriver>,
    normalizer: Rc<dyn AnimationStyleNormalizer>,
    body_node: Option<ElementId>,
    queue: TaskQueue<TransitionAnimationEngine>,
    players: Vec<Rc<TransitionAnimationPlayer>>,
    new_host_elements: IndexMap<ElementId, String>,
    players_by_element: HashMap<ElementId, Vec<Rc<TransitionAnimationPlayer>>>,
    players_by_queried_element: HashMap<ElementId, Vec<Rc<TransitionAnimationPlayer>>>,
    states_by_element: IndexMap<ElementId, IndexMap<String, StateValue>>,
    disabled_nodes: IndexSet<ElementId>,
    total_animations: usize,
    total_queued_players: usize,
    namespace_lookup: HashMap<String, AnimationTransitionNamespace>,
    namespace_list: Vec<String>,
    namespaces_by_host_element: HashMap<ElementId, String>,
    flush_fns: Vec<EngineTask>,
    when_quiet_fns: Vec<EngineTask>,
    collected_enter_elements: Vec<ElementId>,
    collected_leave_elements: Vec<ElementId>,
    removal_states: HashMap<ElementId, RemovalState>,
    removal_listener: Option<RemovalListener>,
    next_listener_id: u64,
}

impl TransitionAnimationEngine {
    pub fn new(
        driver: Rc<dyn AnimationDriver>,
        normalizer: Rc<dyn AnimationStyleNormalizer>,
    ) -> Rc<RefCell<Self>> {
        Rc::new_cyclic(|me: &Weak<RefCell<Self>>| {
            let body_node = driver.get_body_node();
            RefCell::new(TransitionAnimationEngine {
                driver,
                normalizer,
                body_node,
                queue: TaskQueue::new(me.clone()),
                players: Vec::new(),
                new_host_elements: IndexMap::new(),
                players_by_element: HashMap::new(),
                players_by_queried_element: HashMap::new(),
                states_by_element: IndexMap::new(),
                disabled_nodes: IndexSet::new(),
                total_animations: 0,
                total_queued_players: 0,
                namespace_lookup: HashMap::new(),
                namespace_list: Vec::new(),
                namespaces_by_host_element: HashMap::new(),
                flush_fns: Vec::new(),
                when_quiet_fns: Vec::new(),
                collected_enter_elements: Vec::new(),
                collected_leave_elements: Vec::new(),
                removal_states: HashMap::new(),
                removal_listener: None,
                next_listener_id: 0,
            })
        })
    }

    pub fn queue(&self) -> TaskQueue<TransitionAnimationEngine> {
        self.queue.clone()
    }

    fn dispatch(&self) -> Dispatch {
        let queue = self.queue.clone();
        Rc::new(move |callback: Box<dyn FnOnce()>| queue.schedule_callback(callback))
    }

    /// Root players currently running.
    pub fn players(&self) -> Vec<Rc<TransitionAnimationPlayer>> {
        self.players.clone()
    }

    /// Players waiting for the next flush, across all namespaces.
    pub fn queued_players(&self) -> Vec<Rc<TransitionAnimationPlayer>> {
        self.namespace_list
            .iter()
            .filter_map(|id| self.namespace_lookup.get(id))
            .flat_map(|ns| ns.players.iter())
            .filter(|p| p.queued())
            .cloned()
            .collect()
    }

    pub fn set_removal_listener(&mut self, listener: Option<RemovalListener>) {
        self.removal_listener = listener;
    }

    pub fn after_flush(&mut self, callback: impl FnOnce(&mut TransitionAnimationEngine) + 'static) {
        self.flush_fns.push(Box::new(callback));
    }

    /// Runs `callback` once every player started by the next flush is done.
    pub fn after_flush_animations_done(
        &mut self,
        callback: impl FnOnce(&mut TransitionAnimationEngine) + 'static,
    ) {
        self.when_quiet_fns.push(Box::new(callback));
    }

    // ---------------------------------------------------------------
    // namespaces
    // ---------------------------------------------------------------

    fn create_namespace(&mut self, namespace_id: &str, host_element: ElementId) {
        let ns = AnimationTransitionNamespace::new(namespace_id, host_element);
        self.driver.add_class(host_element, &ns.host_class_name);
        self.namespace_lookup.insert(namespace_id.to_string(), ns);

        if is_element_attached(self.driver.as_ref(), host_element) {
            self.balance_namespace_list(namespace_id, host_element);
        } else {
            // placed once the host is inserted and the next flush runs
            self.new_host_elements
                .insert(host_element, namespace_id.to_string());
            self.collect_enter_element(host_element);
        }
    }

    /// Inserts the namespace right after its closest ancestor namespace so
    /// the list stays ordered top-down.
    fn balance_namespace_list(&mut self, namespace_id: &str, host_element: ElementId) {
        if self.namespace_list.is_empty() {
            self.namespace_list.push(namespace_id.to_string());
        } else {
            let mut index = 0;
            let mut ancestor = self.driver.get_parent_element(host_element);
            while let Some(current) = ancestor {
                if let Some(ancestor_ns) = self.namespaces_by_host_element.get(&current) {
                    index = self
                        .namespace_list
                        .iter()
                        .position(|id| id == ancestor_ns)
                        .map_or(0, |i| i + 1);
                    break;
                }
                ancestor = self.driver.get_parent_element(current);
            }
            self.namespace_list.insert(index, namespace_id.to_string());
        }
        self.namespaces_by_host_element
            .insert(host_element, namespace_id.to_string());
    }

    pub fn register(&mut self, namespace_id: &str, host_element: ElementId) {
        if !self.namespace_lookup.contains_key(namespace_id) {
            trace!("creating animation namespace {} on {}", namespace_id, host_element);
            self.create_namespace(namespace_id, host_element);
        }
    }

    pub fn register_trigger(
        &mut self,
        namespace_id: &str,
        name: &str,
        trigger: Rc<AnimationTrigger>,
    ) -> Result<()> {
        let Some(ns) = self.namespace_lookup.get_mut(namespace_id) else {
            return Ok(());
        };
        if ns.triggers.contains_key(name) {
            return Err(AnimationError::DuplicateTrigger(name.to_string()));
        }
        ns.triggers.insert(name.to_string(), trigger);
        self.total_animations += 1;
        Ok(())
    }

    /// Tears the namespace down once the animations of the next flush end.
    pub fn destroy(&mut self, namespace_id: &str, context: RemovalContext) {
        if namespace_id.is_empty() {
            return;
        }
        let namespace_id = namespace_id.to_string();
        self.after_flush_animations_done(move |engine| {
            let Some(ns) = engine.namespace_lookup.get(&namespace_id) else {
                return;
            };
            let host = ns.host_element;
            let players = ns.players.clone();
            engine.namespaces_by_host_element.remove(&host);
            engine.namespace_list.retain(|id| *id != namespace_id);
            for player in players {
                player.destroy();
            }
            // leave triggers that cannot be matched are ignored here
            let _ = engine.signal_removal_for_inner_triggers(&namespace_id, host, context);
            engine.namespace_lookup.remove(&namespace_id);
        });
    }

    fn fetch_namespaces_by_element(&self, element: ElementId) -> IndexSet<String> {
        let mut namespaces = IndexSet::new();
        if let Some(states) = self.states_by_element.get(&element) {
            for state in states.values() {
                if !state.namespace_id.is_empty()
                    && self.namespace_lookup.contains_key(&state.namespace_id)
                {
                    namespaces.insert(state.namespace_id.clone());
                }
            }
        }
        namespaces
    }

    // ---------------------------------------------------------------
    // triggers
    // ---------------------------------------------------------------

    pub fn trigger(
        &mut self,
        namespace_id: &str,
        element: ElementId,
        name: &str,
        value: TriggerValue,
    ) -> Result<bool> {
        if !self.namespace_lookup.contains_key(namespace_id) {
            return Ok(false);
        }
        self.namespace_trigger(namespace_id, element, name, value, true)?;
        Ok(true)
    }

    fn namespace_trigger(
        &mut self,
        namespace_id: &str,
        element: ElementId,
        trigger_name: &str,
        value: TriggerValue,
        default_to_fallback: bool,
    ) -> Result<Option<Rc<TransitionAnimationPlayer>>> {
        let trigger = self
            .namespace_lookup
            .get(namespace_id)
            .and_then(|ns| ns.triggers.get(trigger_name))
            .cloned()
            .ok_or_else(|| AnimationError::UnregisteredTrigger(trigger_name.to_string()))?;
        let player = Rc::new(TransitionAnimationPlayer::new(
            namespace_id,
            trigger_name,
            element,
        ));

        if !self.states_by_element.contains_key(&element) {
            self.driver.add_class(element, NG_TRIGGER_CLASSNAME);
            self.driver
                .add_class(element, &format!("{}-{}", NG_TRIGGER_CLASSNAME, trigger_name));
            self.states_by_element.insert(element, IndexMap::new());
        }
        let states = self.states_by_element.entry(element).or_default();

        let previous_state = states.get(trigger_name).cloned();
        let mut to_state = StateValue::new(value, namespace_id);
        if !to_state.has_options {
            if let Some(previous) = &previous_state {
                to_state.absorb_options(&previous.params);
            }
        }
        states.insert(trigger_name.to_string(), to_state.clone());
        let from_state = previous_state.unwrap_or_else(StateValue::void);

        let is_removal = to_state.value == VOID_VALUE;
        if !is_removal && from_state.value == to_state.value {
            // same value: only changed params need their styles re-applied
            if from_state.params != to_state.params {
                let mut errors = Vec::new();
                let from_styles = trigger.match_styles(&from_state.value, &from_state.params, &mut errors);
                let to_styles = trigger.match_styles(&to_state.value, &to_state.params, &mut errors);
                if !errors.is_empty() {
                    return Err(AnimationError::Flush {
                        errors: vec![(trigger_name.to_string(), errors)],
                    });
                }
                let driver = self.driver.clone();
                self.after_flush(move |_| {
                    erase_styles(driver.as_ref(), element, &from_styles);
                    set_styles(driver.as_ref(), element, &to_styles, None);
                });
            }
            return Ok(None);
        }

        let stale: Vec<Rc<TransitionAnimationPlayer>> = self
            .players_by_element
            .get(&element)
            .map(|players| {
                players
                    .iter()
                    .filter(|p| {
                        p.namespace_id == namespace_id && p.trigger_name == trigger_name && p.queued()
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        for previous in stale {
            previous.destroy();
        }

        let (transition, is_fallback_transition) = match trigger.match_transition(
            &from_state.value,
            &to_state.value,
            Some(element),
            &to_state.params,
        ) {
            Some(transition) => (transition.clone(), false),
            None if default_to_fallback => (trigger.fallback_transition.clone(), true),
            None => return Ok(None),
        };

        trace!(
            "queued @{} {} => {} on {}{}",
            trigger_name,
            from_state.value,
            to_state.value,
            element,
            if is_fallback_transition { " (fallback)" } else { "" }
        );

        self.total_queued_players += 1;

        if !is_fallback_transition {
            self.driver.add_class(element, QUEUED_CLASSNAME);
            let driver = self.driver.clone();
            player.on_start(Box::new(move || driver.remove_class(element, QUEUED_CLASSNAME)));
        }

        let weak = Rc::downgrade(&player);
        let queue = self.queue.clone();
        let ns_id = namespace_id.to_string();
        player.on_done(Box::new(move || {
            queue.schedule_state(move |engine| engine.forget_player(&ns_id, element, &weak));
        }));

        if let Some(ns) = self.namespace_lookup.get_mut(namespace_id) {
            ns.queue.push(QueueInstruction {
                element,
                trigger_name: trigger_name.to_string(),
                transition,
                from_state,
                to_state,
                player: player.clone(),
                is_fallback_transition,
            });
            ns.players.push(player.clone());
        }
        self.players_by_element
            .entry(element)
            .or_default()
            .push(player.clone());

        Ok(Some(player))
    }

    fn forget_player(&mut self, namespace_id: &str, element: ElementId, player: &Weak<TransitionAnimationPlayer>) {
        let same = |p: &Rc<TransitionAnimationPlayer>| std::ptr::eq(Rc::as_ptr(p), player.as_ptr());
        if let Some(ns) = self.namespace_lookup.get_mut(namespace_id) {
            ns.players.retain(|p| !same(p));
        }
        if let Some(players) = self.players_by_element.get_mut(&element) {
            players.retain(|p| !same(p));
        }
    }

    fn forget_queried_player(&mut self, element: ElementId, player: &Weak<TransitionAnimationPlayer>) {
        if let Some(players) = self.players_by_queried_element.get_mut(&element) {
            players.retain(|p| !std::ptr::eq(Rc::as_ptr(p), player.as_ptr()));
            if players.is_empty() {
                self.players_by_queried_element.remove(&element);
            }
        }
    }

    // ---------------------------------------------------------------
    // listeners
    // ---------------------------------------------------------------

    /// Registers `callback` for `phase` of trigger `name` on `element`.
    /// The returned closure unregisters it after the next flush.
    pub fn listen(
        &mut self,
        namespace_id: &str,
        element: ElementId,
        name: &str,
        phase: &str,
        callback: ListenerCallback,
    ) -> Result<Box<dyn FnOnce()>> {
        let has_trigger = self
            .namespace_lookup
            .get(namespace_id)
            .map_or(false, |ns| ns.triggers.contains_key(name));
        if !has_trigger {
            return Err(AnimationError::MissingTrigger {
                phase: phase.to_string(),
                name: name.to_string(),
            });
        }
        if phase.is_empty() {
            return Err(AnimationError::MissingEventPhase {
                name: name.to_string(),
            });
        }
        let phase_kind = match PlayerPhase::parse(phase) {
            Some(p @ (PlayerPhase::Start | PlayerPhase::Done)) => p,
            _ => {
                return Err(AnimationError::UnsupportedPhase {
                    phase: phase.to_string(),
                    name: name.to_string(),
                })
            }
        };

        let id = self.next_listener_id;
        self.next_listener_id += 1;
        if let Some(ns) = self.namespace_lookup.get_mut(namespace_id) {
            ns.element_listeners
                .entry(element)
                .or_default()
                .push(TriggerListener {
                    id,
                    name: name.to_string(),
                    phase: phase_kind,
                    callback,
                });
        }

        let states = self.states_by_element.entry(element).or_default();
        if !states.contains_key(name) {
            self.driver.add_class(element, NG_TRIGGER_CLASSNAME);
            self.driver
                .add_class(element, &format!("{}-{}", NG_TRIGGER_CLASSNAME, name));
            states.insert(name.to_string(), StateValue::void());
        }

        let queue = self.queue.clone();
        let ns_id = namespace_id.to_string();
        let name = name.to_string();
        Ok(Box::new(move || {
            // removed after the flush so leave callbacks can still fire
            queue.schedule_state(move |engine| {
                engine.after_flush(move |engine| engine.remove_listener(&ns_id, element, id, &name));
            });
        }))
    }

    fn remove_listener(&mut self, namespace_id: &str, element: ElementId, id: u64, name: &str) {
        let Some(ns) = self.namespace_lookup.get_mut(namespace_id) else {
            return;
        };
        if let Some(listeners) = ns.element_listeners.get_mut(&element) {
            listeners.retain(|l| l.id != id);
        }
        if !ns.triggers.contains_key(name) {
            if let Some(states) = self.states_by_element.get_mut(&element) {
                states.shift_remove(name);
            }
        }
    }

    // ---------------------------------------------------------------
    // insertion and removal
    // ---------------------------------------------------------------

    /// `insert_before` marks the element as entering.
    pub fn insert_node(
        &mut self,
        namespace_id: &str,
        element: ElementId,
        _parent: ElementId,
        insert_before: bool,
    ) {
        // a removed element inserted again is a move, not a removal
        if let Some(details) = self.removal_states.get_mut(&element) {
            if details.set_for_removal.is_some() {
                details.set_for_removal = None;
                details.flags.insert(RemovalFlags::SET_FOR_MOVE);
                self.collected_leave_elements.retain(|e| *e != element);
            }
        }

        if !namespace_id.is_empty() {
            if let Some(ns) = self.namespace_lookup.get(namespace_id) {
                self.driver.add_class(element, &ns.host_class_name);
            }
        }

        if insert_before {
            self.collect_enter_element(element);
        }
    }

    pub fn collect_enter_element(&mut self, element: ElementId) {
        if !self.collected_enter_elements.contains(&element) {
            self.collected_enter_elements.push(element);
        }
    }

    pub fn mark_element_as_disabled(&mut self, element: ElementId, value: bool) {
        if value {
            if self.disabled_nodes.insert(element) {
                self.driver.add_class(element, DISABLED_CLASSNAME);
            }
        } else if self.disabled_nodes.shift_remove(&element) {
            self.driver.remove_class(element, DISABLED_CLASSNAME);
        }
    }

    pub fn remove_node(
        &mut self,
        namespace_id: &str,
        element: ElementId,
        context: RemovalContext,
    ) -> Result<()> {
        if !namespace_id.is_empty() && self.namespace_lookup.contains_key(namespace_id) {
            self.namespace_remove_node(namespace_id, element, context)?;
        } else {
            self.mark_element_as_removed(namespace_id, element, false, context, None);
        }

        if let Some(host_ns) = self.namespaces_by_host_element.get(&element).cloned() {
            if host_ns != namespace_id {
                self.namespace_remove_node(&host_ns, element, context)?;
            }
        }
        Ok(())
    }

    fn mark_element_as_removed(
        &mut self,
        namespace_id: &str,
        element: ElementId,
        has_animation: bool,
        context: RemovalContext,
        previous_triggers_values: Option<IndexMap<String, String>>,
    ) {
        debug!("deferring removal of {} until flush", element);
        self.collected_leave_elements.push(element);
        let mut flags = RemovalFlags::empty();
        flags.set(RemovalFlags::HAS_ANIMATION, has_animation);
        self.removal_states.insert(
            element,
            RemovalState {
                namespace_id: namespace_id.to_string(),
                set_for_removal: Some(context),
                flags,
                previous_triggers_values,
            },
        );
    }

    fn namespace_remove_node(
        &mut self,
        namespace_id: &str,
        element: ElementId,
        context: RemovalContext,
    ) -> Result<()> {
        self.signal_removal_for_inner_triggers(namespace_id, element, context)?;

        // a declared `* => void` transition owns the removal from here
        if self.trigger_leave_animation(namespace_id, element, context, true, false)? {
            return Ok(());
        }

        let mut contains_potential_parent_transition = false;
        if self.total_animations > 0 {
            let queried = if self.players.is_empty() {
                0
            } else {
                self.players_by_queried_element
                    .get(&element)
                    .map_or(0, Vec::len)
            };
            if queried > 0 {
                contains_potential_parent_transition = true;
            } else {
                let mut parent = self.driver.get_parent_element(element);
                while let Some(current) = parent {
                    if self.states_by_element.contains_key(&current) {
                        contains_potential_parent_transition = true;
                        break;
                    }
                    parent = self.driver.get_parent_element(current);
                }
            }
        }

        // the element's listeners must fire whenever it does get removed
        self.prepare_leave_animation_listeners(namespace_id, element);

        if contains_potential_parent_transition {
            self.mark_element_as_removed(namespace_id, element, false, context, None);
        } else {
            let is_unmarked = self
                .removal_states
                .get(&element)
                .map_or(true, RemovalState::is_null);
            if is_unmarked {
                let ns_id = namespace_id.to_string();
                self.after_flush(move |engine| engine.clear_element_cache(&ns_id, element));
                self.destroy_inner_animations(element);
                self.on_removal_complete(element, context);
            }
        }
        Ok(())
    }

    /// Emulates a leave animation for every trigger-bearing element below
    /// `root`.
    fn signal_removal_for_inner_triggers(
        &mut self,
        namespace_id: &str,
        root: ElementId,
        context: RemovalContext,
    ) -> Result<()> {
        let elements = self.driver.query(root, NG_TRIGGER_SELECTOR, true);
        for &element in &elements {
            // an inner removal already kicked off for this element
            if self.removal_states.contains_key(&element) {
                continue;
            }
            let namespaces = self.fetch_namespaces_by_element(element);
            if namespaces.is_empty() {
                self.clear_element_cache(namespace_id, element);
            } else {
                for ns in namespaces {
                    self.trigger_leave_animation(&ns, element, context, false, true)?;
                }
            }
        }

        let ns_id = namespace_id.to_string();
        self.after_flush_animations_done(move |engine| {
            for element in elements {
                engine.clear_element_cache(&ns_id, element);
            }
        });
        Ok(())
    }

    fn trigger_leave_animation(
        &mut self,
        namespace_id: &str,
        element: ElementId,
        context: RemovalContext,
        destroy_after_complete: bool,
        default_to_fallback: bool,
    ) -> Result<bool> {
        let Some(trigger_states) = self.states_by_element.get(&element).cloned() else {
            return Ok(false);
        };

        let mut previous_triggers_values = IndexMap::new();
        let mut players: Vec<Rc<dyn AnimationPlayer>> = Vec::new();
        for (trigger_name, state) in trigger_states {
            previous_triggers_values.insert(trigger_name.clone(), state.value.clone());
            // the element may be removed on both the host and component level
            let registered = self
                .namespace_lookup
                .get(namespace_id)
                .map_or(false, |ns| ns.triggers.contains_key(&trigger_name));
            if registered {
                let player = self.namespace_trigger(
                    namespace_id,
                    element,
                    &trigger_name,
                    TriggerValue::new(VOID_VALUE),
                    default_to_fallback,
                )?;
                if let Some(player) = player {
                    players.push(player);
                }
            }
        }

        if players.is_empty() {
            return Ok(false);
        }

        self.mark_element_as_removed(
            namespace_id,
            element,
            true,
            context,
            Some(previous_triggers_values),
        );
        if destroy_after_complete {
            let queue = self.queue.clone();
            optimize_group_player(players).on_done(Box::new(move || {
                queue.schedule_state(move |engine| engine.process_leave_node(element));
            }));
        }
        Ok(true)
    }

    /// Queues fallback leave transitions so `listen` callbacks on the
    /// element fire once it is actually removed.
    fn prepare_leave_animation_listeners(&mut self, namespace_id: &str, element: ElementId) {
        let Some(element_states) = self.states_by_element.get(&element) else {
            return;
        };
        let Some(ns) = self.namespace_lookup.get_mut(namespace_id) else {
            return;
        };
        let Some(listeners) = ns.element_listeners.get(&element) else {
            return;
        };

        let mut visited = HashSet::new();
        let mut entries = Vec::new();
        for listener in listeners {
            if !visited.insert(listener.name.clone()) {
                continue;
            }
            let Some(trigger) = ns.triggers.get(&listener.name) else {
                continue;
            };
            let from_state = element_states
                .get(&listener.name)
                .cloned()
                .unwrap_or_else(StateValue::void);
            entries.push(QueueInstruction {
                element,
                trigger_name: listener.name.clone(),
                transition: trigger.fallback_transition.clone(),
                from_state,
                to_state: StateValue::void(),
                player: Rc::new(TransitionAnimationPlayer::new(
                    namespace_id,
                    &listener.name,
                    element,
                )),
                is_fallback_transition: true,
            });
        }
        self.total_queued_players += entries.len();
        ns.queue.extend(entries);
    }

    fn clear_element_cache(&mut self, namespace_id: &str, element: ElementId) {
        self.states_by_element.shift_remove(&element);
        if let Some(ns) = self.namespace_lookup.get_mut(namespace_id) {
            ns.element_listeners.shift_remove(&element);
        }
        if let Some(players) = self.players_by_element.remove(&element) {
            for player in players {
                player.destroy();
            }
        }
    }

    pub fn destroy_inner_animations(&mut self, container: ElementId) {
        for element in self.driver.query(container, NG_TRIGGER_SELECTOR, true) {
            self.destroy_active_animations_for_element(element);
        }
        if self.players_by_queried_element.is_empty() {
            return;
        }
        for element in self.driver.query(container, NG_ANIMATING_SELECTOR, true) {
            self.finish_active_queried_animation_on_element(element);
        }
    }

    fn destroy_active_animations_for_element(&mut self, element: ElementId) {
        let players = self
            .players_by_element
            .get(&element)
            .cloned()
            .unwrap_or_default();
        for player in players {
            // queued players are destroyed during flush, once their
            // listeners are bound
            if player.queued() {
                player.mark_for_destroy();
            } else {
                player.destroy();
            }
        }
    }

    fn finish_active_queried_animation_on_element(&mut self, element: ElementId) {
        let players = self
            .players_by_queried_element
            .get(&element)
            .cloned()
            .unwrap_or_default();
        for player in players {
            player.finish();
        }
    }

    pub fn process_leave_node(&mut self, element: ElementId) {
        if let Some(details) = self.removal_states.get(&element).cloned() {
            if let Some(context) = details.set_for_removal {
                // never removed twice
                self.removal_states.insert(element, RemovalState::null());
                if !details.namespace_id.is_empty() {
                    self.destroy_inner_animations(element);
                    if self.namespace_lookup.contains_key(&details.namespace_id) {
                        self.clear_element_cache(&details.namespace_id, element);
                    }
                }
                self.on_removal_complete(element, context);
            }
        }

        if self.driver.has_class(element, DISABLED_CLASSNAME) {
            self.mark_element_as_disabled(element, false);
        }
        for node in self.driver.query(element, DISABLED_SELECTOR, true) {
            self.mark_element_as_disabled(node, false);
        }
    }

    fn on_removal_complete(&mut self, element: ElementId, context: RemovalContext) {
        debug!("removing {}", element);
        if let Some(parent) = self.driver.get_parent_element(element) {
            self.driver.remove_child(parent, element);
        }
        if let Some(listener) = self.removal_listener.clone() {
            self.queue.schedule_callback(move || listener(element, context));
        }
    }

    fn remove_nodes_after_animation_done(&mut self, element: ElementId, players: Vec<Rc<dyn AnimationPlayer>>) {
        let queue = self.queue.clone();
        optimize_group_player(players).on_done(Box::new(move || {
            queue.schedule_state(move |engine| engine.process_leave_node(element));
        }));
    }

    /// Calls `callback` once every running root player is done.
    pub fn when_rendering_done(&mut self, callback: Box<dyn FnOnce()>) {
        let queue = self.queue.clone();
        if self.players.is_empty() {
            queue.schedule_callback(callback);
        } else {
            let players = self
                .players
                .iter()
                .map(|p| p.clone() as Rc<dyn AnimationPlayer>)
                .collect();
            optimize_group_player(players)
                .on_done(Box::new(move || queue.schedule_callback(callback)));
        }
    }

    // ---------------------------------------------------------------
    // flush
    // ---------------------------------------------------------------

    fn drain_queued_transitions(&mut self, namespace_id: &str) -> Vec<QueueInstruction> {
        let dispatch = self.dispatch();
        let Some(ns) = self.namespace_lookup.get_mut(namespace_id) else {
            return Vec::new();
        };
        let queue = std::mem::take(&mut ns.queue);

        let mut instructions = Vec::new();
        for entry in queue {
            if entry.player.destroyed() {
                continue;
            }
            if let Some(listeners) = ns.element_listeners.get(&entry.element) {
                let player: Rc<dyn AnimationPlayer> = entry.player.clone();
                for listener in listeners.iter().filter(|l| l.name == entry.trigger_name) {
                    let event = make_animation_event(
                        entry.element,
                        &entry.trigger_name,
                        &entry.from_state.value,
                        &entry.to_state.value,
                        "",
                        0.0,
                        false,
                    );
                    listen_on_player(
                        &player,
                        listener.phase,
                        event,
                        listener.callback.clone(),
                        dispatch.clone(),
                    );
                }
            }

            if entry.player.marked_for_destroy() {
                // listeners are bound now; the destroy can fire them
                let player = entry.player.clone();
                self.flush_fns.push(Box::new(move |_| player.destroy()));
            } else {
                instructions.push(entry);
            }
        }

        sort_queued_instructions(&mut instructions, self.driver.as_ref());
        instructions
    }

    pub fn flush(&mut self) -> Result<()> {
        if !self.new_host_elements.is_empty() {
            let hosts = std::mem::take(&mut self.new_host_elements);
            for (element, namespace_id) in hosts {
                self.balance_namespace_list(&namespace_id, element);
            }
        }

        let mut players = Vec::new();
        let mut result = Ok(());
        if !self.namespace_list.is_empty()
            && (self.total_queued_players > 0 || !self.collected_leave_elements.is_empty())
        {
            trace!(
                "flushing {} queued transitions and {} removals",
                self.total_queued_players,
                self.collected_leave_elements.len()
            );
            let mut cleanup = FlushCleanup::default();
            match self.flush_animations(&mut cleanup) {
                Ok(root_players) => players = root_players,
                Err(err) => result = Err(err),
            }
            self.run_flush_cleanup(cleanup);
        } else {
            let leaving = self.collected_leave_elements.clone();
            for element in leaving {
                self.process_leave_node(element);
            }
        }

        self.total_queued_players = 0;
        self.collected_enter_elements.clear();
        self.collected_leave_elements.clear();
        result?;

        for callback in std::mem::take(&mut self.flush_fns) {
            callback(self);
        }

        if !self.when_quiet_fns.is_empty() {
            let quiet_fns = std::mem::take(&mut self.when_quiet_fns);
            if players.is_empty() {
                for callback in quiet_fns {
                    callback(self);
                }
            } else {
                let queue = self.queue.clone();
                let players = players
                    .into_iter()
                    .map(|p| p as Rc<dyn AnimationPlayer>)
                    .collect();
                optimize_group_player(players).on_done(Box::new(move || {
                    queue.schedule_state(move |engine| {
                        for callback in quiet_fns {
                            callback(engine);
                        }
                    });
                }));
            }
        }
        Ok(())
    }

    fn run_flush_cleanup(&mut self, cleanup: FlushCleanup) {
        for (root, nodes) in &cleanup.enter_node_map {
            if let Some(class_name) = cleanup.enter_class_names.get(root) {
                for node in nodes {
                    self.driver.remove_class(*node, class_name);
                }
            }
        }
        for (root, nodes) in &cleanup.leave_node_map {
            if let Some(class_name) = cleanup.leave_class_names.get(root) {
                for node in nodes {
                    self.driver.remove_class(*node, class_name);
                }
            }
        }
        for element in cleanup.all_leave_nodes {
            self.process_leave_node(element);
        }
    }

    /// The entering elements attached to the document, in document order.
    fn capture_entering_elements(&self) -> Vec<ElementId> {
        if self.collected_enter_elements.is_empty() {
            return Vec::new();
        }
        let Some(body) = self.body_node else {
            return self.collected_enter_elements.clone();
        };
        for element in &self.collected_enter_elements {
            self.driver.add_class(*element, STAR_CLASSNAME);
        }
        let matched = self.driver.query(body, STAR_SELECTOR, true);
        for element in &self.collected_enter_elements {
            self.driver.remove_class(*element, STAR_CLASSNAME);
        }
        matched
    }

    fn flush_animations(&mut self, cleanup: &mut FlushCleanup) -> Result<Vec<Rc<TransitionAnimationPlayer>>> {
        let driver = self.driver.clone();
        let mut sub_timelines = ElementInstructionMap::new();
        let mut skipped_players: Vec<Rc<TransitionAnimationPlayer>> = Vec::new();
        let mut skipped_players_map: HashMap<ElementId, Vec<Rc<dyn AnimationPlayer>>> = HashMap::new();
        let mut queued_instructions: Vec<QueuedTransition> = Vec::new();
        let mut queried_elements: HashMap<ElementId, Vec<Rc<TransitionAnimationPlayer>>> = HashMap::new();
        let mut all_pre_style_elements: IndexMap<ElementId, IndexSet<String>> = IndexMap::new();
        let mut all_post_style_elements: IndexMap<ElementId, IndexSet<String>> = IndexMap::new();

        let mut disabled_elements: HashSet<ElementId> = HashSet::new();
        for &node in &self.disabled_nodes {
            disabled_elements.insert(node);
            disabled_elements.extend(driver.query(node, QUEUED_SELECTOR, true));
        }

        let all_trigger_elements: Vec<ElementId> = self.states_by_element.keys().copied().collect();
        let entering = self.capture_entering_elements();

        // must happen before instructions are built so `:enter` queries
        // match the right elements
        cleanup.enter_node_map = build_root_map(driver.as_ref(), &all_trigger_elements, &entering);
        let mut class_index = 0;
        for (root, nodes) in &cleanup.enter_node_map {
            let class_name = format!("{}{}", ENTER_CLASSNAME, class_index);
            class_index += 1;
            for node in nodes {
                driver.add_class(*node, &class_name);
            }
            cleanup.enter_class_names.insert(*root, class_name);
        }

        let mut merged_leave_nodes: IndexSet<ElementId> = IndexSet::new();
        let mut leave_nodes_without_animations: IndexSet<ElementId> = IndexSet::new();
        for &element in &self.collected_leave_elements {
            let Some(details) = self.removal_states.get(&element) else {
                continue;
            };
            if details.set_for_removal.is_none() || cleanup.all_leave_nodes.contains(&element) {
                continue;
            }
            cleanup.all_leave_nodes.push(element);
            merged_leave_nodes.insert(element);
            if details.flags.contains(RemovalFlags::HAS_ANIMATION) {
                merged_leave_nodes.extend(driver.query(element, ALL_DESCENDANTS_SELECTOR, true));
            } else {
                leave_nodes_without_animations.insert(element);
            }
        }

        let merged: Vec<ElementId> = merged_leave_nodes.iter().copied().collect();
        cleanup.leave_node_map = build_root_map(driver.as_ref(), &all_trigger_elements, &merged);
        for (root, nodes) in &cleanup.leave_node_map {
            let class_name = format!("{}{}", LEAVE_CLASSNAME, class_index);
            class_index += 1;
            for node in nodes {
                driver.add_class(*node, &class_name);
            }
            cleanup.leave_class_names.insert(*root, class_name);
        }

        let mut all_players: Vec<Rc<TransitionAnimationPlayer>> = Vec::new();
        let mut erroneous_transitions: Vec<(String, Vec<String>)> = Vec::new();
        let namespace_ids: Vec<String> = self.namespace_list.iter().rev().cloned().collect();
        for namespace_id in namespace_ids {
            for entry in self.drain_queued_transitions(&namespace_id) {
                let player = entry.player.clone();
                let element = entry.element;
                all_players.push(player.clone());

                if !self.collected_enter_elements.is_empty() {
                    let moved = self
                        .removal_states
                        .get(&element)
                        .filter(|d| d.flags.contains(RemovalFlags::SET_FOR_MOVE))
                        .cloned();
                    if let Some(details) = moved {
                        // moved elements never left; keep their previous value
                        let previous_value = details
                            .previous_triggers_values
                            .as_ref()
                            .and_then(|values| values.get(&entry.trigger_name))
                            .cloned();
                        if let Some(previous_value) = previous_value {
                            if let Some(state) = self
                                .states_by_element
                                .get_mut(&element)
                                .and_then(|states| states.get_mut(&entry.trigger_name))
                            {
                                state.value = previous_value;
                            }
                        }
                        player.destroy();
                        continue;
                    }
                }

                let node_is_orphaned = self
                    .body_node
                    .map_or(true, |body| !driver.contains_element(body, element));
                let enter_class_name = cleanup
                    .enter_class_names
                    .get(&element)
                    .map_or(ENTER_CLASSNAME, String::as_str);
                let leave_class_name = cleanup
                    .leave_class_names
                    .get(&element)
                    .map_or(LEAVE_CLASSNAME, String::as_str);
                let mut instruction = entry.transition.build(
                    driver.as_ref(),
                    element,
                    &entry.from_state.value,
                    &entry.to_state.value,
                    enter_class_name,
                    leave_class_name,
                    Some(&entry.from_state.options()),
                    Some(&entry.to_state.options()),
                    &mut sub_timelines,
                    node_is_orphaned,
                );
                if !instruction.errors.is_empty() {
                    erroneous_transitions.push((
                        instruction.trigger_name.clone(),
                        std::mem::take(&mut instruction.errors),
                    ));
                    continue;
                }

                // orphaned elements may still be inserted later, and unmatched
                // transitions only fire events; both just get their styles
                if node_is_orphaned || entry.is_fallback_transition {
                    let (d, from_styles) = (driver.clone(), instruction.from_styles.clone());
                    player.on_start(Box::new(move || erase_styles(d.as_ref(), element, &from_styles)));
                    let (d, to_styles) = (driver.clone(), instruction.to_styles.clone());
                    player.on_destroy(Box::new(move || set_styles(d.as_ref(), element, &to_styles, None)));
                    skipped_players.push(player);
                    continue;
                }

                let normalization_errors =
                    keyframe_normalization_errors(self.normalizer.as_ref(), &instruction.timelines);
                if !normalization_errors.is_empty() {
                    erroneous_transitions.push((instruction.trigger_name.clone(), normalization_errors));
                    continue;
                }

                // replayed under a parent animation, the first keyframe
                // stretches over the delay instead of the player waiting
                let timelines: Vec<AnimationTimelineInstruction> = std::mem::take(&mut instruction.timelines)
                    .into_iter()
                    .filter(|tl| !self.disabled_nodes.contains(&tl.element))
                    .map(|mut tl| {
                        tl.stretch_starting_keyframe = true;
                        tl
                    })
                    .collect();
                instruction.timelines = timelines;
                sub_timelines.append(element, &instruction.timelines);

                for queried in &instruction.queried_elements {
                    queried_elements
                        .entry(*queried)
                        .or_default()
                        .push(player.clone());
                }
                for (el, props) in &instruction.pre_style_props {
                    if !props.is_empty() {
                        all_pre_style_elements
                            .entry(*el)
                            .or_default()
                            .extend(props.iter().cloned());
                    }
                }
                for (el, props) in &instruction.post_style_props {
                    all_post_style_elements
                        .entry(*el)
                        .or_default()
                        .extend(props.iter().cloned());
                }

                queued_instructions.push(QueuedTransition {
                    element,
                    player,
                    instruction,
                });
            }
        }

        if !erroneous_transitions.is_empty() {
            for player in &all_players {
                player.destroy();
            }
            return Err(AnimationError::Flush {
                errors: erroneous_transitions,
            });
        }

        // element -> nearest animated ancestor (None: no animated ancestor)
        let mut all_previous_players_map: HashMap<ElementId, Vec<Rc<TransitionAnimationPlayer>>> = HashMap::new();
        let mut animation_element_map: HashMap<ElementId, Option<ElementId>> = HashMap::new();
        for entry in &queued_instructions {
            if sub_timelines.is_unclaimed(entry.element) {
                animation_element_map.insert(entry.element, Some(entry.element));
                self.before_animation_build(
                    &entry.player.namespace_id,
                    &entry.instruction,
                    &mut all_previous_players_map,
                );
            }
        }

        for player in &skipped_players {
            let element = player.element_id();
            let previous = self.get_previous_players(
                element,
                false,
                Some(player.namespace_id.as_str()),
                Some(player.trigger_name.as_str()),
                None,
            );
            for previous_player in previous {
                all_previous_players_map
                    .entry(element)
                    .or_default()
                    .push(previous_player.clone());
                previous_player.destroy();
            }
        }

        // `*` styles of leaving nodes must equal their `!` styles, since the
        // element is hidden once it is gone
        let mut replace_nodes: Vec<ElementId> = cleanup
            .all_leave_nodes
            .iter()
            .copied()
            .filter(|node| {
                replace_post_styles_as_pre(*node, &mut all_pre_style_elements, &mut all_post_style_elements)
            })
            .collect();

        let mut post_styles_map: HashMap<ElementId, StyleMap> = HashMap::new();
        let failed = cloak_and_compute_styles(
            &mut post_styles_map,
            driver.as_ref(),
            &leave_nodes_without_animations,
            &all_post_style_elements,
            AUTO_STYLE,
        );
        for node in failed {
            self.removal_states
                .insert(node, RemovalState::removed_before_queried());
            if replace_post_styles_as_pre(node, &mut all_pre_style_elements, &mut all_post_style_elements) {
                replace_nodes.push(node);
            }
        }

        let mut pre_styles_map: HashMap<ElementId, StyleMap> = HashMap::new();
        for nodes in cleanup.enter_node_map.values() {
            let cloaked: IndexSet<ElementId> = nodes.iter().copied().collect();
            let failed = cloak_and_compute_styles(
                &mut pre_styles_map,
                driver.as_ref(),
                &cloaked,
                &all_pre_style_elements,
                PRE_STYLE,
            );
            for node in failed {
                self.removal_states
                    .insert(node, RemovalState::removed_before_queried());
            }
        }

        for node in &replace_nodes {
            let mut merged = post_styles_map.get(node).cloned().unwrap_or_default();
            if let Some(pre) = pre_styles_map.get(node) {
                copy_styles(pre, &mut merged);
            }
            post_styles_map.insert(*node, merged);
        }

        let mut root_players: Vec<Rc<TransitionAnimationPlayer>> = Vec::new();
        let mut sub_players: Vec<Rc<TransitionAnimationPlayer>> = Vec::new();
        for entry in &queued_instructions {
            let QueuedTransition {
                element,
                player,
                instruction,
            } = entry;
            let element = *element;

            if sub_timelines.is_unclaimed(element) {
                if disabled_elements.contains(&element) {
                    let (d, to_styles) = (driver.clone(), instruction.to_styles.clone());
                    player.on_destroy(Box::new(move || set_styles(d.as_ref(), element, &to_styles, None)));
                    player.set_disabled(true);
                    player.override_total_time(instruction.total_time);
                    skipped_players.push(player.clone());
                    continue;
                }

                // walk up to the nearest element with its own animation,
                // caching the answer for every parent passed on the way
                let mut parent_with_animation: Option<ElementId> = None;
                if animation_element_map.len() > 1 {
                    let mut current = element;
                    let mut parents_to_add = Vec::new();
                    while let Some(parent) = driver.get_parent_element(current) {
                        if let Some(detected) = animation_element_map.get(&parent) {
                            parent_with_animation = *detected;
                            break;
                        }
                        parents_to_add.push(parent);
                        current = parent;
                    }
                    for parent in parents_to_add {
                        animation_element_map.insert(parent, parent_with_animation);
                    }
                }

                let inner_player = self.build_animation(
                    &player.namespace_id,
                    instruction,
                    &all_previous_players_map,
                    &mut skipped_players_map,
                    &pre_styles_map,
                    &post_styles_map,
                )?;
                player.set_real_player(inner_player);

                match parent_with_animation {
                    None => root_players.push(player.clone()),
                    Some(parent) => {
                        let parent_players: Vec<Rc<dyn AnimationPlayer>> = self
                            .players_by_element
                            .get(&parent)
                            .map(|players| {
                                players
                                    .iter()
                                    .map(|p| p.clone() as Rc<dyn AnimationPlayer>)
                                    .collect()
                            })
                            .unwrap_or_default();
                        if !parent_players.is_empty() {
                            player.set_parent_player(optimize_group_player(parent_players));
                        }
                        skipped_players.push(player.clone());
                    }
                }
            } else {
                // consumed by a parent animation, which may still animate
                // this element even if it is disabled
                erase_styles(driver.as_ref(), element, &instruction.from_styles);
                let (d, to_styles) = (driver.clone(), instruction.to_styles.clone());
                player.on_destroy(Box::new(move || set_styles(d.as_ref(), element, &to_styles, None)));
                sub_players.push(player.clone());
                if disabled_elements.contains(&element) {
                    skipped_players.push(player.clone());
                }
            }
        }

        for player in &sub_players {
            if let Some(players) = skipped_players_map.get(&player.element_id()) {
                if !players.is_empty() {
                    player.set_real_player(optimize_group_player(players.clone()));
                }
            }
        }

        // skipped players only exist to fire their start/done events
        for player in &skipped_players {
            match player.parent_player() {
                Some(parent) => player.sync_player_events(&parent),
                None => player.destroy(),
            }
        }

        // removals picked up by a query wait for those players; all others
        // happen right away unless their own leave animation owns them
        let leaving = cleanup.all_leave_nodes.clone();
        for element in leaving {
            driver.remove_class(element, LEAVE_CLASSNAME);
            let has_animation = self
                .removal_states
                .get(&element)
                .map_or(false, |d| d.flags.contains(RemovalFlags::HAS_ANIMATION));
            if has_animation {
                continue;
            }

            let mut players: Vec<Rc<TransitionAnimationPlayer>> = Vec::new();
            if !queried_elements.is_empty() {
                if let Some(queried) = queried_elements.get(&element) {
                    players.extend(queried.iter().cloned());
                }
                for inner in driver.query(element, NG_ANIMATING_SELECTOR, true) {
                    if let Some(queried) = queried_elements.get(&inner) {
                        players.extend(queried.iter().cloned());
                    }
                }
            }

            let active: Vec<Rc<dyn AnimationPlayer>> = players
                .into_iter()
                .filter(|p| !p.destroyed())
                .map(|p| p as Rc<dyn AnimationPlayer>)
                .collect();
            if active.is_empty() {
                self.process_leave_node(element);
            } else {
                debug!("{} is removed once {} queried players finish", element, active.len());
                self.remove_nodes_after_animation_done(element, active);
            }
        }
        cleanup.all_leave_nodes.clear();

        for player in &root_players {
            self.players.push(player.clone());
            let weak = Rc::downgrade(player);
            let queue = self.queue.clone();
            player.on_done(Box::new(move || {
                queue.schedule_state(move |engine| {
                    if let Some(player) = weak.upgrade() {
                        player.destroy();
                        engine.players.retain(|p| !Rc::ptr_eq(p, &player));
                    }
                });
            }));
            player.play();
        }

        Ok(root_players)
    }

    fn before_animation_build(
        &mut self,
        namespace_id: &str,
        instruction: &AnimationTransitionInstruction,
        all_previous_players_map: &mut HashMap<ElementId, Vec<Rc<TransitionAnimationPlayer>>>,
    ) {
        let root_element = instruction.element;

        // a removal cancels every previous player, whatever its namespace
        let (target_namespace, target_trigger) = if instruction.is_removal_transition {
            (None, None)
        } else {
            (Some(namespace_id), Some(instruction.trigger_name.as_str()))
        };

        for timeline in &instruction.timelines {
            let element = timeline.element;
            let is_queried_element = element != root_element;
            let previous = self.get_previous_players(
                element,
                is_queried_element,
                target_namespace,
                target_trigger,
                Some(instruction.to_state.as_str()),
            );
            let players = all_previous_players_map.entry(element).or_default();
            for player in previous {
                player.get_real_player().before_destroy();
                player.destroy();
                players.push(player);
            }
        }

        // measure pre/post styles without the previous animation's leftovers
        erase_styles(self.driver.as_ref(), root_element, &instruction.from_styles);
    }

    fn get_previous_players(
        &self,
        element: ElementId,
        is_queried_element: bool,
        namespace_id: Option<&str>,
        trigger_name: Option<&str>,
        to_state_value: Option<&str>,
    ) -> Vec<Rc<TransitionAnimationPlayer>> {
        let mut players: Vec<Rc<TransitionAnimationPlayer>> = if is_queried_element {
            self.players_by_queried_element
                .get(&element)
                .cloned()
                .unwrap_or_default()
        } else {
            let is_removal_animation = to_state_value.map_or(true, |v| v == VOID_VALUE);
            self.players_by_element
                .get(&element)
                .map(|players| {
                    players
                        .iter()
                        .filter(|p| !p.queued())
                        .filter(|p| is_removal_animation || Some(p.trigger_name.as_str()) == trigger_name)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        if namespace_id.is_some() || trigger_name.is_some() {
            players.retain(|p| {
                namespace_id.map_or(true, |ns| ns == p.namespace_id)
                    && trigger_name.map_or(true, |t| t == p.trigger_name)
            });
        }
        players
    }

    fn build_animation(
        &mut self,
        namespace_id: &str,
        instruction: &AnimationTransitionInstruction,
        all_previous_players_map: &HashMap<ElementId, Vec<Rc<TransitionAnimationPlayer>>>,
        skipped_players_map: &mut HashMap<ElementId, Vec<Rc<dyn AnimationPlayer>>>,
        pre_styles_map: &HashMap<ElementId, StyleMap>,
        post_styles_map: &HashMap<ElementId, StyleMap>,
    ) -> Result<Rc<dyn AnimationPlayer>> {
        let driver = self.driver.clone();
        let root_element = instruction.element;

        let mut all_queried_players: Vec<Rc<TransitionAnimationPlayer>> = Vec::new();
        let mut all_consumed_elements: IndexSet<ElementId> = IndexSet::new();
        let mut all_sub_elements: IndexSet<ElementId> = IndexSet::new();
        let mut all_new_players: Vec<Rc<dyn AnimationPlayer>> = Vec::new();

        for timeline in &instruction.timelines {
            let element = timeline.element;
            all_consumed_elements.insert(element);

            let removed_before_queried = self
                .removal_states
                .get(&element)
                .map_or(false, |d| d.flags.contains(RemovalFlags::REMOVED_BEFORE_QUERIED));
            if removed_before_queried {
                all_new_players.push(Rc::new(NoopAnimationPlayer::new(
                    timeline.duration,
                    timeline.delay,
                )));
                continue;
            }

            let is_queried_element = element != root_element;
            let previous: Vec<Rc<dyn AnimationPlayer>> = all_previous_players_map
                .get(&element)
                .map(|players| players.iter().map(|p| p.get_real_player()).collect())
                .unwrap_or_default();
            let previous_players: Vec<Rc<dyn AnimationPlayer>> = flatten_group_players(&previous)
                .into_iter()
                .filter(|p| p.element() == Some(element))
                .collect();

            let keyframes = normalize_keyframes(
                self.normalizer.as_ref(),
                &timeline.keyframes,
                pre_styles_map.get(&element),
                post_styles_map.get(&element),
            )?;
            let player = self.build_player(timeline, &keyframes, &previous_players);

            // sub trigger players complete together with this one
            if timeline.sub_timeline {
                all_sub_elements.insert(element);
            }

            if is_queried_element {
                let wrapped = Rc::new(TransitionAnimationPlayer::new(
                    namespace_id,
                    &instruction.trigger_name,
                    element,
                ));
                wrapped.set_real_player(player.clone());
                all_queried_players.push(wrapped);
            }

            all_new_players.push(player);
        }

        for player in all_queried_players {
            let element = player.element_id();
            self.players_by_queried_element
                .entry(element)
                .or_default()
                .push(player.clone());
            let weak = Rc::downgrade(&player);
            let queue = self.queue.clone();
            player.on_done(Box::new(move || {
                queue.schedule_state(move |engine| engine.forget_queried_player(element, &weak));
            }));
        }

        for element in &all_consumed_elements {
            driver.add_class(*element, NG_ANIMATING_CLASSNAME);
        }
        let player = optimize_group_player(all_new_players);
        let to_styles = instruction.to_styles.clone();
        let d = driver.clone();
        player.on_destroy(Box::new(move || {
            for element in &all_consumed_elements {
                d.remove_class(*element, NG_ANIMATING_CLASSNAME);
            }
            set_styles(d.as_ref(), root_element, &to_styles, None);
        }));

        for element in all_sub_elements {
            skipped_players_map
                .entry(element)
                .or_default()
                .push(player.clone());
        }

        Ok(player)
    }

    fn build_player(
        &self,
        instruction: &AnimationTimelineInstruction,
        keyframes: &[Keyframe],
        previous_players: &[Rc<dyn AnimationPlayer>],
    ) -> Rc<dyn AnimationPlayer> {
        if keyframes.is_empty() {
            // nothing to render for an empty transition
            return Rc::new(NoopAnimationPlayer::new(
                instruction.duration,
                instruction.delay,
            ));
        }
        debug!(
            "animating {} over {}ms (delay {}ms, {} keyframes, {} previous players)",
            instruction.element,
            instruction.duration,
            instruction.delay,
            keyframes.len(),
            previous_players.len()
        );
        self.driver.animate(
            instruction.element,
            keyframes,
            instruction.duration,
            instruction.delay,
            instruction.easing.as_deref(),
            previous_players,
        )
    }
}

/// Insertion sort: queries-free transitions first, then descendants before
/// their ancestors.
fn sort_queued_instructions(instructions: &mut [QueueInstruction], driver: &dyn AnimationDriver) {
    for i in 1..instructions.len() {
        let mut j = i;
        while j > 0 && goes_after(&instructions[j - 1], &instructions[j], driver) {
            instructions.swap(j - 1, j);
            j -= 1;
        }
    }
}

fn goes_after(a: &QueueInstruction, b: &QueueInstruction, driver: &dyn AnimationDriver) -> bool {
    let d0 = a.transition.ast.dep_count;
    let d1 = b.transition.ast.dep_count;
    if d0 == 0 || d1 == 0 {
        return d0 > d1;
    }
    driver.contains_element(a.element, b.element)
}

/// Groups `nodes` under their closest ancestor in `roots`. Nodes nested in
/// another node of the set, or with no root above them, are left out.
fn build_root_map(
    driver: &dyn AnimationDriver,
    roots: &[ElementId],
    nodes: &[ElementId],
) -> IndexMap<ElementId, Vec<ElementId>> {
    let mut root_map: IndexMap<ElementId, Vec<ElementId>> =
        roots.iter().map(|root| (*root, Vec::new())).collect();
    if nodes.is_empty() {
        return root_map;
    }

    let node_set: HashSet<ElementId> = nodes.iter().copied().collect();
    let mut local_root_map: HashMap<ElementId, Option<ElementId>> = HashMap::new();
    for &node in nodes {
        let mut path = Vec::new();
        let mut current = node;
        let root = loop {
            if let Some(cached) = local_root_map.get(&current) {
                break *cached;
            }
            path.push(current);
            match driver.get_parent_element(current) {
                None => break None,
                Some(parent) if root_map.contains_key(&parent) => break Some(parent),
                Some(parent) if node_set.contains(&parent) => break None,
                Some(parent) => current = parent,
            }
        };
        for visited in path {
            local_root_map.insert(visited, root);
        }
        if let Some(root) = root {
            if let Some(list) = root_map.get_mut(&root) {
                list.push(node);
            }
        }
    }
    root_map
}

fn cloak_element(driver: &dyn AnimationDriver, element: ElementId, value: Option<Option<String>>) -> Option<String> {
    let old_value = driver.get_inline_style(element, "display");
    match value {
        None => driver.set_style(element, "display", "none"),
        Some(Some(v)) if !v.is_empty() => driver.set_style(element, "display", &v),
        Some(_) => driver.remove_style(element, "display"),
    }
    old_value
}

/// Reads the computed value of every property in `element_props_map` while
/// `elements` are hidden. Returns the elements that produced no value.
fn cloak_and_compute_styles(
    values_map: &mut HashMap<ElementId, StyleMap>,
    driver: &dyn AnimationDriver,
    elements: &IndexSet<ElementId>,
    element_props_map: &IndexMap<ElementId, IndexSet<String>>,
    default_style: &str,
) -> Vec<ElementId> {
    let cloak_vals: Vec<Option<String>> = elements
        .iter()
        .map(|element| cloak_element(driver, *element, None))
        .collect();

    let mut failed_elements = Vec::new();
    for (element, props) in element_props_map {
        let mut styles = StyleMap::new();
        for prop in props {
            let value = driver.compute_style(*element, prop, Some(default_style));
            // a parent animation may already have detached the element
            if value.is_empty() {
                failed_elements.push(*element);
            }
            styles.insert(prop.clone(), value);
        }
        values_map.insert(*element, styles);
    }

    for (element, old_value) in elements.iter().zip(cloak_vals) {
        cloak_element(driver, *element, Some(old_value));
    }
    failed_elements
}

fn replace_post_styles_as_pre(
    element: ElementId,
    all_pre_style_elements: &mut IndexMap<ElementId, IndexSet<String>>,
    all_post_style_elements: &mut IndexMap<ElementId, IndexSet<String>>,
) -> bool {
    let Some(post_entry) = all_post_style_elements.shift_remove(&element) else {
        return false;
    };
    all_pre_style_elements
        .entry(element)
        .or_default()
        .extend(post_entry);
    true
}

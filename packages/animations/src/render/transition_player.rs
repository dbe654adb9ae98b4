//! Transition Player
//!
//! The handle returned for a queued trigger transition. It stands in for
//! the real player until flush builds one, remembering every callback it
//! was given so they can be moved onto the real player.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::driver::ElementId;
use crate::players::{
    register_callback, AnimationPlayer, NoopAnimationPlayer, PlayerCallback, PlayerPhase,
};

/// A callback shared between the placeholder and the real player; whichever
/// fires first consumes it.
type SharedCallback = Rc<RefCell<Option<PlayerCallback>>>;

fn fire(shared: &SharedCallback) {
    let callback = shared.borrow_mut().take();
    if let Some(callback) = callback {
        callback();
    }
}

fn forward(shared: &SharedCallback) -> PlayerCallback {
    let shared = shared.clone();
    Box::new(move || fire(&shared))
}

pub struct TransitionAnimationPlayer {
    pub namespace_id: String,
    pub trigger_name: String,
    element: ElementId,
    player: RefCell<Rc<dyn AnimationPlayer>>,
    contains_real_player: Cell<bool>,
    queued_callbacks: RefCell<Vec<(PlayerPhase, SharedCallback)>>,
    queued: Cell<bool>,
    destroyed: Cell<bool>,
    marked_for_destroy: Cell<bool>,
    disabled: Cell<bool>,
    parent_player: RefCell<Option<Rc<dyn AnimationPlayer>>>,
    total_time: Cell<f64>,
}

impl TransitionAnimationPlayer {
    pub fn new(namespace_id: &str, trigger_name: &str, element: ElementId) -> Self {
        TransitionAnimationPlayer {
            namespace_id: namespace_id.to_string(),
            trigger_name: trigger_name.to_string(),
            element,
            player: RefCell::new(Rc::new(NoopAnimationPlayer::default())),
            contains_real_player: Cell::new(false),
            queued_callbacks: RefCell::new(Vec::new()),
            queued: Cell::new(true),
            destroyed: Cell::new(false),
            marked_for_destroy: Cell::new(false),
            disabled: Cell::new(false),
            parent_player: RefCell::new(None),
            total_time: Cell::new(0.0),
        }
    }

    fn inner(&self) -> Rc<dyn AnimationPlayer> {
        self.player.borrow().clone()
    }

    /// Binds the built player. Callbacks registered while queued move over;
    /// only the first call has any effect.
    pub fn set_real_player(&self, player: Rc<dyn AnimationPlayer>) {
        if self.contains_real_player.get() {
            return;
        }
        let queued = std::mem::take(&mut *self.queued_callbacks.borrow_mut());
        for (phase, callback) in &queued {
            register_callback(player.as_ref(), *phase, forward(callback));
        }
        self.override_total_time(player.total_time());
        *self.player.borrow_mut() = player;
        self.contains_real_player.set(true);
        self.queued.set(false);
    }

    pub fn element_id(&self) -> ElementId {
        self.element
    }

    pub fn get_real_player(&self) -> Rc<dyn AnimationPlayer> {
        self.inner()
    }

    pub fn override_total_time(&self, total_time: f64) {
        self.total_time.set(total_time);
    }

    /// Makes this player follow `parent`: it starts, finishes and is
    /// destroyed along with it.
    pub fn sync_player_events(self: &Rc<Self>, parent: &Rc<dyn AnimationPlayer>) {
        let inner = self.inner();
        parent.on_start(Box::new(move || inner.trigger_callback(PlayerPhase::Start)));
        let me = Rc::downgrade(self);
        parent.on_done(Box::new(move || {
            if let Some(me) = me.upgrade() {
                me.finish();
            }
        }));
        let me = Rc::downgrade(self);
        parent.on_destroy(Box::new(move || {
            if let Some(me) = me.upgrade() {
                me.destroy();
            }
        }));
    }

    fn queue_event(&self, phase: PlayerPhase, callback: PlayerCallback) {
        let shared: SharedCallback = Rc::new(RefCell::new(Some(callback)));
        if self.queued.get() {
            self.queued_callbacks.borrow_mut().push((phase, shared.clone()));
        }
        register_callback(self.inner().as_ref(), phase, forward(&shared));
    }

    pub fn queued(&self) -> bool {
        self.queued.get()
    }

    pub fn destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn marked_for_destroy(&self) -> bool {
        self.marked_for_destroy.get()
    }

    pub fn mark_for_destroy(&self) {
        self.marked_for_destroy.set(true);
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.set(disabled);
    }

    pub fn parent_player(&self) -> Option<Rc<dyn AnimationPlayer>> {
        self.parent_player.borrow().clone()
    }

    pub fn set_parent_player(&self, parent: Rc<dyn AnimationPlayer>) {
        *self.parent_player.borrow_mut() = Some(parent);
    }
}

impl AnimationPlayer for TransitionAnimationPlayer {
    fn on_start(&self, callback: PlayerCallback) {
        self.queue_event(PlayerPhase::Start, callback);
    }

    fn on_done(&self, callback: PlayerCallback) {
        self.queue_event(PlayerPhase::Done, callback);
    }

    fn on_destroy(&self, callback: PlayerCallback) {
        self.queue_event(PlayerPhase::Destroy, callback);
    }

    fn init(&self) {
        self.inner().init();
    }

    fn has_started(&self) -> bool {
        !self.queued.get() && self.inner().has_started()
    }

    fn play(&self) {
        if !self.queued.get() {
            self.inner().play();
        }
    }

    fn pause(&self) {
        if !self.queued.get() {
            self.inner().pause();
        }
    }

    fn restart(&self) {
        if !self.queued.get() {
            self.inner().restart();
        }
    }

    fn finish(&self) {
        self.inner().finish();
    }

    fn destroy(&self) {
        self.destroyed.set(true);
        self.inner().destroy();
    }

    fn reset(&self) {
        if !self.queued.get() {
            self.inner().reset();
        }
    }

    fn set_position(&self, position: f64) {
        if !self.queued.get() {
            self.inner().set_position(position);
        }
    }

    fn get_position(&self) -> f64 {
        if self.queued.get() {
            0.0
        } else {
            self.inner().get_position()
        }
    }

    fn total_time(&self) -> f64 {
        self.total_time.get()
    }

    fn before_destroy(&self) {
        self.inner().before_destroy();
    }

    fn trigger_callback(&self, phase: PlayerPhase) {
        self.inner().trigger_callback(phase);
    }

    fn element(&self) -> Option<ElementId> {
        Some(self.element)
    }

    fn disabled(&self) -> bool {
        self.disabled.get()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::driver::ElementId;
use crate::dsl::timeline_instruction::Keyframe;
use crate::players::{AnimationPlayer, PlayerCallback, PlayerPhase};

/// Records what it was asked to animate and only completes when told to,
/// through `finish()` or `destroy()`.
pub struct MockAnimationPlayer {
    element: ElementId,
    keyframes: Vec<Keyframe>,
    duration: f64,
    delay: f64,
    easing: Option<String>,
    previous_players: Vec<Rc<dyn AnimationPlayer>>,
    on_start_fns: RefCell<Vec<PlayerCallback>>,
    on_done_fns: RefCell<Vec<PlayerCallback>>,
    on_destroy_fns: RefCell<Vec<PlayerCallback>>,
    initialized: Cell<bool>,
    started: Cell<bool>,
    finished: Cell<bool>,
    destroyed: Cell<bool>,
    captured_before_destroy: Cell<bool>,
    position: Cell<f64>,
}

impl MockAnimationPlayer {
    pub fn new(
        element: ElementId,
        keyframes: Vec<Keyframe>,
        duration: f64,
        delay: f64,
        easing: Option<String>,
        previous_players: Vec<Rc<dyn AnimationPlayer>>,
    ) -> Self {
        MockAnimationPlayer {
            element,
            keyframes,
            duration,
            delay,
            easing,
            previous_players,
            on_start_fns: RefCell::new(Vec::new()),
            on_done_fns: RefCell::new(Vec::new()),
            on_destroy_fns: RefCell::new(Vec::new()),
            initialized: Cell::new(false),
            started: Cell::new(false),
            finished: Cell::new(false),
            destroyed: Cell::new(false),
            captured_before_destroy: Cell::new(false),
            position: Cell::new(0.0),
        }
    }

    pub fn element_id(&self) -> ElementId {
        self.element
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn easing(&self) -> Option<&str> {
        self.easing.as_deref()
    }

    pub fn previous_players(&self) -> &[Rc<dyn AnimationPlayer>] {
        &self.previous_players
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn captured_before_destroy(&self) -> bool {
        self.captured_before_destroy.get()
    }

    fn run(fns: &RefCell<Vec<PlayerCallback>>) {
        let callbacks = std::mem::take(&mut *fns.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }

    fn fire_start(&self) {
        if !self.started.get() {
            self.started.set(true);
            Self::run(&self.on_start_fns);
        }
    }
}

impl AnimationPlayer for MockAnimationPlayer {
    fn on_start(&self, callback: PlayerCallback) {
        if self.started.get() {
            callback();
        } else {
            self.on_start_fns.borrow_mut().push(callback);
        }
    }

    fn on_done(&self, callback: PlayerCallback) {
        if self.finished.get() {
            callback();
        } else {
            self.on_done_fns.borrow_mut().push(callback);
        }
    }

    fn on_destroy(&self, callback: PlayerCallback) {
        if self.destroyed.get() {
            callback();
        } else {
            self.on_destroy_fns.borrow_mut().push(callback);
        }
    }

    fn init(&self) {
        self.initialized.set(true);
    }

    fn has_started(&self) -> bool {
        self.started.get()
    }

    fn play(&self) {
        self.init();
        self.fire_start();
    }

    fn pause(&self) {}

    fn restart(&self) {
        self.position.set(0.0);
    }

    fn finish(&self) {
        self.fire_start();
        if !self.finished.get() {
            self.finished.set(true);
            self.position.set(1.0);
            Self::run(&self.on_done_fns);
        }
    }

    fn destroy(&self) {
        if !self.destroyed.get() {
            self.destroyed.set(true);
            self.finish();
            Self::run(&self.on_destroy_fns);
        }
    }

    fn reset(&self) {
        self.started.set(false);
        self.finished.set(false);
        self.position.set(0.0);
    }

    fn set_position(&self, position: f64) {
        self.position.set(position);
    }

    fn get_position(&self) -> f64 {
        self.position.get()
    }

    fn total_time(&self) -> f64 {
        self.duration + self.delay
    }

    fn before_destroy(&self) {
        self.captured_before_destroy.set(true);
    }

    fn trigger_callback(&self, phase: PlayerPhase) {
        match phase {
            PlayerPhase::Start => Self::run(&self.on_start_fns),
            PlayerPhase::Done => Self::run(&self.on_done_fns),
            PlayerPhase::Destroy => Self::run(&self.on_destroy_fns),
        }
    }

    fn element(&self) -> Option<ElementId> {
        Some(self.element)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

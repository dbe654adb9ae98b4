use std::any::Any;
use std::cell::{Cell, RefCell};

use super::{AnimationPlayer, PlayerCallback, PlayerPhase};

/// Stands in for an animation that renders nothing. Playing it fires its
/// start callbacks and finishes immediately; callbacks registered after a
/// phase completed run straight away.
#[derive(Default)]
pub struct NoopAnimationPlayer {
    on_start_fns: RefCell<Vec<PlayerCallback>>,
    on_done_fns: RefCell<Vec<PlayerCallback>>,
    on_destroy_fns: RefCell<Vec<PlayerCallback>>,
    started: Cell<bool>,
    destroyed: Cell<bool>,
    finished: Cell<bool>,
    position: Cell<f64>,
    total_time: f64,
}

impl NoopAnimationPlayer {
    pub fn new(duration: f64, delay: f64) -> Self {
        NoopAnimationPlayer {
            total_time: duration + delay,
            ..Default::default()
        }
    }

    fn run(fns: &RefCell<Vec<PlayerCallback>>) {
        // callbacks may register more callbacks; take the list first
        let callbacks = std::mem::take(&mut *fns.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }

    fn on_finish(&self) {
        if !self.finished.get() {
            self.finished.set(true);
            Self::run(&self.on_done_fns);
        }
    }

    fn fire_start(&self) {
        Self::run(&self.on_start_fns);
    }
}

impl AnimationPlayer for NoopAnimationPlayer {
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

    fn init(&self) {}

    fn has_started(&self) -> bool {
        self.started.get()
    }

    fn play(&self) {
        if !self.has_started() {
            self.started.set(true);
            self.fire_start();
            self.on_finish();
        }
    }

    fn pause(&self) {}

    fn restart(&self) {}

    fn finish(&self) {
        self.on_finish();
    }

    fn destroy(&self) {
        if !self.destroyed.get() {
            self.destroyed.set(true);
            if !self.has_started() {
                self.fire_start();
            }
            self.finish();
            Self::run(&self.on_destroy_fns);
        }
    }

    fn reset(&self) {
        self.started.set(false);
        self.finished.set(false);
    }

    fn set_position(&self, position: f64) {
        let value = if self.total_time != 0.0 {
            position * self.total_time
        } else {
            1.0
        };
        self.position.set(value);
    }

    fn get_position(&self) -> f64 {
        if self.total_time != 0.0 {
            self.position.get() / self.total_time
        } else {
            1.0
        }
    }

    fn total_time(&self) -> f64 {
        self.total_time
    }

    fn trigger_callback(&self, phase: PlayerPhase) {
        match phase {
            PlayerPhase::Start => Self::run(&self.on_start_fns),
            _ => Self::run(&self.on_done_fns),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

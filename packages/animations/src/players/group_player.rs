use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{AnimationPlayer, PlayerCallback, PlayerPhase};

/// Runs several players as one. It starts once every child has started
/// and finishes once every child has finished. Callbacks registered after
/// a phase completed run straight away.
pub struct AnimationGroupPlayer {
    players: Vec<Rc<dyn AnimationPlayer>>,
    on_start_fns: RefCell<Vec<PlayerCallback>>,
    on_done_fns: RefCell<Vec<PlayerCallback>>,
    on_destroy_fns: RefCell<Vec<PlayerCallback>>,
    done_count: Cell<usize>,
    destroy_count: Cell<usize>,
    start_count: Cell<usize>,
    started: Cell<bool>,
    finished: Cell<bool>,
    destroyed: Cell<bool>,
    total_time: f64,
}

impl AnimationGroupPlayer {
    pub fn new(players: Vec<Rc<dyn AnimationPlayer>>) -> Rc<dyn AnimationPlayer> {
        let total_time = players.iter().fold(0.0f64, |t, p| t.max(p.total_time()));
        let group = Rc::new(AnimationGroupPlayer {
            players,
            on_start_fns: RefCell::new(Vec::new()),
            on_done_fns: RefCell::new(Vec::new()),
            on_destroy_fns: RefCell::new(Vec::new()),
            done_count: Cell::new(0),
            destroy_count: Cell::new(0),
            start_count: Cell::new(0),
            started: Cell::new(false),
            finished: Cell::new(false),
            destroyed: Cell::new(false),
            total_time,
        });

        // children keep the group alive until they have reported back
        let total = group.players.len();
        for player in &group.players {
            let me = group.clone();
            player.on_done(Box::new(move || {
                me.done_count.set(me.done_count.get() + 1);
                if me.done_count.get() == total {
                    me.on_finish();
                }
            }));
            let me = group.clone();
            player.on_destroy(Box::new(move || {
                me.destroy_count.set(me.destroy_count.get() + 1);
                if me.destroy_count.get() == total {
                    me.on_destroy_all();
                }
            }));
            let me = group.clone();
            player.on_start(Box::new(move || {
                me.start_count.set(me.start_count.get() + 1);
                if me.start_count.get() == total {
                    me.fire_start();
                }
            }));
        }
        group
    }

    pub fn players(&self) -> &[Rc<dyn AnimationPlayer>] {
        &self.players
    }

    fn run(fns: &RefCell<Vec<PlayerCallback>>) {
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
        if !self.started.get() {
            self.started.set(true);
            Self::run(&self.on_start_fns);
        }
    }

    fn on_destroy_all(&self) {
        if !self.destroyed.get() {
            self.destroyed.set(true);
            self.on_finish();
            for player in &self.players {
                player.destroy();
            }
            Self::run(&self.on_destroy_fns);
        }
    }
}

impl AnimationPlayer for AnimationGroupPlayer {
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
        for player in &self.players {
            player.init();
        }
    }

    fn has_started(&self) -> bool {
        self.started.get()
    }

    fn play(&self) {
        self.init();
        self.fire_start();
        for player in &self.players {
            player.play();
        }
        if self.players.is_empty() {
            self.on_finish();
        }
    }

    fn pause(&self) {
        for player in &self.players {
            player.pause();
        }
    }

    fn restart(&self) {
        for player in &self.players {
            player.restart();
        }
    }

    fn finish(&self) {
        self.on_finish();
        for player in &self.players {
            player.finish();
        }
    }

    fn destroy(&self) {
        self.on_destroy_all();
    }

    fn reset(&self) {
        for player in &self.players {
            player.reset();
        }
        self.destroyed.set(false);
        self.finished.set(false);
        self.started.set(false);
    }

    fn set_position(&self, position: f64) {
        let time_at_position = position * self.total_time;
        for player in &self.players {
            let player_position = if player.total_time() != 0.0 {
                (time_at_position / player.total_time()).min(1.0)
            } else {
                1.0
            };
            player.set_position(player_position);
        }
    }

    fn get_position(&self) -> f64 {
        let mut longest: Option<&Rc<dyn AnimationPlayer>> = None;
        for player in &self.players {
            if longest.map_or(true, |l| player.total_time() > l.total_time()) {
                longest = Some(player);
            }
        }
        longest.map_or(0.0, |p| p.get_position())
    }

    fn total_time(&self) -> f64 {
        self.total_time
    }

    fn before_destroy(&self) {
        for player in &self.players {
            player.before_destroy();
        }
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

//! Animation Players
//!
//! The playback handle every animation is driven through, plus the two
//! players the engine builds itself: a no-op player for animations with
//! nothing to render and a group player that runs several as one.

use std::any::Any;
use std::rc::Rc;

use crate::driver::ElementId;

pub mod group_player;
pub mod noop_player;

pub use group_player::AnimationGroupPlayer;
pub use noop_player::NoopAnimationPlayer;

/// A one-shot player callback.
pub type PlayerCallback = Box<dyn FnOnce()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerPhase {
    Start,
    Done,
    Destroy,
}

impl PlayerPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerPhase::Start => "start",
            PlayerPhase::Done => "done",
            PlayerPhase::Destroy => "destroy",
        }
    }

    pub fn parse(phase: &str) -> Option<Self> {
        match phase {
            "start" => Some(PlayerPhase::Start),
            "done" => Some(PlayerPhase::Done),
            "destroy" => Some(PlayerPhase::Destroy),
            _ => None,
        }
    }
}

/// Playback control over one running animation.
///
/// Methods take `&self`: players are shared between the engine maps that
/// track them, so implementations keep their state in cells. Callbacks
/// fire synchronously from whichever call completes the phase.
pub trait AnimationPlayer {
    fn on_start(&self, callback: PlayerCallback);
    fn on_done(&self, callback: PlayerCallback);
    fn on_destroy(&self, callback: PlayerCallback);

    fn init(&self);
    fn has_started(&self) -> bool;
    fn play(&self);
    fn pause(&self);
    fn restart(&self);
    fn finish(&self);
    fn destroy(&self);
    fn reset(&self);
    fn set_position(&self, position: f64);
    fn get_position(&self) -> f64;

    /// Duration plus delay, in milliseconds.
    fn total_time(&self) -> f64;

    /// Lets the player snapshot its current styles before it is cancelled
    /// in favour of a newer animation.
    fn before_destroy(&self) {}

    /// Fires (and clears) the pending callbacks of `phase` without
    /// changing playback state.
    fn trigger_callback(&self, _phase: PlayerPhase) {}

    /// The element the player animates, when it animates exactly one.
    fn element(&self) -> Option<ElementId> {
        None
    }

    fn disabled(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}

/// Registers `callback` for `phase` on `player`.
pub fn register_callback(player: &dyn AnimationPlayer, phase: PlayerPhase, callback: PlayerCallback) {
    match phase {
        PlayerPhase::Start => player.on_start(callback),
        PlayerPhase::Done => player.on_done(callback),
        PlayerPhase::Destroy => player.on_destroy(callback),
    }
}

/// Zero players become a no-op, one stays as is, more are grouped.
pub fn optimize_group_player(mut players: Vec<Rc<dyn AnimationPlayer>>) -> Rc<dyn AnimationPlayer> {
    match players.len() {
        0 => Rc::new(NoopAnimationPlayer::new(0.0, 0.0)),
        1 => players.remove(0),
        _ => AnimationGroupPlayer::new(players),
    }
}

/// Replaces every group player in `players` by its (recursively
/// flattened) children.
pub fn flatten_group_players(players: &[Rc<dyn AnimationPlayer>]) -> Vec<Rc<dyn AnimationPlayer>> {
    let mut final_players = Vec::new();
    flatten_group_players_recur(players, &mut final_players);
    final_players
}

fn flatten_group_players_recur(players: &[Rc<dyn AnimationPlayer>], out: &mut Vec<Rc<dyn AnimationPlayer>>) {
    for player in players {
        match player.as_any().downcast_ref::<AnimationGroupPlayer>() {
            Some(group) => flatten_group_players_recur(group.players(), out),
            None => out.push(player.clone()),
        }
    }
}

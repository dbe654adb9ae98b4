//! Animation Runtime
//!
//! Everything that runs against a live DOM through an `AnimationDriver`.

pub mod engine;
pub mod shared;
pub mod task_queue;
pub mod timeline_engine;
pub mod transition_engine;
pub mod transition_player;

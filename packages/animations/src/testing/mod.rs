//! Testing Support
//!
//! An in-memory `AnimationDriver` and the player it hands out, for driving
//! the engines without a browser.

mod mock_driver;
mod mock_player;

pub use mock_driver::MockAnimationDriver;
pub use mock_player::MockAnimationPlayer;

//! The deterministic simulation at the core of a Voidpeak arena match.
//!
//! This module is the only place in the crate that knows what a "frame" of
//! gameplay actually contains. Everything in [`crate::sessions`],
//! [`crate::input_queue`], and [`crate::sync_layer`] is generic over
//! [`crate::Config`]; `sim` supplies the concrete `Input` and `State` types
//! that instantiate it for this game, plus the pure function that advances
//! one from the other.
//!
//! Sub-modules:
//!
//! - [`fixed`] — fixed-point scalar arithmetic, no floats on the hot path.
//! - [`rng`] — the seeded gameplay PRNG carried inside state.
//! - [`layout`] — compile-time word offsets of the flat state buffer.
//! - [`state`] — the [`GameState`] buffer itself, plus (de)serialization and
//!   checksums.
//! - [`step`] — the per-frame update function and its input type.

pub mod fixed;
pub mod layout;
pub mod rng;
pub mod state;
pub mod step;

pub use state::GameState;
pub use step::InputWord;

use crate::control::PeerId;
use crate::Config;

/// The concrete [`Config`] for a Voidpeak arena session: fixed-size player
/// input words, the flat [`GameState`] buffer, and peer identities assigned
/// by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig;

impl Config for GameConfig {
    type Input = InputWord;
    type State = GameState;
    type Address = PeerId;
}

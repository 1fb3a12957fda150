//! Playback scheduling
//!
//! The dual-slot scheduler and its building blocks: per-slot state, the
//! chain pump task, and the fade ramp state machine.

pub mod chain;
pub mod engine;
pub mod ramp;
pub mod slot;

pub use engine::AudioPlayer;
pub use ramp::RampKind;
pub use slot::{SlotId, SlotSnapshot};

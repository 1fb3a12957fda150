//! Playback events broadcast to the session controller
//!
//! The engine is fire-and-forget: `play()` returns as soon as a chain is
//! wired, so completion, failure, and fade milestones are reported through a
//! broadcast channel instead of return values. The engine does not depend on
//! anyone listening; send errors (no receivers) are ignored.

use crate::playback::ramp::RampKind;
use crate::playback::slot::SlotId;
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Capacity of the engine's broadcast channel
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events emitted by the playback engine
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// A slot was armed and began playing a source
    Started { slot: SlotId, source: PathBuf },

    /// A slot reached natural end-of-stream and was cleaned up
    Finished { slot: SlotId },

    /// A slot's decode pipeline or output sink failed; the slot was cleaned up
    /// immediately (no fade-out)
    Failed { slot: SlotId, message: String },

    /// A fade or crossfade ramp ran to completion
    FadeFinished { kind: RampKind },

    /// `stop()` tore down both slots
    Stopped,
}

/// Create the engine's event channel
pub(crate) fn channel() -> broadcast::Sender<PlaybackEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

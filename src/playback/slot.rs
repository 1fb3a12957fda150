//! Player slot: one ownable unit of playback
//!
//! A slot binds one decode pipeline, one volume stage, and one output sink
//! together with its bookkeeping (identity, active flag, current gain,
//! source). The three chain resources are created together when the slot is
//! armed and destroyed together by `cleanup()`; no partial states survive a
//! cleanup call.
//!
//! Slots are only touched from the engine's lock, so there is no internal
//! synchronization beyond the shared pieces handed to the chain pump (the
//! gain inside the volume stage, the kill flag, the shared sink handle).

use crate::audio::{OutputSink, VolumeStage};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Fixed identity of a player slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    /// Index into the engine's slot array
    pub(crate) fn index(self) -> usize {
        match self {
            SlotId::A => 0,
            SlotId::B => 1,
        }
    }

    /// The other slot
    pub(crate) fn other(self) -> SlotId {
        match self {
            SlotId::A => SlotId::B,
            SlotId::B => SlotId::A,
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotId::A => write!(f, "A"),
            SlotId::B => write!(f, "B"),
        }
    }
}

/// Sink handle shared between the slot (for cleanup) and its chain pump (for
/// writes). `close()` is idempotent, so both sides may end up closing it.
pub type SharedSink = Arc<Mutex<Box<dyn OutputSink>>>;

/// Read-only snapshot of a slot's state for diagnostics and tests
#[derive(Debug, Clone)]
pub struct SlotSnapshot {
    pub id: SlotId,
    pub active: bool,
    pub gain: f32,
    pub source: Option<PathBuf>,
}

/// One of the engine's two playback slots
pub struct PlayerSlot {
    id: SlotId,
    active: bool,
    /// Bumped on every cleanup so events from superseded chains are ignored
    generation: u64,
    source: Option<PathBuf>,
    volume: Option<VolumeStage>,
    kill: Option<Arc<AtomicBool>>,
    sink: Option<SharedSink>,
    /// The sink's close signal, held outside the sink lock so cleanup can
    /// interrupt a writer blocked in backpressure while it holds that lock
    sink_closed: Option<Arc<AtomicBool>>,
}

impl PlayerSlot {
    pub fn new(id: SlotId) -> Self {
        Self {
            id,
            active: false,
            generation: 0,
            source: None,
            volume: None,
            kill: None,
            sink: None,
            sink_closed: None,
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source(&self) -> Option<&PathBuf> {
        self.source.as_ref()
    }

    /// Current gain; an idle slot reads as 0.0
    pub fn gain(&self) -> f32 {
        self.volume.as_ref().map(|v| v.gain()).unwrap_or(0.0)
    }

    /// Set the gain on the slot's volume stage (no-op when idle)
    pub fn set_gain(&self, gain: f32) {
        if let Some(volume) = &self.volume {
            volume.set_gain(gain);
        }
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            id: self.id,
            active: self.active,
            gain: self.gain(),
            source: self.source.clone(),
        }
    }

    /// Bind a fresh chain to this slot and mark it active.
    ///
    /// Returns the generation of the new chain; the chain pump reports its
    /// terminal event tagged with this value.
    pub fn arm(
        &mut self,
        source: PathBuf,
        volume: VolumeStage,
        kill: Arc<AtomicBool>,
        sink: SharedSink,
        sink_closed: Arc<AtomicBool>,
    ) -> u64 {
        debug_assert!(!self.active, "arming must follow cleanup");

        self.source = Some(source);
        self.volume = Some(volume);
        self.kill = Some(kill);
        self.sink = Some(sink);
        self.sink_closed = Some(sink_closed);
        self.active = true;
        self.generation
    }

    /// Tear down the slot's chain, whatever state it is in.
    ///
    /// Kills the decode pump, silences and drops the volume stage, closes the
    /// sink, and resets bookkeeping. Best-effort: a failing sink close is
    /// logged and the remaining teardown proceeds. Safe to call on an idle
    /// slot (no-op).
    pub fn cleanup(&mut self) {
        if !self.active && self.sink.is_none() {
            return;
        }

        if let Some(kill) = self.kill.take() {
            kill.store(true, Ordering::Release);
        }

        // Unblock a writer stuck in backpressure before asking for the sink
        // lock; the pump holds the lock across a write and its retry loop
        // only exits once this flag is set
        if let Some(closed) = self.sink_closed.take() {
            closed.store(true, Ordering::Release);
        }

        if let Some(volume) = self.volume.take() {
            volume.set_gain(0.0);
        }

        if let Some(sink) = self.sink.take() {
            match sink.lock() {
                Ok(mut sink) => {
                    if let Err(e) = sink.close() {
                        warn!("Error closing sink ({}): {}", self.id, e);
                    }
                }
                Err(_) => warn!("Sink lock poisoned during cleanup ({})", self.id),
            }
        }

        self.active = false;
        self.source = None;
        self.generation += 1;
        debug!("Slot {} cleaned up (generation {})", self.id, self.generation);
    }
}

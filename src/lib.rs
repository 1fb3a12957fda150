//! # Vibe Playback Engine
//!
//! Dual-slot crossfading audio playback including:
//! - Decode pipeline (symphonia decode, resample to 44.1kHz stereo s16)
//! - Per-slot volume stage with live gain control
//! - Device output sink (cpal) behind a replaceable trait
//! - Dual-slot scheduler with fade-in/fade-out/crossfade ramps
//! - Playback event broadcast (started/finished/failed/fade/stopped)

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod playback;
pub mod source;

pub use config::PlayerConfig;
pub use error::{Error, Result};
pub use events::PlaybackEvent;
pub use playback::{AudioPlayer, RampKind, SlotId, SlotSnapshot};

//! Configuration for the playback engine
//!
//! All values have built-in defaults defined in code; a TOML file can override
//! them. The engine is a library, so there is no command-line layer here; the
//! session controller either constructs a [`PlayerConfig`] directly or points
//! at a TOML file.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

fn default_fade_duration_ms() -> u64 {
    2000
}

fn default_fade_tick_ms() -> u64 {
    50
}

fn default_sink_buffer_frames() -> usize {
    // ~186ms @ 44.1kHz; enough to ride out scheduling jitter without adding
    // noticeable teardown latency
    8192
}

/// Playback engine configuration
///
/// Defaults: 2000ms fades stepped every 50ms (40 steps), default output device.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    /// Fade/crossfade duration in milliseconds
    #[serde(default = "default_fade_duration_ms")]
    pub fade_duration_ms: u64,

    /// Interval between gain steps during a fade, in milliseconds
    #[serde(default = "default_fade_tick_ms")]
    pub fade_tick_ms: u64,

    /// Output device name (None = system default device)
    #[serde(default)]
    pub device: Option<String>,

    /// Capacity of the sink ring buffer, in stereo frames
    #[serde(default = "default_sink_buffer_frames")]
    pub sink_buffer_frames: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            fade_duration_ms: default_fade_duration_ms(),
            fade_tick_ms: default_fade_tick_ms(),
            device: None,
            sink_buffer_frames: default_sink_buffer_frames(),
        }
    }
}

impl PlayerConfig {
    /// Load configuration from a TOML file
    ///
    /// Missing keys fall back to the built-in defaults.
    ///
    /// # Errors
    /// - File unreadable
    /// - TOML parse failure
    /// - Invalid timing values (zero tick, fade shorter than one tick)
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        config.validate()?;
        info!(
            "Loaded playback config: fade={}ms, tick={}ms",
            config.fade_duration_ms, config.fade_tick_ms
        );
        Ok(config)
    }

    /// Validate timing values
    pub fn validate(&self) -> Result<()> {
        if self.fade_tick_ms == 0 {
            return Err(Error::Config("fade_tick_ms must be > 0".to_string()));
        }
        if self.fade_duration_ms < self.fade_tick_ms {
            return Err(Error::Config(format!(
                "fade_duration_ms ({}) must be >= fade_tick_ms ({})",
                self.fade_duration_ms, self.fade_tick_ms
            )));
        }
        if self.sink_buffer_frames == 0 {
            return Err(Error::Config("sink_buffer_frames must be > 0".to_string()));
        }
        Ok(())
    }

    /// Number of gain steps in one fade ramp
    pub fn fade_steps(&self) -> u32 {
        (self.fade_duration_ms / self.fade_tick_ms).max(1) as u32
    }

    /// Interval between ramp ticks
    pub fn fade_tick(&self) -> Duration {
        Duration::from_millis(self.fade_tick_ms)
    }
}

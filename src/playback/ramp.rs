//! Fade ramp state machine
//!
//! A ramp is the pure arithmetic of one fade: kind, step counter, and the
//! participating slots' endpoint gains. The engine drives it from a single
//! cancellable timer task; at most one ramp exists system-wide and starting a
//! new one replaces the old (cancel-and-replace, never two timers mutating
//! the same gains).
//!
//! Numeric semantics: `steps = fade_duration / tick_interval`, gain at step n
//! is `n / steps` (fade-in) or `start_gain * (1 - n / steps)` (fade-out),
//! clamped into [0, 1] every tick. The final tick snaps both sides to their
//! exact endpoints so floating-point drift never leaves a residual gain.

use crate::playback::slot::SlotId;

/// What a ramp does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampKind {
    /// One slot rises 0 → 1
    FadeIn,
    /// One slot falls from its current gain → 0
    FadeOut,
    /// Old slot falls to 0 while the new slot rises to 1 in lockstep
    Crossfade,
}

/// Gain assignments produced by one ramp tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampStep {
    /// Slot rising toward 1 and its new gain
    pub fade_in: Option<(SlotId, f32)>,
    /// Slot falling toward 0 and its new gain
    pub fade_out: Option<(SlotId, f32)>,
    /// True on the final tick; endpoint gains are exact (1.0 / 0.0)
    pub done: bool,
}

/// One in-flight fade or crossfade
#[derive(Debug)]
pub struct FadeRamp {
    kind: RampKind,
    step: u32,
    steps: u32,
    rising: Option<SlotId>,
    falling: Option<(SlotId, f32)>,
}

impl FadeRamp {
    /// Ramp a lone slot from 0 to 1
    pub fn fade_in(slot: SlotId, steps: u32) -> Self {
        Self {
            kind: RampKind::FadeIn,
            step: 0,
            steps: steps.max(1),
            rising: Some(slot),
            falling: None,
        }
    }

    /// Ramp a slot from its current gain down to 0
    pub fn fade_out(slot: SlotId, start_gain: f32, steps: u32) -> Self {
        Self {
            kind: RampKind::FadeOut,
            step: 0,
            steps: steps.max(1),
            rising: None,
            falling: Some((slot, start_gain.clamp(0.0, 1.0))),
        }
    }

    /// Synchronized crossfade: `from` falls to 0 while `to` rises to 1, both
    /// moved on the same tick
    pub fn crossfade(from: SlotId, from_gain: f32, to: SlotId, steps: u32) -> Self {
        Self {
            kind: RampKind::Crossfade,
            step: 0,
            steps: steps.max(1),
            rising: Some(to),
            falling: Some((from, from_gain.clamp(0.0, 1.0))),
        }
    }

    pub fn kind(&self) -> RampKind {
        self.kind
    }

    /// Advance one tick and return the gains to apply
    pub fn advance(&mut self) -> RampStep {
        self.step = (self.step + 1).min(self.steps);
        let done = self.step >= self.steps;
        let progress = self.step as f32 / self.steps as f32;

        let fade_in = self.rising.map(|slot| {
            let gain = if done { 1.0 } else { progress.clamp(0.0, 1.0) };
            (slot, gain)
        });

        let fade_out = self.falling.map(|(slot, start)| {
            let gain = if done {
                0.0
            } else {
                (start * (1.0 - progress)).clamp(0.0, 1.0)
            };
            (slot, gain)
        });

        RampStep {
            fade_in,
            fade_out,
            done,
        }
    }
}

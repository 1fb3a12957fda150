//! Dual-slot playback scheduler
//!
//! `AudioPlayer` owns exactly two player slots for the process lifetime,
//! decides which slot serves a new `play()` request, drives fade/crossfade
//! ramps from a single cancellable timer task, and guarantees slot teardown
//! on completion, error, and explicit stop.
//!
//! All slot state lives behind one async lock; the ramp task, the chain event
//! handler, and the public operations each take the lock for one step at a
//! time, so handlers are atomic with respect to each other.

use crate::audio::output::{default_device_name, CpalSinkFactory};
use crate::audio::{SampleFormat, SinkFactory, SymphoniaStream, VolumeStage};
use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::events::{self, PlaybackEvent};
use crate::playback::chain::{self, ChainEvent, ChainOutcome};
use crate::playback::ramp::FadeRamp;
use crate::playback::slot::{PlayerSlot, SharedSink, SlotId, SlotSnapshot};
use crate::source::resolve_source;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

struct EngineInner {
    slots: [PlayerSlot; 2],
    /// At most one ramp timer exists; replaced wholesale, never shared
    ramp_task: Option<JoinHandle<()>>,
}

impl EngineInner {
    fn slot(&self, id: SlotId) -> &PlayerSlot {
        &self.slots[id.index()]
    }

    fn slot_mut(&mut self, id: SlotId) -> &mut PlayerSlot {
        &mut self.slots[id.index()]
    }

    /// Pick the slot for a new play() request.
    ///
    /// Prefers an idle slot. When both are active, picks the one with the
    /// lower gain on the theory that it is the less perceptually prominent
    /// track (likely fading out). This is a documented heuristic, not a
    /// guarantee: it can pick a slot that is still fading *in* and therefore
    /// low-gain early in its own ramp.
    fn select_target(&self) -> SlotId {
        let a = self.slot(SlotId::A);
        let b = self.slot(SlotId::B);

        if !a.is_active() {
            SlotId::A
        } else if !b.is_active() {
            SlotId::B
        } else if a.gain() <= b.gain() {
            SlotId::A
        } else {
            SlotId::B
        }
    }
}

/// Dual-slot crossfading audio player
///
/// Construct exactly one per process (in the session controller's composition
/// root); the two slots are reused across every `play()`/`stop()` cycle so no
/// device handles leak over repeated starts and stops.
///
/// Must be created inside a Tokio runtime: construction spawns the chain
/// event handler task.
pub struct AudioPlayer {
    inner: Arc<Mutex<EngineInner>>,
    config: PlayerConfig,
    sink_factory: Arc<dyn SinkFactory>,
    events: broadcast::Sender<PlaybackEvent>,
    chain_tx: mpsc::UnboundedSender<ChainEvent>,
}

impl AudioPlayer {
    /// Create a player rendering to the system audio device.
    pub fn new(config: PlayerConfig) -> Self {
        let factory = Arc::new(CpalSinkFactory::new(
            config.device.clone(),
            config.sink_buffer_frames,
        ));

        match default_device_name() {
            Some(name) => info!("Default audio output device: {}", name),
            None => warn!("No audio output device available; playback will fail"),
        }

        Self::with_sink_factory(config, factory)
    }

    /// Create a player with a custom sink backend.
    pub fn with_sink_factory(config: PlayerConfig, sink_factory: Arc<dyn SinkFactory>) -> Self {
        let inner = Arc::new(Mutex::new(EngineInner {
            slots: [PlayerSlot::new(SlotId::A), PlayerSlot::new(SlotId::B)],
            ramp_task: None,
        }));

        let events = events::channel();
        let (chain_tx, chain_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::chain_event_loop(
            Arc::clone(&inner),
            events.clone(),
            chain_rx,
        ));

        Self {
            inner,
            config,
            sink_factory,
            events,
            chain_tx,
        }
    }

    /// Subscribe to playback events.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Snapshot of both slots, A first.
    pub async fn slot_states(&self) -> [SlotSnapshot; 2] {
        let inner = self.inner.lock().await;
        [
            inner.slot(SlotId::A).snapshot(),
            inner.slot(SlotId::B).snapshot(),
        ]
    }

    /// Start playing a source, optionally fading it in (crossfading if
    /// another track is audible).
    ///
    /// Returns once the chain is wired; decode and fades proceed in the
    /// background. Only the pre-flight source checks fail synchronously;
    /// everything after that is reported through the event channel.
    ///
    /// # Errors
    /// - [`Error::InvalidSource`]: malformed URI or unsupported scheme
    /// - [`Error::SourceNotFound`]: the resolved path does not exist
    pub async fn play(&self, source: &str, fade_in: bool) -> Result<()> {
        let path = resolve_source(source)?;
        if !path.is_file() {
            // Rejected before any slot is touched
            return Err(Error::SourceNotFound(path));
        }

        // Probing the file and opening the device both block; keep them off
        // the engine lock so a slow open never stalls stop() or slot_states()
        let factory = Arc::clone(&self.sink_factory);
        let open_path = path.clone();
        let opened = tokio::task::spawn_blocking(move || {
            let stream = SymphoniaStream::open(&open_path)?;
            let sink = factory.open_sink()?;
            Ok::<_, Error>((stream, sink))
        })
        .await
        .unwrap_or_else(|e| Err(Error::Playback(format!("open task failed: {}", e))));

        let (stream, sink_box) = match opened {
            Ok(parts) => parts,
            Err(e) => {
                // Nothing was armed; report against the slot the request
                // would have used
                let target = self.inner.lock().await.select_target();
                error!("Failed to start playback on slot {}: {}", target, e);
                let _ = self.events.send(PlaybackEvent::Failed {
                    slot: target,
                    message: e.to_string(),
                });
                return Ok(());
            }
        };

        let close_signal = sink_box.close_signal();
        let sink: SharedSink = Arc::new(std::sync::Mutex::new(sink_box));

        let mut inner = self.inner.lock().await;

        // Cancel any in-flight ramp before gains change hands
        if let Some(task) = inner.ramp_task.take() {
            task.abort();
        }

        let target = inner.select_target();
        let other = target.other();
        let fading_out = if inner.slot(other).is_active() {
            Some((other, inner.slot(other).gain()))
        } else {
            None
        };

        // Tear down any stale occupant first; a previous chain must never
        // still be writing once the new chain is wired in
        inner.slot_mut(target).cleanup();

        let initial_gain = if fade_in { 0.0 } else { 1.0 };
        let volume = VolumeStage::new(initial_gain, SampleFormat::S16);
        let kill = Arc::new(AtomicBool::new(false));

        let generation = inner.slot_mut(target).arm(
            path.clone(),
            volume.clone(),
            Arc::clone(&kill),
            Arc::clone(&sink),
            close_signal,
        );

        chain::spawn_chain(
            target,
            generation,
            Box::new(stream),
            volume,
            sink,
            kill,
            self.chain_tx.clone(),
        );

        info!(
            "Started playback ({}): {}",
            target,
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        );
        let _ = self.events.send(PlaybackEvent::Started {
            slot: target,
            source: path,
        });

        if fade_in {
            let steps = self.config.fade_steps();
            let ramp = match fading_out {
                Some((from, from_gain)) => FadeRamp::crossfade(from, from_gain, target, steps),
                None => FadeRamp::fade_in(target, steps),
            };
            self.start_ramp(&mut inner, ramp);
        }

        Ok(())
    }

    /// Stop all playback: cancel any fade and tear down both slots.
    ///
    /// Idempotent; calling with nothing playing is a no-op. The only
    /// operation guaranteed to leave the scheduler fully idle.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;

        if let Some(task) = inner.ramp_task.take() {
            task.abort();
        }

        for slot in inner.slots.iter_mut() {
            slot.cleanup();
        }

        info!("All playback stopped");
        let _ = self.events.send(PlaybackEvent::Stopped);
    }

    /// Install a new ramp, replacing (cancelling) any running one.
    fn start_ramp(&self, inner: &mut EngineInner, mut ramp: FadeRamp) {
        if let Some(task) = inner.ramp_task.take() {
            task.abort();
        }

        let inner_arc = Arc::clone(&self.inner);
        let events = self.events.clone();
        let tick = self.config.fade_tick();

        inner.ramp_task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick of a tokio interval completes immediately; consume
            // it so step 1 lands after one full tick period
            interval.tick().await;

            loop {
                interval.tick().await;
                let mut inner = inner_arc.lock().await;

                let step = ramp.advance();
                if let Some((slot, gain)) = step.fade_in {
                    inner.slot(slot).set_gain(gain);
                }
                if let Some((slot, gain)) = step.fade_out {
                    inner.slot(slot).set_gain(gain);
                }

                if step.done {
                    // The faded-out side is silent now; tear it down
                    if let Some((slot, _)) = step.fade_out {
                        inner.slot_mut(slot).cleanup();
                    }
                    inner.ramp_task = None;
                    debug!("Fade complete ({:?})", ramp.kind());
                    let _ = events.send(PlaybackEvent::FadeFinished { kind: ramp.kind() });
                    break;
                }
            }
        }));
    }

    /// Consume terminal chain events, cleaning up the owning slot.
    ///
    /// An errored chain is cleaned up immediately rather than faded out: an
    /// error is not a musical event, and cutting it short beats playing
    /// corrupted audio (at the cost of an audible click).
    async fn chain_event_loop(
        inner: Arc<Mutex<EngineInner>>,
        events: broadcast::Sender<PlaybackEvent>,
        mut chain_rx: mpsc::UnboundedReceiver<ChainEvent>,
    ) {
        while let Some(event) = chain_rx.recv().await {
            let mut inner = inner.lock().await;
            let slot = inner.slot_mut(event.slot);

            // A cleanup bumps the generation; drop events from chains that
            // were already superseded or torn down
            if !slot.is_active() || slot.generation() != event.generation {
                debug!(
                    "Ignoring stale chain event for slot {} (generation {})",
                    event.slot, event.generation
                );
                continue;
            }

            match event.outcome {
                ChainOutcome::Finished => {
                    info!("Playback ended ({})", event.slot);
                    slot.cleanup();
                    let _ = events.send(PlaybackEvent::Finished { slot: event.slot });
                }
                ChainOutcome::DecodeFailed(message) => {
                    let source = slot
                        .source()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    error!("Decode error ({}, {}): {}", event.slot, source, message);
                    slot.cleanup();
                    let _ = events.send(PlaybackEvent::Failed {
                        slot: event.slot,
                        message,
                    });
                }
                ChainOutcome::SinkFailed(message) => {
                    let source = slot
                        .source()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    error!("Sink error ({}, {}): {}", event.slot, source, message);
                    slot.cleanup();
                    let _ = events.send(PlaybackEvent::Failed {
                        slot: event.slot,
                        message,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner_with_gains(a: Option<f32>, b: Option<f32>) -> EngineInner {
        let mut inner = EngineInner {
            slots: [PlayerSlot::new(SlotId::A), PlayerSlot::new(SlotId::B)],
            ramp_task: None,
        };

        for (id, gain) in [(SlotId::A, a), (SlotId::B, b)] {
            if let Some(gain) = gain {
                let volume = VolumeStage::new(gain, SampleFormat::S16);
                let kill = Arc::new(AtomicBool::new(false));
                let sink: SharedSink =
                    Arc::new(std::sync::Mutex::new(Box::new(NullSink) as Box<dyn crate::audio::OutputSink>));
                inner.slot_mut(id).arm(
                    std::path::PathBuf::from("t.mp3"),
                    volume,
                    kill,
                    sink,
                    Arc::new(AtomicBool::new(false)),
                );
            }
        }
        inner
    }

    struct NullSink;

    impl crate::audio::OutputSink for NullSink {
        fn write(&mut self, _pcm: &[u8]) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_select_prefers_idle_slot() {
        let inner = inner_with_gains(None, None);
        assert_eq!(inner.select_target(), SlotId::A);

        let inner = inner_with_gains(Some(1.0), None);
        assert_eq!(inner.select_target(), SlotId::B);

        let inner = inner_with_gains(None, Some(1.0));
        assert_eq!(inner.select_target(), SlotId::A);
    }

    #[test]
    fn test_select_both_active_picks_lower_gain() {
        let inner = inner_with_gains(Some(0.9), Some(0.2));
        assert_eq!(inner.select_target(), SlotId::B);

        let inner = inner_with_gains(Some(0.1), Some(0.8));
        assert_eq!(inner.select_target(), SlotId::A);
    }

    #[test]
    fn test_select_equal_gain_prefers_a() {
        let inner = inner_with_gains(Some(0.5), Some(0.5));
        assert_eq!(inner.select_target(), SlotId::A);
    }
}

//! Chain pump: drives decode → volume → sink for one armed slot
//!
//! The pump runs on a blocking task (decode and sink writes both block) and
//! reports exactly one terminal event back to the engine, tagged with the
//! slot generation so a superseded chain cannot affect a later occupant of
//! the same slot. A killed pump reports nothing: its owner is already tearing
//! it down.

use crate::audio::{DecodeStream, VolumeStage};
use crate::playback::slot::{SharedSink, SlotId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// How a chain ended
#[derive(Debug)]
pub enum ChainOutcome {
    /// Natural end-of-stream
    Finished,
    /// Decode pipeline failed mid-stream
    DecodeFailed(String),
    /// Output sink failed to accept samples
    SinkFailed(String),
}

/// Terminal event from a chain pump to the engine
#[derive(Debug)]
pub struct ChainEvent {
    pub slot: SlotId,
    pub generation: u64,
    pub outcome: ChainOutcome,
}

/// Spawn the pump for a freshly armed slot.
pub fn spawn_chain(
    slot: SlotId,
    generation: u64,
    mut stream: Box<dyn DecodeStream>,
    volume: VolumeStage,
    sink: SharedSink,
    kill: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<ChainEvent>,
) {
    tokio::task::spawn_blocking(move || {
        let outcome = run_chain(stream.as_mut(), &volume, &sink, &kill);
        match outcome {
            Some(outcome) => {
                let _ = events.send(ChainEvent {
                    slot,
                    generation,
                    outcome,
                });
            }
            None => debug!("Chain pump for slot {} killed", slot),
        }
    });
}

/// Pump loop. Returns `None` when killed, `Some(outcome)` otherwise.
fn run_chain(
    stream: &mut dyn DecodeStream,
    volume: &VolumeStage,
    sink: &SharedSink,
    kill: &AtomicBool,
) -> Option<ChainOutcome> {
    loop {
        if kill.load(Ordering::Acquire) {
            return None;
        }

        match stream.next_pcm() {
            Ok(Some(pcm)) => {
                // Whatever gain is set right now applies to this whole buffer
                let scaled = volume.apply(&pcm);

                let write_result = match sink.lock() {
                    Ok(mut sink) => sink.write(&scaled),
                    Err(_) => {
                        return Some(ChainOutcome::SinkFailed(
                            "sink lock poisoned".to_string(),
                        ));
                    }
                };

                if let Err(e) = write_result {
                    // A write failing because cleanup closed the sink is not
                    // a device fault; stay silent in that case
                    if kill.load(Ordering::Acquire) {
                        return None;
                    }
                    return Some(ChainOutcome::SinkFailed(e.to_string()));
                }
            }
            Ok(None) => return Some(ChainOutcome::Finished),
            Err(e) => {
                if kill.load(Ordering::Acquire) {
                    return None;
                }
                return Some(ChainOutcome::DecodeFailed(e.to_string()));
            }
        }
    }
}

//! Component H: the command queue.
//!
//! Per `spec.md` §9, this replaces an unbounded queue with a bounded
//! lock-free SPMC queue (`crossbeam_queue::ArrayQueue`) sized
//! `max(64, 4 * layer_count)`. A full queue is visible to the caller as
//! [`crate::error::MixerError::CommandQueueFull`] rather than silently
//! dropped or grown — the control thread decides what to do (retry, drop,
//! log) instead of the core making that call for it.

use crate::fader::FaderKind;
use crate::layer::LayerHandle;
use crate::pipeline::EnvironmentId;
use crate::sound::{SoundInstance, SoundInstanceId};
use crossbeam_queue::ArrayQueue;

pub enum Command {
    Play {
        instance: Box<SoundInstance>,
        reply: Option<LayerHandleSlot>,
    },
    Stop {
        handle: LayerHandle,
        fade_seconds: f64,
    },
    Halt {
        handle: LayerHandle,
    },
    /// Resumes a single halted layer back to `Play`/`Loop`, per
    /// `spec.md` §4.7's `Halt → Play|Loop : onResumed`.
    Resume {
        handle: LayerHandle,
    },
    /// Bulk `Halt → Play|Loop` transition, per `spec.md` §6's `playAll`.
    PlayAll,
    SetGainPan {
        handle: LayerHandle,
        gain: f32,
        pan: f32,
        fade_kind: FaderKind,
        fade_seconds: f64,
    },
    SetPitch {
        handle: LayerHandle,
        pitch: f32,
    },
    SetPlaySpeed {
        handle: LayerHandle,
        speed: f32,
    },
    SetCursor {
        handle: LayerHandle,
        frame: u64,
    },
    SetOcclusion {
        handle: LayerHandle,
        occlusion: f32,
    },
    SetEnvironmentWeights {
        handle: LayerHandle,
        weights: Vec<(EnvironmentId, f32)>,
    },
    StopAll {
        fade_seconds: f64,
    },
    HaltAll,
    SetMasterGain {
        gain: f32,
    },
}

/// One-shot slot the audio thread publishes the newly-assigned
/// [`LayerHandle`] into once a `Play` command is accepted, so the control
/// thread can learn which layer it landed on without a round trip through
/// the queue in the other direction.
pub type LayerHandleSlot = std::sync::Arc<arc_swap::ArcSwapOption<LayerHandle>>;

pub fn new_layer_handle_slot() -> LayerHandleSlot {
    std::sync::Arc::new(arc_swap::ArcSwapOption::from(None))
}

pub struct CommandQueue {
    queue: ArrayQueue<Command>,
}

impl CommandQueue {
    pub fn new(layer_count: usize) -> Self {
        let capacity = (4 * layer_count).max(64);
        Self {
            queue: ArrayQueue::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Enqueues a command from the control thread. Returns the command
    /// back to the caller if the queue is full, rather than blocking —
    /// the mix loop must never be blocked on by a full queue, and the
    /// control thread must never block waiting for the audio thread.
    pub fn push(&self, command: Command) -> Result<(), Command> {
        self.queue.push(command)
    }

    /// Drains all pending commands. Called once at the top of every
    /// `mix()` invocation (Component I), never mid-buffer.
    pub fn drain(&self) -> Vec<Command> {
        let mut out = Vec::with_capacity(self.queue.len());
        while let Some(cmd) = self.queue.pop() {
            out.push(cmd);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_floor_is_64() {
        let q = CommandQueue::new(1);
        assert_eq!(q.capacity(), 64);
    }

    #[test]
    fn capacity_scales_with_layer_count() {
        let q = CommandQueue::new(32);
        assert_eq!(q.capacity(), 128);
    }

    #[test]
    fn full_queue_returns_command_to_caller() {
        let q = CommandQueue::new(1);
        for _ in 0..q.capacity() {
            assert!(q.push(Command::HaltAll).is_ok());
        }
        assert!(q.push(Command::HaltAll).is_err());
    }
}

//! Component G: the mixer layer state machine.
//!
//! Grounded in the original's `AMPLIMIX_LOAD`/`STORE`/`CSWAP` macros
//! (`Mixer.cpp`), which wrap `std::atomic<AmUInt32>` with
//! acquire/release/acq_rel ordering so the control thread can poll a
//! layer's playback state without locking while the audio thread performs
//! the terminal transition. The mixer owns a fixed pool of layers,
//! addressed by non-owning `(index, generation)` [`LayerHandle`]s so a
//! handle captured before a layer was recycled is rejected rather than
//! silently aliasing whatever now occupies that slot.

use crate::sound::SoundInstance;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LayerState {
    Min = 0,
    Stop = 1,
    Halt = 2,
    Play = 3,
    Loop = 4,
    Max = 5,
}

impl LayerState {
    fn from_u32(v: u32) -> Self {
        match v {
            0 => LayerState::Min,
            1 => LayerState::Stop,
            2 => LayerState::Halt,
            3 => LayerState::Play,
            4 => LayerState::Loop,
            _ => LayerState::Max,
        }
    }
}

/// Allowed transitions, matching the original's `ChannelPlaybackState`
/// progression: a layer starts at `Min` (never played), moves to `Play`,
/// may cycle to `Loop` and back to `Play`, and always ends at `Stop`.
/// `Halt` is reachable from any active state as an immediate, non-fading
/// pause, and resumes back to `Play` or `Loop` per `spec.md` §4.7's
/// `Halt → Play|Loop : onResumed`; `Max` is a sentinel and is never a
/// valid transition target.
fn can_transition(from: LayerState, to: LayerState) -> bool {
    use LayerState::*;
    match (from, to) {
        (_, Max) | (Max, _) => false,
        (_, Halt) => true,
        (Halt, Play) | (Halt, Loop) => true,
        (Min, Play) => true,
        (Play, Loop) | (Loop, Play) => true,
        (Play, Stop) | (Loop, Stop) | (Halt, Stop) => true,
        (Stop, Play) => true,
        (a, b) if a == b => true,
        _ => false,
    }
}

/// Observe-only lifecycle notifications, matching the original's
/// `onStarted`/`onPaused`/`onResumed`/`onStopped`/`onEnded`/`onLooped`
/// channel callbacks. The mixer emits these as plain values the façade
/// forwards to the caller; nothing in the core subscribes to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerEvent {
    Started,
    Stopped,
    Halted,
    Resumed,
    Looped,
    Ended,
}

pub struct MixerLayer {
    state: AtomicU32,
    /// State captured the moment this layer entered `Halt`, so `resume`
    /// knows whether to land back on `Play` or `Loop`.
    pre_halt_state: AtomicU32,
    generation: u32,
    pub instance: Option<SoundInstance>,
}

impl MixerLayer {
    fn new() -> Self {
        Self {
            state: AtomicU32::new(LayerState::Min as u32),
            pre_halt_state: AtomicU32::new(LayerState::Play as u32),
            generation: 0,
            instance: None,
        }
    }

    pub fn load_state(&self) -> LayerState {
        LayerState::from_u32(self.state.load(Ordering::Acquire))
    }

    /// Attempts the transition, retrying only on a concurrent read of the
    /// same value (no ABA risk here: only the audio thread writes).
    /// Returns `false` if the transition table rejects the move.
    pub fn try_transition(&self, to: LayerState) -> bool {
        loop {
            let current = self.state.load(Ordering::Acquire);
            let from = LayerState::from_u32(current);
            if !can_transition(from, to) {
                return false;
            }
            if self
                .state
                .compare_exchange(current, to as u32, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                if to == LayerState::Halt {
                    self.pre_halt_state.store(from as u32, Ordering::Release);
                }
                return true;
            }
        }
    }

    /// Resumes a halted layer back to the state it was halted from
    /// (`Play` or `Loop`); defaults to `Play` if it was halted from
    /// anything else. Returns `false` if the layer isn't currently
    /// `Halt`.
    pub fn resume(&self) -> bool {
        let pre = LayerState::from_u32(self.pre_halt_state.load(Ordering::Acquire));
        let target = match pre {
            LayerState::Loop => LayerState::Loop,
            _ => LayerState::Play,
        };
        self.try_transition(target)
    }

    fn force_state(&self, to: LayerState) {
        self.state.store(to as u32, Ordering::Release);
    }
}

/// Fixed pool of mixer layers, one per simultaneously-playable voice.
/// `spec.md` §4.6 bounds this at construction time — the pool never
/// grows, matching the original's fixed channel count.
pub struct LayerPool {
    layers: Vec<MixerLayer>,
    generations: Vec<u32>,
    free: Vec<u32>,
}

impl LayerPool {
    pub fn new(capacity: usize) -> Self {
        let layers = (0..capacity).map(|_| MixerLayer::new()).collect();
        Self {
            layers,
            generations: vec![0; capacity],
            free: (0..capacity as u32).rev().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.layers.len()
    }

    pub fn acquire(&mut self, instance: SoundInstance) -> Option<LayerHandle> {
        let index = self.free.pop()?;
        let layer = &mut self.layers[index as usize];
        layer.instance = Some(instance);
        layer.force_state(LayerState::Min);
        layer.try_transition(LayerState::Play);
        Some(LayerHandle {
            index,
            generation: self.generations[index as usize],
        })
    }

    pub fn get(&self, handle: LayerHandle) -> Option<&MixerLayer> {
        if self.generations[handle.index as usize] != handle.generation {
            return None;
        }
        self.layers.get(handle.index as usize)
    }

    pub fn get_mut(&mut self, handle: LayerHandle) -> Option<&mut MixerLayer> {
        if self.generations[handle.index as usize] != handle.generation {
            return None;
        }
        self.layers.get_mut(handle.index as usize)
    }

    /// Releases a layer back to the pool after it reaches `Stop`/`Halt`
    /// and its instance has been torn down. Bumps the generation so any
    /// outstanding handle to this slot is now recognized as stale.
    pub fn release(&mut self, handle: LayerHandle) {
        if self.generations[handle.index as usize] != handle.generation {
            return;
        }
        let layer = &mut self.layers[handle.index as usize];
        layer.instance = None;
        layer.force_state(LayerState::Min);
        self.generations[handle.index as usize] = self.generations[handle.index as usize].wrapping_add(1);
        self.free.push(handle.index);
    }

    pub fn iter_active_mut(&mut self) -> impl Iterator<Item = (LayerHandle, &mut MixerLayer)> {
        let generations = &self.generations;
        self.layers.iter_mut().enumerate().filter_map(move |(i, l)| {
            if l.instance.is_some() {
                Some((
                    LayerHandle {
                        index: i as u32,
                        generation: generations[i],
                    },
                    l,
                ))
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handle_is_rejected_after_release() {
        let mut pool = LayerPool::new(1);
        let id = crate::sound::SoundInstanceId(1);
        let instance = crate::sound::SoundInstance::new(
            id,
            Box::new(crate::test_support::SilentDecoder::new(2, 48000)),
            Default::default(),
        );
        let handle = pool.acquire(instance).unwrap();
        pool.release(handle);
        assert!(pool.get(handle).is_none());
    }

    #[test]
    fn play_to_stop_to_play_is_allowed_after_recycle() {
        assert!(can_transition(LayerState::Play, LayerState::Stop));
        assert!(can_transition(LayerState::Stop, LayerState::Play));
        assert!(!can_transition(LayerState::Stop, LayerState::Loop));
    }

    #[test]
    fn halt_reachable_from_any_state() {
        for s in [LayerState::Min, LayerState::Stop, LayerState::Play, LayerState::Loop] {
            assert!(can_transition(s, LayerState::Halt));
        }
    }

    #[test]
    fn halt_resumes_to_prior_play_or_loop_state() {
        assert!(can_transition(LayerState::Halt, LayerState::Play));
        assert!(can_transition(LayerState::Halt, LayerState::Loop));

        let mut pool = LayerPool::new(1);
        let id = crate::sound::SoundInstanceId(1);
        let instance = crate::sound::SoundInstance::new(
            id,
            Box::new(crate::test_support::SilentDecoder::new(2, 48000)),
            Default::default(),
        );
        let handle = pool.acquire(instance).unwrap();
        let layer = pool.get(handle).unwrap();
        assert!(layer.try_transition(LayerState::Loop));
        assert!(layer.try_transition(LayerState::Halt));
        assert_eq!(layer.load_state(), LayerState::Halt);
        assert!(layer.resume());
        assert_eq!(layer.load_state(), LayerState::Loop);
    }
}

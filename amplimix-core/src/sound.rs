//! Component F: the sound instance.

use crate::decoder::{Decoder, SoundFormat};
use crate::fader::Fader;
use crate::pipeline::EnvironmentId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SoundInstanceId(pub u64);

/// Loop count for a sound instance. `Finite(0)` plays once with no
/// repeats; `Infinite` loops until explicitly stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Finite(u32),
    Infinite,
}

impl LoopMode {
    fn decrement(self) -> (Self, bool) {
        match self {
            LoopMode::Infinite => (LoopMode::Infinite, true),
            LoopMode::Finite(0) => (LoopMode::Finite(0), false),
            LoopMode::Finite(n) => (LoopMode::Finite(n - 1), true),
        }
    }
}

/// Construction-time parameters for a new sound instance, mirroring the
/// original's `PlayAdvanced` parameters (gain, pan, pitch, speed, loop
/// count, start/end cursor) plus the occlusion/environment inputs
/// `spec.md` §5 folds in from `ChannelInternalState`.
#[derive(Debug, Clone)]
pub struct SoundInstanceSettings {
    pub initial_gain: f32,
    pub initial_pan: f32,
    pub initial_pitch: f32,
    /// `userPlaySpeed`: independent of `initial_pitch`. The mix loop
    /// consumes source frames at `pitch * speed`, matching `spec.md` §3's
    /// `playSpeed = pitch × userPlaySpeed`.
    pub initial_speed: f32,
    pub loop_mode: LoopMode,
    pub start_frame: u64,
    /// Exclusive end of the playable window. `Some(end) == Some(start_frame)`
    /// plays zero frames and ends on the first callback (`spec.md` §8).
    /// `None` plays to the natural end of the source.
    pub end_frame: Option<u64>,
    pub occlusion: f32,
    pub environment_weights: Vec<(EnvironmentId, f32)>,
    pub filter_preset: Option<String>,
}

impl Default for SoundInstanceSettings {
    fn default() -> Self {
        Self {
            initial_gain: 1.0,
            initial_pan: 0.0,
            initial_pitch: 1.0,
            initial_speed: 1.0,
            loop_mode: LoopMode::Finite(0),
            start_frame: 0,
            end_frame: None,
            occlusion: 0.0,
            environment_weights: Vec::new(),
            filter_preset: None,
        }
    }
}

/// A single playing (or about-to-play) sound, owning its decoder and the
/// small amount of per-instance state the mix loop reads every callback.
/// Exclusively owned by the audio thread once attached to a
/// [`crate::layer::MixerLayer`] — all external mutation happens through
/// the command queue (Component H).
pub struct SoundInstance {
    pub id: SoundInstanceId,
    pub decoder: Box<dyn Decoder>,
    pub format: SoundFormat,

    pub gain: f32,
    pub pan: f32,
    pub pitch: f32,
    /// `userPlaySpeed`; combined with `pitch` as `pitch * speed` to derive
    /// the source-frame consumption rate (`spec.md` §4.8(b)).
    pub speed: f32,
    pub gain_fader: Option<Fader>,

    pub loop_mode: LoopMode,
    pub cursor: u64,
    pub end_frame: Option<u64>,
    /// Fixed width of the `[start_frame, end_frame)` window, `None` if
    /// unbounded. Reset into `remaining_frames` on every loop.
    window_frames: Option<u64>,
    /// Source frames left to render in the current pass before the
    /// window's `end_frame` forces a loop/end, `None` if unbounded.
    pub(crate) remaining_frames: Option<u64>,

    pub occlusion: f32,
    pub environment_weights: Vec<(EnvironmentId, f32)>,
    pub filter_preset: Option<String>,
}

impl SoundInstance {
    pub fn new(id: SoundInstanceId, decoder: Box<dyn Decoder>, settings: SoundInstanceSettings) -> Self {
        let format = decoder.format();
        let window_frames = settings
            .end_frame
            .map(|end| end.saturating_sub(settings.start_frame));
        Self {
            id,
            decoder,
            format,
            gain: settings.initial_gain,
            pan: settings.initial_pan,
            pitch: settings.initial_pitch.max(0.001),
            speed: settings.initial_speed.max(0.001),
            gain_fader: None,
            loop_mode: settings.loop_mode,
            cursor: settings.start_frame,
            end_frame: settings.end_frame,
            window_frames,
            remaining_frames: window_frames,
            occlusion: settings.occlusion,
            environment_weights: settings.environment_weights,
            filter_preset: settings.filter_preset,
        }
    }

    /// Effective frame-consumption-rate multiplier, `pitch * speed`.
    pub fn play_speed(&self) -> f32 {
        (self.pitch * self.speed).max(0.001)
    }

    /// Called when the decoder reaches the end of stream, or when the
    /// `end_frame` window has been fully consumed. Returns `true` if
    /// playback should loop (decoder is rewound by the caller and the
    /// window countdown is reset), `false` if the instance has fully
    /// ended.
    pub fn consume_loop(&mut self) -> bool {
        let (next, should_loop) = self.loop_mode.decrement();
        self.loop_mode = next;
        if should_loop {
            self.cursor = 0;
            self.remaining_frames = self.window_frames;
        }
        should_loop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_loop_counts_down_exactly() {
        let mut mode = LoopMode::Finite(2);
        let mut loops = 0;
        loop {
            let (next, should_loop) = mode.decrement();
            mode = next;
            if !should_loop {
                break;
            }
            loops += 1;
        }
        assert_eq!(loops, 2);
    }

    #[test]
    fn infinite_loop_never_stops() {
        let mode = LoopMode::Infinite;
        let (next, should_loop) = mode.decrement();
        assert!(should_loop);
        assert_eq!(next, LoopMode::Infinite);
    }

    #[test]
    fn start_equal_to_end_yields_zero_remaining_frames() {
        let mut settings = SoundInstanceSettings::default();
        settings.start_frame = 100;
        settings.end_frame = Some(100);
        let instance = SoundInstance::new(
            SoundInstanceId(1),
            Box::new(crate::test_support::SilentDecoder::new(2, 48_000)),
            settings,
        );
        assert_eq!(instance.remaining_frames, Some(0));
    }

    #[test]
    fn play_speed_multiplies_pitch_and_speed() {
        let mut settings = SoundInstanceSettings::default();
        settings.initial_pitch = 1.5;
        settings.initial_speed = 2.0;
        let instance = SoundInstance::new(
            SoundInstanceId(2),
            Box::new(crate::test_support::SilentDecoder::new(2, 48_000)),
            settings,
        );
        assert!((instance.play_speed() - 3.0).abs() < 1e-6);
    }
}

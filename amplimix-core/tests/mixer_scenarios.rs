//! End-to-end scenarios exercising `Amplimix` through its public façade
//! only, the way a host game engine would: construct, `play()`, `mix()`
//! in fixed-size blocks, drain events. Grounded in `spec.md` §8.4's
//! scenario table.

use amplimix_core::chunk::SoundChunk;
use amplimix_core::decoder::{Decoder, DecoderError, SampleFormat, SoundFormat};
use amplimix_core::layer::LayerEvent;
use amplimix_core::mixer::{gain_to_q15, lr_gain, mix_accumulate_q15, MixerConfig};
use amplimix_core::filters::{BiquadKindTag, FilterKind};
use amplimix_core::pipeline::{PipelineNodeConfig, ProcessorPipeline};
use amplimix_core::registry::{FaderRegistry, FilterRegistry, ProcessorRegistry};
use amplimix_core::sound::{LoopMode, SoundInstance, SoundInstanceId, SoundInstanceSettings};
use amplimix_core::Amplimix;

/// Fixed in-memory interleaved-`f32` decoder, standing in for a real
/// codec the way a host integration test would stub one out.
struct ToneDecoder {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
    pos: usize,
}

impl ToneDecoder {
    fn tone(frames: usize, channels: u16, sample_rate: u32, freq: f32) -> Self {
        let mut samples = vec![0.0f32; frames * channels as usize];
        for f in 0..frames {
            let v = (2.0 * std::f32::consts::PI * freq * f as f32 / sample_rate as f32).sin();
            for c in 0..channels as usize {
                samples[f * channels as usize + c] = v;
            }
        }
        Self {
            samples,
            channels,
            sample_rate,
            pos: 0,
        }
    }
}

impl Decoder for ToneDecoder {
    fn format(&self) -> SoundFormat {
        SoundFormat {
            channels: self.channels,
            sample_rate: self.sample_rate,
            sample_format: SampleFormat::F32,
            frames: Some((self.samples.len() / self.channels.max(1) as usize) as u64),
        }
    }

    fn decode(&mut self, chunk: &mut SoundChunk) -> Result<usize, DecoderError> {
        let total_frames = self.samples.len() / self.channels.max(1) as usize;
        let remaining = total_frames.saturating_sub(self.pos);
        let max_frames = chunk.samples.len() / self.channels.max(1) as usize;
        let n = remaining.min(max_frames);

        let start = self.pos * self.channels as usize;
        let end = start + n * self.channels as usize;
        chunk.samples[..end - start].copy_from_slice(&self.samples[start..end]);
        chunk.channels = self.channels;
        self.pos += n;
        Ok(n)
    }

    fn seek(&mut self, frame: u64) -> Result<(), DecoderError> {
        self.pos = frame as usize;
        Ok(())
    }

    fn len_frames(&self) -> Option<u64> {
        Some((self.samples.len() / self.channels.max(1) as usize) as u64)
    }
}

fn test_mixer(layer_count: usize) -> Amplimix {
    let config = MixerConfig {
        device_sample_rate: 48_000,
        device_channels: 2,
        layer_count,
        chunk_pool_capacity: 16,
    };
    Amplimix::new(
        config,
        FaderRegistry::builder().enable_standard().build(),
        FilterRegistry::builder().build(),
        ProcessorRegistry::builder().register_standard(FilterRegistry::builder().build()).build(),
    )
}

/// Scenario: silence in, silence out. No sound playing should never
/// produce so much as denormal noise in the device buffer.
#[test]
fn silence_test() {
    let mut mixer = test_mixer(4);
    let mut out = vec![0.777f32; 512 * 2];
    mixer.mix(&mut out, 512);
    assert!(out.iter().all(|s| *s == 0.0));
}

/// Scenario: a static mono source panned center should split evenly and
/// at the -3dB-ish pan-law gain to both device channels.
#[test]
fn static_mono_to_stereo_pan_center() {
    let mut mixer = test_mixer(4);

    // Cross-check the pan-law formula itself against the Q15 fixed-point
    // invariant from spec.md §8.4 before driving it through the mixer.
    let (l, r) = lr_gain(1.0, 0.0);
    assert!((l - r).abs() < 1e-6);

    let gain_q15 = gain_to_q15(l);
    let half_scale = 16384i16;
    let out = mix_accumulate_q15(half_scale, gain_q15);
    assert!((out as i32 - 11585).abs() <= 2, "expected ~11585 LSB, got {out}");

    let mut settings = SoundInstanceSettings::default();
    settings.initial_pan = 0.0;
    settings.initial_gain = 1.0;
    let instance = SoundInstance::new(
        SoundInstanceId(1),
        Box::new(ToneDecoder::tone(48_000, 1, 48_000, 220.0)),
        settings,
    );
    mixer.play(instance).unwrap();

    let mut out = vec![0.0f32; 512 * 2];
    mixer.mix(&mut out, 512);

    let left_energy: f32 = out.iter().step_by(2).map(|s| s.abs()).sum();
    let right_energy: f32 = out.iter().skip(1).step_by(2).map(|s| s.abs()).sum();
    assert!((left_energy - right_energy).abs() < left_energy * 0.05);
}

/// Scenario: panning hard left vs hard right should move energy to the
/// matching device channel.
#[test]
fn pan_sweep_moves_energy_left_and_right() {
    let mut mixer = test_mixer(4);

    let mut left_settings = SoundInstanceSettings::default();
    left_settings.initial_pan = -1.0;
    let left_instance = SoundInstance::new(
        SoundInstanceId(1),
        Box::new(ToneDecoder::tone(48_000, 1, 48_000, 220.0)),
        left_settings,
    );
    mixer.play(left_instance).unwrap();

    let mut out = vec![0.0f32; 512 * 2];
    mixer.mix(&mut out, 512);
    let left_energy: f32 = out.iter().step_by(2).map(|s| s.abs()).sum();
    let right_energy: f32 = out.iter().skip(1).step_by(2).map(|s| s.abs()).sum();
    assert!(left_energy > right_energy * 5.0, "l={left_energy} r={right_energy}");

    let mut mixer = test_mixer(4);
    let mut right_settings = SoundInstanceSettings::default();
    right_settings.initial_pan = 1.0;
    let right_instance = SoundInstance::new(
        SoundInstanceId(2),
        Box::new(ToneDecoder::tone(48_000, 1, 48_000, 220.0)),
        right_settings,
    );
    mixer.play(right_instance).unwrap();

    let mut out = vec![0.0f32; 512 * 2];
    mixer.mix(&mut out, 512);
    let left_energy: f32 = out.iter().step_by(2).map(|s| s.abs()).sum();
    let right_energy: f32 = out.iter().skip(1).step_by(2).map(|s| s.abs()).sum();
    assert!(right_energy > left_energy * 5.0, "l={left_energy} r={right_energy}");
}

/// Scenario: a sound with a finite loop count of `k` emits `Looped`
/// exactly `k - 1` times and then exactly one `Ended`, never the reverse
/// order and never a trailing extra event.
#[test]
fn loop_count_emits_looped_then_ended_in_order() {
    let mut mixer = test_mixer(4);
    let decoder = Box::new(ToneDecoder::tone(200, 1, 48_000, 330.0));
    let mut settings = SoundInstanceSettings::default();
    settings.loop_mode = LoopMode::Finite(3);
    let instance = SoundInstance::new(SoundInstanceId(9), decoder, settings);
    mixer.play(instance).unwrap();

    let mut out = vec![0.0f32; 200 * 2];
    let mut events = Vec::new();
    for _ in 0..60 {
        mixer.mix(&mut out, 200);
        events.extend(mixer.take_events().into_iter().map(|(_, e)| e));
        if events.last() == Some(&LayerEvent::Ended) {
            break;
        }
    }

    let loop_count = events.iter().filter(|e| **e == LayerEvent::Looped).count();
    assert_eq!(loop_count, 3, "events: {events:?}");
    assert_eq!(events.last(), Some(&LayerEvent::Ended));
    // Ended must be the last event and must appear exactly once.
    assert_eq!(events.iter().filter(|e| **e == LayerEvent::Ended).count(), 1);
}

/// Scenario: a named biquad low-pass preset, resolved through the
/// `instance_filter` pipeline node against a `SoundInstance::filter_preset`
/// name, attenuates a high-frequency tone well below its unfiltered level.
#[test]
fn biquad_lowpass_attenuates_above_threshold() {
    let filters = FilterRegistry::builder()
        .register(
            "lowpass_1k",
            FilterKind::Biquad(BiquadKindTag::LowPass),
        )
        .build();
    let registry = ProcessorRegistry::builder().register_standard(filters).build();
    let config = vec![PipelineNodeConfig::Processor {
        processor: "instance_filter".to_string(),
    }];
    let mut pipeline = ProcessorPipeline::new(&registry, &config);

    let sample_rate = 48_000u32;
    let tone_freq = 14_000.0;
    let n = 4096;
    let tone: Vec<f32> = (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * tone_freq * i as f32 / sample_rate as f32).sin())
        .collect();

    let mut unfiltered = tone.clone();
    let mut scratch = Vec::new();
    pipeline.process(SoundInstanceId(1), sample_rate, 1, &[], 0.0, None, &mut unfiltered, &mut scratch);
    assert_eq!(unfiltered, tone, "no filter preset must be a passthrough");

    let mut filtered = tone.clone();
    pipeline.process(
        SoundInstanceId(2),
        sample_rate,
        1,
        &[],
        0.0,
        Some("lowpass_1k"),
        &mut filtered,
        &mut scratch,
    );

    let rms = |buf: &[f32]| -> f64 {
        let sum: f64 = buf.iter().map(|s| (*s as f64).powi(2)).sum();
        (sum / buf.len() as f64).sqrt()
    };

    let input_rms = rms(&tone[n / 2..]);
    let output_rms = rms(&filtered[n / 2..]);
    assert!(
        output_rms < input_rms * 0.3,
        "expected heavy attenuation through the low-pass preset, in={input_rms} out={output_rms}"
    );
}

/// Scenario: doubling playback pitch consumes source frames roughly
/// twice as fast, so a fixed-length buffer ends in roughly half as many
/// device-frame blocks as unpitched playback.
#[test]
fn pitch_shift_changes_frame_consumption_rate() {
    let blocks_to_end = |pitch: f32| -> usize {
        let mut mixer = test_mixer(4);
        let decoder = Box::new(ToneDecoder::tone(48_000, 1, 48_000, 220.0));
        let mut settings = SoundInstanceSettings::default();
        settings.initial_pitch = pitch;
        let instance = SoundInstance::new(SoundInstanceId(3), decoder, settings);
        mixer.play(instance).unwrap();

        let mut out = vec![0.0f32; 1024 * 2];
        for block in 1..=200 {
            mixer.mix(&mut out, 1024);
            if mixer.take_events().iter().any(|(_, e)| *e == LayerEvent::Ended) {
                return block;
            }
        }
        200
    };

    let normal = blocks_to_end(1.0);
    let doubled = blocks_to_end(2.0);

    assert!(
        doubled < normal,
        "pitch 2.0 should end sooner than pitch 1.0: normal={normal} doubled={doubled}"
    );
    let ratio = normal as f64 / doubled as f64;
    assert!((ratio - 2.0).abs() < 0.5, "expected ~2x consumption rate, got ratio={ratio}");
}

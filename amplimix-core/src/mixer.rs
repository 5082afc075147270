//! Components I and J: the mix loop and the `Amplimix` façade.
//!
//! Grounded in `examples/original_source/src/Mixer/Mixer.cpp`'s
//! `MixLayer`/`Mix` functions: drain pending commands, then for every
//! active layer decode enough source frames, resample to the device rate
//! (scaled by pitch and speed), apply per-instance gain/pan, run the
//! processor pipeline, and accumulate into the output buffer — all
//! without allocating once steady state is reached.

use crate::chunk::{ChunkPool, ChunkTag, SoundChunk};
use crate::command_queue::{new_layer_handle_slot, Command, CommandQueue};
use crate::decoder::Decoder;
use crate::error::{MixerError, MixerResult};
use crate::fader::{Fader, FaderKind, FaderState};
use crate::layer::{LayerHandle, LayerPool, LayerState};
use crate::pipeline::{standard_pipeline_config, EnvironmentId, PipelineNodeConfig, ProcessorPipeline};
use crate::registry::{FaderRegistry, FilterRegistry, ProcessorRegistry};
use crate::sound::{LoopMode, SoundInstance, SoundInstanceId, SoundInstanceSettings};
use std::f32::consts::PI;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Construction-time parameters, grouped per `spec.md` §6's external
/// interface surface (ambient "configuration" concern, `SPEC_FULL.md` §3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MixerConfig {
    pub device_sample_rate: u32,
    pub device_channels: u16,
    pub layer_count: usize,
    pub chunk_pool_capacity: usize,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            device_sample_rate: 48_000,
            device_channels: 2,
            layer_count: 64,
            chunk_pool_capacity: 128,
        }
    }
}

/// Linear left/right gain pair from a `[-1, 1]` pan value and a scalar
/// gain, matching the original's `LRGain`:
/// `p = pi * (pan + 1) / 4; left = cos(p) * gain; right = sin(p) * gain`.
pub fn lr_gain(gain: f32, pan: f32) -> (f32, f32) {
    let p = PI * (pan.clamp(-1.0, 1.0) + 1.0) / 4.0;
    (p.cos() * gain, p.sin() * gain)
}

/// Q15 fixed-point gain multiply-accumulate, `(sample * gain_q15) >> 15`,
/// kept as a standalone utility for integer-PCM backends that want the
/// original's exact fixed-point accumulation semantics for the final
/// gain/pan stage (see `DESIGN.md` for why the f32 device path below
/// doesn't route through this by default).
pub fn mix_accumulate_q15(sample: i16, gain_q15: i16) -> i16 {
    ((sample as i32 * gain_q15 as i32) >> 15) as i16
}

pub fn gain_to_q15(gain: f32) -> i16 {
    (gain.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

struct LayerRuntime {
    pipeline: ProcessorPipeline,
    pipeline_scratch: Vec<f32>,
    history: Vec<f32>,
    /// Fractional read position into `history`, in source frames.
    read_pos: f64,
    scratch_chunk: SoundChunk,
}

impl LayerRuntime {
    fn new(
        processor_registry: &ProcessorRegistry,
        pipeline_config: &[PipelineNodeConfig],
        scratch_chunk: SoundChunk,
    ) -> Self {
        Self {
            pipeline: ProcessorPipeline::new(processor_registry, pipeline_config),
            pipeline_scratch: Vec::new(),
            history: Vec::new(),
            read_pos: 0.0,
            scratch_chunk,
        }
    }

    fn reset(&mut self) {
        self.history.clear();
        self.read_pos = 0.0;
    }
}

/// Handle returned from [`Amplimix::play`]; resolves to the assigned
/// [`LayerHandle`] once the audio thread has applied the `Play` command,
/// which happens at the top of its next `mix()` call.
pub struct PendingLayerHandle {
    slot: crate::command_queue::LayerHandleSlot,
}

impl PendingLayerHandle {
    /// Returns the assigned handle if the audio thread has applied the
    /// command yet, `None` otherwise. Never blocks.
    pub fn poll(&self) -> Option<LayerHandle> {
        self.slot.load().as_deref().copied()
    }
}

enum RenderOutcome {
    Playing,
    Looped,
    Ended,
}

/// The `Amplimix` façade: the entire public surface of Components F–J.
pub struct Amplimix {
    config: MixerConfig,
    layers: LayerPool,
    runtimes: Vec<Option<LayerRuntime>>,
    command_queue: CommandQueue,
    fader_registry: FaderRegistry,
    filter_registry: FilterRegistry,
    processor_registry: ProcessorRegistry,
    pipeline_config: Vec<PipelineNodeConfig>,
    chunk_pool: Arc<ChunkPool>,
    master_gain: AtomicU32,
    pending_events: Vec<(SoundInstanceId, crate::layer::LayerEvent)>,
    mix_scratch: Vec<f32>,
}

impl Amplimix {
    /// Constructs a mixer using the standard effects chain (environment
    /// send, occlusion, per-instance named filter). Use
    /// [`Self::new_with_pipeline`] to supply a custom
    /// [`PipelineNodeConfig`] list, per `spec.md` §6's declarative
    /// pipeline configuration surface.
    pub fn new(
        config: MixerConfig,
        fader_registry: FaderRegistry,
        filter_registry: FilterRegistry,
        processor_registry: ProcessorRegistry,
    ) -> Self {
        Self::new_with_pipeline(
            config,
            fader_registry,
            filter_registry,
            processor_registry,
            standard_pipeline_config(),
        )
    }

    pub fn new_with_pipeline(
        config: MixerConfig,
        fader_registry: FaderRegistry,
        filter_registry: FilterRegistry,
        processor_registry: ProcessorRegistry,
        pipeline_config: Vec<PipelineNodeConfig>,
    ) -> Self {
        let layer_count = config.layer_count;
        let chunk_pool = ChunkPool::new(config.chunk_pool_capacity);
        Self {
            runtimes: (0..layer_count).map(|_| None).collect(),
            layers: LayerPool::new(layer_count),
            command_queue: CommandQueue::new(layer_count),
            fader_registry,
            filter_registry,
            processor_registry,
            pipeline_config,
            chunk_pool,
            master_gain: AtomicU32::new(1.0f32.to_bits()),
            pending_events: Vec::new(),
            mix_scratch: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    pub fn filter_registry(&self) -> &FilterRegistry {
        &self.filter_registry
    }

    pub fn fader_registry(&self) -> &FaderRegistry {
        &self.fader_registry
    }

    pub fn chunk_pool_stats(&self, tag: ChunkTag) -> crate::chunk::ChunkPoolStats {
        self.chunk_pool.stats(tag)
    }

    // -- Façade: control-thread API (Component J) -----------------------

    /// Enqueues a sound for playback and returns a [`PendingLayerHandle`]
    /// the caller can poll for the [`LayerHandle`] the audio thread
    /// assigns once the command is applied at the top of the next `mix()`
    /// call. Polling rather than blocking keeps `play()` itself
    /// non-blocking even if the audio thread isn't currently running.
    pub fn play(&self, instance: SoundInstance) -> Result<PendingLayerHandle, MixerError> {
        let slot = new_layer_handle_slot();
        self.command_queue
            .push(Command::Play {
                instance: Box::new(instance),
                reply: Some(slot.clone()),
            })
            .map_err(|_| MixerError::CommandQueueFull(self.command_queue.capacity()))?;
        Ok(PendingLayerHandle { slot })
    }

    /// Enqueues a sound for playback with an explicit cursor window and
    /// play parameters, matching the original's `PlayAdvanced` and
    /// `spec.md` §6's `playAdvanced` control-API entry. `end_frame` of
    /// `Some(start_frame)` plays zero frames and ends on the first
    /// callback (`spec.md` §8).
    #[allow(clippy::too_many_arguments)]
    pub fn play_advanced(
        &self,
        id: SoundInstanceId,
        mut decoder: Box<dyn Decoder>,
        start_frame: u64,
        end_frame: Option<u64>,
        gain: f32,
        pan: f32,
        pitch: f32,
        speed: f32,
        loop_mode: LoopMode,
    ) -> Result<PendingLayerHandle, MixerError> {
        let _ = decoder.seek(start_frame);
        let settings = SoundInstanceSettings {
            initial_gain: gain,
            initial_pan: pan,
            initial_pitch: pitch,
            initial_speed: speed,
            loop_mode,
            start_frame,
            end_frame,
            ..Default::default()
        };
        self.play(SoundInstance::new(id, decoder, settings))
    }

    /// Bulk-resumes every currently-halted layer back to the state it was
    /// halted from (`Play` or `Loop`), matching `spec.md` §6's `playAll`.
    pub fn play_all(&self) -> MixerResult<()> {
        self.enqueue(Command::PlayAll)
    }

    pub fn stop(&self, handle: LayerHandle, fade_seconds: f64) -> MixerResult<()> {
        self.enqueue(Command::Stop { handle, fade_seconds })
    }

    pub fn halt(&self, handle: LayerHandle) -> MixerResult<()> {
        self.enqueue(Command::Halt { handle })
    }

    /// Resumes a single halted layer, per `spec.md` §4.7's
    /// `Halt → Play|Loop : onResumed`.
    pub fn resume(&self, handle: LayerHandle) -> MixerResult<()> {
        self.enqueue(Command::Resume { handle })
    }

    pub fn set_gain_pan(
        &self,
        handle: LayerHandle,
        gain: f32,
        pan: f32,
        fade_kind: FaderKind,
        fade_seconds: f64,
    ) -> MixerResult<()> {
        self.fader_registry.require(fade_kind)?;
        self.enqueue(Command::SetGainPan {
            handle,
            gain,
            pan,
            fade_kind,
            fade_seconds,
        })
    }

    pub fn set_pitch(&self, handle: LayerHandle, pitch: f32) -> MixerResult<()> {
        self.enqueue(Command::SetPitch { handle, pitch })
    }

    /// Sets `userPlaySpeed`, independent of pitch; effective consumption
    /// rate is `pitch * speed` (`spec.md` §3/§4.8(b)).
    pub fn set_play_speed(&self, handle: LayerHandle, speed: f32) -> MixerResult<()> {
        self.enqueue(Command::SetPlaySpeed { handle, speed })
    }

    pub fn set_cursor(&self, handle: LayerHandle, frame: u64) -> MixerResult<()> {
        self.enqueue(Command::SetCursor { handle, frame })
    }

    pub fn set_obstruction_occlusion(&self, handle: LayerHandle, occlusion: f32) -> MixerResult<()> {
        self.enqueue(Command::SetOcclusion { handle, occlusion })
    }

    pub fn set_environment_weights(&self, handle: LayerHandle, weights: Vec<(EnvironmentId, f32)>) -> MixerResult<()> {
        self.enqueue(Command::SetEnvironmentWeights { handle, weights })
    }

    pub fn fade(&self, handle: LayerHandle, kind: FaderKind, to_gain: f32, duration: f64) -> MixerResult<()> {
        self.set_gain_pan(handle, to_gain, 0.0, kind, duration)
    }

    pub fn stop_all(&self, fade_seconds: f64) -> MixerResult<()> {
        self.enqueue(Command::StopAll { fade_seconds })
    }

    pub fn halt_all(&self) -> MixerResult<()> {
        self.enqueue(Command::HaltAll)
    }

    pub fn set_master_gain(&self, gain: f32) -> MixerResult<()> {
        self.enqueue(Command::SetMasterGain { gain })
    }

    pub fn is_playing(&self, handle: LayerHandle) -> bool {
        matches!(
            self.layers.get(handle).map(|l| l.load_state()),
            Some(LayerState::Play) | Some(LayerState::Loop)
        )
    }

    pub fn take_events(&mut self) -> Vec<(SoundInstanceId, crate::layer::LayerEvent)> {
        std::mem::take(&mut self.pending_events)
    }

    fn enqueue(&self, command: Command) -> MixerResult<()> {
        self.command_queue
            .push(command)
            .map_err(|_| MixerError::CommandQueueFull(self.command_queue.capacity()))
    }

    // -- Component I: the mix loop (audio thread, real time) ------------

    /// Renders `frames` device frames of interleaved audio into `output`
    /// (`frames * device_channels` long). Called once per audio callback.
    pub fn mix(&mut self, output: &mut [f32], frames: usize) {
        output.iter_mut().for_each(|s| *s = 0.0);
        self.apply_commands();

        let device_channels = self.config.device_channels;
        let device_sample_rate = self.config.device_sample_rate;

        let registry = &self.processor_registry;
        let pipeline_config = &self.pipeline_config;
        let runtimes = &mut self.runtimes;
        let chunk_pool = &self.chunk_pool;
        let pending_events = &mut self.pending_events;

        for (handle, layer) in self.layers.iter_active_mut() {
            let state = layer.load_state();
            if !matches!(state, LayerState::Play | LayerState::Loop) {
                continue;
            }

            let Some(instance) = layer.instance.as_mut() else {
                continue;
            };

            let runtime = match runtimes[handle_index(handle)].as_mut() {
                Some(r) => r,
                None => {
                    let Some(chunk) = chunk_pool.try_checkout(ChunkTag::Amplimix) else {
                        tracing::error!("chunk pool exhausted, skipping layer this cycle");
                        continue;
                    };
                    runtimes[handle_index(handle)] = Some(LayerRuntime::new(registry, pipeline_config, chunk));
                    runtimes[handle_index(handle)].as_mut().unwrap()
                }
            };

            self.mix_scratch.clear();
            self.mix_scratch.resize(frames * device_channels as usize, 0.0);

            let outcome = render_layer(
                instance,
                runtime,
                device_sample_rate,
                device_channels,
                frames,
                &mut self.mix_scratch,
            );

            for (dst, src) in output.iter_mut().zip(self.mix_scratch.iter()) {
                *dst += *src;
            }

            match outcome {
                RenderOutcome::Playing => {}
                RenderOutcome::Looped => {
                    layer.try_transition(LayerState::Loop);
                    pending_events.push((instance.id, crate::layer::LayerEvent::Looped));
                }
                RenderOutcome::Ended => {
                    layer.try_transition(LayerState::Stop);
                    pending_events.push((instance.id, crate::layer::LayerEvent::Ended));
                }
            }
        }

        // Release any layer that reached Stop this block, recycling its
        // runtime and pipeline state. Halted layers are left alone: a
        // pause is not a stop, and must stay allocated until resumed or
        // explicitly stopped (`spec.md` §4.7).
        let to_release: Vec<LayerHandle> = self
            .layers
            .iter_active_mut()
            .filter(|(_, l)| l.load_state() == LayerState::Stop)
            .map(|(h, _)| h)
            .collect();

        for handle in to_release {
            if let Some(layer) = self.layers.get_mut(handle) {
                if let Some(instance) = &layer.instance {
                    if let Some(runtime) = runtimes[handle_index(handle)].as_mut() {
                        runtime.pipeline.cleanup_sound(instance.id);
                    }
                }
            }
            if let Some(runtime) = runtimes[handle_index(handle)].take() {
                chunk_pool.release(ChunkTag::Amplimix, runtime.scratch_chunk);
            }
            self.layers.release(handle);
        }

        let master = f32::from_bits(self.master_gain.load(Ordering::Acquire));
        if (master - 1.0).abs() > f32::EPSILON {
            for s in output.iter_mut() {
                *s *= master;
            }
        }
    }

    fn apply_commands(&mut self) {
        for command in self.command_queue.drain() {
            match command {
                Command::Play { instance, reply } => {
                    let Some(chunk) = self.chunk_pool.try_checkout(ChunkTag::Amplimix) else {
                        tracing::error!("chunk pool exhausted, dropping Play command");
                        continue;
                    };
                    match self.layers.acquire(*instance) {
                        Some(handle) => {
                            self.runtimes[handle_index(handle)] =
                                Some(LayerRuntime::new(&self.processor_registry, &self.pipeline_config, chunk));
                            if let Some(layer) = self.layers.get(handle) {
                                if let Some(instance) = &layer.instance {
                                    self.pending_events
                                        .push((instance.id, crate::layer::LayerEvent::Started));
                                }
                            }
                            if let Some(slot) = reply {
                                slot.store(Some(std::sync::Arc::new(handle)));
                            }
                        }
                        None => {
                            tracing::warn!("layer pool exhausted, dropping Play command");
                            self.chunk_pool.release(ChunkTag::Amplimix, chunk);
                        }
                    }
                }
                Command::Stop { handle, fade_seconds } => {
                    if let Some(layer) = self.layers.get_mut(handle) {
                        if let Some(instance) = layer.instance.as_mut() {
                            if fade_seconds > 0.0 {
                                instance.gain_fader =
                                    Some(Fader::new(FaderKind::Linear, instance.gain as f64, 0.0, fade_seconds));
                            } else {
                                layer.try_transition(LayerState::Stop);
                            }
                        }
                    }
                }
                Command::Halt { handle } => self.apply_commands_single(Command::Halt { handle }),
                Command::Resume { handle } => self.apply_commands_single(Command::Resume { handle }),
                Command::PlayAll => {
                    let handles: Vec<LayerHandle> = self
                        .layers
                        .iter_active_mut()
                        .filter(|(_, l)| l.load_state() == LayerState::Halt)
                        .map(|(h, _)| h)
                        .collect();
                    for handle in handles {
                        self.apply_commands_single(Command::Resume { handle });
                    }
                }
                Command::SetGainPan {
                    handle,
                    gain,
                    pan,
                    fade_kind,
                    fade_seconds,
                } => {
                    if let Some(layer) = self.layers.get_mut(handle) {
                        if let Some(instance) = layer.instance.as_mut() {
                            instance.pan = pan;
                            if fade_seconds > 0.0 {
                                instance.gain_fader =
                                    Some(Fader::new(fade_kind, instance.gain as f64, gain as f64, fade_seconds));
                            } else {
                                instance.gain = gain;
                                instance.gain_fader = None;
                            }
                        }
                    }
                }
                Command::SetPitch { handle, pitch } => {
                    if let Some(layer) = self.layers.get_mut(handle) {
                        if let Some(instance) = layer.instance.as_mut() {
                            instance.pitch = pitch.max(0.001);
                        }
                    }
                }
                Command::SetPlaySpeed { handle, speed } => {
                    if let Some(layer) = self.layers.get_mut(handle) {
                        if let Some(instance) = layer.instance.as_mut() {
                            instance.speed = speed.max(0.001);
                        }
                    }
                }
                Command::SetCursor { handle, frame } => {
                    if let Some(layer) = self.layers.get_mut(handle) {
                        if let Some(instance) = layer.instance.as_mut() {
                            let _ = instance.decoder.seek(frame);
                            instance.cursor = frame;
                        }
                    }
                    if let Some(runtime) = self.runtimes[handle_index(handle)].as_mut() {
                        runtime.reset();
                    }
                }
                Command::SetOcclusion { handle, occlusion } => {
                    if let Some(layer) = self.layers.get_mut(handle) {
                        if let Some(instance) = layer.instance.as_mut() {
                            instance.occlusion = occlusion;
                        }
                    }
                }
                Command::SetEnvironmentWeights { handle, weights } => {
                    if let Some(layer) = self.layers.get_mut(handle) {
                        if let Some(instance) = layer.instance.as_mut() {
                            instance.environment_weights = weights;
                        }
                    }
                }
                Command::StopAll { fade_seconds } => {
                    let handles: Vec<LayerHandle> = self.layers.iter_active_mut().map(|(h, _)| h).collect();
                    for handle in handles {
                        self.apply_commands_single(Command::Stop { handle, fade_seconds });
                    }
                }
                Command::HaltAll => {
                    let handles: Vec<LayerHandle> = self.layers.iter_active_mut().map(|(h, _)| h).collect();
                    for handle in handles {
                        self.apply_commands_single(Command::Halt { handle });
                    }
                }
                Command::SetMasterGain { gain } => {
                    self.master_gain.store(gain.to_bits(), Ordering::Release);
                }
            }
        }
    }

    fn apply_commands_single(&mut self, command: Command) {
        match command {
            Command::Stop { handle, fade_seconds } => {
                if let Some(layer) = self.layers.get_mut(handle) {
                    if fade_seconds <= 0.0 {
                        layer.try_transition(LayerState::Stop);
                    } else if let Some(instance) = layer.instance.as_mut() {
                        instance.gain_fader = Some(Fader::new(FaderKind::Linear, instance.gain as f64, 0.0, fade_seconds));
                    }
                }
            }
            Command::Halt { handle } => {
                if let Some(layer) = self.layers.get_mut(handle) {
                    if layer.try_transition(LayerState::Halt) {
                        if let Some(instance) = &layer.instance {
                            self.pending_events.push((instance.id, crate::layer::LayerEvent::Halted));
                        }
                    }
                }
            }
            Command::Resume { handle } => {
                if let Some(layer) = self.layers.get_mut(handle) {
                    if layer.resume() {
                        if let Some(instance) = &layer.instance {
                            self.pending_events.push((instance.id, crate::layer::LayerEvent::Resumed));
                        }
                    }
                }
            }
            _ => unreachable!("apply_commands_single only used for Stop/Halt/Resume fan-out"),
        }
    }
}

fn handle_index(handle: LayerHandle) -> usize {
    // `index` is crate-visible on LayerHandle; mixer.rs is in the same
    // crate as layer.rs.
    handle.index as usize
}

#[allow(clippy::too_many_arguments)]
fn render_layer(
    instance: &mut SoundInstance,
    runtime: &mut LayerRuntime,
    device_sample_rate: u32,
    device_channels: u16,
    out_frames: usize,
    out: &mut [f32],
) -> RenderOutcome {
    if instance.remaining_frames == Some(0) {
        return RenderOutcome::Ended;
    }

    let src_channels = instance.format.channels.max(1) as usize;
    let step = (instance.format.sample_rate as f64 * instance.play_speed() as f64) / device_sample_rate.max(1) as f64;
    let needed_src_frames = (out_frames as f64 * step).ceil() as usize + 2;

    let mut outcome = RenderOutcome::Playing;
    ensure_history(instance, runtime, needed_src_frames, &mut outcome);

    let history_frames = runtime.history.len() / src_channels;
    let dt = 1.0 / device_sample_rate.max(1) as f64;

    // Clamp how many device frames this block actually renders if the
    // instance's `end_frame` window runs out before `out_frames` does,
    // so a bounded `playAdvanced` window never reads past its end.
    let effective_out_frames = match instance.remaining_frames {
        Some(remaining) => out_frames.min((remaining as f64 / step).floor() as usize),
        None => out_frames,
    };

    for frame_idx in 0..effective_out_frames {
        let pos = runtime.read_pos;
        let i0 = pos.floor() as usize;
        let frac = pos - i0 as f64;

        let mut src_sample = [0.0f32; 8];
        if i0 + 1 < history_frames {
            for c in 0..src_channels.min(8) {
                let a = runtime.history[i0 * src_channels + c];
                let b = runtime.history[(i0 + 1) * src_channels + c];
                src_sample[c] = (a as f64 * (1.0 - frac) + b as f64 * frac) as f32;
            }
        } else if i0 < history_frames {
            for c in 0..src_channels.min(8) {
                src_sample[c] = runtime.history[i0 * src_channels + c];
            }
        }

        let gain = instance
            .gain_fader
            .as_mut()
            .map(|f| f.tick(dt) as f32)
            .unwrap_or(instance.gain);
        if let Some(fader) = &instance.gain_fader {
            if fader.state() == FaderState::Active {
                instance.gain = gain;
            } else {
                instance.gain = gain;
                instance.gain_fader = None;
            }
        }

        write_device_frame(&src_sample[..src_channels.min(8)], device_channels, gain, instance.pan, out, frame_idx);

        runtime.read_pos += step;
    }

    runtime.pipeline.process(
        instance.id,
        device_sample_rate,
        device_channels,
        &instance.environment_weights,
        instance.occlusion,
        instance.filter_preset.as_deref(),
        &mut out[..out_frames * device_channels as usize],
        &mut runtime.pipeline_scratch,
    );

    let consumed = runtime.read_pos.floor() as usize;
    if consumed > 0 && consumed <= history_frames {
        runtime.history.drain(..consumed * src_channels);
        runtime.read_pos -= consumed as f64;
    }

    if let Some(remaining) = instance.remaining_frames.as_mut() {
        *remaining = remaining.saturating_sub(consumed as u64);
        if *remaining == 0 && effective_out_frames < out_frames {
            outcome = if instance.consume_loop() {
                let _ = instance.decoder.seek(instance.cursor);
                runtime.reset();
                RenderOutcome::Looped
            } else {
                RenderOutcome::Ended
            };
        }
    }

    outcome
}

/// Decodes into `runtime.scratch_chunk` (checked out from the pool once,
/// for the lifetime of the layer — see [`Amplimix::mix`]) until enough
/// source frames are buffered in `runtime.history` to satisfy
/// `needed_src_frames`, looping or padding with silence at end of stream.
fn ensure_history(
    instance: &mut SoundInstance,
    runtime: &mut LayerRuntime,
    needed_src_frames: usize,
    outcome: &mut RenderOutcome,
) {
    let src_channels = instance.format.channels.max(1) as usize;
    let available = runtime.history.len() / src_channels;
    let have_from_read_pos = available as f64 - runtime.read_pos;

    if have_from_read_pos >= needed_src_frames as f64 {
        return;
    }

    loop {
        let n = match instance.decoder.decode(&mut runtime.scratch_chunk) {
            Ok(n) => n,
            Err(_) => 0,
        };

        if n == 0 {
            if instance.consume_loop() {
                let _ = instance.decoder.seek(0);
                *outcome = RenderOutcome::Looped;
                continue;
            } else {
                *outcome = RenderOutcome::Ended;
                // Pad with silence so the remaining requested frames are
                // well-defined zeros rather than stale history.
                let pad = needed_src_frames.saturating_sub(runtime.history.len() / src_channels);
                runtime.history.extend(std::iter::repeat(0.0).take(pad * src_channels));
                return;
            }
        }

        runtime
            .history
            .extend_from_slice(&runtime.scratch_chunk.samples[..n * src_channels]);

        let available = runtime.history.len() / src_channels;
        if available as f64 - runtime.read_pos >= needed_src_frames as f64 {
            return;
        }
    }
}

/// Down-mix coefficients for the Vorbis-standard channel orderings
/// (`spec.md` §4.8(g)): mono; L/R; L/C/R; FL/FR/RL/RR (quad); FL/FC/FR/
/// RL/RR (5.0); FL/FC/FR/RL/RR/LFE (5.1) and wider. Beyond those, an
/// equal-weight average is the only generic option.
fn vorbis_downmix_to_stereo(src: &[f32]) -> (f32, f32) {
    const SIDE: f32 = std::f32::consts::FRAC_1_SQRT_2;
    match src.len() {
        0 => (0.0, 0.0),
        1 => (src[0], src[0]),
        2 => (src[0], src[1]),
        3 => {
            let c = src[1] * SIDE;
            (src[0] + c, src[2] + c)
        }
        4 => (src[0] + src[2] * SIDE, src[1] + src[3] * SIDE),
        5 => {
            let c = src[1] * SIDE;
            (src[0] + c + src[3] * SIDE, src[2] + c + src[4] * SIDE)
        }
        _ => {
            // 5.1 (FL FC FR RL RR LFE) and wider: fold any extra surround
            // channels in at half weight rather than dropping them.
            let c = src[1] * SIDE;
            let lfe = src[5] * SIDE;
            let mut l = src[0] + c + src[3] * SIDE + lfe;
            let mut r = src[2] + c + src[4] * SIDE + lfe;
            for extra in &src[6..] {
                l += extra * SIDE * 0.5;
                r += extra * SIDE * 0.5;
            }
            (l, r)
        }
    }
}

fn write_device_frame(src: &[f32], device_channels: u16, gain: f32, pan: f32, out: &mut [f32], frame_idx: usize) {
    let base = frame_idx * device_channels as usize;
    match (src.len(), device_channels) {
        (1, 2) => {
            let (l, r) = lr_gain(gain, pan);
            out[base] = src[0] * l;
            out[base + 1] = src[0] * r;
        }
        (1, n) => {
            for c in 0..n as usize {
                out[base + c] = src[0] * gain;
            }
        }
        (2, 2) => {
            let (l, r) = lr_gain(gain, pan);
            out[base] = src[0] * l;
            out[base + 1] = src[1] * r;
        }
        (s, n) if s == n as usize => {
            for c in 0..n as usize {
                out[base + c] = src[c] * gain;
            }
        }
        (_, 2) => {
            let (l, r) = vorbis_downmix_to_stereo(src);
            out[base] = l * gain;
            out[base + 1] = r * gain;
        }
        (s, 1) => {
            let mono: f32 = src.iter().take(s).sum::<f32>() / s.max(1) as f32;
            out[base] = mono * gain;
        }
        (s, n) => {
            // No standard Vorbis layout maps this channel-count pair;
            // equal-weight downmix broadcast to every device channel.
            let mono: f32 = src.iter().take(s).sum::<f32>() / s.max(1) as f32;
            for c in 0..n as usize {
                out[base + c] = mono * gain;
            }
        }
    }
}

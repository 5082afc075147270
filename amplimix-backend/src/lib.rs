//! Device-facing backend: opens an already-available audio output device
//! and drives [`amplimix_core::Amplimix::mix`] from its callback. Grounded
//! in the teacher's `audio-backend` crate — the worker-thread-owns-the-
//! stream architecture in `cpal_backend.rs` is kept almost unchanged,
//! generalized only to call into the mixing core instead of an opaque
//! render closure's original engine-specific logic.
//!
//! This crate is intentionally outside `amplimix-core`: `spec.md` §1
//! excludes device I/O from the mixing core itself.

mod cpal_backend;

pub use cpal_backend::CpalAudioBackend;

use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no matching output device found")]
    DeviceNotFound,
    #[error("unsupported device format: {0}")]
    UnsupportedFormat(String),
    #[error("render function was not set before start()")]
    RenderNotSet,
    #[error("backend error: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo {
    pub sample_rate: u32,
    pub buffer_size: usize,
    pub channels: u16,
}

#[derive(Debug, Clone)]
pub enum DiagnosticEvent {
    XRun { count: u32 },
    Other(String),
}

pub type DiagnosticsCb = Arc<dyn Fn(DiagnosticEvent) + Send + Sync>;

/// Render callback invoked from the audio thread: fill `data` (interleaved,
/// device sample format already converted to `f32`) given the device
/// sample rate and frame count.
pub type RenderFn = Arc<dyn Fn(&mut [f32], u32, usize) + Send + Sync>;

pub trait AudioBackend {
    fn start(&mut self, render: RenderFn) -> Result<(), BackendError>;
    fn stop(&mut self) -> Result<(), BackendError>;
    fn sample_rate(&self) -> u32;
    fn buffer_size(&self) -> usize;
    fn channels(&self) -> u16;
    fn frames_since_start(&self) -> u64;
    fn set_diagnostics_callback(&mut self, cb: Option<DiagnosticsCb>);
}

/// Builds a [`RenderFn`] that locks `mixer` and calls
/// [`amplimix_core::Amplimix::mix`] once per callback — the standard way
/// to wire an `Amplimix` instance into any [`AudioBackend`].
pub fn render_fn_for_mixer(mixer: Arc<parking_lot::Mutex<amplimix_core::Amplimix>>) -> RenderFn {
    Arc::new(move |data: &mut [f32], _sample_rate: u32, frames: usize| {
        mixer.lock().mix(data, frames);
    })
}

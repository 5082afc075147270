//! Amplimix: the real-time mixing core of a cross-platform, data-driven
//! game audio engine.
//!
//! This crate implements Components A–J: the sample buffer/chunk pool,
//! the decoder interface, the fader subsystem, the filter subsystem, the
//! processor pipeline, the sound instance, the mixer layer state machine,
//! the command queue, the mix loop, and the `Amplimix` façade itself. It
//! deliberately does not load asset definitions, open audio devices, or
//! perform 3D spatialization — see `SPEC_FULL.md` for the full boundary.

pub mod chunk;
pub mod command_queue;
pub mod decoder;
pub mod error;
pub mod fader;
pub mod filters;
pub mod layer;
pub mod mixer;
pub mod pipeline;
pub mod registry;
pub mod sound;

#[cfg(test)]
mod test_support;

pub use error::{MixerError, MixerResult};
pub use mixer::{Amplimix, MixerConfig, PendingLayerHandle};

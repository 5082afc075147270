//! Explicit, builder-constructed, immutable registries for faders,
//! filters, processors and codecs.
//!
//! The original source keeps a static global `Registry<T>` per DSP
//! category (filters, sound processors, faders, codecs) that plugins
//! register into at process start. `spec.md` §9 replaces that with
//! registries built once, explicitly, and passed by reference wherever
//! construction needs them — no global mutable state, no runtime
//! registration after startup.

use crate::decoder::{Codec, Decoder};
use crate::error::{MixerError, MixerResult};
use crate::fader::FaderKind;
use crate::filters::{Filter, FilterKind};
use crate::pipeline::{EnvironmentProcessor, IdentityProcessor, InstanceFilterProcessor, OcclusionProcessor, SoundProcessor};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FaderRegistry {
    enabled: HashMap<FaderKind, ()>,
}

impl FaderRegistry {
    pub fn builder() -> FaderRegistryBuilder {
        FaderRegistryBuilder::default()
    }

    pub fn is_enabled(&self, kind: FaderKind) -> bool {
        self.enabled.contains_key(&kind)
    }

    pub fn require(&self, kind: FaderKind) -> MixerResult<()> {
        if self.is_enabled(kind) {
            Ok(())
        } else {
            Err(MixerError::UnknownFader(kind))
        }
    }
}

#[derive(Default)]
pub struct FaderRegistryBuilder {
    enabled: HashMap<FaderKind, ()>,
}

impl FaderRegistryBuilder {
    pub fn enable(mut self, kind: FaderKind) -> Self {
        self.enabled.insert(kind, ());
        self
    }

    /// Enables the full standard set: Linear, Constant, SCurve,
    /// Exponential, Ease.
    pub fn enable_standard(self) -> Self {
        self.enable(FaderKind::Linear)
            .enable(FaderKind::Constant)
            .enable(FaderKind::SCurve)
            .enable(FaderKind::Exponential)
            .enable(FaderKind::Ease)
    }

    pub fn build(self) -> FaderRegistry {
        FaderRegistry {
            enabled: self.enabled,
        }
    }
}

/// A named filter preset: a filter kind plus optional parameter
/// overrides applied after construction. Presets correspond to the
/// original's per-name filter instances (`FilterInstance` in the data
/// model), looked up by name at pipeline run time rather than via a
/// global registry.
#[derive(Debug, Clone, Copy)]
pub struct FilterPreset {
    pub kind: FilterKind,
    pub frequency_hz: Option<f64>,
    pub resonance: Option<f64>,
    pub gain_db: Option<f64>,
}

impl From<FilterKind> for FilterPreset {
    fn from(kind: FilterKind) -> Self {
        Self {
            kind,
            frequency_hz: None,
            resonance: None,
            gain_db: None,
        }
    }
}

/// Constructs a [`Filter`] from a resolved preset, applying any parameter
/// overrides the preset carries. Overrides only apply to `Biquad`
/// filters; the other four kinds use their fixed default construction.
pub fn build_filter_from_preset(preset: FilterPreset, sample_rate: u32, channels: u16) -> Filter {
    let mut filter = Filter::new(preset.kind, sample_rate, channels);
    if let Filter::Biquad(b) = &mut filter {
        if let Some(hz) = preset.frequency_hz {
            b.set_frequency(hz);
        }
        if let Some(q) = preset.resonance {
            b.set_resonance(q);
        }
        if let Some(g) = preset.gain_db {
            b.set_gain_db(g);
        }
    }
    filter
}

#[derive(Debug, Clone)]
pub struct FilterRegistry {
    presets: HashMap<String, FilterPreset>,
}

impl FilterRegistry {
    pub fn builder() -> FilterRegistryBuilder {
        FilterRegistryBuilder::default()
    }

    pub fn lookup(&self, name: &str) -> MixerResult<FilterPreset> {
        self.presets
            .get(name)
            .copied()
            .ok_or_else(|| MixerError::PipelineConstruction("filter", name.to_string()))
    }
}

#[derive(Default)]
pub struct FilterRegistryBuilder {
    presets: HashMap<String, FilterPreset>,
}

impl FilterRegistryBuilder {
    pub fn register(mut self, name: impl Into<String>, kind: FilterKind) -> Self {
        self.presets.insert(name.into(), FilterPreset::from(kind));
        self
    }

    /// Registers a preset with explicit parameter overrides, e.g. a
    /// biquad low-pass at a specific cutoff rather than its default.
    pub fn register_with(mut self, name: impl Into<String>, preset: FilterPreset) -> Self {
        self.presets.insert(name.into(), preset);
        self
    }

    pub fn build(self) -> FilterRegistry {
        FilterRegistry {
            presets: self.presets,
        }
    }
}

/// Name-keyed factory table for pipeline [`SoundProcessor`] nodes,
/// resolved by [`crate::pipeline::ProcessorPipeline`] when a
/// [`crate::pipeline::PipelineNodeConfig`] names a processor. Mirrors the
/// original's `SoundProcessor::Register`/`Find` global map, but built
/// once and immutable after `build()`.
pub struct ProcessorRegistry {
    factories: HashMap<String, Arc<dyn Fn() -> Box<dyn SoundProcessor> + Send + Sync>>,
}

impl ProcessorRegistry {
    pub fn builder() -> ProcessorRegistryBuilder {
        ProcessorRegistryBuilder::default()
    }

    /// Constructs a fresh instance of the named processor, or `None` if
    /// no factory is registered under that name.
    pub fn create(&self, name: &str) -> Option<Box<dyn SoundProcessor>> {
        self.factories.get(name).map(|factory| factory())
    }
}

#[derive(Default)]
pub struct ProcessorRegistryBuilder {
    factories: HashMap<String, Arc<dyn Fn() -> Box<dyn SoundProcessor> + Send + Sync>>,
}

impl ProcessorRegistryBuilder {
    pub fn register<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn SoundProcessor> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Registers the standard node set: `"identity"` (no-op, useful as
    /// one side of a `Mixer` node), `"environment"`, `"occlusion"`, and
    /// `"instance_filter"` (resolving `filter_preset` names against
    /// `filters`).
    pub fn register_standard(self, filters: FilterRegistry) -> Self {
        self.register("identity", || Box::new(IdentityProcessor) as Box<dyn SoundProcessor>)
            .register("environment", || {
                Box::new(EnvironmentProcessor::default()) as Box<dyn SoundProcessor>
            })
            .register("occlusion", || Box::new(OcclusionProcessor::default()) as Box<dyn SoundProcessor>)
            .register("instance_filter", move || {
                Box::new(InstanceFilterProcessor::new(filters.clone())) as Box<dyn SoundProcessor>
            })
    }

    pub fn build(self) -> ProcessorRegistry {
        ProcessorRegistry {
            factories: self.factories,
        }
    }
}

/// Ordered, name-keyed set of container/codec probes, matching
/// `spec.md` §4.2's four recognized formats. Replaces
/// `amplimix-codecs`'s bare `Vec<Box<dyn Codec>>` + manual
/// `can_handle`-loop dispatch with a single resolution point the
/// decoder-creation doc comments can point at.
pub struct CodecRegistry {
    codecs: Vec<Box<dyn Codec>>,
}

impl CodecRegistry {
    pub fn builder() -> CodecRegistryBuilder {
        CodecRegistryBuilder::default()
    }

    /// Returns the first registered codec whose `can_handle` accepts
    /// `bytes`, probed in registration order (cheapest, most specific
    /// magic-number checks first).
    pub fn detect(&self, bytes: &[u8]) -> Option<&dyn Codec> {
        self.codecs.iter().find(|c| c.can_handle(bytes)).map(|c| c.as_ref())
    }

    /// Detects the container and opens a decoder for it in one step.
    pub fn open(&self, bytes: Vec<u8>) -> MixerResult<Box<dyn Decoder>> {
        let codec = self
            .detect(&bytes)
            .ok_or_else(|| MixerError::Decoder("no codec recognizes this container".to_string()))?;
        codec.open(bytes).map_err(|e| MixerError::Decoder(e.to_string()))
    }
}

#[derive(Default)]
pub struct CodecRegistryBuilder {
    codecs: Vec<Box<dyn Codec>>,
}

impl CodecRegistryBuilder {
    pub fn register(mut self, codec: Box<dyn Codec>) -> Self {
        self.codecs.push(codec);
        self
    }

    pub fn build(self) -> CodecRegistry {
        CodecRegistry { codecs: self.codecs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::BiquadKindTag;

    #[test]
    fn fader_registry_rejects_disabled_kind() {
        let reg = FaderRegistry::builder().enable(FaderKind::Linear).build();
        assert!(reg.require(FaderKind::Linear).is_ok());
        assert!(reg.require(FaderKind::Ease).is_err());
    }

    #[test]
    fn filter_registry_looks_up_by_name() {
        let reg = FilterRegistry::builder()
            .register("voice_lowpass", FilterKind::Biquad(BiquadKindTag::LowPass))
            .build();
        assert!(reg.lookup("voice_lowpass").is_ok());
        assert!(reg.lookup("missing").is_err());
    }

    #[test]
    fn filter_preset_override_carries_frequency() {
        let reg = FilterRegistry::builder()
            .register_with(
                "tight_lowpass",
                FilterPreset {
                    kind: FilterKind::Biquad(BiquadKindTag::LowPass),
                    frequency_hz: Some(1000.0),
                    resonance: None,
                    gain_db: None,
                },
            )
            .build();
        let preset = reg.lookup("tight_lowpass").unwrap();
        assert_eq!(preset.frequency_hz, Some(1000.0));
    }

    #[test]
    fn processor_registry_creates_named_node() {
        let reg = ProcessorRegistry::builder().register_standard(FilterRegistry::builder().build()).build();
        assert!(reg.create("occlusion").is_some());
        assert!(reg.create("missing").is_none());
    }

    #[test]
    fn codec_registry_detects_by_magic_bytes() {
        struct FakeCodec;
        impl Codec for FakeCodec {
            fn name(&self) -> &'static str {
                "fake"
            }
            fn can_handle(&self, bytes: &[u8]) -> bool {
                bytes.starts_with(b"FAKE")
            }
            fn open(&self, _bytes: Vec<u8>) -> Result<Box<dyn Decoder>, crate::decoder::DecoderError> {
                Err(crate::decoder::DecoderError::Unsupported)
            }
        }

        let reg = CodecRegistry::builder().register(Box::new(FakeCodec)).build();
        assert!(reg.detect(b"FAKE1234").is_some());
        assert!(reg.detect(b"other").is_none());
    }
}

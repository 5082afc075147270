//! Component B's concrete codecs: WAV, MP3, OGG/Vorbis and FLAC decoding
//! via `symphonia`, plus an offline high-quality resampler via `rubato`
//! for load-time rate conversion. `amplimix-core` only depends on the
//! `Codec`/`Decoder` traits this crate implements against.

pub mod codecs;
pub mod error;
pub mod resample;
pub mod symphonia_codec;

pub use codecs::{standard_codec_registry, standard_codecs};
pub use symphonia_codec::SymphoniaDecoder;

use amplimix_core::registry::CodecRegistry;

/// Detects the container and opens a decoder for it via `registry`, the
/// way a host integration dispatches once it has loaded a sound's raw
/// bytes.
pub fn open_best_match(
    registry: &CodecRegistry,
    bytes: Vec<u8>,
) -> Result<Box<dyn amplimix_core::decoder::Decoder>, error::CodecError> {
    registry.open(bytes).map_err(|e| error::CodecError::Symphonia(e.to_string()))
}

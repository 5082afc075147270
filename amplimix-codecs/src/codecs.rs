//! The four recognized container/codec pairs from `spec.md` §4.2: WAV
//! (PCM16/float), MP3, OGG/Vorbis, FLAC. Each is a thin
//! [`amplimix_core::decoder::Codec`] wrapper picking a `symphonia`
//! extension hint and sniffing the container's magic bytes so a registry
//! can dispatch on raw bytes without relying on a file extension.

use crate::symphonia_codec::SymphoniaDecoder;
use amplimix_core::decoder::{Codec, Decoder, DecoderError};
use amplimix_core::registry::CodecRegistry;

pub struct WavCodec;

impl Codec for WavCodec {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn can_handle(&self, bytes: &[u8]) -> bool {
        bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
    }

    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn Decoder>, DecoderError> {
        Ok(Box::new(SymphoniaDecoder::open(bytes, Some("wav"))?))
    }
}

pub struct Mp3Codec;

impl Codec for Mp3Codec {
    fn name(&self) -> &'static str {
        "mp3"
    }

    fn can_handle(&self, bytes: &[u8]) -> bool {
        if bytes.len() >= 3 && &bytes[0..3] == b"ID3" {
            return true;
        }
        // MPEG frame sync: 11 set bits at the start of a frame header.
        bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0
    }

    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn Decoder>, DecoderError> {
        Ok(Box::new(SymphoniaDecoder::open(bytes, Some("mp3"))?))
    }
}

pub struct OggVorbisCodec;

impl Codec for OggVorbisCodec {
    fn name(&self) -> &'static str {
        "ogg"
    }

    fn can_handle(&self, bytes: &[u8]) -> bool {
        bytes.len() >= 4 && &bytes[0..4] == b"OggS"
    }

    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn Decoder>, DecoderError> {
        Ok(Box::new(SymphoniaDecoder::open(bytes, Some("ogg"))?))
    }
}

pub struct FlacCodec;

impl Codec for FlacCodec {
    fn name(&self) -> &'static str {
        "flac"
    }

    fn can_handle(&self, bytes: &[u8]) -> bool {
        bytes.len() >= 4 && &bytes[0..4] == b"fLaC"
    }

    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn Decoder>, DecoderError> {
        Ok(Box::new(SymphoniaDecoder::open(bytes, Some("flac"))?))
    }
}

/// Builds the standard set of codecs recognized by this crate, in the
/// order they should be probed (cheapest, most specific magic-number
/// checks first).
pub fn standard_codecs() -> Vec<Box<dyn Codec>> {
    vec![
        Box::new(WavCodec),
        Box::new(FlacCodec),
        Box::new(OggVorbisCodec),
        Box::new(Mp3Codec),
    ]
}

/// Builds a [`CodecRegistry`] carrying the standard codec set, the way a
/// host integration constructs it once at startup.
pub fn standard_codec_registry() -> CodecRegistry {
    standard_codecs()
        .into_iter()
        .fold(CodecRegistry::builder(), |builder, codec| builder.register(codec))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_codec_recognizes_riff_header() {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&[0u8; 4]);
        bytes.extend_from_slice(b"WAVE");
        assert!(WavCodec.can_handle(&bytes));
        assert!(!Mp3Codec.can_handle(&bytes));
    }

    #[test]
    fn flac_codec_recognizes_magic() {
        assert!(FlacCodec.can_handle(b"fLaC\x00\x00\x00\x00"));
    }

    #[test]
    fn standard_registry_detects_flac_by_magic_bytes() {
        let registry = standard_codec_registry();
        assert_eq!(registry.detect(b"fLaC\x00\x00\x00\x00").map(|c| c.name()), Some("flac"));
        assert!(registry.detect(b"not a known container").is_none());
    }
}

//! Component B: the codec/decoder interface.
//!
//! `amplimix-core` only depends on the trait boundary defined here; the
//! concrete WAV/MP3/OGG/FLAC implementations live in `amplimix-codecs` so
//! the mixing core stays decoder-agnostic. Per `spec.md` §9's redesign
//! flags, this boundary stays a narrow object-safe trait (`dyn Decoder`)
//! rather than a closed enum, because new codecs are exactly the kind of
//! extension a game integration needs without forking the core.

use crate::chunk::SoundChunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    I16,
    F32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub sample_format: SampleFormat,
    /// Total frame count, if known up front (streamed sources may not know).
    pub frames: Option<u64>,
}

/// A positioned, stateful PCM decoder for one open sound. `Send` because a
/// freshly constructed decoder is handed off from the control thread to
/// the audio thread through the command queue (Component H) — a single
/// ownership transfer, never concurrent shared access.
pub trait Decoder: Send {
    fn format(&self) -> SoundFormat;

    /// Decode up to `chunk.samples.capacity()` frames into `chunk`,
    /// starting from the decoder's current position. Returns the number of
    /// frames written; `0` means end of stream. `chunk.frames` is set by
    /// the caller to the returned value.
    fn decode(&mut self, chunk: &mut SoundChunk) -> Result<usize, DecoderError>;

    /// Seek to an absolute frame position. Decoders that only support
    /// forward seeking (many streamed codecs) may re-open from the start.
    fn seek(&mut self, frame: u64) -> Result<(), DecoderError>;

    /// Total length in frames, if known.
    fn len_frames(&self) -> Option<u64>;
}

#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("unsupported or corrupt container")]
    Unsupported,
    #[error("seek past end of stream")]
    SeekOutOfRange,
    #[error("decode failure: {0}")]
    Other(String),
}

/// Object-safe factory for a single codec. Registered into a
/// [`crate::registry::CodecRegistry`] at startup; see `spec.md` §9 — this
/// replaces the original's global mutable codec registry with an
/// explicit, builder-constructed, immutable one.
pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap sniff of whether this codec can likely decode `bytes` (magic
    /// number / header check), used by the registry to pick a decoder when
    /// the caller does not already know the container type.
    fn can_handle(&self, bytes: &[u8]) -> bool;

    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn Decoder>, DecoderError>;
}

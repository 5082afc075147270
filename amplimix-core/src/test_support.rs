//! In-memory decoder stand-ins used only by unit/integration tests, so
//! tests never need real codec crates or file I/O.

#![cfg(test)]

use crate::chunk::SoundChunk;
use crate::decoder::{Decoder, DecoderError, SampleFormat, SoundFormat};

/// Decoder that yields a fixed, precomputed buffer of interleaved f32
/// samples and then ends.
pub struct BufferDecoder {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
    pos: usize,
}

impl BufferDecoder {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
            pos: 0,
        }
    }

    pub fn silent(frames: usize, channels: u16, sample_rate: u32) -> Self {
        Self::new(vec![0.0; frames * channels as usize], channels, sample_rate)
    }
}

impl Decoder for BufferDecoder {
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

/// Convenience wrapper producing an arbitrarily long silent stream,
/// distinct from [`BufferDecoder`] only in its constructor ergonomics.
pub struct SilentDecoder(BufferDecoder);

impl SilentDecoder {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self(BufferDecoder::silent(48_000 * 60, channels, sample_rate))
    }
}

impl Decoder for SilentDecoder {
    fn format(&self) -> SoundFormat {
        self.0.format()
    }

    fn decode(&mut self, chunk: &mut SoundChunk) -> Result<usize, DecoderError> {
        self.0.decode(chunk)
    }

    fn seek(&mut self, frame: u64) -> Result<(), DecoderError> {
        self.0.seek(frame)
    }

    fn len_frames(&self) -> Option<u64> {
        self.0.len_frames()
    }
}

/// A short buffer useful for exercising end-of-stream/loop behavior
/// quickly in tests.
pub fn short_tone_decoder(frames: usize, channels: u16, sample_rate: u32, freq: f32) -> BufferDecoder {
    let mut samples = vec![0.0f32; frames * channels as usize];
    for f in 0..frames {
        let v = (2.0 * std::f32::consts::PI * freq * f as f32 / sample_rate as f32).sin();
        for c in 0..channels as usize {
            samples[f * channels as usize + c] = v;
        }
    }
    BufferDecoder::new(samples, channels, sample_rate)
}

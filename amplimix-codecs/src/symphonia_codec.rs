//! Generic `symphonia`-backed decoder, grounded in the teacher's
//! `asset-manager/src/asset_manager.rs::streaming::StreamingAsset::decode_with_symphonia`
//! decode loop, generalized from "push into a ring buffer" to implementing
//! [`amplimix_core::decoder::Decoder`] directly so the mixing core can pull
//! frames on demand.

use crate::error::CodecError;
use amplimix_core::decoder::{Decoder, DecoderError, SampleFormat, SoundFormat};
use std::io::Cursor;
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{Decoder as SymphoniaDecoderTrait, DecoderOptions};
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

pub struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn SymphoniaDecoderTrait>,
    track_id: u32,
    sound_format: SoundFormat,
    pending: Vec<f32>,
    pending_pos: usize,
}

impl SymphoniaDecoder {
    pub fn open(bytes: Vec<u8>, extension_hint: Option<&str>) -> Result<Self, CodecError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension_hint {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| CodecError::Symphonia(e.to_string()))?;

        let format = probed.format;
        let track = format
            .default_track()
            .ok_or(CodecError::Unrecognized)?
            .clone();

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| CodecError::Symphonia(e.to_string()))?;

        let channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(2);
        let sample_rate = track.codec_params.sample_rate.unwrap_or(48_000);
        let frames = track.codec_params.n_frames;

        Ok(Self {
            format,
            decoder,
            track_id: track.id,
            sound_format: SoundFormat {
                channels,
                sample_rate,
                sample_format: SampleFormat::F32,
                frames,
            },
            pending: Vec::new(),
            pending_pos: 0,
        })
    }

    fn refill(&mut self) -> Result<bool, CodecError> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(_) => return Ok(false),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = self
                .decoder
                .decode(&packet)
                .map_err(|e| CodecError::Symphonia(e.to_string()))?;

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);

            match &decoded {
                AudioBufferRef::F32(_)
                | AudioBufferRef::U8(_)
                | AudioBufferRef::U16(_)
                | AudioBufferRef::U24(_)
                | AudioBufferRef::U32(_)
                | AudioBufferRef::S8(_)
                | AudioBufferRef::S16(_)
                | AudioBufferRef::S24(_)
                | AudioBufferRef::S32(_)
                | AudioBufferRef::F64(_) => {
                    sample_buf.copy_interleaved_ref(decoded);
                }
            }

            self.pending.clear();
            self.pending.extend_from_slice(sample_buf.samples());
            self.pending_pos = 0;
            return Ok(true);
        }
    }
}

impl Decoder for SymphoniaDecoder {
    fn format(&self) -> SoundFormat {
        self.sound_format
    }

    fn decode(&mut self, chunk: &mut amplimix_core::chunk::SoundChunk) -> Result<usize, DecoderError> {
        let channels = self.sound_format.channels.max(1) as usize;
        let max_frames = chunk.samples.len() / channels;
        let mut written_frames = 0usize;

        while written_frames < max_frames {
            if self.pending_pos >= self.pending.len() {
                let refilled = self.refill().map_err(DecoderError::from)?;
                if !refilled {
                    break;
                }
            }

            let remaining_pending = (self.pending.len() - self.pending_pos) / channels;
            let remaining_out = max_frames - written_frames;
            let n = remaining_pending.min(remaining_out);

            let src_start = self.pending_pos;
            let src_end = src_start + n * channels;
            let dst_start = written_frames * channels;
            let dst_end = dst_start + n * channels;
            chunk.samples[dst_start..dst_end].copy_from_slice(&self.pending[src_start..src_end]);

            self.pending_pos += n * channels;
            written_frames += n;

            if n == 0 {
                break;
            }
        }

        chunk.channels = self.sound_format.channels;
        Ok(written_frames)
    }

    fn seek(&mut self, frame: u64) -> Result<(), DecoderError> {
        self.format
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: frame,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| DecoderError::Other(e.to_string()))?;
        self.pending.clear();
        self.pending_pos = 0;
        Ok(())
    }

    fn len_frames(&self) -> Option<u64> {
        self.sound_format.frames
    }
}

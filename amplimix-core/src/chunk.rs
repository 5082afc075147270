//! Component A: sample buffer / chunk pool.
//!
//! A [`SoundChunk`] is a fixed-capacity block of interleaved `f32` PCM
//! samples. Decoders fill chunks; the mix loop reads them. Chunks are
//! recycled through a [`ChunkPool`] so the hot path never allocates —
//! mirroring the original source's chunk-based streaming buffers, without
//! reimplementing a general-purpose memory allocator (out of scope per
//! `spec.md` §1).
//!
//! Every checkout/release is attributed to a [`ChunkTag`] naming the
//! subsystem that owns it, matching `spec.md` §3/§4.1's per-tag
//! allocation/free/peak-bytes accounting requirement.

use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Number of interleaved frames held by one chunk. Matches the original
/// source's default streaming chunk size.
pub const CHUNK_FRAMES: usize = 4096;

/// Chunks are provisioned wide enough for the spec's maximum supported
/// channel count (`spec.md` §3) regardless of any one stream's actual
/// channel count, since the pool is shared across sources of differing
/// widths. A chunk's `channels` field is set per-use by whoever fills it.
pub const MAX_CHANNELS: u16 = 8;

/// Named purpose a chunk checkout is attributed to, per `spec.md` §3's
/// tag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkTag {
    Amplimix,
    Codec,
    SoundData,
    Filtering,
    Engine,
    Default,
}

impl ChunkTag {
    const COUNT: usize = 6;

    fn index(self) -> usize {
        match self {
            ChunkTag::Amplimix => 0,
            ChunkTag::Codec => 1,
            ChunkTag::SoundData => 2,
            ChunkTag::Filtering => 3,
            ChunkTag::Engine => 4,
            ChunkTag::Default => 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SoundChunk {
    /// Interleaved samples, `frames * channels` long. `len()` may be less
    /// than `capacity()` for the final chunk of a stream.
    pub samples: Vec<f32>,
    pub channels: u16,
    pub frames: usize,
}

impl SoundChunk {
    fn with_capacity() -> Self {
        Self {
            samples: vec![0.0; CHUNK_FRAMES * MAX_CHANNELS as usize],
            channels: 0,
            frames: 0,
        }
    }

    pub fn clear(&mut self) {
        self.frames = 0;
        self.samples.iter_mut().for_each(|s| *s = 0.0);
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples[..self.frames * self.channels as usize]
    }

    fn byte_size(&self) -> u64 {
        (self.samples.len() * std::mem::size_of::<f32>()) as u64
    }
}

#[derive(Debug, Default)]
struct TagCounters {
    allocations: AtomicU64,
    frees: AtomicU64,
    live_bytes: AtomicU64,
    peak_bytes: AtomicU64,
}

/// Snapshot of one tag's usage accounting, per `spec.md` §4.1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkPoolStats {
    pub allocations: u64,
    pub frees: u64,
    pub peak_bytes: u64,
}

/// Lock-free pool of reusable chunks, shared between the decode/control
/// thread (which returns chunks once mixed) and any background streaming
/// loader (which checks chunks out to decode into).
///
/// Grounded in the teacher's `ringbuf`-based streaming design
/// (`asset-manager/src/asset_manager.rs::streaming`), generalized to a
/// checkout/return pool rather than a single-producer/single-consumer ring,
/// since chunks here are recycled rather than streamed byte-for-byte.
pub struct ChunkPool {
    free: ArrayQueue<SoundChunk>,
    counters: [TagCounters; ChunkTag::COUNT],
}

impl ChunkPool {
    pub fn new(capacity: usize) -> Arc<Self> {
        let free = ArrayQueue::new(capacity.max(1));
        for _ in 0..capacity {
            let _ = free.push(SoundChunk::with_capacity());
        }
        Arc::new(Self {
            free,
            counters: std::array::from_fn(|_| TagCounters::default()),
        })
    }

    /// Check out a chunk, allocating a fresh one if the pool is momentarily
    /// empty. Only meant for the control thread (e.g. priming a new sound
    /// instance) — the real-time mix path must use [`Self::try_checkout`],
    /// which never allocates.
    pub fn checkout(&self, tag: ChunkTag) -> SoundChunk {
        let chunk = self.free.pop().unwrap_or_else(SoundChunk::with_capacity);
        self.record_checkout(tag, &chunk);
        chunk
    }

    /// Check out a chunk without ever allocating. Returns `None` if the
    /// pool is momentarily exhausted, per `spec.md` §4.1's "pool
    /// exhaustion is fatal to the operation, abort cleanly" contract —
    /// the caller must skip this cycle's work for that tag rather than
    /// allocate on the audio thread.
    pub fn try_checkout(&self, tag: ChunkTag) -> Option<SoundChunk> {
        let chunk = self.free.pop()?;
        self.record_checkout(tag, &chunk);
        Some(chunk)
    }

    /// Return a chunk to the pool for reuse. Drops it silently if the pool
    /// is full (e.g. pool was shrunk) rather than growing unbounded.
    pub fn release(&self, tag: ChunkTag, mut chunk: SoundChunk) {
        let bytes = chunk.byte_size();
        chunk.clear();
        let dropped = self.free.push(chunk).is_err();
        let counters = &self.counters[tag.index()];
        counters.frees.fetch_add(1, Ordering::Relaxed);
        if !dropped {
            counters.live_bytes.fetch_sub(bytes, Ordering::Relaxed);
        }
    }

    pub fn stats(&self, tag: ChunkTag) -> ChunkPoolStats {
        let c = &self.counters[tag.index()];
        ChunkPoolStats {
            allocations: c.allocations.load(Ordering::Relaxed),
            frees: c.frees.load(Ordering::Relaxed),
            peak_bytes: c.peak_bytes.load(Ordering::Relaxed),
        }
    }

    fn record_checkout(&self, tag: ChunkTag, chunk: &SoundChunk) {
        let bytes = chunk.byte_size();
        let counters = &self.counters[tag.index()];
        counters.allocations.fetch_add(1, Ordering::Relaxed);
        let live = counters.live_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        counters.peak_bytes.fetch_max(live, Ordering::Relaxed);
    }
}

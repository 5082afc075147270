//! Freeverb-style Schroeder reverb: parallel comb filters feeding series
//! allpass filters, per channel. Grounded in
//! `examples/original_source/src/Sound/Filters/FreeverbFilter.h` (the
//! original wraps the same classic Jezar-at-Dreampoint topology).

const COMB_TUNING_L: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNING_L: [usize; 4] = [556, 441, 341, 225];
const STEREO_SPREAD: usize = 23;

#[derive(Debug, Clone)]
struct Comb {
    buffer: Vec<f32>,
    pos: usize,
    feedback: f32,
    filter_store: f32,
    damp: f32,
}

impl Comb {
    fn new(size: usize, feedback: f32, damp: f32) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            pos: 0,
            feedback,
            filter_store: 0.0,
            damp,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let out = self.buffer[self.pos];
        self.filter_store = out * (1.0 - self.damp) + self.filter_store * self.damp;
        self.buffer[self.pos] = input + self.filter_store * self.feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        out
    }
}

#[derive(Debug, Clone)]
struct Allpass {
    buffer: Vec<f32>,
    pos: usize,
    feedback: f32,
}

impl Allpass {
    fn new(size: usize, feedback: f32) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            pos: 0,
            feedback,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.pos];
        let output = -input + buffered;
        self.buffer[self.pos] = input + buffered * self.feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }
}

#[derive(Debug, Clone)]
struct ChannelReverb {
    combs: Vec<Comb>,
    allpasses: Vec<Allpass>,
}

impl ChannelReverb {
    fn new(channel_index: usize, room_size: f32, damp: f32) -> Self {
        let spread = channel_index * STEREO_SPREAD;
        let combs = COMB_TUNING_L
            .iter()
            .map(|&n| Comb::new(n + spread, room_size, damp))
            .collect();
        let allpasses = ALLPASS_TUNING_L
            .iter()
            .map(|&n| Allpass::new(n + spread, 0.5))
            .collect();
        Self { combs, allpasses }
    }

    fn process(&mut self, input: f32) -> f32 {
        let mut out = 0.0;
        for c in &mut self.combs {
            out += c.process(input);
        }
        for a in &mut self.allpasses {
            out = a.process(out);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct FreeverbFilter {
    wet: f32,
    dry: f32,
    channels: Vec<ChannelReverb>,
}

impl FreeverbFilter {
    pub fn new(channel_count: u16, room_size: f32, damp: f32) -> Self {
        let room_size = room_size.clamp(0.0, 0.99);
        let damp = damp.clamp(0.0, 1.0);
        Self {
            wet: 0.3,
            dry: 0.7,
            channels: (0..channel_count as usize)
                .map(|i| ChannelReverb::new(i, room_size, damp))
                .collect(),
        }
    }

    pub fn set_wet_dry(&mut self, wet: f32, dry: f32) {
        self.wet = wet.clamp(0.0, 1.0);
        self.dry = dry.clamp(0.0, 1.0);
    }

    pub fn process(&mut self, samples: &mut [f32], channels: u16) {
        if self.channels.len() < channels as usize {
            while self.channels.len() < channels as usize {
                let idx = self.channels.len();
                self.channels.push(ChannelReverb::new(idx, 0.5, 0.5));
            }
        }
        let frames = samples.len() / channels as usize;
        for f in 0..frames {
            for ch in 0..channels as usize {
                let idx = f * channels as usize + ch;
                let dry_sample = samples[idx];
                let wet_sample = self.channels[ch].process(dry_sample);
                samples[idx] = dry_sample * self.dry + wet_sample * self.wet;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_produces_decaying_tail() {
        let mut f = FreeverbFilter::new(1, 0.8, 0.5);
        f.set_wet_dry(1.0, 0.0);
        let mut buf = vec![0.0f32; 4000];
        buf[0] = 1.0;
        f.process(&mut buf, 1);
        let tail_energy: f64 = buf[2000..].iter().map(|s| (*s as f64).powi(2)).sum();
        assert!(tail_energy > 0.0);
    }
}

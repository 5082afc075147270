//! Flanger filter, grounded in
//! `examples/original_source/src/Sound/Filters/FlangerFilter.h`: an LFO
//! sweeps a short delay line's read position, mixed with the dry signal.

use std::f64::consts::PI;

#[derive(Debug, Clone)]
struct ChannelDelay {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl ChannelDelay {
    fn new(max_delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay_samples.max(1)],
            write_pos: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlangerFilter {
    /// LFO rate in Hz.
    rate_hz: f64,
    /// Sweep depth in seconds, added on top of a fixed base delay.
    depth_seconds: f64,
    base_delay_seconds: f64,
    wet: f64,
    sample_rate: u32,
    phase: f64,
    delays: Vec<ChannelDelay>,
}

impl FlangerFilter {
    pub fn new(sample_rate: u32, channel_count: u16) -> Self {
        let max_delay = ((0.02 * sample_rate as f64) as usize).max(8);
        Self {
            rate_hz: 0.2,
            depth_seconds: 0.002,
            base_delay_seconds: 0.003,
            wet: 0.5,
            sample_rate,
            phase: 0.0,
            delays: (0..channel_count).map(|_| ChannelDelay::new(max_delay)).collect(),
        }
    }

    pub fn set_rate_hz(&mut self, hz: f64) {
        self.rate_hz = hz.max(0.0);
    }

    pub fn set_depth_seconds(&mut self, s: f64) {
        self.depth_seconds = s.max(0.0);
    }

    pub fn set_wet(&mut self, wet: f64) {
        self.wet = wet.clamp(0.0, 1.0);
    }

    pub fn process(&mut self, samples: &mut [f32], channels: u16) {
        if self.delays.len() < channels as usize {
            let max_delay = self.delays.first().map(|d| d.buffer.len()).unwrap_or(8);
            self.delays
                .resize_with(channels as usize, || ChannelDelay::new(max_delay));
        }

        let frames = samples.len() / channels as usize;
        let phase_inc = 2.0 * PI * self.rate_hz / self.sample_rate.max(1) as f64;

        for f in 0..frames {
            let lfo = self.phase.sin();
            self.phase += phase_inc;
            if self.phase > 2.0 * PI {
                self.phase -= 2.0 * PI;
            }

            let delay_seconds = self.base_delay_seconds + self.depth_seconds * (0.5 + 0.5 * lfo);

            for ch in 0..channels as usize {
                let idx = f * channels as usize + ch;
                let dry = samples[idx] as f64;
                let delay = &mut self.delays[ch];
                let len = delay.buffer.len();
                let delay_samples = (delay_seconds * self.sample_rate.max(1) as f64).clamp(0.0, (len - 1) as f64);

                let read_pos_f = (delay.write_pos as f64 - delay_samples).rem_euclid(len as f64);
                let i0 = read_pos_f.floor() as usize % len;
                let i1 = (i0 + 1) % len;
                let frac = read_pos_f.fract();
                let wet_sample = delay.buffer[i0] as f64 * (1.0 - frac) + delay.buffer[i1] as f64 * frac;

                delay.buffer[delay.write_pos] = dry as f32;
                delay.write_pos = (delay.write_pos + 1) % len;

                samples[idx] = (dry * (1.0 - self.wet) + wet_sample * self.wet) as f32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_when_wet_zero() {
        let mut f = FlangerFilter::new(48000, 1);
        f.set_wet(0.0);
        let mut buf = vec![0.3f32, -0.2, 0.1, 0.5];
        let orig = buf.clone();
        f.process(&mut buf, 1);
        for (a, b) in buf.iter().zip(orig.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}

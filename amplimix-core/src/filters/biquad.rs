//! Biquad resonant filter, Direct Form I, grounded in
//! `examples/original_source/src/Sound/Filters/BiquadResonantFilter.cpp`.

use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BiquadType {
    LowPass,
    HighPass,
    BandPass,
    Peak,
    Notch,
    LowShelf,
    HighShelf,
}

#[derive(Debug, Clone, Copy)]
struct Coefficients {
    a0: f64,
    a1: f64,
    a2: f64,
    b1: f64,
    b2: f64,
}

impl Default for Coefficients {
    fn default() -> Self {
        Self {
            a0: 1.0,
            a1: 0.0,
            a2: 0.0,
            b1: 0.0,
            b2: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

/// Per-instance biquad filter. Coefficients are recomputed lazily when any
/// parameter changes (the "dirty bit" in the original), not on every
/// sample, matching `spec.md` §4.4's filter contract.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    filter_type: BiquadType,
    frequency: f64,
    resonance: f64,
    gain_db: f64,
    sample_rate: u32,
    dirty: bool,
    coeffs: Coefficients,
    channels: Vec<ChannelState>,
}

impl BiquadFilter {
    pub fn new(filter_type: BiquadType, sample_rate: u32, channel_count: u16) -> Self {
        Self {
            filter_type,
            frequency: 8000.0,
            resonance: std::f64::consts::FRAC_1_SQRT_2,
            gain_db: 0.0,
            sample_rate,
            dirty: true,
            coeffs: Coefficients::default(),
            channels: vec![ChannelState::default(); channel_count as usize],
        }
    }

    pub fn filter_type_tag(&self) -> BiquadType {
        self.filter_type
    }

    pub fn set_type(&mut self, t: BiquadType) {
        if t != self.filter_type {
            self.filter_type = t;
            self.dirty = true;
        }
    }

    pub fn set_frequency(&mut self, hz: f64) {
        if (hz - self.frequency).abs() > f64::EPSILON {
            self.frequency = hz;
            self.dirty = true;
        }
    }

    pub fn set_resonance(&mut self, q: f64) {
        if (q - self.resonance).abs() > f64::EPSILON {
            self.resonance = q.max(0.0001);
            self.dirty = true;
        }
    }

    pub fn set_gain_db(&mut self, db: f64) {
        if (db - self.gain_db).abs() > f64::EPSILON {
            self.gain_db = db;
            self.dirty = true;
        }
    }

    pub fn set_sample_rate(&mut self, sr: u32) {
        if sr != self.sample_rate {
            self.sample_rate = sr;
            self.dirty = true;
        }
    }

    fn recompute_if_dirty(&mut self) {
        if !self.dirty {
            return;
        }
        self.coeffs = compute_coefficients(
            self.filter_type,
            self.frequency,
            self.resonance,
            self.gain_db,
            self.sample_rate,
        );
        self.dirty = false;
    }

    /// Process one interleaved buffer in place.
    pub fn process(&mut self, samples: &mut [f32], channels: u16) {
        self.recompute_if_dirty();
        if self.channels.len() < channels as usize {
            self.channels.resize(channels as usize, ChannelState::default());
        }
        let c = self.coeffs;
        let frames = samples.len() / channels as usize;
        for f in 0..frames {
            for ch in 0..channels as usize {
                let idx = f * channels as usize + ch;
                let x0 = samples[idx] as f64;
                let st = &mut self.channels[ch];
                let y0 = c.a0 * x0 + c.a1 * st.x1 + c.a2 * st.x2 - c.b1 * st.y1 - c.b2 * st.y2;
                st.x2 = st.x1;
                st.x1 = x0;
                st.y2 = st.y1;
                st.y1 = y0;
                samples[idx] = y0 as f32;
            }
        }
    }
}

fn compute_coefficients(
    t: BiquadType,
    freq: f64,
    q: f64,
    gain_db: f64,
    sample_rate: u32,
) -> Coefficients {
    let sample_rate = sample_rate.max(1) as f64;
    let omega = 2.0 * PI * freq / sample_rate;
    let sn = omega.sin();
    let cs = omega.cos();
    let alpha = sn / (2.0 * q.max(1e-6));
    let a = 10f64.powf(gain_db / 40.0);

    // (b0, b1, b2, a0, a1, a2) in the standard RBJ cookbook form, then
    // normalized and renamed to match `Coefficients`'s a0/a1/a2/b1/b2
    // (numerator/denominator) layout used by the process loop above.
    let (b0, b1, b2, a0, a1, a2) = match t {
        BiquadType::LowPass => {
            let b1 = 1.0 - cs;
            let b0 = b1 / 2.0;
            let b2 = b0;
            (b0, b1, b2, 1.0 + alpha, -2.0 * cs, 1.0 - alpha)
        }
        BiquadType::HighPass => {
            let b1 = -(1.0 + cs);
            let b0 = -b1 / 2.0;
            let b2 = b0;
            (b0, b1, b2, 1.0 + alpha, -2.0 * cs, 1.0 - alpha)
        }
        BiquadType::BandPass => {
            let b0 = alpha;
            let b1 = 0.0;
            let b2 = -alpha;
            (b0, b1, b2, 1.0 + alpha, -2.0 * cs, 1.0 - alpha)
        }
        BiquadType::Notch => {
            let b0 = 1.0;
            let b1 = -2.0 * cs;
            let b2 = 1.0;
            (b0, b1, b2, 1.0 + alpha, -2.0 * cs, 1.0 - alpha)
        }
        BiquadType::Peak => {
            let b0 = 1.0 + alpha * a;
            let b1 = -2.0 * cs;
            let b2 = 1.0 - alpha * a;
            let a0 = 1.0 + alpha / a;
            let a1 = -2.0 * cs;
            let a2 = 1.0 - alpha / a;
            (b0, b1, b2, a0, a1, a2)
        }
        BiquadType::LowShelf => {
            let sq = (2.0 * a).sqrt() * alpha;
            let b0 = a * ((a + 1.0) - (a - 1.0) * cs + sq);
            let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cs);
            let b2 = a * ((a + 1.0) - (a - 1.0) * cs - sq);
            let a0 = (a + 1.0) + (a - 1.0) * cs + sq;
            let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cs);
            let a2 = (a + 1.0) + (a - 1.0) * cs - sq;
            (b0, b1, b2, a0, a1, a2)
        }
        BiquadType::HighShelf => {
            let sq = (2.0 * a).sqrt() * alpha;
            let b0 = a * ((a + 1.0) + (a - 1.0) * cs + sq);
            let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cs);
            let b2 = a * ((a + 1.0) + (a - 1.0) * cs - sq);
            let a0 = (a + 1.0) - (a - 1.0) * cs + sq;
            let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cs);
            let a2 = (a + 1.0) - (a - 1.0) * cs - sq;
            (b0, b1, b2, a0, a1, a2)
        }
    };

    Coefficients {
        a0: b0 / a0,
        a1: b1 / a0,
        a2: b2 / a0,
        b1: a1 / a0,
        b2: a2 / a0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowpass_attenuates_high_frequency_tone() {
        let sample_rate = 48000u32;
        let mut filt = BiquadFilter::new(BiquadType::LowPass, sample_rate, 1);
        filt.set_frequency(500.0);
        filt.set_resonance(0.707);

        let tone_freq = 12000.0;
        let n = 2048;
        let mut buf: Vec<f32> = (0..n)
            .map(|i| (2.0 * PI * tone_freq * i as f64 / sample_rate as f64).sin() as f32)
            .collect();

        let input_rms = rms(&buf);
        filt.process(&mut buf, 1);
        let output_rms = rms(&buf[n / 2..]);

        assert!(output_rms < input_rms * 0.5, "expected attenuation, got in={input_rms} out={output_rms}");
    }

    #[test]
    fn dirty_bit_avoids_recompute_when_unchanged() {
        let mut filt = BiquadFilter::new(BiquadType::LowPass, 48000, 1);
        filt.recompute_if_dirty();
        assert!(!filt.dirty);
        filt.set_frequency(filt.frequency);
        assert!(!filt.dirty);
    }

    fn rms(buf: &[f32]) -> f64 {
        let sum: f64 = buf.iter().map(|s| (*s as f64).powi(2)).sum();
        (sum / buf.len() as f64).sqrt()
    }
}

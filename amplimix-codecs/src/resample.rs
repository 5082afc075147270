//! Offline high-quality resampling for priming a fully-decoded sound at a
//! different rate than the mixer's base rate, using `rubato` — the same
//! crate the teacher's `asset-manager` depends on for exactly this
//! purpose. The mixer's own per-callback pitch/rate conversion
//! (`amplimix_core::mixer`) uses a lightweight persistent linear
//! interpolator instead, since a `SincFixedIn` resampler allocates
//! internally and is not safe to construct or drive on the real-time
//! thread; this module is for control-thread, load-time use only.

use crate::error::CodecError;
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

/// Resamples interleaved `f32` PCM from `from_rate` to `to_rate`,
/// returning newly-allocated interleaved output. Not real-time safe.
pub fn resample_offline(
    interleaved: &[f32],
    channels: usize,
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<f32>, CodecError> {
    if from_rate == to_rate || channels == 0 {
        return Ok(interleaved.to_vec());
    }

    let planar = deinterleave(interleaved, channels);
    let ratio = to_rate as f64 / from_rate as f64;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, planar[0].len(), channels)
        .map_err(|e| CodecError::Symphonia(e.to_string()))?;

    let out_planar = resampler
        .process(&planar, None)
        .map_err(|e| CodecError::Symphonia(e.to_string()))?;

    Ok(interleave(&out_planar))
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut out = vec![Vec::with_capacity(frames); channels];
    for f in 0..frames {
        for (c, chan_buf) in out.iter_mut().enumerate() {
            chan_buf.push(samples[f * channels + c]);
        }
    }
    out
}

fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    if planar.is_empty() {
        return Vec::new();
    }
    let frames = planar[0].len();
    let channels = planar.len();
    let mut out = vec![0.0f32; frames * channels];
    for (c, chan_buf) in planar.iter().enumerate() {
        for (f, sample) in chan_buf.iter().enumerate() {
            out[f * channels + c] = *sample;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_passthrough() {
        let data = vec![0.1, 0.2, -0.3, 0.4];
        let out = resample_offline(&data, 2, 48_000, 48_000).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn upsampling_produces_more_frames() {
        let frames = 4096;
        let data: Vec<f32> = (0..frames).map(|i| (i as f32 * 0.01).sin()).collect();
        let out = resample_offline(&data, 1, 22_050, 44_100).unwrap();
        assert!(out.len() > data.len());
    }
}

//! Component C: the fader subsystem.
//!
//! Grounded in `examples/original_source/src/Sound/Fader.cpp` and
//! `src/Sound/Faders/EaseFader.h`. A fader interpolates a scalar (gain,
//! pan, pitch) from one value to another over a duration, using one of a
//! fixed set of easing curves. Faders are closed tagged variants (not
//! `dyn Trait`) per `spec.md` §9 — the curve set is part of the contract,
//! not an extension point.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaderKind {
    Linear,
    Constant,
    SCurve,
    Exponential,
    Ease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaderState {
    Disabled,
    Active,
    Stopped,
}

/// Cubic bezier control points used by the `Ease` curve, matching the
/// original's `kEaseFaderControlPoints` (a CSS-`ease`-like curve).
const EASE_CONTROL_POINTS: [f64; 4] = [0.25, 0.1, 0.25, 1.0];

#[derive(Debug, Clone, Copy)]
pub struct Fader {
    kind: FaderKind,
    from: f64,
    to: f64,
    /// Duration in seconds. Zero duration means the fader resolves to `to`
    /// on the first tick.
    duration: f64,
    elapsed: f64,
    state: FaderState,
}

impl Fader {
    pub fn new(kind: FaderKind, from: f64, to: f64, duration: f64) -> Self {
        Self {
            kind,
            from,
            to,
            duration: duration.max(0.0),
            elapsed: 0.0,
            state: FaderState::Active,
        }
    }

    pub fn kind(&self) -> FaderKind {
        self.kind
    }

    pub fn state(&self) -> FaderState {
        self.state
    }

    pub fn set_state(&mut self, state: FaderState) {
        self.state = state;
    }

    /// Advance the fader by `dt` seconds and return the current
    /// interpolated value. Once the fader reaches its target it
    /// transitions to `Stopped` but keeps returning `to`.
    pub fn tick(&mut self, dt: f64) -> f64 {
        if self.state != FaderState::Active {
            return self.to;
        }

        self.elapsed = (self.elapsed + dt).min(self.duration);
        let t = if self.duration <= 0.0 {
            1.0
        } else {
            self.elapsed / self.duration
        };

        let eased = ease(self.kind, t.clamp(0.0, 1.0));
        let value = self.from + (self.to - self.from) * eased;

        if self.elapsed >= self.duration {
            self.state = FaderState::Stopped;
        }

        value
    }

    pub fn is_active(&self) -> bool {
        self.state == FaderState::Active
    }
}

fn ease(kind: FaderKind, t: f64) -> f64 {
    match kind {
        FaderKind::Linear => t,
        FaderKind::Constant => {
            if t >= 1.0 {
                1.0
            } else {
                0.0
            }
        }
        FaderKind::SCurve => t * t * (3.0 - 2.0 * t),
        FaderKind::Exponential => {
            if t <= 0.0 {
                0.0
            } else {
                (t * t) as f64
            }
        }
        FaderKind::Ease => cubic_bezier_ease(t),
    }
}

/// Evaluates the `y` coordinate of a cubic bezier parameterized so that `x`
/// runs linearly `0..1` along the curve's own parameter `u`, matching how
/// the original's `EaseFader` solves for `u` given the elapsed-time
/// fraction via binary search.
fn cubic_bezier_ease(x: f64) -> f64 {
    let [x1, y1, x2, y2] = EASE_CONTROL_POINTS;

    let bezier = |u: f64, p1: f64, p2: f64| -> f64 {
        let mu = 1.0 - u;
        3.0 * mu * mu * u * p1 + 3.0 * mu * u * u * p2 + u * u * u
    };

    // Binary search for u such that bezier_x(u) == x.
    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    let mut u = x;
    for _ in 0..20 {
        u = (lo + hi) * 0.5;
        let bx = bezier(u, x1, x2);
        if bx < x {
            lo = u;
        } else {
            hi = u;
        }
    }

    bezier(u, y1, y2).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_fader_reaches_target() {
        let mut f = Fader::new(FaderKind::Linear, 0.0, 1.0, 1.0);
        assert_eq!(f.tick(0.5), 0.5);
        assert_eq!(f.tick(0.5), 1.0);
        assert_eq!(f.state(), FaderState::Stopped);
    }

    #[test]
    fn zero_duration_resolves_immediately() {
        let mut f = Fader::new(FaderKind::Linear, 0.0, 2.0, 0.0);
        assert_eq!(f.tick(0.0), 2.0);
        assert_eq!(f.state(), FaderState::Stopped);
    }

    #[test]
    fn scurve_is_symmetric_at_midpoint() {
        assert!((ease(FaderKind::SCurve, 0.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn ease_curve_monotonic() {
        let mut prev = 0.0;
        for i in 1..=10 {
            let t = i as f64 / 10.0;
            let v = ease(FaderKind::Ease, t);
            assert!(v >= prev);
            prev = v;
        }
    }
}

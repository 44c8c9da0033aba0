//! Easing curves used by fades and distance rolloff.
//!
//! Provided curves:
//! - `Interpolation` : named easing functions over `[0, 1]` (linear, power-in, exponential-in, smoothstep)
//! - `LoudnessCurve` : the perceptual fade-in / fade-out pair shared by the music engine
//!
//! All curves are `no_std` friendly, `Copy`, and avoid heap allocations.
//! Inputs outside `[0, 1]` are clamped before evaluation.

use core::fmt::Debug;
use crate::perceptual::{clamp01, lerp, m_pow};

// -------------------------------- Interpolation ----------------------------------

/// Named easing function mapping progress `a ∈ [0, 1]` onto `[0, 1]`.
///
/// Every variant satisfies `apply(0) == 0` and `apply(1) == 1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Interpolation {
    Linear,
    Pow2In,
    #[default]
    Pow3In,
    Pow4In,
    Pow5In,
    /// Exponential ease-in with base 2 and power 5.
    Exp5In,
    /// Exponential ease-in with base 2 and power 10.
    Exp10In,
    SmoothStep,
}

impl Interpolation {
    /// Evaluate the curve at `a`.
    #[inline]
    pub fn apply(self, a: f32) -> f32 {
        let a = clamp01(a);
        match self {
            Interpolation::Linear => a,
            Interpolation::Pow2In => a * a,
            Interpolation::Pow3In => a * a * a,
            Interpolation::Pow4In => {
                let a2 = a * a;
                a2 * a2
            }
            Interpolation::Pow5In => {
                let a2 = a * a;
                a2 * a2 * a
            }
            Interpolation::Exp5In => exp_in(a, 5.0),
            Interpolation::Exp10In => exp_in(a, 10.0),
            Interpolation::SmoothStep => a * a * (3.0 - 2.0 * a),
        }
    }

    /// Interpolate from `start` to `end` following this curve.
    #[inline]
    pub fn apply_range(self, start: f32, end: f32, a: f32) -> f32 {
        lerp(start, end, self.apply(a))
    }
}

/// `2^(power·(a-1))`, rescaled so the curve starts exactly at 0.
#[inline]
fn exp_in(a: f32, power: f32) -> f32 {
    let min = m_pow(2.0, -power);
    let scale = 1.0 / (1.0 - min);
    (m_pow(2.0, power * (a - 1.0)) - min) * scale
}

// ------------------------------- Loudness fades ----------------------------------

/// Fade-in / fade-out easing that follows the global loudness exponent, so both
/// directions feel symmetric to the ear.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LoudnessCurve {
    exponent: u32,
}

impl LoudnessCurve {
    #[inline]
    pub fn new(exponent: u32) -> Self {
        Self { exponent: exponent.max(1) }
    }

    #[inline] pub fn exponent(&self) -> u32 { self.exponent }

    /// `p^e`
    #[inline]
    pub fn fade_in(&self, progress: f32) -> f32 {
        m_pow(clamp01(progress), self.exponent as f32)
    }

    /// `(p - 1)^e · (e even ? -1 : 1) + 1`; mirrors [`fade_in`](Self::fade_in).
    #[inline]
    pub fn fade_out(&self, progress: f32) -> f32 {
        let p = clamp01(progress);
        let sign = if self.exponent % 2 == 0 { -1.0 } else { 1.0 };
        // integer power keeps the sign of a negative base
        let mut acc = 1.0;
        for _ in 0..self.exponent {
            acc *= p - 1.0;
        }
        acc * sign + 1.0
    }
}

impl Default for LoudnessCurve {
    fn default() -> Self {
        Self::new(crate::perceptual::DEFAULT_LOUDNESS_EXPONENT)
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ALL: [Interpolation; 8] = [
        Interpolation::Linear,
        Interpolation::Pow2In,
        Interpolation::Pow3In,
        Interpolation::Pow4In,
        Interpolation::Pow5In,
        Interpolation::Exp5In,
        Interpolation::Exp10In,
        Interpolation::SmoothStep,
    ];

    #[test]
    fn curves_hit_endpoints() {
        for curve in ALL {
            assert_relative_eq!(curve.apply(0.0), 0.0, epsilon = 1e-6);
            assert_relative_eq!(curve.apply(1.0), 1.0, epsilon = 1e-6);
            assert_relative_eq!(curve.apply(-3.0), 0.0, epsilon = 1e-6);
            assert_relative_eq!(curve.apply(7.0), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn apply_range_goes_downwards() {
        let v = Interpolation::Linear.apply_range(1.0, 0.2, 0.5);
        assert_relative_eq!(v, 0.6);
    }

    #[test]
    fn fade_out_mirrors_fade_in() {
        for e in 1..=6 {
            let c = LoudnessCurve::new(e);
            assert_relative_eq!(c.fade_out(0.0), 0.0, epsilon = 1e-6);
            assert_relative_eq!(c.fade_out(1.0), 1.0, epsilon = 1e-6);
            for i in 0..=10 {
                let p = i as f32 / 10.0;
                // point symmetry around (0.5, 0.5)
                assert_relative_eq!(c.fade_out(p), 1.0 - c.fade_in(1.0 - p), epsilon = 1e-5);
            }
        }
    }
}

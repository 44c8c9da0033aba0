//! 2D spatial helpers: positions, distance rolloff and stereo pan.
//!
//! Goals
//! - `no_std`-friendly, allocation free
//! - Pure functions of listener/emitter geometry, no hidden state
//!
//! Contents
//! - `Vec2`            : minimal 2D vector with length limiting
//! - `Rolloff`         : distance attenuation parameters + [`Rolloff::factor`]
//! - `pan_for_offset`  : horizontal offset → pan in `[-reduction, reduction]`
//!
//! Notes
//! - Rolloff applies no attenuation inside `min_distance`; between
//!   `min_distance` and `max_distance` the configured curve walks the gain from
//!   1 down to `min_gain`, and it stays at `min_gain` beyond.
//! - Pan is linear in the horizontal offset only; vertical offset never pans.

use crate::curves::Interpolation;
use crate::perceptual::{clamp01, lerp, m_abs, m_sqrt};

/// Plain 2D vector in world units.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[inline] pub const fn new(x: f32, y: f32) -> Self { Self { x, y } }

    #[inline] pub fn sub(self, other: Vec2) -> Vec2 { Vec2::new(self.x - other.x, self.y - other.y) }

    #[inline] pub fn add(self, other: Vec2) -> Vec2 { Vec2::new(self.x + other.x, self.y + other.y) }

    #[inline] pub fn scale(self, s: f32) -> Vec2 { Vec2::new(self.x * s, self.y * s) }

    #[inline] pub fn len2(self) -> f32 { self.x * self.x + self.y * self.y }

    #[inline] pub fn len(self) -> f32 { m_sqrt(self.len2()) }

    #[inline] pub fn distance(self, other: Vec2) -> f32 { self.sub(other).len() }

    /// Shorten the vector to at most `max_len`, keeping its direction.
    #[inline]
    pub fn limit(self, max_len: f32) -> Vec2 {
        let max_len = max_len.max(0.0);
        let len2 = self.len2();
        if len2 > max_len * max_len && len2 > 0.0 {
            self.scale(max_len / m_sqrt(len2))
        } else {
            self
        }
    }

    /// Midpoint between two points.
    #[inline]
    pub fn midpoint(self, other: Vec2) -> Vec2 {
        Vec2::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }
}

/// Distance attenuation parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rolloff {
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_gain: f32,
    pub curve: Interpolation,
}

impl Rolloff {
    /// Gain multiplier in `[min_gain, 1]` for an emitter `distance` units away.
    #[inline]
    pub fn factor(&self, distance: f32) -> f32 {
        if distance <= self.min_distance {
            return 1.0;
        }
        let span = self.max_distance - self.min_distance;
        if span <= 0.0 {
            return self.min_gain;
        }
        let progress = clamp01((distance - self.min_distance) / span);
        self.curve.apply_range(1.0, self.min_gain, progress)
    }
}

impl Default for Rolloff {
    fn default() -> Self {
        Self { min_distance: 3.0, max_distance: 15.0, min_gain: 0.0, curve: Interpolation::Pow3In }
    }
}

/// Pan for an emitter `dx` units to the right of the listener (negative = left).
///
/// Magnitude grows linearly until `|dx| == limit`, where it reaches `reduction`.
#[inline]
pub fn pan_for_offset(dx: f32, limit: f32, reduction: f32) -> f32 {
    let raw = if limit > 0.0 { clamp01(m_abs(dx / limit)) } else { 1.0 };
    let pan = lerp(0.0, reduction, raw);
    if dx < 0.0 { -pan } else { pan }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rolloff_is_flat_inside_min_distance() {
        let r = Rolloff::default();
        assert_eq!(r.factor(0.0), 1.0);
        assert_eq!(r.factor(3.0), 1.0);
    }

    #[test]
    fn rolloff_reaches_min_gain() {
        let r = Rolloff { min_gain: 0.25, ..Rolloff::default() };
        assert_relative_eq!(r.factor(15.0), 0.25);
        assert_relative_eq!(r.factor(1000.0), 0.25);
        let mid = r.factor(9.0);
        assert!(mid < 1.0 && mid > 0.25, "mid={mid}");
    }

    #[test]
    fn rolloff_degenerate_span() {
        let r = Rolloff { min_distance: 5.0, max_distance: 5.0, ..Rolloff::default() };
        assert_eq!(r.factor(5.0), 1.0);
        assert_eq!(r.factor(5.1), 0.0);
    }

    #[test]
    fn pan_is_signed_and_clamped() {
        assert_relative_eq!(pan_for_offset(5.0, 10.0, 0.33), 0.165);
        assert_relative_eq!(pan_for_offset(-5.0, 10.0, 0.33), -0.165);
        assert_relative_eq!(pan_for_offset(-50.0, 10.0, 0.33), -0.33);
        assert_eq!(pan_for_offset(0.0, 10.0, 0.33), 0.0);
    }

    #[test]
    fn limit_caps_length() {
        let v = Vec2::new(3.0, 4.0).limit(2.5);
        assert_relative_eq!(v.len(), 2.5, epsilon = 1e-6);
        assert_relative_eq!(v.x, 1.5, epsilon = 1e-6);
        assert_eq!(Vec2::new(1.0, 0.0).limit(2.0), Vec2::new(1.0, 0.0));
    }
}

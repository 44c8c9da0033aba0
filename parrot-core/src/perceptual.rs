//! Perceptual loudness math.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - Math backend selection that works in both `std` and `no_std` contexts
//! - Clean, side-effect free helpers that are easy to test
//!
//! Human loudness perception is not linear. A 0–1 control value raised to a
//! small integer power (3–4) makes a linear slider *feel* linear to the ear;
//! see [`perceived_volume`]. Decibel helpers are used by the engines to shift
//! live volumes by a relative amount instead of snapping them.
//!
//! Conventions:
//! - All functions are `#[inline]` where useful to help the optimizer.
//! - Argument and return domains are documented per function.

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // libm (C math) in no_std
    if #[cfg(feature = "no-std")] {
        #[inline] pub(crate) fn m_pow(x: f32, e: f32) -> f32 { libm::powf(x, e) }
        #[inline] pub(crate) fn m_log10(x: f32) -> f32 { libm::log10f(x) }
        #[inline] pub(crate) fn m_sqrt(x: f32) -> f32 { libm::sqrtf(x) }
        #[inline] pub(crate) fn m_abs(x: f32) -> f32 { libm::fabsf(x) }
    // std backend
    } else {
        #[inline] pub(crate) fn m_pow(x: f32, e: f32) -> f32 { x.powf(e) }
        #[inline] pub(crate) fn m_log10(x: f32) -> f32 { x.log10() }
        #[inline] pub(crate) fn m_sqrt(x: f32) -> f32 { x.sqrt() }
        #[inline] pub(crate) fn m_abs(x: f32) -> f32 { x.abs() }
    }
}

// --------------------------------- Constants -------------------------------------

/// Smallest volume ever handed to a backend for a sounding track (≈ -120 dB).
///
/// Also the threshold under which a player counts as "unpowered".
pub const MIN_VOLUME: f32 = 0.000_001;

/// Loudness curve exponent used when nothing else is configured.
pub const DEFAULT_LOUDNESS_EXPONENT: u32 = 3;

// --------------------------------- Utilities -------------------------------------

/// Clamp into [0, 1]. NaN maps to 0.
#[inline]
pub fn clamp01(x: f32) -> f32 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

// --------------------------------- dB / linear -----------------------------------

/// Convert decibels to linear volume: `10^(0.05·db)`.
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    m_pow(10.0, 0.05 * db)
}

/// Convert linear volume to decibels: `20·log10(v)`.
///
/// `v <= 0` yields `f32::NEG_INFINITY` (silence), never NaN.
#[inline]
pub fn linear_to_db(volume: f32) -> f32 {
    if volume <= 0.0 || volume.is_nan() {
        f32::NEG_INFINITY
    } else {
        20.0 * m_log10(volume)
    }
}

/// Shift `volume` by `delta_db` decibels, keeping silence silent.
#[inline]
pub fn shift_db(volume: f32, delta_db: f32) -> f32 {
    if volume <= 0.0 {
        return 0.0;
    }
    db_to_linear(linear_to_db(volume) + delta_db)
}

// --------------------------------- Loudness curve --------------------------------

/// Map a linear control value onto perceived loudness: `raw^exponent`, clamped to [0, 1].
///
/// `raw <= 0` (and NaN) yields `0`.
#[inline]
pub fn perceived_volume(raw: f32, exponent: u32) -> f32 {
    let raw = clamp01(raw);
    if raw <= 0.0 {
        return 0.0;
    }
    clamp01(m_pow(raw, exponent as f32))
}

// --------------------------------- Tests (std only) ------------------------------

#![cfg_attr(not(feature = "std"), no_std)]
//! Parrot Core: no_std-ready math shared by the Parrot audio instance engines.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use the `libm` math backend
//! - `serde`    : derive `Serialize`/`Deserialize` for curve selections
//!
//! Modules
//! - [`perceptual`] : db/linear conversion, perceived loudness curve, clamps
//! - [`curves`]     : easing curves for rolloff and fades
//! - [`spatial`]    : `Vec2`, distance rolloff, stereo pan
//!
//! Design
//! - No heap allocations; pure functions and small `Copy` types
//! - Nothing in here talks to a playback backend

pub mod curves;
pub mod perceptual;
pub mod spatial;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::curves::{Interpolation, LoudnessCurve};
    pub use crate::perceptual::{
        clamp01, db_to_linear, lerp, linear_to_db, perceived_volume, shift_db, MIN_VOLUME,
    };
    pub use crate::spatial::{pan_for_offset, Rolloff, Vec2};
}

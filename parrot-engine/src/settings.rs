//! Tunables shared by the sound and music engines.
//!
//! Changes can be made at any time through the facade; both engines read the
//! record on every call that needs it. All fields have defaults, so a settings
//! file only needs to name what it overrides.

use parrot_core::curves::{Interpolation, LoudnessCurve};
use parrot_core::spatial::Rolloff;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::instance::PlaybackMode;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParrotSettings {
    /// Exponent of the perceived-loudness curve applied to every 0–1 volume.
    pub loudness_exponent: u32,

    /// Distances under this play with no attenuation.
    pub rolloff_min_distance: f32,
    /// Distances beyond this play at `rolloff_min_gain`.
    pub rolloff_max_distance: f32,
    pub rolloff_min_gain: f32,
    pub rolloff_curve: Interpolation,

    /// Horizontal offset at which pan stops growing.
    pub pan_limit: f32,
    /// Pan reached at `pan_limit`.
    pub pan_reduction: f32,

    /// World units per second a continuous sound may move.
    pub continuous_speed: f32,
    /// Seconds a continuous sound survives without being touched.
    pub continuous_timeout: f32,
    /// Seconds a continuous sound takes to reach full volume.
    pub continuous_fade_in: f32,

    /// Seconds a stopped sound keeps fading before it is released.
    pub death_fade_out: f32,
    /// Clip duration assumed when the backend cannot report one.
    pub unsupported_clip_duration: f32,

    /// Drop far-away, very short sounds before they are ever created.
    pub ignore_distant_short_sounds: bool,
    /// Clips at or under this many seconds count as short.
    pub short_sound_max_duration: f32,
    /// Distance beyond which short sounds are dropped; `None` uses `rolloff_max_distance`.
    pub short_sound_ignore_distance: Option<f32>,
    pub short_sound_ignored_modes: Vec<PlaybackMode>,

    pub music_fade_in: f32,
    pub music_fade_out: f32,
}

impl Default for ParrotSettings {
    fn default() -> Self {
        Self {
            loudness_exponent: 3,
            rolloff_min_distance: 3.0,
            rolloff_max_distance: 15.0,
            rolloff_min_gain: 0.0,
            rolloff_curve: Interpolation::Pow3In,
            pan_limit: 10.0,
            pan_reduction: 0.33,
            continuous_speed: 75.0,
            continuous_timeout: 0.35,
            continuous_fade_in: 0.15,
            death_fade_out: 0.4,
            unsupported_clip_duration: 15.0,
            ignore_distant_short_sounds: false,
            short_sound_max_duration: 0.5,
            short_sound_ignore_distance: None,
            short_sound_ignored_modes: vec![PlaybackMode::Normal],
            music_fade_in: 0.8,
            music_fade_out: 0.8,
        }
    }
}

impl ParrotSettings {
    /// Reject values the engines cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.loudness_exponent == 0 {
            return Err(Error::setting("loudness_exponent", "must be at least 1"));
        }
        let non_negative = [
            ("rolloff_min_distance", self.rolloff_min_distance),
            ("rolloff_max_distance", self.rolloff_max_distance),
            ("pan_limit", self.pan_limit),
            ("continuous_speed", self.continuous_speed),
            ("continuous_timeout", self.continuous_timeout),
            ("continuous_fade_in", self.continuous_fade_in),
            ("death_fade_out", self.death_fade_out),
            ("unsupported_clip_duration", self.unsupported_clip_duration),
            ("short_sound_max_duration", self.short_sound_max_duration),
            ("music_fade_in", self.music_fade_in),
            ("music_fade_out", self.music_fade_out),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(Error::setting(name, format!("must be a non-negative number, got {value}")));
            }
        }
        if self.rolloff_min_distance > self.rolloff_max_distance {
            return Err(Error::setting(
                "rolloff_min_distance",
                format!("{} is beyond rolloff_max_distance {}", self.rolloff_min_distance, self.rolloff_max_distance),
            ));
        }
        if !(0.0..=1.0).contains(&self.rolloff_min_gain) {
            return Err(Error::setting("rolloff_min_gain", format!("must be in 0-1, got {}", self.rolloff_min_gain)));
        }
        if let Some(distance) = self.short_sound_ignore_distance {
            if !(distance >= 0.0) {
                return Err(Error::setting("short_sound_ignore_distance", format!("must be non-negative, got {distance}")));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn rolloff(&self) -> Rolloff {
        Rolloff {
            min_distance: self.rolloff_min_distance,
            max_distance: self.rolloff_max_distance,
            min_gain: self.rolloff_min_gain,
            curve: self.rolloff_curve,
        }
    }

    #[inline]
    pub fn loudness_curve(&self) -> LoudnessCurve {
        LoudnessCurve::new(self.loudness_exponent)
    }

    /// Effective distance of the distant-short-sound filter.
    #[inline]
    pub fn short_sound_distance(&self) -> f32 {
        self.short_sound_ignore_distance.unwrap_or(self.rolloff_max_distance)
    }
}

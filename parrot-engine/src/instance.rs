//! Per-instance records of the sound engine.
//!
//! A [`SoundInstance`] is created by a play request, mutated every tick by the
//! engine that owns it, and dropped once killed or once its death fade has
//! run out. Hosts only ever see it through shared references.

use core::num::NonZeroU64;

use parrot_core::spatial::Vec2;
use serde::{Deserialize, Serialize};

use crate::backend::{BackendHandle, ClipId, RoutingChannel};
use crate::library::{CategoryId, SoundTypeId};

/// How an instance ends.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Plays once and dies when the clip runs out.
    #[default]
    Normal,
    /// Loops while being touched; shared by every caller of the same type.
    Continuous,
    /// Loops until stopped.
    Eternal,
}

impl PlaybackMode {
    #[inline]
    pub fn is_looping(self) -> bool {
        self != PlaybackMode::Normal
    }
}

/// Externally visible id of a sound instance. Never zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundId(pub(crate) NonZeroU64);

impl SoundId {
    #[inline] pub fn get(self) -> u64 { self.0.get() }
}

impl core::fmt::Display for SoundId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct SoundInstance {
    pub(crate) id: SoundId,
    pub(crate) type_id: SoundTypeId,
    pub(crate) category: CategoryId,
    pub(crate) clip: ClipId,
    pub(crate) handle: Option<BackendHandle>,
    pub(crate) routing: Option<RoutingChannel>,
    pub(crate) mode: PlaybackMode,

    pub(crate) position: Vec2,
    /// Positions buffered this tick by continuous callers.
    pub(crate) pending_positions: Vec<Vec2>,

    /// Type pitch times request pitch, before variation and category factor.
    pub(crate) pitch: f32,
    /// Pitch last sent to the backend.
    pub(crate) applied_pitch: f32,
    /// Category factor ratio not yet sent to the backend.
    pub(crate) pitch_nudge: f32,
    /// Raw 0-1 volume including this instance's random variation.
    pub(crate) volume: f32,
    pub(crate) volume_factor: f32,

    pub(crate) dying: bool,
    pub(crate) pending_start: bool,
    /// Engine clock at the last touch, or at the stop request once dying.
    pub(crate) last_touch: f64,
    pub(crate) elapsed: f32,
    pub(crate) duration: f32,
    pub(crate) current_volume: f32,
    pub(crate) current_pan: f32,

    pub(crate) priority: i32,
    pub(crate) persistent: bool,
}

impl SoundInstance {
    #[inline] pub fn id(&self) -> SoundId { self.id }
    #[inline] pub fn sound_type(&self) -> SoundTypeId { self.type_id }
    #[inline] pub fn category(&self) -> CategoryId { self.category }
    #[inline] pub fn clip(&self) -> ClipId { self.clip }
    #[inline] pub fn handle(&self) -> Option<BackendHandle> { self.handle }
    #[inline] pub fn routing(&self) -> Option<RoutingChannel> { self.routing }
    #[inline] pub fn playback_mode(&self) -> PlaybackMode { self.mode }
    #[inline] pub fn position(&self) -> Vec2 { self.position }
    #[inline] pub fn pitch(&self) -> f32 { self.applied_pitch }
    #[inline] pub fn volume_factor(&self) -> f32 { self.volume_factor }
    #[inline] pub fn elapsed(&self) -> f32 { self.elapsed }
    #[inline] pub fn duration(&self) -> f32 { self.duration }
    #[inline] pub fn priority(&self) -> i32 { self.priority }
    #[inline] pub fn is_persistent(&self) -> bool { self.persistent }
    #[inline] pub fn is_dying(&self) -> bool { self.dying }
    #[inline] pub fn is_pending_start(&self) -> bool { self.pending_start }

    /// Volume (before master) applied on the last tick.
    #[inline] pub fn current_volume(&self) -> f32 { self.current_volume }
    #[inline] pub fn current_pan(&self) -> f32 { self.current_pan }

    /// Holds a backend handle or is still waiting for its first start.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.handle.is_some() || self.pending_start
    }

    /// Valid and not fading out.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.is_valid() && !self.dying
    }

    /// A one-shot clip that has played past its duration. Looping modes never expire.
    #[inline]
    pub fn is_expired(&self) -> bool {
        !self.mode.is_looping() && self.duration > 0.0 && self.elapsed > self.duration
    }
}

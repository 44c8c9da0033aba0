//! Parrot Engine: per-frame sound effect and music instance management.
//!
//! Crate layout:
//! - [`backend`]  : `SoundBackend` / `MusicBackend` traits the host implements
//! - [`library`]  : sound categories, sound types, music types and their registries
//! - [`selector`] : weighted non-repeating clip selection
//! - [`instance`] : sound instance records and playback modes
//! - [`sound`]    : sound effect engine (voices, fades, spatialization)
//! - [`music`]    : music engine (fade state machine per track)
//! - [`settings`] : tunables shared by both engines
//! - [`parrot`]   : facade driving both engines against one backend
//! - [`testing`]  : recording backend for tests and headless runs
//!
//! The engines never produce samples. They decide what should be audible and
//! hand play/adjust/stop calls to the backend, all from `update`.

pub mod backend;
pub mod error;
pub mod instance;
pub mod library;
pub mod music;
pub mod parrot;
pub mod selector;
pub mod settings;
mod slab;
pub mod sound;
pub mod testing;

// Re-export some commonly used items to make downstream imports ergonomic.
pub use backend::{BackendHandle, ClipId, MusicBackend, RoutingChannel, SoundBackend, TrackId, VoiceParams};
pub use error::{Error, Result};
pub use instance::{PlaybackMode, SoundId, SoundInstance};
pub use library::{
    CategoryId, MusicLibrary, MusicType, MusicTypeId, SoundCategory, SoundLibrary, SoundType, SoundTypeId,
};
pub use music::{MusicChannel, MusicId, MusicRequest, MusicState};
pub use parrot::Parrot;
pub use settings::ParrotSettings;
pub use sound::{Diagnostics, SoundRequest};

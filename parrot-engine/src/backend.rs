//! Playback backend seam.
//!
//! The engines never decode, mix or output samples. They decide *what* should
//! be audible and hand the resulting calls to a host-provided backend through
//! the two traits defined here:
//!
//! - [`SoundBackend`] : fire-and-forget effect voices addressed by [`BackendHandle`]
//! - [`MusicBackend`] : long-lived streamed tracks addressed by [`TrackId`]
//!
//! Every call is assumed synchronous and non-blocking. A play call that fails
//! returns `None`; the sound engine notices the missing handle on the next tick
//! and force-removes the instance.
//!
//! Clips and tracks are opaque ids owned by the host; mapping them onto real
//! audio data is the backend's business.

use serde::{Deserialize, Serialize};

/// Host-side identifier of a loaded sound effect clip.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClipId(pub u32);

/// Host-side identifier of a streamable music track.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u32);

/// Opaque bus/effects channel identifier forwarded to the backend.
///
/// Absence (`None` at call sites) means default routing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingChannel(pub u32);

/// Handle of one sounding voice, as returned by the backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BackendHandle(pub u64);

/// Parameters of a voice start.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VoiceParams {
    pub volume: f32,
    pub pitch: f32,
    pub pan: f32,
    pub routing: Option<RoutingChannel>,
}

/// Anything that can start, adjust and stop sound effect voices.
pub trait SoundBackend {
    /// Play `clip` once. `None` signals the voice could not be started.
    fn play(&mut self, clip: ClipId, params: VoiceParams) -> Option<BackendHandle>;

    /// Play `clip` in a loop until stopped.
    fn looped(&mut self, clip: ClipId, params: VoiceParams) -> Option<BackendHandle>;

    /// Adjust a sounding voice in place.
    fn set_volume_and_pan(&mut self, handle: BackendHandle, volume: f32, pan: f32);

    fn set_pitch(&mut self, handle: BackendHandle, pitch: f32);

    /// Stop a voice immediately.
    fn stop(&mut self, handle: BackendHandle);

    /// A one-shot voice reported as not playing is released early.
    fn is_playing(&self, handle: BackendHandle) -> bool;

    /// Duration of `clip` in seconds, or `None` if this backend cannot report it.
    fn clip_duration(&self, clip: ClipId) -> Option<f32>;
}

/// Anything that can stream music tracks.
///
/// Tracks are stateful objects on the backend side: `play` after `pause`
/// resumes, `set_position` seeks.
pub trait MusicBackend {
    fn play_track(&mut self, track: TrackId, routing: Option<RoutingChannel>);

    fn pause_track(&mut self, track: TrackId);

    fn stop_track(&mut self, track: TrackId);

    fn set_track_volume(&mut self, track: TrackId, volume: f32);

    /// Seek to `seconds` from the start.
    fn set_track_position(&mut self, track: TrackId, seconds: f32);

    fn set_track_looping(&mut self, track: TrackId, looping: bool);

    fn is_track_playing(&self, track: TrackId) -> bool;
}

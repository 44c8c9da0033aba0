//! Headless backend that records every call it receives.
//!
//! Useful for tests, benchmarks and hosts that want to drive the engines
//! without an audio device. Clips play until stopped or until
//! [`RecordingBackend::finish`] is called; tracks behave the same way.

use std::collections::{HashMap, HashSet};

use crate::backend::{
    BackendHandle, ClipId, MusicBackend, RoutingChannel, SoundBackend, TrackId, VoiceParams,
};

/// One recorded backend call.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Play { clip: ClipId, params: VoiceParams, handle: Option<BackendHandle> },
    Loop { clip: ClipId, params: VoiceParams, handle: Option<BackendHandle> },
    SetVolumeAndPan { handle: BackendHandle, volume: f32, pan: f32 },
    SetPitch { handle: BackendHandle, pitch: f32 },
    Stop { handle: BackendHandle },
    PlayTrack { track: TrackId, routing: Option<RoutingChannel> },
    PauseTrack { track: TrackId },
    StopTrack { track: TrackId },
    SetTrackVolume { track: TrackId, volume: f32 },
    SetTrackPosition { track: TrackId, seconds: f32 },
    SetTrackLooping { track: TrackId, looping: bool },
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<Call>,
    durations: HashMap<ClipId, f32>,
    playing: HashSet<BackendHandle>,
    tracks: HashSet<TrackId>,
    next_handle: u64,
    fail_plays: usize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `seconds` as the duration of `clip`. Unknown clips report nothing.
    pub fn with_duration(mut self, clip: ClipId, seconds: f32) -> Self {
        self.durations.insert(clip, seconds);
        self
    }

    /// Make the next `count` play/loop calls fail.
    pub fn fail_next_plays(&mut self, count: usize) {
        self.fail_plays = count;
    }

    /// Simulate a voice running out on its own.
    pub fn finish(&mut self, handle: BackendHandle) {
        self.playing.remove(&handle);
    }

    /// Simulate a non-looping track reaching its end.
    pub fn finish_track(&mut self, track: TrackId) {
        self.tracks.remove(&track);
    }

    #[inline] pub fn calls(&self) -> &[Call] { &self.calls }

    /// Drop the recorded history, keeping playback state.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn voices_playing(&self) -> usize {
        self.playing.len()
    }

    /// Last volume sent for `handle`, from either a start or an adjustment.
    pub fn last_volume(&self, handle: BackendHandle) -> Option<f32> {
        self.calls.iter().rev().find_map(|call| match call {
            Call::SetVolumeAndPan { handle: h, volume, .. } if *h == handle => Some(*volume),
            Call::Play { handle: Some(h), params, .. } | Call::Loop { handle: Some(h), params, .. }
                if *h == handle =>
            {
                Some(params.volume)
            }
            _ => None,
        })
    }

    /// Last volume sent for `track`.
    pub fn last_track_volume(&self, track: TrackId) -> Option<f32> {
        self.calls.iter().rev().find_map(|call| match call {
            Call::SetTrackVolume { track: t, volume } if *t == track => Some(*volume),
            _ => None,
        })
    }

    fn start(&mut self) -> Option<BackendHandle> {
        if self.fail_plays > 0 {
            self.fail_plays -= 1;
            return None;
        }
        self.next_handle += 1;
        let handle = BackendHandle(self.next_handle);
        self.playing.insert(handle);
        Some(handle)
    }
}

impl SoundBackend for RecordingBackend {
    fn play(&mut self, clip: ClipId, params: VoiceParams) -> Option<BackendHandle> {
        let handle = self.start();
        self.calls.push(Call::Play { clip, params, handle });
        handle
    }

    fn looped(&mut self, clip: ClipId, params: VoiceParams) -> Option<BackendHandle> {
        let handle = self.start();
        self.calls.push(Call::Loop { clip, params, handle });
        handle
    }

    fn set_volume_and_pan(&mut self, handle: BackendHandle, volume: f32, pan: f32) {
        self.calls.push(Call::SetVolumeAndPan { handle, volume, pan });
    }

    fn set_pitch(&mut self, handle: BackendHandle, pitch: f32) {
        self.calls.push(Call::SetPitch { handle, pitch });
    }

    fn stop(&mut self, handle: BackendHandle) {
        self.playing.remove(&handle);
        self.calls.push(Call::Stop { handle });
    }

    fn is_playing(&self, handle: BackendHandle) -> bool {
        self.playing.contains(&handle)
    }

    fn clip_duration(&self, clip: ClipId) -> Option<f32> {
        self.durations.get(&clip).copied()
    }
}

impl MusicBackend for RecordingBackend {
    fn play_track(&mut self, track: TrackId, routing: Option<RoutingChannel>) {
        self.tracks.insert(track);
        self.calls.push(Call::PlayTrack { track, routing });
    }

    fn pause_track(&mut self, track: TrackId) {
        self.tracks.remove(&track);
        self.calls.push(Call::PauseTrack { track });
    }

    fn stop_track(&mut self, track: TrackId) {
        self.tracks.remove(&track);
        self.calls.push(Call::StopTrack { track });
    }

    fn set_track_volume(&mut self, track: TrackId, volume: f32) {
        self.calls.push(Call::SetTrackVolume { track, volume });
    }

    fn set_track_position(&mut self, track: TrackId, seconds: f32) {
        self.calls.push(Call::SetTrackPosition { track, seconds });
    }

    fn set_track_looping(&mut self, track: TrackId, looping: bool) {
        self.calls.push(Call::SetTrackLooping { track, looping });
    }

    fn is_track_playing(&self, track: TrackId) -> bool {
        self.tracks.contains(&track)
    }
}

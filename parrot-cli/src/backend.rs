//! Logging backend: every call becomes a `tracing` event, clips end on their own.

use std::collections::HashMap;

use parrot_engine::{BackendHandle, ClipId, MusicBackend, RoutingChannel, SoundBackend, TrackId, VoiceParams};
use tracing::trace;

struct Voice {
    clip: ClipId,
    remaining: f32,
    looping: bool,
}

struct Track {
    position: f32,
    length: f32,
    looping: bool,
    playing: bool,
}

/// Simulated device. Voices and tracks advance with [`LogBackend::advance`].
#[derive(Default)]
pub struct LogBackend {
    clip_lengths: HashMap<ClipId, f32>,
    track_lengths: HashMap<TrackId, f32>,
    voices: HashMap<BackendHandle, Voice>,
    tracks: HashMap<TrackId, Track>,
    next_handle: u64,
    pub calls: u64,
}

impl LogBackend {
    pub fn with_clip(mut self, clip: ClipId, seconds: f32) -> Self {
        self.clip_lengths.insert(clip, seconds);
        self
    }

    pub fn with_track(mut self, track: TrackId, seconds: f32) -> Self {
        self.track_lengths.insert(track, seconds);
        self
    }

    /// Move simulated playback forward; one-shot voices and tracks run out.
    pub fn advance(&mut self, dt: f32) {
        self.voices.retain(|handle, voice| {
            if voice.looping {
                return true;
            }
            voice.remaining -= dt;
            if voice.remaining <= 0.0 {
                trace!(handle = handle.0, clip = voice.clip.0, "voice ended");
                return false;
            }
            true
        });
        for (track, state) in &mut self.tracks {
            if !state.playing {
                continue;
            }
            state.position += dt;
            if state.position >= state.length {
                if state.looping {
                    state.position -= state.length;
                } else {
                    state.playing = false;
                    trace!(track = track.0, "track ended");
                }
            }
        }
    }

    pub fn voices(&self) -> usize {
        self.voices.len()
    }

    fn start(&mut self, clip: ClipId, params: VoiceParams, looping: bool) -> Option<BackendHandle> {
        self.calls += 1;
        self.next_handle += 1;
        let handle = BackendHandle(self.next_handle);
        let remaining = self.clip_lengths.get(&clip).copied().unwrap_or(1.0);
        self.voices.insert(handle, Voice { clip, remaining, looping });
        trace!(
            handle = handle.0,
            clip = clip.0,
            volume = params.volume,
            pitch = params.pitch,
            pan = params.pan,
            looping,
            "voice start"
        );
        Some(handle)
    }

    fn track(&mut self, track: TrackId) -> &mut Track {
        let length = self.track_lengths.get(&track).copied().unwrap_or(180.0);
        self.tracks.entry(track).or_insert(Track { position: 0.0, length, looping: false, playing: false })
    }
}

impl SoundBackend for LogBackend {
    fn play(&mut self, clip: ClipId, params: VoiceParams) -> Option<BackendHandle> {
        self.start(clip, params, false)
    }

    fn looped(&mut self, clip: ClipId, params: VoiceParams) -> Option<BackendHandle> {
        self.start(clip, params, true)
    }

    fn set_volume_and_pan(&mut self, handle: BackendHandle, volume: f32, pan: f32) {
        self.calls += 1;
        trace!(handle = handle.0, volume, pan, "voice adjust");
    }

    fn set_pitch(&mut self, handle: BackendHandle, pitch: f32) {
        self.calls += 1;
        trace!(handle = handle.0, pitch, "voice pitch");
    }

    fn stop(&mut self, handle: BackendHandle) {
        self.calls += 1;
        self.voices.remove(&handle);
        trace!(handle = handle.0, "voice stop");
    }

    fn is_playing(&self, handle: BackendHandle) -> bool {
        self.voices.contains_key(&handle)
    }

    fn clip_duration(&self, clip: ClipId) -> Option<f32> {
        self.clip_lengths.get(&clip).copied()
    }
}

impl MusicBackend for LogBackend {
    fn play_track(&mut self, track: TrackId, routing: Option<RoutingChannel>) {
        self.calls += 1;
        self.track(track).playing = true;
        trace!(track = track.0, routing = ?routing, "track play");
    }

    fn pause_track(&mut self, track: TrackId) {
        self.calls += 1;
        self.track(track).playing = false;
        trace!(track = track.0, "track pause");
    }

    fn stop_track(&mut self, track: TrackId) {
        self.calls += 1;
        let state = self.track(track);
        state.playing = false;
        state.position = 0.0;
        trace!(track = track.0, "track stop");
    }

    fn set_track_volume(&mut self, track: TrackId, volume: f32) {
        self.calls += 1;
        trace!(track = track.0, volume, "track volume");
    }

    fn set_track_position(&mut self, track: TrackId, seconds: f32) {
        self.calls += 1;
        self.track(track).position = seconds;
    }

    fn set_track_looping(&mut self, track: TrackId, looping: bool) {
        self.calls += 1;
        self.track(track).looping = looping;
    }

    fn is_track_playing(&self, track: TrackId) -> bool {
        self.tracks.get(&track).is_some_and(|t| t.playing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: VoiceParams = VoiceParams { volume: 1.0, pitch: 1.0, pan: 0.0, routing: None };

    #[test]
    fn one_shot_voices_run_out() {
        let mut b = LogBackend::default().with_clip(ClipId(1), 0.5);
        let once = b.play(ClipId(1), PARAMS).unwrap();
        let looped = b.looped(ClipId(1), PARAMS).unwrap();
        b.advance(0.6);
        assert!(!b.is_playing(once));
        assert!(b.is_playing(looped));
    }

    #[test]
    fn tracks_end_unless_looping() {
        let mut b = LogBackend::default().with_track(TrackId(1), 1.0).with_track(TrackId(2), 1.0);
        b.play_track(TrackId(1), None);
        b.play_track(TrackId(2), None);
        b.set_track_looping(TrackId(2), true);
        b.advance(1.5);
        assert!(!b.is_track_playing(TrackId(1)));
        assert!(b.is_track_playing(TrackId(2)));
    }
}

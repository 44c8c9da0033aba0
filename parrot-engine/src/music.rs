//! Music instance engine.
//!
//! One [`MusicInstance`] per music type, each driven through an explicit fade
//! state machine:
//!
//! ```text
//! Silent ─► FadingIn ─► Playing ─► FadingOut ─► Paused ─(resume)─► FadingIn
//!    └──────────────────►┘              └──────► Disposing ◄── Paused (stop)
//! ```
//!
//! Requests only move instances between states; backend calls are issued from
//! [`MusicEngine::update`]. Target volumes combine master, channel, type and
//! relative volume, each passed through the loudness curve. Changing any of
//! them reprojects every affected target by the decibel difference so the
//! shift is heard as a level change, not a restart.

use core::num::NonZeroU64;
use std::collections::HashMap;

use parrot_core::perceptual::{clamp01, lerp, linear_to_db, perceived_volume, shift_db, MIN_VOLUME};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::backend::{MusicBackend, RoutingChannel, TrackId};
use crate::library::{MusicLibrary, MusicTypeId};
use crate::settings::ParrotSettings;

/// Fade duration floor, so a zero-length fade does not divide by zero.
const MIN_FADE: f32 = 0.000_01;

/// Logical music channel. At most one active instance sounds per channel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MusicChannel(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MusicId(NonZeroU64);

impl MusicId {
    #[inline] pub fn get(self) -> u64 { self.0.get() }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MusicState {
    /// Requested, not yet started on the backend.
    Silent,
    FadingIn,
    Playing,
    FadingOut,
    /// Faded out and halted; can be resumed.
    Paused,
    /// Released on the current update.
    Disposing,
}

impl MusicState {
    /// Audible or becoming audible.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, MusicState::FadingIn | MusicState::Playing)
    }
}

// -------------------------------- Requests ---------------------------------------

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MusicRequest {
    pub music_type: MusicTypeId,
    pub looping: bool,
    pub fade_in: bool,
    /// Seek offset in seconds applied before the first start.
    pub position: f32,
    pub channel: MusicChannel,
    pub routing: Option<RoutingChannel>,
}

impl MusicRequest {
    /// Non-looping, fading in, from the start, on channel 0.
    pub fn new(music_type: MusicTypeId) -> Self {
        Self {
            music_type,
            looping: false,
            fade_in: true,
            position: 0.0,
            channel: MusicChannel::default(),
            routing: None,
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn fade_in(mut self, fade_in: bool) -> Self {
        self.fade_in = fade_in;
        self
    }

    pub fn position(mut self, seconds: f32) -> Self {
        self.position = seconds;
        self
    }

    pub fn channel(mut self, channel: MusicChannel) -> Self {
        self.channel = channel;
        self
    }

    pub fn routing(mut self, routing: RoutingChannel) -> Self {
        self.routing = Some(routing);
        self
    }
}

#[derive(Clone, Debug)]
pub struct MusicInstance {
    id: MusicId,
    music_type: MusicTypeId,
    track: TrackId,
    looping: bool,
    channel: MusicChannel,
    routing: Option<RoutingChannel>,
    target_volume: f32,
    /// Volume last sent to the backend.
    volume: f32,
    initial_position: f32,
    state: MusicState,
    next_state: Option<MusicState>,
    state_timer: f32,
}

impl MusicInstance {
    #[inline] pub fn id(&self) -> MusicId { self.id }
    #[inline] pub fn music_type(&self) -> MusicTypeId { self.music_type }
    #[inline] pub fn track(&self) -> TrackId { self.track }
    #[inline] pub fn is_looping(&self) -> bool { self.looping }
    #[inline] pub fn channel(&self) -> MusicChannel { self.channel }
    #[inline] pub fn routing(&self) -> Option<RoutingChannel> { self.routing }
    #[inline] pub fn target_volume(&self) -> f32 { self.target_volume }
    #[inline] pub fn volume(&self) -> f32 { self.volume }
    #[inline] pub fn state(&self) -> MusicState { self.state }
    #[inline] pub fn next_state(&self) -> Option<MusicState> { self.next_state }
    #[inline] pub fn state_timer(&self) -> f32 { self.state_timer }

    /// Fade toward `next`, or jump straight to the end of the fade.
    fn fade_out(&mut self, next: MusicState, graceful: bool) {
        let silent = self.state == MusicState::Silent;
        self.state = MusicState::FadingOut;
        self.next_state = Some(next);
        self.target_volume = self.volume;
        self.state_timer = if graceful && !silent { 0.0 } else { f32::INFINITY };
    }

    fn set_backend_volume<B: MusicBackend + ?Sized>(&mut self, backend: &mut B, volume: f32) {
        let volume = volume.clamp(MIN_VOLUME, 1.0);
        self.volume = volume;
        backend.set_track_volume(self.track, volume);
    }
}

// --------------------------------- Engine ----------------------------------------

pub struct MusicEngine {
    library: MusicLibrary,
    instances: Vec<MusicInstance>,
    next_id: u64,
    /// Raw 0-1 volumes; perceived values are derived on use.
    master_volume: f32,
    channel_volumes: HashMap<MusicChannel, f32>,
    type_volumes: HashMap<MusicTypeId, f32>,
}

impl MusicEngine {
    pub fn new(library: MusicLibrary) -> Self {
        Self {
            library,
            instances: Vec::new(),
            next_id: 0,
            master_volume: 1.0,
            channel_volumes: HashMap::new(),
            type_volumes: HashMap::new(),
        }
    }

    #[inline] pub fn library(&self) -> &MusicLibrary { &self.library }
    #[inline] pub fn library_mut(&mut self) -> &mut MusicLibrary { &mut self.library }

    pub fn instances(&self) -> impl Iterator<Item = &MusicInstance> + '_ {
        self.instances.iter()
    }

    pub fn instance(&self, id: MusicId) -> Option<&MusicInstance> {
        self.instances.iter().find(|i| i.id == id)
    }

    // ------------------------------ Volumes ----------------------------------

    #[inline] pub fn master_volume(&self) -> f32 { self.master_volume }

    pub fn channel_volume(&self, channel: MusicChannel) -> f32 {
        self.channel_volumes.get(&channel).copied().unwrap_or(1.0)
    }

    pub fn type_volume(&self, music_type: MusicTypeId) -> f32 {
        self.type_volumes.get(&music_type).copied().unwrap_or(1.0)
    }

    pub fn set_master_volume(&mut self, volume: f32, settings: &ParrotSettings) {
        let old = self.master_volume;
        self.master_volume = clamp01(volume);
        self.reproject(old, self.master_volume, settings, |_| true);
    }

    pub fn set_channel_volume(&mut self, channel: MusicChannel, volume: f32, settings: &ParrotSettings) {
        let old = self.channel_volume(channel);
        let volume = clamp01(volume);
        self.channel_volumes.insert(channel, volume);
        self.reproject(old, volume, settings, |i| i.channel == channel);
    }

    pub fn set_type_volume(&mut self, music_type: MusicTypeId, volume: f32, settings: &ParrotSettings) {
        let old = self.type_volume(music_type);
        let volume = clamp01(volume);
        self.type_volumes.insert(music_type, volume);
        self.reproject(old, volume, settings, |i| i.music_type == music_type);
    }

    /// Shift matching targets by the decibel difference between two raw volumes.
    ///
    /// Coming back from silence there is nothing to shift, so targets are
    /// rebuilt from scratch instead. Fade-outs keep their start level then.
    fn reproject(
        &mut self,
        old_raw: f32,
        new_raw: f32,
        settings: &ParrotSettings,
        matches: impl Fn(&MusicInstance) -> bool,
    ) {
        let exponent = settings.loudness_exponent;
        let old = perceived_volume(old_raw, exponent);
        let new = perceived_volume(new_raw, exponent);
        if old > 0.0 {
            let delta_db = linear_to_db(new) - linear_to_db(old);
            for instance in self.instances.iter_mut().filter(|i| matches(i)) {
                instance.target_volume = shift_db(instance.target_volume, delta_db);
            }
        } else {
            let targets: Vec<(usize, f32)> = self
                .instances
                .iter()
                .enumerate()
                .filter(|(_, i)| matches(i) && i.state != MusicState::FadingOut)
                .map(|(index, i)| (index, self.target_for(i.music_type, i.channel, settings)))
                .collect();
            for (index, target) in targets {
                self.instances[index].target_volume = target;
            }
        }
    }

    fn target_for(&self, music_type: MusicTypeId, channel: MusicChannel, settings: &ParrotSettings) -> f32 {
        let exponent = settings.loudness_exponent;
        let relative = self.library.music_type(music_type).map_or(1.0, |t| t.relative_volume);
        perceived_volume(self.master_volume, exponent)
            * perceived_volume(relative, exponent)
            * perceived_volume(self.channel_volume(channel), exponent)
            * perceived_volume(self.type_volume(music_type), exponent)
    }

    /// Master volume above the -120 dB floor.
    ///
    /// A silenced player reports nothing as playing.
    pub fn is_powered(&self, settings: &ParrotSettings) -> bool {
        perceived_volume(self.master_volume, settings.loudness_exponent) > MIN_VOLUME
    }

    // ------------------------------ Queries ----------------------------------

    pub fn is_playing(&self, settings: &ParrotSettings) -> bool {
        self.is_powered(settings) && self.instances.iter().any(|i| i.state.is_active())
    }

    /// Whether the active instance on `channel` is actually sounding on the backend.
    pub fn is_channel_playing<B: MusicBackend + ?Sized>(
        &self,
        channel: MusicChannel,
        settings: &ParrotSettings,
        backend: &B,
    ) -> bool {
        self.is_powered(settings)
            && self
                .active_on(channel)
                .is_some_and(|i| backend.is_track_playing(i.track))
    }

    pub fn current_track(&self, channel: MusicChannel, settings: &ParrotSettings) -> Option<MusicTypeId> {
        if !self.is_powered(settings) {
            return None;
        }
        self.active_on(channel).map(|i| i.music_type)
    }

    fn active_on(&self, channel: MusicChannel) -> Option<&MusicInstance> {
        self.instances.iter().find(|i| i.channel == channel && i.state.is_active())
    }

    // ------------------------------ Requests ---------------------------------

    /// Start `request.music_type` on its channel, gracefully stopping whatever
    /// occupied the channel. An existing instance of the same type is reused.
    ///
    /// Returns `None` for an unknown music type.
    pub fn play(&mut self, request: MusicRequest, settings: &ParrotSettings) -> Option<MusicId> {
        let track = self.library.music_type(request.music_type)?.track;
        self.stop_channel(request.channel, true);

        let target_volume = self.target_for(request.music_type, request.channel, settings);
        let next_state = if request.fade_in { MusicState::FadingIn } else { MusicState::Playing };

        let index = match self.instances.iter().rposition(|i| i.music_type == request.music_type) {
            Some(index) => index,
            None => {
                let id = self.next_id();
                self.instances.push(MusicInstance {
                    id,
                    music_type: request.music_type,
                    track,
                    looping: false,
                    channel: request.channel,
                    routing: None,
                    target_volume: 0.0,
                    volume: MIN_VOLUME,
                    initial_position: 0.0,
                    state: MusicState::Silent,
                    next_state: None,
                    state_timer: 0.0,
                });
                self.instances.len() - 1
            }
        };

        let instance = &mut self.instances[index];
        instance.track = track;
        instance.looping = request.looping;
        instance.channel = request.channel;
        instance.routing = request.routing;
        instance.target_volume = target_volume;
        instance.initial_position = request.position;
        instance.state = MusicState::Silent;
        instance.next_state = Some(next_state);
        instance.state_timer = 0.0;
        debug!(id = instance.id.get(), track = instance.track.0, channel = request.channel.0, "music requested");
        Some(instance.id)
    }

    fn next_id(&mut self) -> MusicId {
        loop {
            self.next_id = self.next_id.wrapping_add(1);
            if let Some(raw) = NonZeroU64::new(self.next_id) {
                let id = MusicId(raw);
                if self.instance(id).is_none() {
                    return id;
                }
            }
        }
    }

    pub fn pause(&mut self, music_type: MusicTypeId, graceful: bool) {
        self.pause_where(graceful, |i| i.music_type == music_type);
    }

    pub fn pause_channel(&mut self, channel: MusicChannel, graceful: bool) {
        self.pause_where(graceful, |i| i.channel == channel);
    }

    pub fn pause_instance(&mut self, id: MusicId, graceful: bool) {
        self.pause_where(graceful, |i| i.id == id);
    }

    pub fn pause_all(&mut self, graceful: bool) {
        self.pause_where(graceful, |_| true);
    }

    fn pause_where(&mut self, graceful: bool, matches: impl Fn(&MusicInstance) -> bool) {
        for instance in self.instances.iter_mut().filter(|i| matches(i)) {
            if instance.state.is_active() || instance.state == MusicState::Silent {
                instance.fade_out(MusicState::Paused, graceful);
            }
        }
    }

    pub fn resume(&mut self, music_type: MusicTypeId, graceful: bool, settings: &ParrotSettings) {
        self.resume_where(graceful, settings, |i| i.music_type == music_type);
    }

    pub fn resume_channel(&mut self, channel: MusicChannel, graceful: bool, settings: &ParrotSettings) {
        self.resume_where(graceful, settings, |i| i.channel == channel);
    }

    pub fn resume_instance(&mut self, id: MusicId, graceful: bool, settings: &ParrotSettings) {
        self.resume_where(graceful, settings, |i| i.id == id);
    }

    pub fn resume_all(&mut self, graceful: bool, settings: &ParrotSettings) {
        self.resume_where(graceful, settings, |_| true);
    }

    /// Paused and fading-out instances fade back in toward a freshly computed target.
    fn resume_where(&mut self, graceful: bool, settings: &ParrotSettings, matches: impl Fn(&MusicInstance) -> bool) {
        for index in 0..self.instances.len() {
            let instance = &self.instances[index];
            if !matches(instance) || !matches!(instance.state, MusicState::Paused | MusicState::FadingOut) {
                continue;
            }
            let target = self.target_for(instance.music_type, instance.channel, settings);
            let instance = &mut self.instances[index];
            instance.state = MusicState::FadingIn;
            instance.next_state = Some(MusicState::Playing);
            instance.target_volume = target;
            instance.state_timer = if graceful { 0.0 } else { f32::INFINITY };
        }
    }

    pub fn stop(&mut self, music_type: MusicTypeId, graceful: bool) {
        self.stop_where(graceful, |i| i.music_type == music_type);
    }

    pub fn stop_channel(&mut self, channel: MusicChannel, graceful: bool) {
        self.stop_where(graceful, |i| i.channel == channel);
    }

    pub fn stop_instance(&mut self, id: MusicId, graceful: bool) {
        self.stop_where(graceful, |i| i.id == id);
    }

    pub fn stop_all(&mut self, graceful: bool) {
        self.stop_where(graceful, |_| true);
    }

    /// Paused instances are already silent and get released on the next update.
    fn stop_where(&mut self, graceful: bool, matches: impl Fn(&MusicInstance) -> bool) {
        for instance in self.instances.iter_mut().filter(|i| matches(i)) {
            if instance.state.is_active() || instance.state == MusicState::Silent {
                instance.fade_out(MusicState::Disposing, graceful);
            } else if instance.state == MusicState::Paused {
                instance.state = MusicState::Disposing;
                instance.next_state = None;
            }
        }
    }

    /// Stop every track the backend has seen and forget all instances.
    pub fn dispose<B: MusicBackend + ?Sized>(&mut self, backend: &mut B) {
        for instance in self.instances.drain(..) {
            // silent instances never reached the backend
            if instance.state != MusicState::Silent {
                backend.stop_track(instance.track);
            }
        }
    }

    // ------------------------------- Update ----------------------------------

    /// Advance every state machine by `dt` seconds.
    pub fn update<B: MusicBackend + ?Sized>(&mut self, dt: f32, settings: &ParrotSettings, backend: &mut B) {
        let curve = settings.loudness_curve();
        for index in (0..self.instances.len()).rev() {
            let instance = &mut self.instances[index];
            let old_state = instance.state;
            instance.state_timer += dt.max(0.0);
            let track = instance.track;

            match instance.state {
                MusicState::Silent => {
                    backend.play_track(track, instance.routing);
                    backend.set_track_position(track, instance.initial_position);
                    instance.set_backend_volume(backend, MIN_VOLUME);
                    backend.set_track_looping(track, instance.looping);
                    if instance.next_state == Some(MusicState::FadingIn) {
                        instance.state = MusicState::FadingIn;
                        instance.next_state = Some(MusicState::Playing);
                    } else {
                        instance.state = MusicState::Playing;
                        instance.next_state = None;
                    }
                }
                MusicState::FadingIn => {
                    if !backend.is_track_playing(track) {
                        backend.play_track(track, instance.routing);
                    }
                    let progress = clamp01(instance.state_timer / settings.music_fade_in.max(MIN_FADE));
                    let volume = lerp(0.0, instance.target_volume, curve.fade_in(progress));
                    instance.set_backend_volume(backend, volume);
                    if instance.state_timer > settings.music_fade_in {
                        instance.state = MusicState::Playing;
                        instance.next_state = None;
                    }
                }
                MusicState::Playing => {
                    if backend.is_track_playing(track) {
                        let target = instance.target_volume;
                        instance.set_backend_volume(backend, target);
                    } else {
                        instance.state = MusicState::Disposing;
                    }
                }
                MusicState::FadingOut => {
                    let progress = clamp01(instance.state_timer / settings.music_fade_out.max(MIN_FADE));
                    let volume = lerp(instance.target_volume, MIN_VOLUME, curve.fade_out(progress));
                    if backend.is_track_playing(track) {
                        instance.set_backend_volume(backend, volume);
                    }
                    if instance.state_timer > settings.music_fade_out {
                        backend.pause_track(track);
                        if instance.next_state == Some(MusicState::Paused) {
                            instance.state = MusicState::Paused;
                        } else {
                            backend.set_track_position(track, 0.0);
                            instance.state = MusicState::Disposing;
                        }
                        instance.next_state = None;
                    }
                }
                MusicState::Paused | MusicState::Disposing => {}
            }

            if old_state != instance.state {
                trace!(id = instance.id.get(), from = ?old_state, to = ?instance.state, "music state");
                instance.state_timer = 0.0;
            }

            if instance.state == MusicState::Disposing {
                backend.stop_track(track);
                self.instances.remove(index);
            }
        }
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::MusicType;
    use crate::testing::{Call, RecordingBackend};
    use approx::assert_relative_eq;

    struct Rig {
        engine: MusicEngine,
        settings: ParrotSettings,
        backend: RecordingBackend,
        cave: MusicTypeId,
        snow: MusicTypeId,
    }

    impl Rig {
        fn new() -> Self {
            let mut library = MusicLibrary::default();
            let cave = library.add_type(MusicType::new("crystal_cave", TrackId(1), 1.0));
            let snow = library.add_type(MusicType::new("snowland", TrackId(2), 0.8));
            Self {
                engine: MusicEngine::new(library),
                settings: ParrotSettings::default(),
                backend: RecordingBackend::new(),
                cave,
                snow,
            }
        }

        fn update(&mut self, dt: f32) {
            self.engine.update(dt, &self.settings, &mut self.backend);
        }

        fn state(&self, id: MusicId) -> Option<MusicState> {
            self.engine.instance(id).map(MusicInstance::state)
        }
    }

    #[test]
    fn dispose_stops_paused_tracks() {
        let mut rig = Rig::new();
        rig.engine.play(MusicRequest::new(rig.cave), &rig.settings).unwrap();
        rig.update(0.1);
        rig.engine.pause(rig.cave, false);
        rig.update(0.1);
        rig.backend.clear_calls();

        rig.engine.dispose(&mut rig.backend);
        assert_eq!(rig.backend.calls(), &[Call::StopTrack { track: TrackId(1) }]);
        assert_eq!(rig.engine.instances().count(), 0);
    }

    #[test]
    fn dispose_skips_tracks_never_started() {
        let mut rig = Rig::new();
        rig.engine.play(MusicRequest::new(rig.cave), &rig.settings).unwrap();
        rig.engine.dispose(&mut rig.backend);
        assert!(rig.backend.calls().is_empty());
    }

    #[test]
    fn stopping_a_paused_track_releases_it() {
        let mut rig = Rig::new();
        let id = rig.engine.play(MusicRequest::new(rig.cave), &rig.settings).unwrap();
        rig.update(0.1);
        rig.engine.pause(rig.cave, false);
        rig.update(0.1);
        assert_eq!(rig.state(id), Some(MusicState::Paused));

        rig.engine.stop(rig.cave, true);
        rig.update(0.1);
        assert_eq!(rig.state(id), None);
        assert!(matches!(rig.backend.calls().last(), Some(Call::StopTrack { track: TrackId(1) })));
    }

    #[test]
    fn routing_reaches_the_backend() {
        let mut rig = Rig::new();
        rig.engine.play(MusicRequest::new(rig.cave).routing(RoutingChannel(3)), &rig.settings).unwrap();
        rig.update(0.1);
        assert_eq!(rig.backend.calls()[0], Call::PlayTrack { track: TrackId(1), routing: Some(RoutingChannel(3)) });
    }

    #[test]
    fn fades_in_then_plays_at_target() {
        let mut rig = Rig::new();
        let id = rig.engine.play(MusicRequest::new(rig.cave).looping(true).position(3.0), &rig.settings).unwrap();
        assert_eq!(rig.state(id), Some(MusicState::Silent));

        rig.update(0.1);
        assert_eq!(rig.state(id), Some(MusicState::FadingIn));
        assert_eq!(
            &rig.backend.calls()[..4],
            &[
                Call::PlayTrack { track: TrackId(1), routing: None },
                Call::SetTrackPosition { track: TrackId(1), seconds: 3.0 },
                Call::SetTrackVolume { track: TrackId(1), volume: MIN_VOLUME },
                Call::SetTrackLooping { track: TrackId(1), looping: true },
            ]
        );

        rig.update(0.4);
        let halfway = rig.backend.last_track_volume(TrackId(1)).unwrap();
        assert!(halfway > MIN_VOLUME && halfway < 1.0, "{halfway}");

        rig.update(0.5);
        assert_eq!(rig.state(id), Some(MusicState::Playing));
        rig.update(0.1);
        assert_relative_eq!(rig.backend.last_track_volume(TrackId(1)).unwrap(), 1.0);
    }

    #[test]
    fn relative_volume_goes_through_loudness_curve() {
        let mut rig = Rig::new();
        let id = rig.engine.play(MusicRequest::new(rig.snow), &rig.settings).unwrap();
        assert_relative_eq!(rig.engine.instance(id).unwrap().target_volume(), 0.512, epsilon = 1e-6);
    }

    #[test]
    fn graceful_stop_terminates_in_time() {
        let mut rig = Rig::new();
        let dt = 0.25;
        let id = rig.engine.play(MusicRequest::new(rig.cave).fade_in(false), &rig.settings).unwrap();
        rig.update(dt);
        rig.update(dt);
        assert_eq!(rig.state(id), Some(MusicState::Playing));

        rig.engine.stop_instance(id, true);
        let budget = (rig.settings.music_fade_out / dt) as usize + 1;
        let mut ticks = 0;
        while rig.state(id).is_some() {
            rig.update(dt);
            ticks += 1;
            assert!(ticks <= budget, "still alive after {ticks} ticks");
        }
        assert!(rig.backend.calls().contains(&Call::StopTrack { track: TrackId(1) }));
    }

    #[test]
    fn stop_from_silent_collapses_fade() {
        let mut rig = Rig::new();
        let id = rig.engine.play(MusicRequest::new(rig.cave), &rig.settings).unwrap();
        rig.engine.stop_instance(id, true);
        assert_eq!(rig.state(id), Some(MusicState::FadingOut));
        rig.update(0.016);
        assert_eq!(rig.state(id), None);
    }

    #[test]
    fn pause_and_resume() {
        let mut rig = Rig::new();
        let id = rig.engine.play(MusicRequest::new(rig.cave).fade_in(false), &rig.settings).unwrap();
        rig.update(0.016);
        rig.update(0.016);

        rig.engine.pause(rig.cave, false);
        rig.update(0.016);
        assert_eq!(rig.state(id), Some(MusicState::Paused));
        assert!(rig.backend.calls().contains(&Call::PauseTrack { track: TrackId(1) }));
        assert!(!rig.engine.is_playing(&rig.settings));

        rig.engine.resume(rig.cave, true, &rig.settings);
        assert_eq!(rig.state(id), Some(MusicState::FadingIn));
        rig.update(0.016);
        assert!(rig.backend.is_track_playing(TrackId(1)));
        assert!(rig.engine.is_playing(&rig.settings));
    }

    #[test]
    fn new_play_replaces_channel_occupant() {
        let mut rig = Rig::new();
        let cave = rig.engine.play(MusicRequest::new(rig.cave).fade_in(false), &rig.settings).unwrap();
        rig.update(0.016);
        rig.update(0.016);
        let snow = rig.engine.play(MusicRequest::new(rig.snow), &rig.settings).unwrap();
        assert_eq!(rig.state(cave), Some(MusicState::FadingOut));
        assert_eq!(rig.state(snow), Some(MusicState::Silent));

        for _ in 0..60 {
            rig.update(0.05);
        }
        assert_eq!(rig.state(cave), None);
        assert_eq!(rig.engine.current_track(MusicChannel(0), &rig.settings), Some(rig.snow));
        assert!(rig.engine.is_channel_playing(MusicChannel(0), &rig.settings, &rig.backend));
    }

    #[test]
    fn replaying_a_type_reuses_its_instance() {
        let mut rig = Rig::new();
        let a = rig.engine.play(MusicRequest::new(rig.cave), &rig.settings).unwrap();
        rig.update(0.016);
        let b = rig.engine.play(MusicRequest::new(rig.cave).channel(MusicChannel(2)), &rig.settings).unwrap();
        assert_eq!(a, b);
        assert_eq!(rig.engine.instances().count(), 1);
        assert_eq!(rig.engine.instance(a).unwrap().channel(), MusicChannel(2));
    }

    #[test]
    fn finished_track_is_disposed() {
        let mut rig = Rig::new();
        let id = rig.engine.play(MusicRequest::new(rig.cave).fade_in(false), &rig.settings).unwrap();
        rig.update(0.016);
        rig.backend.finish_track(TrackId(1));
        rig.update(0.016);
        assert_eq!(rig.state(id), None);
    }

    #[test]
    fn volume_changes_reproject_targets() {
        let mut rig = Rig::new();
        let id = rig.engine.play(MusicRequest::new(rig.cave), &rig.settings).unwrap();
        rig.engine.set_master_volume(0.5, &rig.settings);
        assert_relative_eq!(rig.engine.instance(id).unwrap().target_volume(), 0.125, epsilon = 1e-5);

        rig.engine.set_channel_volume(MusicChannel(0), 0.5, &rig.settings);
        assert_relative_eq!(rig.engine.instance(id).unwrap().target_volume(), 0.125 * 0.125, epsilon = 1e-5);

        rig.engine.set_channel_volume(MusicChannel(7), 0.1, &rig.settings);
        assert_relative_eq!(rig.engine.instance(id).unwrap().target_volume(), 0.125 * 0.125, epsilon = 1e-5);

        rig.engine.set_type_volume(rig.cave, 0.5, &rig.settings);
        assert_relative_eq!(rig.engine.instance(id).unwrap().target_volume(), 0.125 * 0.125 * 0.125, epsilon = 1e-6);
    }

    #[test]
    fn muted_player_reports_nothing() {
        let mut rig = Rig::new();
        let id = rig.engine.play(MusicRequest::new(rig.cave).fade_in(false), &rig.settings).unwrap();
        rig.update(0.016);
        assert!(rig.engine.is_playing(&rig.settings));

        rig.engine.set_master_volume(0.0, &rig.settings);
        assert!(!rig.engine.is_playing(&rig.settings));
        assert_eq!(rig.engine.current_track(MusicChannel(0), &rig.settings), None);
        assert_eq!(rig.engine.instance(id).unwrap().target_volume(), 0.0);

        rig.engine.set_master_volume(1.0, &rig.settings);
        assert_relative_eq!(rig.engine.instance(id).unwrap().target_volume(), 1.0);
        assert!(rig.engine.is_playing(&rig.settings));
    }

    #[test]
    fn unknown_type_is_ignored() {
        let mut rig = Rig::new();
        assert!(rig.engine.play(MusicRequest::new(MusicTypeId(40)), &rig.settings).is_none());
    }

    #[test]
    fn dispose_stops_tracks() {
        let mut rig = Rig::new();
        rig.engine.play(MusicRequest::new(rig.cave), &rig.settings);
        rig.update(0.016);
        rig.engine.dispose(&mut rig.backend);
        assert_eq!(rig.engine.instances().count(), 0);
        assert!(!rig.backend.is_track_playing(TrackId(1)));
    }
}

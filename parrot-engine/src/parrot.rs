//! Facade tying both engines to one backend and one settings record.
//!
//! The host calls requests whenever it likes and [`Parrot::update`] once per
//! frame. Everything forwards to [`SoundEngine`] or [`MusicEngine`]; the only
//! logic living here is validating settings before they are applied.

use crate::backend::{MusicBackend, SoundBackend};
use crate::error::Result;
use crate::instance::{SoundId, SoundInstance};
use crate::library::{CategoryId, MusicLibrary, MusicTypeId, SoundLibrary, SoundTypeId};
use crate::music::{MusicChannel, MusicEngine, MusicId, MusicInstance, MusicRequest};
use crate::settings::ParrotSettings;
use crate::sound::{Diagnostics, SoundEngine, SoundRequest};

pub struct Parrot<B> {
    backend: B,
    settings: ParrotSettings,
    sounds: SoundEngine,
    music: MusicEngine,
}

impl<B: SoundBackend + MusicBackend> Parrot<B> {
    /// Fails if `settings` do not validate.
    pub fn new(backend: B, settings: ParrotSettings, sounds: SoundLibrary, music: MusicLibrary) -> Result<Self> {
        settings.validate()?;
        Ok(Self { backend, settings, sounds: SoundEngine::new(sounds), music: MusicEngine::new(music) })
    }

    /// Like [`Parrot::new`] with a fixed random seed for clip choice and variation.
    pub fn with_seed(
        backend: B,
        settings: ParrotSettings,
        sounds: SoundLibrary,
        music: MusicLibrary,
        seed: u64,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self { backend, settings, sounds: SoundEngine::with_seed(sounds, seed), music: MusicEngine::new(music) })
    }

    /// Advance sounds, then music, by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        self.sounds.update(dt, &self.settings, &mut self.backend);
        self.music.update(dt, &self.settings, &mut self.backend);
    }

    /// Stop and release everything.
    pub fn dispose(&mut self) {
        self.sounds.dispose(&mut self.backend);
        self.music.dispose(&mut self.backend);
    }

    #[inline] pub fn backend(&self) -> &B { &self.backend }
    #[inline] pub fn backend_mut(&mut self) -> &mut B { &mut self.backend }
    #[inline] pub fn settings(&self) -> &ParrotSettings { &self.settings }
    #[inline] pub fn sounds(&self) -> &SoundEngine { &self.sounds }
    #[inline] pub fn music(&self) -> &MusicEngine { &self.music }
    #[inline] pub fn sound_library(&self) -> &SoundLibrary { self.sounds.library() }
    #[inline] pub fn music_library(&self) -> &MusicLibrary { self.music.library() }
    #[inline] pub fn diagnostics(&self) -> Diagnostics { self.sounds.diagnostics() }

    /// Replace the settings. Invalid settings are rejected and the old ones kept.
    pub fn set_settings(&mut self, settings: ParrotSettings) -> Result<()> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    pub fn set_listener(&mut self, x: f32, y: f32) {
        self.sounds.set_listener(x, y);
    }

    // ------------------------------ Volume -----------------------------------

    #[inline] pub fn sound_volume(&self) -> f32 { self.sounds.master_volume() }

    pub fn set_sound_volume(&mut self, volume: f32) {
        self.sounds.set_master_volume(volume);
    }

    #[inline] pub fn music_volume(&self) -> f32 { self.music.master_volume() }

    pub fn set_music_volume(&mut self, volume: f32) {
        self.music.set_master_volume(volume, &self.settings);
    }

    pub fn music_channel_volume(&self, channel: MusicChannel) -> f32 {
        self.music.channel_volume(channel)
    }

    pub fn set_music_channel_volume(&mut self, channel: MusicChannel, volume: f32) {
        self.music.set_channel_volume(channel, volume, &self.settings);
    }

    pub fn music_type_volume(&self, music_type: MusicTypeId) -> f32 {
        self.music.type_volume(music_type)
    }

    pub fn set_music_type_volume(&mut self, music_type: MusicTypeId, volume: f32) {
        self.music.set_type_volume(music_type, volume, &self.settings);
    }

    pub fn category_pitch_factor(&self, category: CategoryId) -> f32 {
        self.sounds.category_pitch_factor(category)
    }

    pub fn set_category_pitch_factor(&mut self, category: CategoryId, factor: f32) {
        self.sounds.set_category_pitch_factor(category, factor);
    }

    // ------------------------------ Sounds -----------------------------------

    pub fn play_sound(&mut self, request: SoundRequest) -> Option<SoundId> {
        self.sounds.play(request, &self.settings, &self.backend)
    }

    pub fn sound(&self, id: SoundId) -> Option<&SoundInstance> {
        self.sounds.get(id)
    }

    pub fn touch_sound(&mut self, id: SoundId) -> bool {
        self.sounds.touch(id)
    }

    pub fn set_sound_coordinates(&mut self, id: SoundId, x: f32, y: f32) {
        self.sounds.set_coordinates(id, x, y);
    }

    pub fn set_sound_persistent(&mut self, id: SoundId, persistent: bool) -> bool {
        self.sounds.set_persistent(id, persistent)
    }

    pub fn stop_sound(&mut self, id: SoundId) {
        self.sounds.stop(id);
    }

    pub fn stop_sound_type(&mut self, sound_type: SoundTypeId, ignore_persistent: bool) {
        self.sounds.stop_type(sound_type, ignore_persistent);
    }

    pub fn stop_sound_category(&mut self, category: CategoryId, ignore_persistent: bool) {
        self.sounds.stop_category(category, ignore_persistent);
    }

    pub fn stop_all_sounds(&mut self, ignore_persistent: bool) {
        self.sounds.stop_all(ignore_persistent);
    }

    pub fn kill_sound(&mut self, id: SoundId) {
        self.sounds.kill(id, &mut self.backend);
    }

    pub fn kill_sound_type(&mut self, sound_type: SoundTypeId) {
        self.sounds.kill_type(sound_type, &mut self.backend);
    }

    pub fn kill_sound_category(&mut self, category: CategoryId) {
        self.sounds.kill_category(category, &mut self.backend);
    }

    pub fn kill_all_sounds(&mut self) {
        self.sounds.kill_all(&mut self.backend);
    }

    // ------------------------------- Music -----------------------------------

    pub fn play_music(&mut self, request: MusicRequest) -> Option<MusicId> {
        self.music.play(request, &self.settings)
    }

    pub fn music_instance(&self, id: MusicId) -> Option<&MusicInstance> {
        self.music.instance(id)
    }

    pub fn pause_music(&mut self, music_type: MusicTypeId, graceful: bool) {
        self.music.pause(music_type, graceful);
    }

    pub fn pause_music_channel(&mut self, channel: MusicChannel, graceful: bool) {
        self.music.pause_channel(channel, graceful);
    }

    pub fn pause_music_instance(&mut self, id: MusicId, graceful: bool) {
        self.music.pause_instance(id, graceful);
    }

    pub fn pause_all_music(&mut self, graceful: bool) {
        self.music.pause_all(graceful);
    }

    pub fn resume_music(&mut self, music_type: MusicTypeId, graceful: bool) {
        self.music.resume(music_type, graceful, &self.settings);
    }

    pub fn resume_music_channel(&mut self, channel: MusicChannel, graceful: bool) {
        self.music.resume_channel(channel, graceful, &self.settings);
    }

    pub fn resume_music_instance(&mut self, id: MusicId, graceful: bool) {
        self.music.resume_instance(id, graceful, &self.settings);
    }

    pub fn resume_all_music(&mut self, graceful: bool) {
        self.music.resume_all(graceful, &self.settings);
    }

    pub fn stop_music(&mut self, music_type: MusicTypeId, graceful: bool) {
        self.music.stop(music_type, graceful);
    }

    pub fn stop_music_channel(&mut self, channel: MusicChannel, graceful: bool) {
        self.music.stop_channel(channel, graceful);
    }

    pub fn stop_music_instance(&mut self, id: MusicId, graceful: bool) {
        self.music.stop_instance(id, graceful);
    }

    pub fn stop_all_music(&mut self, graceful: bool) {
        self.music.stop_all(graceful);
    }

    /// Any music fading in or playing, on any channel.
    pub fn is_music_playing(&self) -> bool {
        self.music.is_playing(&self.settings)
    }

    pub fn is_music_channel_playing(&self, channel: MusicChannel) -> bool {
        self.music.is_channel_playing(channel, &self.settings, &self.backend)
    }

    pub fn current_music(&self, channel: MusicChannel) -> Option<MusicTypeId> {
        self.music.current_track(channel, &self.settings)
    }
}

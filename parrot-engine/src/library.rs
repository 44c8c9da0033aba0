//! Sound and music definitions consulted by the engines.
//!
//! Contents:
//! - `SoundCategory` : voice budget shared by every type in it, spatial flag
//! - `SoundType`     : clip set plus base volume/pitch/variation, playback mode, priority
//! - `MusicType`     : one streamable track and its relative volume
//! - `SoundLibrary` / `MusicLibrary` : append-only registries handing out ids
//!
//! Definitions are plain data. The engines read them every tick; the only
//! state ever mutated is a type's [`NonRepeatingSelector`] when clips are picked.

use crate::backend::{ClipId, RoutingChannel, TrackId};
use crate::error::{Error, Result};
use crate::instance::PlaybackMode;
use crate::selector::NonRepeatingSelector;

/// Id of a registered [`SoundCategory`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryId(pub(crate) u32);

/// Id of a registered [`SoundType`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundTypeId(pub(crate) u32);

/// Id of a registered [`MusicType`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MusicTypeId(pub(crate) u32);

// -------------------------------- Sound categories -------------------------------

#[derive(Clone, Debug)]
pub struct SoundCategory {
    pub name: String,
    /// Maximum concurrent voices across every type of this category.
    pub voices: usize,
    /// Spatial categories get distance attenuation and pan.
    pub spatial: bool,
}

impl SoundCategory {
    pub fn new(name: impl Into<String>, voices: usize, spatial: bool) -> Self {
        Self { name: name.into(), voices, spatial }
    }
}

// ---------------------------------- Sound types ----------------------------------

#[derive(Clone, Debug)]
pub struct SoundType {
    pub name: String,
    pub clips: Vec<ClipId>,
    pub category: CategoryId,
    /// Maximum concurrent voices of this type.
    pub voices: usize,
    /// Base linear volume, 0 to 1, before the loudness curve.
    pub volume: f32,
    /// Random spread added to `volume` per instance, ±`volume_variation`.
    pub volume_variation: f32,
    pub pitch: f32,
    /// Random spread of the pitch multiplier per instance, ±`pitch_variation`.
    pub pitch_variation: f32,
    pub playback_mode: Option<PlaybackMode>,
    /// Scales continuous-sound timeout and fade-in for this type.
    pub continuity_factor: f32,
    /// Higher numbers survive voice eviction longer.
    pub priority: i32,
    /// Default routing when a request does not name one.
    pub routing: Option<RoutingChannel>,
    pub selector: Option<NonRepeatingSelector<ClipId>>,
}

impl SoundType {
    pub fn new(name: impl Into<String>, category: CategoryId, voices: usize) -> Self {
        Self {
            name: name.into(),
            clips: Vec::new(),
            category,
            voices,
            volume: 1.0,
            volume_variation: 0.0,
            pitch: 1.0,
            pitch_variation: 0.05,
            playback_mode: None,
            continuity_factor: 1.0,
            priority: 0,
            routing: None,
            selector: None,
        }
    }

    pub fn clips(mut self, clips: impl IntoIterator<Item = ClipId>) -> Self {
        self.clips = clips.into_iter().collect();
        if let Some(selector) = self.selector.as_mut() {
            selector.set_items(self.clips.iter().copied());
        }
        self
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn volume_variation(mut self, variation: f32) -> Self {
        self.volume_variation = variation;
        self
    }

    pub fn pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn pitch_variation(mut self, variation: f32) -> Self {
        self.pitch_variation = variation;
        self
    }

    pub fn mode(mut self, mode: PlaybackMode) -> Self {
        self.playback_mode = Some(mode);
        self
    }

    pub fn continuity_factor(mut self, factor: f32) -> Self {
        self.continuity_factor = factor;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn routing(mut self, routing: RoutingChannel) -> Self {
        self.routing = Some(routing);
        self
    }

    /// Choose clips through a [`NonRepeatingSelector`] with the given drop-off.
    pub fn non_repeating(mut self, drop_off: f32) -> Result<Self> {
        let selector = NonRepeatingSelector::new(drop_off)?.with_items(self.clips.iter().copied());
        self.selector = Some(selector);
        Ok(self)
    }
}

// ---------------------------------- Music types ----------------------------------

#[derive(Clone, Debug)]
pub struct MusicType {
    pub name: String,
    pub track: TrackId,
    /// Linear volume relative to other tracks, 0 to 1, before the loudness curve.
    pub relative_volume: f32,
}

impl MusicType {
    pub fn new(name: impl Into<String>, track: TrackId, relative_volume: f32) -> Self {
        Self { name: name.into(), track, relative_volume }
    }
}

// ----------------------------------- Registries ----------------------------------

#[derive(Clone, Debug, Default)]
pub struct SoundLibrary {
    categories: Vec<SoundCategory>,
    types: Vec<SoundType>,
}

impl SoundLibrary {
    pub fn add_category(&mut self, category: SoundCategory) -> CategoryId {
        self.categories.push(category);
        CategoryId((self.categories.len() - 1) as u32)
    }

    /// Register a sound type. Its category must already be registered.
    pub fn add_type(&mut self, sound_type: SoundType) -> Result<SoundTypeId> {
        if self.category(sound_type.category).is_none() {
            return Err(Error::UnknownCategory(sound_type.category.0));
        }
        if sound_type.voices == 0 {
            return Err(Error::NoVoices(sound_type.name));
        }
        self.types.push(sound_type);
        Ok(SoundTypeId((self.types.len() - 1) as u32))
    }

    #[inline]
    pub fn category(&self, id: CategoryId) -> Option<&SoundCategory> {
        self.categories.get(id.0 as usize)
    }

    #[inline]
    pub fn sound_type(&self, id: SoundTypeId) -> Option<&SoundType> {
        self.types.get(id.0 as usize)
    }

    #[inline]
    pub(crate) fn sound_type_mut(&mut self, id: SoundTypeId) -> Option<&mut SoundType> {
        self.types.get_mut(id.0 as usize)
    }

    pub fn categories(&self) -> impl Iterator<Item = (CategoryId, &SoundCategory)> {
        self.categories.iter().enumerate().map(|(i, c)| (CategoryId(i as u32), c))
    }

    pub fn types(&self) -> impl Iterator<Item = (SoundTypeId, &SoundType)> {
        self.types.iter().enumerate().map(|(i, t)| (SoundTypeId(i as u32), t))
    }

    pub fn find_type(&self, name: &str) -> Option<SoundTypeId> {
        self.types().find(|(_, t)| t.name == name).map(|(id, _)| id)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MusicLibrary {
    types: Vec<MusicType>,
}

impl MusicLibrary {
    pub fn add_type(&mut self, music_type: MusicType) -> MusicTypeId {
        self.types.push(music_type);
        MusicTypeId((self.types.len() - 1) as u32)
    }

    #[inline]
    pub fn music_type(&self, id: MusicTypeId) -> Option<&MusicType> {
        self.types.get(id.0 as usize)
    }

    pub fn types(&self) -> impl Iterator<Item = (MusicTypeId, &MusicType)> {
        self.types.iter().enumerate().map(|(i, t)| (MusicTypeId(i as u32), t))
    }

    pub fn find_type(&self, name: &str) -> Option<MusicTypeId> {
        self.types().find(|(_, t)| t.name == name).map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_needs_known_category() {
        let mut lib = SoundLibrary::default();
        let err = lib.add_type(SoundType::new("step", CategoryId(3), 1)).unwrap_err();
        assert_eq!(err, Error::UnknownCategory(3));
    }

    #[test]
    fn zero_voices_is_rejected() {
        let mut lib = SoundLibrary::default();
        let cat = lib.add_category(SoundCategory::new("world", 4, false));
        assert!(matches!(lib.add_type(SoundType::new("mute", cat, 0)), Err(Error::NoVoices(_))));
    }

    #[test]
    fn selector_follows_clip_list() {
        let t = SoundType::new("step", CategoryId(0), 1)
            .non_repeating(0.8)
            .unwrap()
            .clips([ClipId(1), ClipId(2), ClipId(3)]);
        assert_eq!(t.selector.as_ref().map(NonRepeatingSelector::len), Some(3));
    }

    #[test]
    fn lookup_by_name() {
        let mut lib = SoundLibrary::default();
        let cat = lib.add_category(SoundCategory::new("player", 16, true));
        let id = lib.add_type(SoundType::new("footsteps", cat, 3)).unwrap();
        assert_eq!(lib.find_type("footsteps"), Some(id));
        assert_eq!(lib.find_type("missing"), None);

        let mut music = MusicLibrary::default();
        let m = music.add_type(MusicType::new("snowland", TrackId(0), 0.8));
        assert_eq!(music.find_type("snowland"), Some(m));
    }
}

//! Sound effect instance engine.
//!
//! Owns every requested, sounding and dying effect instance. Requests only
//! record intent; [`SoundEngine::update`] is where fades, spatialization and
//! backend scheduling happen. The one exception is the `kill*` family, which
//! stops backend voices immediately.
//!
//! Per tick, for each instance in registration order:
//! 1. continuous positions are solidified (once, before the loop)
//! 2. untouched continuous instances start dying
//! 3. instances that were started but hold no handle are dropped
//! 4. continuous fade-in, elapsed time, expiry of one-shots
//! 5. death fade, removal once it ran out
//! 6. distance rolloff and pan for spatial categories
//! 7. start the voice, or adjust it in place
//!
//! Timestamps (touch, stop) are taken from the engine clock, which only moves
//! inside `update`, so a host that stops calling `update` freezes every fade.

use core::num::NonZeroU64;
use std::collections::HashMap;

use parrot_core::perceptual::{clamp01, perceived_volume};
use parrot_core::spatial::{pan_for_offset, Rolloff, Vec2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

use crate::backend::{ClipId, RoutingChannel, SoundBackend, VoiceParams};
use crate::instance::{PlaybackMode, SoundId, SoundInstance};
use crate::library::{CategoryId, SoundLibrary, SoundTypeId};
use crate::selector::NonRepeatingSelector;
use crate::settings::ParrotSettings;
use crate::slab::{Slab, SlotKey};

// -------------------------------- Requests ---------------------------------------

/// Everything a play call can say about a new sound.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SoundRequest {
    pub sound_type: SoundTypeId,
    /// Force a clip of the type by index; out-of-range falls back to random choice.
    pub clip_index: Option<usize>,
    pub position: Vec2,
    pub volume_factor: f32,
    pub pitch: f32,
    /// Overrides the type's playback mode.
    pub mode: Option<PlaybackMode>,
    /// Overrides the type's routing.
    pub routing: Option<RoutingChannel>,
    /// Overrides the type's priority.
    pub priority: Option<i32>,
    pub persistent: bool,
}

impl SoundRequest {
    pub fn new(sound_type: SoundTypeId) -> Self {
        Self {
            sound_type,
            clip_index: None,
            position: Vec2::ZERO,
            volume_factor: 1.0,
            pitch: 1.0,
            mode: None,
            routing: None,
            priority: None,
            persistent: false,
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Vec2::new(x, y);
        self
    }

    pub fn clip(mut self, index: usize) -> Self {
        self.clip_index = Some(index);
        self
    }

    pub fn volume(mut self, factor: f32) -> Self {
        self.volume_factor = factor;
        self
    }

    pub fn pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn mode(mut self, mode: PlaybackMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn routing(mut self, routing: RoutingChannel) -> Self {
        self.routing = Some(routing);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }
}

/// Counters of recovered conditions and policy decisions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Instances dropped because their start never produced a handle.
    pub backend_failures: u64,
    /// Instances stopped by voice limiting.
    pub evictions: u64,
    /// Play requests refused by the distant-short-sound filter.
    pub rejected: u64,
    /// Voices started on the backend.
    pub started: u64,
}

// --------------------------------- Engine ----------------------------------------

pub struct SoundEngine {
    library: SoundLibrary,
    slots: Slab<SoundInstance>,
    /// Registration order; update walks it front to back.
    order: Vec<SlotKey>,
    by_id: HashMap<SoundId, SlotKey>,
    next_id: u64,
    clock: f64,
    master_volume: f32,
    category_pitch: HashMap<CategoryId, f32>,
    listener: Vec2,
    rng: StdRng,
    diagnostics: Diagnostics,
}

enum Tick {
    Keep,
    Remove,
}

/// Read-only inputs shared by every instance during one update.
struct Frame<'a> {
    library: &'a SoundLibrary,
    settings: &'a ParrotSettings,
    rolloff: Rolloff,
    listener: Vec2,
    master: f32,
    category_pitch: &'a HashMap<CategoryId, f32>,
    clock: f64,
    dt: f32,
}

impl SoundEngine {
    pub fn new(library: SoundLibrary) -> Self {
        Self::with_rng(library, StdRng::from_entropy())
    }

    /// Deterministic clip choice and variation, for tests and replays.
    pub fn with_seed(library: SoundLibrary, seed: u64) -> Self {
        Self::with_rng(library, StdRng::seed_from_u64(seed))
    }

    fn with_rng(library: SoundLibrary, rng: StdRng) -> Self {
        Self {
            library,
            slots: Slab::new(),
            order: Vec::new(),
            by_id: HashMap::new(),
            next_id: 0,
            clock: 0.0,
            master_volume: 1.0,
            category_pitch: HashMap::new(),
            listener: Vec2::ZERO,
            rng,
            diagnostics: Diagnostics::default(),
        }
    }

    #[inline] pub fn library(&self) -> &SoundLibrary { &self.library }
    #[inline] pub fn library_mut(&mut self) -> &mut SoundLibrary { &mut self.library }
    #[inline] pub fn diagnostics(&self) -> Diagnostics { self.diagnostics }
    #[inline] pub fn listener(&self) -> Vec2 { self.listener }
    #[inline] pub fn clock(&self) -> f64 { self.clock }
    #[inline] pub fn live_count(&self) -> usize { self.slots.len() }

    /// Nothing requested, sounding or dying.
    #[inline] pub fn is_idle(&self) -> bool { self.slots.is_empty() }

    /// Reference point for rolloff and pan.
    #[inline]
    pub fn set_listener(&mut self, x: f32, y: f32) {
        self.listener = Vec2::new(x, y);
    }

    /// Raw 0-1 master volume, before the loudness curve.
    #[inline] pub fn master_volume(&self) -> f32 { self.master_volume }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = clamp01(volume);
    }

    pub fn category_pitch_factor(&self, category: CategoryId) -> f32 {
        self.category_pitch.get(&category).copied().unwrap_or(1.0)
    }

    /// Store a pitch multiplier for `category`.
    ///
    /// New voices start with it; voices already sounding are shifted by the
    /// ratio between old and new factor on the next update.
    pub fn set_category_pitch_factor(&mut self, category: CategoryId, factor: f32) {
        let old = self.category_pitch_factor(category);
        self.category_pitch.insert(category, factor);
        if old <= 0.0 || factor == old {
            return;
        }
        let ratio = factor / old;
        for key in &self.order {
            if let Some(instance) = self.slots.get_mut(*key) {
                if instance.category == category && instance.handle.is_some() {
                    instance.pitch_nudge *= ratio;
                }
            }
        }
    }

    // ------------------------------ Queries ----------------------------------

    pub fn get(&self, id: SoundId) -> Option<&SoundInstance> {
        self.slots.get(*self.by_id.get(&id)?)
    }

    pub fn is_valid(&self, id: SoundId) -> bool {
        self.get(id).is_some_and(SoundInstance::is_valid)
    }

    /// Live instances in registration order.
    pub fn instances(&self) -> impl Iterator<Item = &SoundInstance> + '_ {
        self.order.iter().filter_map(|key| self.slots.get(*key))
    }

    fn get_mut(&mut self, id: SoundId) -> Option<&mut SoundInstance> {
        self.slots.get_mut(*self.by_id.get(&id)?)
    }

    // ------------------------------ Requests ---------------------------------

    /// Request a sound. Returns `None` when nothing will play: unknown type,
    /// no clips, or refused by the distant-short-sound filter.
    ///
    /// A continuous request for a type that already has an active continuous
    /// instance touches that instance and returns its id.
    pub fn play<B: SoundBackend + ?Sized>(
        &mut self,
        request: SoundRequest,
        settings: &ParrotSettings,
        backend: &B,
    ) -> Option<SoundId> {
        let sound_type = self.library.sound_type(request.sound_type)?;
        let mode = request.mode.or(sound_type.playback_mode).unwrap_or_default();

        if mode == PlaybackMode::Continuous {
            for key in self.order.iter().rev() {
                let Some(instance) = self.slots.get_mut(*key) else { continue };
                if instance.type_id == request.sound_type
                    && instance.mode == PlaybackMode::Continuous
                    && instance.is_active()
                {
                    instance.last_touch = self.clock;
                    return Some(instance.id);
                }
            }
        }

        let sound_type = self.library.sound_type(request.sound_type)?;
        let category_id = sound_type.category;
        let spatial = self.library.category(category_id).is_some_and(|c| c.spatial);

        // a rejected request must not advance the selector, so the filter picks on copies
        if settings.ignore_distant_short_sounds
            && spatial
            && settings.short_sound_ignored_modes.contains(&mode)
            && request.position.distance(self.listener) > settings.short_sound_distance()
        {
            let mut rng = self.rng.clone();
            let mut selector = sound_type.selector.clone();
            let clip = pick_clip(&sound_type.clips, selector.as_mut(), request.clip_index, &mut rng)?;
            let duration = backend.clip_duration(clip).unwrap_or(settings.unsupported_clip_duration);
            if duration <= settings.short_sound_max_duration {
                self.diagnostics.rejected += 1;
                debug!(sound_type = %sound_type.name, duration, "dropped distant short sound");
                return None;
            }
        }

        let sound_type = self.library.sound_type_mut(request.sound_type)?;
        let clip = pick_clip(&sound_type.clips, sound_type.selector.as_mut(), request.clip_index, &mut self.rng)?;
        let sound_type = self.library.sound_type(request.sound_type)?;
        let duration = backend.clip_duration(clip).unwrap_or(settings.unsupported_clip_duration);

        let volume_spread = sound_type.volume_variation * self.rng.gen_range(-1.0f32..=1.0);
        let triangular = self.rng.gen::<f32>() - self.rng.gen::<f32>();
        let pitch = sound_type.pitch * request.pitch * (1.0 + sound_type.pitch_variation * triangular);
        let volume = sound_type.volume + volume_spread;
        let routing = request.routing.or(sound_type.routing);
        let priority = request.priority.unwrap_or(sound_type.priority);

        let id = self.next_id();
        trace!(%id, sound_type = ?request.sound_type, ?mode, ?clip, "sound requested");
        let instance = SoundInstance {
            id,
            type_id: request.sound_type,
            category: category_id,
            clip,
            handle: None,
            routing,
            mode,
            position: request.position,
            pending_positions: Vec::new(),
            pitch,
            applied_pitch: pitch,
            pitch_nudge: 1.0,
            volume,
            volume_factor: request.volume_factor,
            dying: false,
            pending_start: true,
            last_touch: self.clock,
            elapsed: 0.0,
            duration,
            current_volume: 0.0,
            current_pan: 0.0,
            priority,
            persistent: request.persistent,
        };

        let key = self.slots.insert(instance);
        self.order.push(key);
        self.by_id.insert(id, key);
        self.limit_voices(request.sound_type, category_id);
        Some(id)
    }

    /// Keep an instance alive. Returns whether it is still valid.
    pub fn touch(&mut self, id: SoundId) -> bool {
        let clock = self.clock;
        let Some(instance) = self.get_mut(id) else { return false };
        if instance.is_active() {
            instance.last_touch = clock;
        }
        instance.is_valid()
    }

    /// Move an instance. Continuous instances buffer the position until the
    /// next update; dying instances ignore it.
    pub fn set_coordinates(&mut self, id: SoundId, x: f32, y: f32) {
        let Some(instance) = self.get_mut(id) else { return };
        if instance.dying {
            return;
        }
        let position = Vec2::new(x, y);
        if instance.mode == PlaybackMode::Continuous {
            instance.pending_positions.push(position);
        } else {
            instance.position = position;
        }
    }

    /// Returns `false` if the id is gone.
    pub fn set_persistent(&mut self, id: SoundId, persistent: bool) -> bool {
        match self.get_mut(id) {
            Some(instance) => {
                instance.persistent = persistent;
                true
            }
            None => false,
        }
    }

    /// Graceful stop of one instance.
    pub fn stop(&mut self, id: SoundId) {
        let clock = self.clock;
        if let Some(instance) = self.get_mut(id) {
            begin_stop(instance, clock);
        }
    }

    pub fn stop_type(&mut self, sound_type: SoundTypeId, ignore_persistent: bool) {
        self.stop_where(ignore_persistent, |i| i.type_id == sound_type);
    }

    pub fn stop_category(&mut self, category: CategoryId, ignore_persistent: bool) {
        self.stop_where(ignore_persistent, |i| i.category == category);
    }

    pub fn stop_all(&mut self, ignore_persistent: bool) {
        self.stop_where(ignore_persistent, |_| true);
    }

    fn stop_where(&mut self, ignore_persistent: bool, matches: impl Fn(&SoundInstance) -> bool) {
        let clock = self.clock;
        for key in &self.order {
            let Some(instance) = self.slots.get_mut(*key) else { continue };
            if ignore_persistent && instance.persistent {
                continue;
            }
            if matches(instance) {
                begin_stop(instance, clock);
            }
        }
    }

    /// Stop the backend voice now and forget the instance.
    pub fn kill<B: SoundBackend + ?Sized>(&mut self, id: SoundId, backend: &mut B) {
        self.kill_where(backend, |i| i.id == id);
    }

    pub fn kill_type<B: SoundBackend + ?Sized>(&mut self, sound_type: SoundTypeId, backend: &mut B) {
        self.kill_where(backend, |i| i.type_id == sound_type);
    }

    pub fn kill_category<B: SoundBackend + ?Sized>(&mut self, category: CategoryId, backend: &mut B) {
        self.kill_where(backend, |i| i.category == category);
    }

    pub fn kill_all<B: SoundBackend + ?Sized>(&mut self, backend: &mut B) {
        self.kill_where(backend, |_| true);
    }

    fn kill_where<B: SoundBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        matches: impl Fn(&SoundInstance) -> bool,
    ) {
        let slots = &mut self.slots;
        let by_id = &mut self.by_id;
        self.order.retain(|key| {
            let Some(instance) = slots.get(*key) else { return false };
            if !matches(instance) {
                return true;
            }
            if let Some(handle) = instance.handle {
                backend.stop(handle);
            }
            trace!(id = %instance.id, "sound killed");
            by_id.remove(&instance.id);
            slots.remove(*key);
            false
        });
    }

    /// Kill everything and reset the registries.
    pub fn dispose<B: SoundBackend + ?Sized>(&mut self, backend: &mut B) {
        self.kill_all(backend);
        self.slots.clear();
        self.by_id.clear();
    }

    // ------------------------------- Update ----------------------------------

    /// Advance every instance by `dt` seconds and issue the resulting backend calls.
    pub fn update<B: SoundBackend + ?Sized>(&mut self, dt: f32, settings: &ParrotSettings, backend: &mut B) {
        let dt = dt.max(0.0);
        self.clock += f64::from(dt);
        self.solidify(dt, settings);

        let frame = Frame {
            library: &self.library,
            settings,
            rolloff: settings.rolloff(),
            listener: self.listener,
            master: perceived_volume(self.master_volume, settings.loudness_exponent),
            category_pitch: &self.category_pitch,
            clock: self.clock,
            dt,
        };

        let mut index = 0;
        while index < self.order.len() {
            let key = self.order[index];
            let tick = match self.slots.get_mut(key) {
                Some(instance) => tick(instance, &frame, backend, &mut self.diagnostics),
                None => Tick::Remove,
            };
            match tick {
                Tick::Keep => index += 1,
                Tick::Remove => {
                    self.order.remove(index);
                    if let Some(instance) = self.slots.remove(key) {
                        self.by_id.remove(&instance.id);
                    }
                }
            }
        }
    }

    /// Collapse positions buffered by continuous callers into one per instance.
    ///
    /// Per axis, whichever of the closest buffered position and their average is
    /// nearer the listener wins. The instance moves toward that point at most
    /// `continuous_speed * dt`, then settles halfway between old and new.
    fn solidify(&mut self, dt: f32, settings: &ParrotSettings) {
        let listener = self.listener;
        let max_step = settings.continuous_speed * dt;
        for key in &self.order {
            let Some(instance) = self.slots.get_mut(*key) else { continue };
            let Some(first) = instance.pending_positions.first() else { continue };

            let mut closest = first.sub(listener);
            let mut sum = Vec2::ZERO;
            for position in &instance.pending_positions {
                sum = sum.add(*position);
                let offset = position.sub(listener);
                if offset.x.abs() < closest.x.abs() {
                    closest.x = offset.x;
                }
                if offset.y.abs() < closest.y.abs() {
                    closest.y = offset.y;
                }
            }
            let average = sum.scale(1.0 / instance.pending_positions.len() as f32).sub(listener);
            if average.x.abs() < closest.x.abs() {
                closest.x = average.x;
            }
            if average.y.abs() < closest.y.abs() {
                closest.y = average.y;
            }

            let old = instance.position;
            let target = listener.add(closest);
            let moved = old.add(target.sub(old).limit(max_step));
            instance.position = old.midpoint(moved);
            instance.pending_positions.clear();
        }
    }

    /// Stop the oldest, lowest-priority active voices beyond the type and
    /// category budgets. Never kills; evicted voices fade out.
    fn limit_voices(&mut self, type_id: SoundTypeId, category_id: CategoryId) {
        let (Some(sound_type), Some(category)) =
            (self.library.sound_type(type_id), self.library.category(category_id))
        else {
            return;
        };

        let mut candidates = Vec::new();
        let mut type_count = 0;
        for key in &self.order {
            let Some(instance) = self.slots.get(*key) else { continue };
            if instance.category != category_id {
                continue;
            }
            if instance.type_id == type_id {
                type_count += 1;
            }
            candidates.push((instance.priority, instance.id, *key));
        }

        let type_over = type_count > sound_type.voices;
        let category_over = candidates.len() > category.voices;
        if !type_over && !category_over {
            return;
        }

        candidates.sort_unstable_by_key(|&(priority, id, _)| (priority, id));
        let mut type_budget = sound_type.voices;
        let mut category_budget = category.voices;
        for &(_, _, key) in candidates.iter().rev() {
            let Some(instance) = self.slots.get_mut(key) else { continue };
            if !instance.is_active() || instance.is_expired() {
                continue;
            }
            let mut evict = false;
            if type_over && instance.type_id == type_id {
                match type_budget.checked_sub(1) {
                    Some(left) => type_budget = left,
                    None => evict = true,
                }
            }
            if !evict && category_over {
                match category_budget.checked_sub(1) {
                    Some(left) => category_budget = left,
                    None => evict = true,
                }
            }
            if evict {
                debug!(id = %instance.id, priority = instance.priority, "voice evicted");
                begin_stop(instance, self.clock);
                self.diagnostics.evictions += 1;
            }
        }
    }

    fn next_id(&mut self) -> SoundId {
        loop {
            self.next_id = self.next_id.wrapping_add(1);
            if let Some(raw) = NonZeroU64::new(self.next_id) {
                let id = SoundId(raw);
                if !self.by_id.contains_key(&id) {
                    return id;
                }
            }
        }
    }
}

/// Mark an instance as dying, starting its death fade at `clock`.
///
/// An instance that never reached the backend is released on the next tick.
fn begin_stop(instance: &mut SoundInstance, clock: f64) {
    if instance.dying {
        return;
    }
    instance.dying = true;
    instance.last_touch = clock;
    instance.pending_start = false;
}

fn pick_clip<R: Rng + ?Sized>(
    clips: &[ClipId],
    selector: Option<&mut NonRepeatingSelector<ClipId>>,
    index: Option<usize>,
    rng: &mut R,
) -> Option<ClipId> {
    match index {
        Some(index) if index < clips.len() => Some(clips[index]),
        _ => match selector {
            Some(selector) => selector.pick(rng).copied(),
            None => clips.choose(rng).copied(),
        },
    }
}

fn tick<B: SoundBackend + ?Sized>(
    instance: &mut SoundInstance,
    frame: &Frame<'_>,
    backend: &mut B,
    diagnostics: &mut Diagnostics,
) -> Tick {
    let settings = frame.settings;
    let (Some(sound_type), Some(category)) =
        (frame.library.sound_type(instance.type_id), frame.library.category(instance.category))
    else {
        return Tick::Remove;
    };
    let continuity = sound_type.continuity_factor;

    if instance.mode == PlaybackMode::Continuous && instance.is_active() {
        let idle = (frame.clock - instance.last_touch) as f32;
        if idle > settings.continuous_timeout * continuity {
            trace!(id = %instance.id, idle, "continuous sound timed out");
            begin_stop(instance, frame.clock);
        }
    }

    if !instance.pending_start && instance.handle.is_none() {
        if !instance.dying {
            diagnostics.backend_failures += 1;
            warn!(id = %instance.id, clip = ?instance.clip, "backend returned no handle, dropping sound");
        }
        return Tick::Remove;
    }

    let mut fade_in = 1.0;
    if instance.mode == PlaybackMode::Continuous {
        let window = settings.continuous_fade_in * continuity;
        if window > 0.0 {
            fade_in = clamp01(instance.elapsed / window);
        }
    }

    instance.elapsed += frame.dt;
    if instance.is_active() && instance.is_expired() {
        begin_stop(instance, frame.clock);
    }
    // one-shots can end before their reported duration
    if instance.is_active() && instance.mode == PlaybackMode::Normal {
        if let Some(handle) = instance.handle {
            if !backend.is_playing(handle) {
                trace!(id = %instance.id, "voice finished on the backend");
                begin_stop(instance, frame.clock);
            }
        }
    }

    let mut life = 1.0;
    if instance.dying {
        let dead = (frame.clock - instance.last_touch) as f32;
        if dead > settings.death_fade_out {
            if let Some(handle) = instance.handle {
                backend.stop(handle);
            }
            trace!(id = %instance.id, "sound released");
            return Tick::Remove;
        }
        life = if settings.death_fade_out > 0.0 { clamp01(1.0 - dead / settings.death_fade_out) } else { 0.0 };
    }

    let mut distance = 1.0;
    let mut pan = 0.0;
    if category.spatial {
        let offset = instance.position.sub(frame.listener);
        distance = frame.rolloff.factor(offset.len());
        pan = pan_for_offset(offset.x, settings.pan_limit, settings.pan_reduction);
    }

    let mut volume = perceived_volume(instance.volume, settings.loudness_exponent)
        * instance.volume_factor
        * fade_in
        * distance
        * life;
    if instance.dying {
        volume = volume.min(instance.current_volume);
        pan = instance.current_pan;
    }
    let final_volume = volume * frame.master;

    if instance.pending_start {
        instance.pending_start = false;
        let category_pitch = frame.category_pitch.get(&instance.category).copied().unwrap_or(1.0);
        let params = VoiceParams {
            volume: final_volume,
            pitch: instance.pitch * category_pitch,
            pan,
            routing: instance.routing,
        };
        instance.handle = if instance.mode.is_looping() {
            backend.looped(instance.clip, params)
        } else {
            backend.play(instance.clip, params)
        };
        instance.applied_pitch = params.pitch;
        instance.pitch_nudge = 1.0;
        if instance.handle.is_some() {
            diagnostics.started += 1;
        }
        trace!(id = %instance.id, volume = final_volume, pitch = params.pitch, pan, "voice started");
    } else if let Some(handle) = instance.handle {
        if instance.pitch_nudge != 1.0 {
            instance.applied_pitch *= instance.pitch_nudge;
            instance.pitch_nudge = 1.0;
            backend.set_pitch(handle, instance.applied_pitch);
        }
        backend.set_volume_and_pan(handle, final_volume, pan);
    }

    instance.current_volume = volume;
    instance.current_pan = pan;
    Tick::Keep
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{SoundCategory, SoundType};
    use crate::testing::{Call, RecordingBackend};
    use approx::assert_relative_eq;

    struct Rig {
        engine: SoundEngine,
        settings: ParrotSettings,
        backend: RecordingBackend,
        world: CategoryId,
        spatial: CategoryId,
    }

    impl Rig {
        fn new() -> Self {
            let mut library = SoundLibrary::default();
            let world = library.add_category(SoundCategory::new("world", 4, false));
            let spatial = library.add_category(SoundCategory::new("player", 16, true));
            Self {
                engine: SoundEngine::with_seed(library, 7),
                settings: ParrotSettings::default(),
                backend: RecordingBackend::new().with_duration(ClipId(1), 2.0),
                world,
                spatial,
            }
        }

        fn add(&mut self, sound_type: SoundType) -> SoundTypeId {
            self.engine.library_mut().add_type(sound_type.pitch_variation(0.0)).unwrap()
        }

        fn play(&mut self, request: SoundRequest) -> Option<SoundId> {
            self.engine.play(request, &self.settings, &self.backend)
        }

        fn update(&mut self, dt: f32) {
            self.engine.update(dt, &self.settings, &mut self.backend);
        }
    }

    #[test]
    fn one_shot_expires_then_fades_out() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("beep", rig.world, 2).clips([ClipId(1)]));
        let id = rig.play(SoundRequest::new(t)).unwrap();
        assert!(rig.engine.get(id).unwrap().is_pending_start());

        rig.update(1.0);
        let s = rig.engine.get(id).unwrap();
        assert!(s.is_active() && s.handle().is_some());

        rig.update(1.5);
        let s = rig.engine.get(id).unwrap();
        assert!(s.is_expired() && s.is_dying());

        let fade = rig.settings.death_fade_out;
        rig.update(fade + 0.01);
        assert!(rig.engine.get(id).is_none());
        assert!(matches!(rig.backend.calls().last(), Some(Call::Stop { .. })));
        assert_eq!(rig.engine.live_count(), 0);
    }

    #[test]
    fn continuous_requests_share_one_instance() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("flame", rig.spatial, 1).clips([ClipId(2)]).mode(PlaybackMode::Continuous));
        let a = rig.play(SoundRequest::new(t));
        let b = rig.play(SoundRequest::new(t).at(1.0, 1.0));
        assert!(a.is_some());
        assert_eq!(a, b);
        assert_eq!(rig.engine.live_count(), 1);

        rig.update(0.016);
        assert!(matches!(rig.backend.calls()[0], Call::Loop { .. }));
    }

    #[test]
    fn continuous_decays_when_untouched() {
        let mut rig = Rig::new();
        let t = rig.add(
            SoundType::new("flame", rig.world, 1)
                .clips([ClipId(2)])
                .mode(PlaybackMode::Continuous)
                .continuity_factor(0.5),
        );
        let id = rig.play(SoundRequest::new(t)).unwrap();
        // timeout is 0.35 * 0.5
        rig.update(0.1);
        assert!(rig.engine.touch(id));
        rig.update(0.1);
        assert!(rig.engine.get(id).unwrap().is_active());
        rig.update(0.1);
        assert!(rig.engine.get(id).unwrap().is_dying());
    }

    #[test]
    fn continuous_fades_in() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("flame", rig.world, 1).clips([ClipId(2)]).mode(PlaybackMode::Continuous));
        let id = rig.play(SoundRequest::new(t)).unwrap();
        rig.update(0.05);
        assert_eq!(rig.engine.get(id).unwrap().current_volume(), 0.0);
        rig.engine.touch(id);
        rig.update(0.05);
        let v = rig.engine.get(id).unwrap().current_volume();
        assert!(v > 0.0 && v < 1.0, "{v}");
        for _ in 0..4 {
            rig.engine.touch(id);
            rig.update(0.05);
        }
        assert_relative_eq!(rig.engine.get(id).unwrap().current_volume(), 1.0);
    }

    #[test]
    fn lower_priority_is_evicted() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("alarm", rig.world, 1).clips([ClipId(1)]));
        let high = rig.play(SoundRequest::new(t).priority(1)).unwrap();
        let low = rig.play(SoundRequest::new(t).priority(0)).unwrap();
        rig.update(0.016);
        assert!(rig.engine.get(high).unwrap().is_active());
        assert!(rig.engine.get(low).map_or(true, SoundInstance::is_dying));
        assert_eq!(rig.engine.diagnostics().evictions, 1);
    }

    #[test]
    fn oldest_is_evicted_on_ties() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("step", rig.world, 2).clips([ClipId(1)]));
        let ids: Vec<_> = (0..3).map(|_| rig.play(SoundRequest::new(t)).unwrap()).collect();
        assert!(rig.engine.get(ids[0]).unwrap().is_dying());
        assert!(rig.engine.get(ids[1]).unwrap().is_active());
        assert!(rig.engine.get(ids[2]).unwrap().is_active());
    }

    #[test]
    fn category_budget_spans_types() {
        let mut rig = Rig::new();
        let a = rig.add(SoundType::new("a", rig.world, 4).clips([ClipId(1)]));
        let b = rig.add(SoundType::new("b", rig.world, 4).clips([ClipId(1)]));
        for i in 0..6 {
            rig.play(SoundRequest::new(if i % 2 == 0 { a } else { b }));
        }
        rig.update(0.016);
        let active = rig.engine.instances().filter(|s| s.is_active()).count();
        assert_eq!(active, 4);
    }

    #[test]
    fn master_volume_change_reaches_running_voice() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("hum", rig.world, 1).clips([ClipId(3)]).mode(PlaybackMode::Eternal));
        let id = rig.play(SoundRequest::new(t)).unwrap();
        rig.update(0.016);
        let handle = rig.engine.get(id).unwrap().handle().unwrap();
        assert_relative_eq!(rig.backend.last_volume(handle).unwrap(), 1.0);

        rig.engine.set_master_volume(0.5);
        rig.update(0.016);
        assert_relative_eq!(rig.backend.last_volume(handle).unwrap(), 0.125);
        let starts = rig.backend.calls().iter().filter(|c| matches!(c, Call::Loop { .. })).count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn failed_start_is_dropped_and_counted() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("beep", rig.world, 1).clips([ClipId(1)]));
        rig.backend.fail_next_plays(1);
        let id = rig.play(SoundRequest::new(t)).unwrap();
        rig.update(0.016);
        assert!(!rig.engine.is_valid(id));
        rig.update(0.016);
        assert!(rig.engine.get(id).is_none());
        assert_eq!(rig.engine.diagnostics().backend_failures, 1);
    }

    #[test]
    fn stopping_before_start_never_reaches_backend() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("beep", rig.world, 1).clips([ClipId(1)]));
        let id = rig.play(SoundRequest::new(t)).unwrap();
        rig.engine.stop(id);
        assert!(!rig.engine.touch(id));
        rig.update(0.016);
        assert!(rig.engine.get(id).is_none());
        assert!(rig.backend.calls().is_empty());
        assert_eq!(rig.engine.diagnostics().backend_failures, 0);
    }

    #[test]
    fn dying_sound_never_swells() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("step", rig.spatial, 1).clips([ClipId(1)]));
        let id = rig.play(SoundRequest::new(t).at(10.0, 0.0)).unwrap();
        rig.update(0.016);
        let before = rig.engine.get(id).unwrap().current_volume();
        let pan = rig.engine.get(id).unwrap().current_pan();
        rig.engine.stop(id);
        rig.engine.set_coordinates(id, 0.0, 0.0);
        rig.update(0.016);
        let s = rig.engine.get(id).unwrap();
        assert!(s.current_volume() <= before);
        assert_eq!(s.current_pan(), pan);
        assert_eq!(s.position(), Vec2::new(10.0, 0.0));
    }

    #[test]
    fn spatial_sounds_pan_and_attenuate() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("step", rig.spatial, 4).clips([ClipId(1)]));
        let near = rig.play(SoundRequest::new(t).at(-1.0, 0.0)).unwrap();
        let far = rig.play(SoundRequest::new(t).at(9.0, 0.0)).unwrap();
        let gone = rig.play(SoundRequest::new(t).at(0.0, 40.0)).unwrap();
        rig.update(0.016);
        let near = rig.engine.get(near).unwrap();
        let far = rig.engine.get(far).unwrap();
        assert_relative_eq!(near.current_volume(), 1.0);
        assert!(near.current_pan() < 0.0);
        assert!(far.current_volume() < 1.0 && far.current_pan() > 0.0);
        assert_eq!(rig.engine.get(gone).unwrap().current_volume(), 0.0);
    }

    #[test]
    fn continuous_positions_are_solidified() {
        let mut rig = Rig::new();
        rig.settings.continuous_timeout = 10.0;
        let t = rig.add(SoundType::new("flame", rig.spatial, 1).clips([ClipId(2)]).mode(PlaybackMode::Continuous));
        let id = rig.play(SoundRequest::new(t).at(4.0, 4.0)).unwrap();
        rig.engine.set_coordinates(id, 4.0, 0.0);
        rig.engine.set_coordinates(id, 0.0, 4.0);
        // still buffered
        assert_eq!(rig.engine.get(id).unwrap().position(), Vec2::new(4.0, 4.0));
        rig.update(1.0);
        // closest per axis is (0, 0); the move is capped then halved
        assert_eq!(rig.engine.get(id).unwrap().position(), Vec2::new(2.0, 2.0));
    }

    #[test]
    fn continuous_speed_caps_movement() {
        let mut rig = Rig::new();
        rig.settings.continuous_speed = 1.0;
        rig.settings.continuous_timeout = 10.0;
        let t = rig.add(SoundType::new("flame", rig.spatial, 1).clips([ClipId(2)]).mode(PlaybackMode::Continuous));
        let id = rig.play(SoundRequest::new(t).at(10.0, 0.0)).unwrap();
        rig.engine.set_coordinates(id, 0.0, 0.0);
        rig.update(1.0);
        assert_relative_eq!(rig.engine.get(id).unwrap().position().x, 9.5);
    }

    #[test]
    fn bulk_stop_can_spare_persistent() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("hum", rig.world, 4).clips([ClipId(3)]).mode(PlaybackMode::Eternal));
        let keep = rig.play(SoundRequest::new(t).persistent(true)).unwrap();
        let drop = rig.play(SoundRequest::new(t)).unwrap();
        rig.update(0.016);
        rig.engine.stop_all(true);
        assert!(rig.engine.get(keep).unwrap().is_active());
        assert!(rig.engine.get(drop).unwrap().is_dying());
        rig.engine.stop_type(t, false);
        assert!(rig.engine.get(keep).unwrap().is_dying());
    }

    #[test]
    fn kill_stops_backend_immediately() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("hum", rig.world, 4).clips([ClipId(3)]).mode(PlaybackMode::Eternal));
        let a = rig.play(SoundRequest::new(t)).unwrap();
        rig.play(SoundRequest::new(t));
        rig.update(0.016);
        assert_eq!(rig.backend.voices_playing(), 2);

        rig.engine.kill(a, &mut rig.backend);
        assert!(rig.engine.get(a).is_none());
        assert_eq!(rig.backend.voices_playing(), 1);

        rig.engine.kill_category(rig.world, &mut rig.backend);
        assert_eq!(rig.engine.live_count(), 0);
        assert_eq!(rig.backend.voices_playing(), 0);
    }

    #[test]
    fn category_pitch_nudges_live_voices() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("hum", rig.world, 1).clips([ClipId(3)]).mode(PlaybackMode::Eternal));
        let id = rig.play(SoundRequest::new(t).pitch(1.5)).unwrap();
        rig.update(0.016);
        rig.backend.clear_calls();

        rig.engine.set_category_pitch_factor(rig.world, 2.0);
        assert!(rig.backend.calls().is_empty());
        rig.update(0.016);
        assert!(rig.backend.calls().contains(&Call::SetPitch {
            handle: rig.engine.get(id).unwrap().handle().unwrap(),
            pitch: 3.0,
        }));
        assert_relative_eq!(rig.engine.get(id).unwrap().pitch(), 3.0);
    }

    #[test]
    fn distant_short_sounds_can_be_ignored() {
        let mut rig = Rig::new();
        rig.settings.ignore_distant_short_sounds = true;
        rig.backend = RecordingBackend::new().with_duration(ClipId(4), 0.2);
        let t = rig.add(SoundType::new("tick", rig.spatial, 4).clips([ClipId(4)]));
        assert!(rig.play(SoundRequest::new(t).at(100.0, 0.0)).is_none());
        assert!(rig.play(SoundRequest::new(t).at(1.0, 0.0)).is_some());
        assert!(rig.play(SoundRequest::new(t).at(100.0, 0.0).mode(PlaybackMode::Eternal)).is_some());
        assert_eq!(rig.engine.diagnostics().rejected, 1);
    }

    #[test]
    fn rejected_requests_leave_clip_rotation_alone() {
        let mut rig = Rig::new();
        rig.settings.ignore_distant_short_sounds = true;
        rig.backend = RecordingBackend::new().with_duration(ClipId(4), 0.2).with_duration(ClipId(5), 0.2);
        let t = rig.add(SoundType::new("tick", rig.spatial, 4).clips([ClipId(4), ClipId(5)]).non_repeating(0.9).unwrap());
        let weights = |rig: &Rig| -> Vec<f32> {
            rig.engine.library().sound_type(t).unwrap().selector.as_ref().unwrap().weights().collect()
        };
        for _ in 0..5 {
            assert!(rig.play(SoundRequest::new(t).at(100.0, 0.0)).is_none());
        }
        assert_eq!(weights(&rig), vec![1.0, 1.0]);

        rig.play(SoundRequest::new(t)).unwrap();
        assert_ne!(weights(&rig), vec![1.0, 1.0]);
    }

    #[test]
    fn routing_comes_from_request_or_type() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("boom", rig.world, 4).clips([ClipId(1)]).routing(RoutingChannel(5)));
        rig.play(SoundRequest::new(t));
        rig.play(SoundRequest::new(t).routing(RoutingChannel(9)));
        rig.update(0.016);
        let routings: Vec<_> = rig
            .backend
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::Play { params, .. } => Some(params.routing),
                _ => None,
            })
            .collect();
        assert_eq!(routings, vec![Some(RoutingChannel(5)), Some(RoutingChannel(9))]);
    }

    #[test]
    fn one_shot_ends_when_backend_finishes_early() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("beep", rig.world, 2).clips([ClipId(1)]));
        let id = rig.play(SoundRequest::new(t)).unwrap();
        rig.update(0.1);
        let handle = rig.engine.get(id).unwrap().handle().unwrap();

        rig.backend.finish(handle);
        rig.update(0.1);
        let s = rig.engine.get(id).unwrap();
        assert!(s.is_dying() && !s.is_expired());
        assert_eq!(rig.engine.diagnostics().backend_failures, 0);
    }

    #[test]
    fn explicit_clip_index_wins() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("step", rig.world, 4).clips([ClipId(5), ClipId(6), ClipId(7)]));
        let id = rig.play(SoundRequest::new(t).clip(2)).unwrap();
        assert_eq!(rig.engine.get(id).unwrap().clip(), ClipId(7));
        // out of range falls back to a random pick
        assert!(rig.play(SoundRequest::new(t).clip(9)).is_some());
    }

    #[test]
    fn type_without_clips_plays_nothing() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("empty", rig.world, 1));
        assert!(rig.play(SoundRequest::new(t)).is_none());
        assert_eq!(rig.engine.live_count(), 0);
    }

    #[test]
    fn unknown_duration_falls_back_to_setting() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("odd", rig.world, 1).clips([ClipId(99)]));
        let id = rig.play(SoundRequest::new(t)).unwrap();
        assert_eq!(rig.engine.get(id).unwrap().duration(), rig.settings.unsupported_clip_duration);
    }

    #[test]
    fn dispose_releases_everything() {
        let mut rig = Rig::new();
        let t = rig.add(SoundType::new("hum", rig.world, 4).clips([ClipId(3)]).mode(PlaybackMode::Eternal));
        rig.play(SoundRequest::new(t));
        rig.play(SoundRequest::new(t));
        rig.update(0.016);
        rig.engine.dispose(&mut rig.backend);
        assert_eq!(rig.engine.live_count(), 0);
        assert_eq!(rig.backend.voices_playing(), 0);
    }
}

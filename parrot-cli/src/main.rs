//! `parrot`: runs demo scenes through the engine with no audio device.
//!
//! Every backend call is emitted as a `trace` event; run with
//! `RUST_LOG=parrot=trace,parrot_engine=debug` to watch the voice traffic.

mod backend;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use parrot_engine::{
    ClipId, MusicChannel, MusicLibrary, MusicRequest, MusicType, MusicTypeId, Parrot, ParrotSettings, PlaybackMode,
    SoundCategory, SoundLibrary, SoundRequest, SoundType, SoundTypeId, TrackId,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::backend::LogBackend;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Scenario {
    /// Player walking past a beeping console
    Footsteps,
    /// Continuous flamethrower held, moved and released
    Flamethrower,
    /// Crossfade between two music tracks with a pause in between
    Music,
    All,
}

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "parrot", version, about = "Drive the Parrot engine through demo scenes")]
struct Args {
    /// Scene to run
    #[arg(short, long, value_enum, default_value = "all")]
    scenario: Scenario,

    /// Number of frames to simulate
    #[arg(short, long, default_value_t = 600)]
    frames: u32,

    /// Simulated frame rate
    #[arg(long, default_value_t = 60.0)]
    fps: f32,

    /// Engine settings (TOML); missing keys keep their defaults
    #[arg(short, long, env = "PARROT_CONFIG")]
    config: Option<PathBuf>,

    /// Seed for clip choice and demo movement
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

struct Demo {
    footsteps: SoundTypeId,
    beep: SoundTypeId,
    spark: SoundTypeId,
    flamethrower: SoundTypeId,
    cave: MusicTypeId,
    snowland: MusicTypeId,
}

fn load_settings(path: Option<&PathBuf>) -> Result<ParrotSettings> {
    let Some(path) = path else {
        return Ok(ParrotSettings::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let settings: ParrotSettings = toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(settings)
}

fn build_library() -> Result<(SoundLibrary, MusicLibrary, Demo)> {
    let mut sounds = SoundLibrary::default();
    let player = sounds.add_category(SoundCategory::new("player", 16, true));
    let environment = sounds.add_category(SoundCategory::new("environment", 16, true));
    sounds.add_category(SoundCategory::new("world", 4, false));
    sounds.add_category(SoundCategory::new("restricted", 1, false));
    sounds.add_category(SoundCategory::new("user_interface", 8, false));

    let footsteps = sounds.add_type(
        SoundType::new("footsteps", player, 3)
            .clips([ClipId(1), ClipId(2), ClipId(3), ClipId(4)])
            .volume_variation(0.1)
            .non_repeating(0.5)?,
    )?;
    let beep = sounds.add_type(
        SoundType::new("warning_beep", environment, 1).clips([ClipId(10)]).volume(0.5).mode(PlaybackMode::Eternal),
    )?;
    let spark = sounds.add_type(SoundType::new("flamethrower_spark", player, 2).clips([ClipId(20)]))?;
    let flamethrower = sounds.add_type(
        SoundType::new("flamethrower", player, 1)
            .clips([ClipId(21)])
            .mode(PlaybackMode::Continuous)
            .continuity_factor(0.3),
    )?;

    let mut music = MusicLibrary::default();
    let cave = music.add_type(MusicType::new("crystal_cave", TrackId(1), 0.8));
    let snowland = music.add_type(MusicType::new("snowland", TrackId(2), 0.8));
    music.add_type(MusicType::new("boss_fight", TrackId(3), 1.0));

    Ok((sounds, music, Demo { footsteps, beep, spark, flamethrower, cave, snowland }))
}

fn backend() -> LogBackend {
    LogBackend::default()
        .with_clip(ClipId(1), 0.35)
        .with_clip(ClipId(2), 0.35)
        .with_clip(ClipId(3), 0.4)
        .with_clip(ClipId(4), 0.3)
        .with_clip(ClipId(10), 1.2)
        .with_clip(ClipId(20), 0.25)
        .with_clip(ClipId(21), 2.0)
        .with_track(TrackId(1), 24.0)
        .with_track(TrackId(2), 30.0)
}

struct Runner {
    parrot: Parrot<LogBackend>,
    demo: Demo,
    rng: StdRng,
    dt: f32,
}

impl Runner {
    fn step(&mut self) {
        self.parrot.backend_mut().advance(self.dt);
        self.parrot.update(self.dt);
    }

    fn footsteps(&mut self, frames: u32) {
        info!(frames, "scene: footsteps");
        self.parrot.play_sound(SoundRequest::new(self.demo.beep).at(6.0, 0.0));
        // walk from the left of the console to the right, one step every 0.35 s
        let step_every = (0.35 / self.dt).max(1.0) as u32;
        for frame in 0..frames {
            let t = frame as f32 / frames.max(1) as f32;
            self.parrot.set_listener(-10.0 + 20.0 * t, 0.0);
            if frame % step_every == 0 {
                self.parrot.play_sound(SoundRequest::new(self.demo.footsteps).at(-10.0 + 20.0 * t, 0.0));
            }
            self.step();
        }
        self.parrot.stop_sound_type(self.demo.beep, false);
    }

    fn flamethrower(&mut self, frames: u32) {
        info!(frames, "scene: flamethrower");
        let held = frames * 2 / 3;
        let mut flame = None;
        for frame in 0..frames {
            if frame < held {
                let x = self.rng.gen_range(-1.0..1.0);
                let y = self.rng.gen_range(2.0..4.0);
                // holding the trigger re-requests the continuous sound every frame
                flame = self.parrot.play_sound(SoundRequest::new(self.demo.flamethrower).at(x, y)).or(flame);
                if self.rng.gen_bool(0.05) {
                    self.parrot.play_sound(SoundRequest::new(self.demo.spark).at(x, y));
                }
            }
            self.step();
        }
        if let Some(id) = flame {
            let state = self.parrot.sound(id).map(|s| if s.is_dying() { "dying" } else { "active" });
            info!(id = %id, state = state.unwrap_or("gone"), "flamethrower after release");
        }
    }

    fn music(&mut self, frames: u32) {
        info!(frames, "scene: music");
        let third = frames / 3;
        self.parrot.play_music(MusicRequest::new(self.demo.cave).looping(true));
        for frame in 0..frames {
            if frame == third {
                // same channel: the cave track fades out as snowland fades in
                self.parrot.play_music(MusicRequest::new(self.demo.snowland));
            }
            if frame == 2 * third {
                self.parrot.pause_music_channel(MusicChannel(0), true);
            }
            if frame == 2 * third + third / 2 {
                self.parrot.resume_music_channel(MusicChannel(0), true);
            }
            self.step();
        }
        let current = self.parrot.current_music(MusicChannel(0)).and_then(|id| self.parrot.music_library().music_type(id));
        info!(
            playing = self.parrot.is_music_playing(),
            current = current.map(|t| t.name.as_str()).unwrap_or("none"),
            "music after scene"
        );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    anyhow::ensure!(args.fps > 0.0, "--fps must be positive");

    let settings = load_settings(args.config.as_ref())?;
    let (sounds, music, demo) = build_library()?;
    let parrot = Parrot::with_seed(backend(), settings, sounds, music, args.seed).context("starting engine")?;

    info!(scenario = ?args.scenario, frames = args.frames, fps = args.fps, seed = args.seed, "parrot starting");

    let mut runner = Runner { parrot, demo, rng: StdRng::seed_from_u64(args.seed), dt: 1.0 / args.fps };
    match args.scenario {
        Scenario::Footsteps => runner.footsteps(args.frames),
        Scenario::Flamethrower => runner.flamethrower(args.frames),
        Scenario::Music => runner.music(args.frames),
        Scenario::All => {
            runner.footsteps(args.frames);
            runner.flamethrower(args.frames);
            runner.music(args.frames);
        }
    }

    let diagnostics = runner.parrot.diagnostics();
    let live = runner.parrot.sounds().live_count();
    runner.parrot.dispose();

    println!("--- parrot summary ---");
    println!("sounds started    : {}", diagnostics.started);
    println!("voices evicted    : {}", diagnostics.evictions);
    println!("requests rejected : {}", diagnostics.rejected);
    println!("backend failures  : {}", diagnostics.backend_failures);
    println!("live at shutdown  : {live}");
    println!("backend calls     : {}", runner.parrot.backend().calls);
    println!("voices after stop : {}", runner.parrot.backend().voices());
    Ok(())
}

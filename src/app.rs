use crate::assets::{self, Package};
use crate::config::{self, Config};
use crate::core::audio::{AudioTimeTracker, DEFAULT_REPORT_INTERVAL_SECTORS, SimulatedDrive, TrackTimes};
use crate::core::clock::{FixedClock, spawn_timer_thread};
use crate::core::fixed::{Fixed, FixedTime};
use crate::core::input::{Pad, PadButton};
use crate::game::chart::Chart;
use crate::game::effects::Effect;
use crate::game::gameplay::{self, DrawState, PlayResult};
use crate::game::judgment::Judgement;
use crate::game::replay::Replay;
use crate::game::stage::{Stage, StageRigs};
use log::{debug, info, warn};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Audio keeps streaming a little past the chart; the session ends with it.
const TRACK_TAIL: FixedTime = FixedTime::from_int(2);
const PRESENT_INTERVAL: FixedTime = FixedTime::ONE;

#[derive(Clone, Debug)]
pub enum Scene {
    Stage,
    Results(PlayResult),
}

#[derive(Clone, Debug)]
pub enum SceneAction {
    None,
    Navigate(Scene),
    Exit,
}

/// Everything a session needs besides its chart, rigs and input.
#[derive(Clone, Copy, Debug)]
pub struct SessionSettings {
    pub track: u8,
    pub timer_hz: u32,
    pub latency: FixedTime,
    pub extrap_window: FixedTime,
    pub seed: u32,
    pub realtime: bool,
}

impl SessionSettings {
    fn from_config(cfg: &Config, seed: u32) -> Self {
        Self {
            track: cfg.track,
            timer_hz: cfg.timer_hz,
            latency: FixedTime::from_ratio(cfg.audio_latency_ms as i32, 1000),
            extrap_window: FixedTime::from_ratio(cfg.extrapolation_window_ms as i32, 1000),
            seed,
            realtime: cfg.realtime,
        }
    }
}

fn clock_seed() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
        .unwrap_or(1)
}

/// Loads the package, recompiling the source chart into it when stale.
fn prepare_package(cfg: &Config) -> Result<Package, String> {
    let path = Path::new(&cfg.package_path);
    let mut package = if path.exists() {
        Package::load(path)?
    } else {
        info!("No package at '{}', starting a new one.", path.display());
        Package::new()
    };

    let mut dirty = false;
    if !cfg.chart_path.is_empty() {
        let chart_path = Path::new(&cfg.chart_path);
        match std::fs::read(chart_path) {
            Ok(source) => dirty |= assets::sync_charts(&mut package, &cfg.song, &source)? > 0,
            Err(e) => warn!("Chart source '{}' unavailable: {e}", chart_path.display()),
        }
    }
    if package.search(assets::BF_RIG).is_none() {
        assets::store_rigs(&mut package, &StageRigs::placeholder())?;
        dirty = true;
    }
    if dirty && let Err(e) = package.save(path) {
        warn!("{e}");
    }
    Ok(package)
}

/// What a renderer would draw this frame, condensed into one log line.
fn log_presentation(draw: &DrawState, stage: &Stage, times: TrackTimes) {
    let pieces: usize = stage
        .effects
        .iter()
        .map(|(_, effect)| match effect {
            Effect::Combo(popup) => popup.pieces().len(),
        })
        .sum();
    debug!(
        "[{}] notes {} | score {} x{} | camera ({}, {}, {}) | effects {} ({pieces} pieces) | bf frame {} | drive {}/{}/{}",
        draw.time,
        draw.notes.len(),
        draw.score.text(),
        draw.combo,
        stage.camera.x(Fixed::ONE),
        stage.camera.y(Fixed::ONE),
        stage.camera.z(Fixed::ONE),
        stage.effects.len(),
        stage.bf.character().frame(),
        times.raw,
        times.extrap,
        times.track,
    );
}

/// Runs one song until its track plays out (or until Start) and returns the
/// result.
pub fn run_session(
    chart: Chart,
    rigs: &StageRigs,
    replay: &Replay,
    settings: SessionSettings,
) -> Result<PlayResult, String> {
    let mut track_lengths = vec![FixedTime::ZERO; usize::from(settings.track) + 1];
    track_lengths[usize::from(settings.track)] = chart.end_time() + TRACK_TAIL;

    let tracker = Arc::new(AudioTimeTracker::new(settings.latency, settings.extrap_window));
    let drive = SimulatedDrive::new(track_lengths, DEFAULT_REPORT_INTERVAL_SECTORS);
    let mut state = gameplay::init(Arc::clone(&tracker), Box::new(drive), settings.seed);
    gameplay::start(&mut state, chart, settings.track)?;
    let mut stage = Stage::new(rigs, settings.seed);

    let mut clock = FixedClock::new(settings.timer_hz);
    let source = clock.source();
    let timer = settings
        .realtime
        .then(|| spawn_timer_thread(clock.source(), settings.timer_hz));
    clock.start();

    let mut pad = Pad::new();
    let mut cursor = replay.cursor();
    let mut frames = 0u64;
    let mut present_timer = FixedTime::ZERO;
    loop {
        if timer.is_some() {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            source.interrupt();
        }
        let dt = clock.update();
        if dt == FixedTime::ZERO {
            continue;
        }
        frames += 1;

        let input = pad.poll(cursor.held_at(state.time));
        if input.pressed(PadButton::START) {
            info!("Start pressed at {}, leaving the stage.", state.time);
            break;
        }
        stage.handle_pad(&input);
        gameplay::process(&mut state, dt, &input, &mut stage);
        stage.tick(dt, state.time);

        present_timer += dt;
        if present_timer >= PRESENT_INTERVAL {
            present_timer -= PRESENT_INTERVAL;
            log_presentation(gameplay::draw_state(&state), &stage, tracker.times());
        }

        if gameplay::song_ended(&state) {
            info!("Track {} finished at {}.", settings.track, state.time);
            break;
        }
    }
    if let Some(timer) = timer {
        timer.stop();
    }
    if !cursor.finished() {
        debug!("Replay stopped with input still queued.");
    }
    debug!("Session ran {frames} frames over {} s of clock.", clock.get_time());
    Ok(gameplay::summary(&state))
}

fn run_stage(cfg: &Config, package: &Package) -> Result<SceneAction, String> {
    let chart = assets::load_chart(package, &cfg.song, cfg.difficulty)?;
    let rigs = assets::load_rigs(package);
    let replay = if cfg.replay_path.is_empty() {
        info!("No replay configured, using autoplay.");
        Replay::autoplay(&chart)
    } else {
        Replay::load(Path::new(&cfg.replay_path))?
    };
    let seed = match (replay.seed, cfg.random_seed) {
        (Some(seed), _) => seed,
        (None, 0) => clock_seed(),
        (None, seed) => seed,
    };
    info!("Starting {} ({}) with seed {seed:#010x}.", cfg.song, cfg.difficulty);
    let result = run_session(chart, &rigs, &replay, SessionSettings::from_config(cfg, seed))?;
    Ok(SceneAction::Navigate(Scene::Results(result)))
}

fn show_results(result: &PlayResult) -> SceneAction {
    info!(
        "Score {} | max combo {} | health {} | ended at {}",
        result.score, result.max_combo, result.health, result.time
    );
    for judgement in Judgement::ALL {
        info!("  {:<5} {}", judgement.name(), result.counts.get(judgement));
    }
    info!("  Miss  {} ({} player notes)", result.counts.misses, result.player_notes);
    SceneAction::Exit
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cfg = config::get();
    let package = prepare_package(&cfg)?;

    let mut scene = Scene::Stage;
    loop {
        let action = match &scene {
            Scene::Stage => run_stage(&cfg, &package)?,
            Scene::Results(result) => show_results(result),
        };
        match action {
            SceneAction::Navigate(next) => scene = next,
            SceneAction::Exit => {
                info!("Exit action received. Shutting down.");
                break;
            }
            SceneAction::None => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::chart::{Direction, Note, NoteKey, Section, SectionFlags};
    use crate::game::replay::{ReplayButton, ReplayEvent};

    fn settings() -> SessionSettings {
        SessionSettings {
            track: 5,
            timer_hz: 60,
            latency: FixedTime::from_ratio(25, 1000),
            extrap_window: FixedTime::from_ratio(1500, 1000),
            seed: 3,
            realtime: false,
        }
    }

    fn chart() -> Chart {
        let notes = [
            (1.0, NoteKey::player(Direction::Left), 0.0),
            (1.5, NoteKey::opponent(Direction::Down), 0.0),
            (2.0, NoteKey::player(Direction::Up), 0.5),
            (3.0, NoteKey::player(Direction::Right), 0.0),
            (3.25, NoteKey::player(Direction::Down), 0.0),
        ]
        .into_iter()
        .map(|(t, key, len)| Note::new(FixedTime::from_f64(t), FixedTime::from_f64(len), key, false))
        .collect();
        Chart {
            scroll: FixedTime::from_int(250),
            sections: (0..2)
                .map(|i| Section {
                    time: FixedTime::from_int(2 * i),
                    length: FixedTime::from_int(2),
                    flags: SectionFlags::MUST_HIT,
                })
                .collect(),
            notes,
        }
    }

    #[test]
    fn autoplay_clears_the_chart() {
        let chart = chart();
        let replay = Replay::autoplay(&chart);
        let result = run_session(chart, &StageRigs::placeholder(), &replay, settings()).expect("session");
        assert_eq!(result.player_notes, 4);
        assert_eq!(result.counts.misses, 0);
        assert_eq!(result.counts.hits(), 4);
        assert_eq!(result.max_combo, 4);
    }

    #[test]
    fn start_ends_the_session_early() {
        let replay = Replay {
            seed: None,
            events: vec![ReplayEvent { time: 0.5, button: ReplayButton::Start, pressed: true }],
        };
        let result = run_session(chart(), &StageRigs::placeholder(), &replay, settings()).expect("session");
        assert_eq!(result.score, 0);
        assert_eq!(result.counts.hits() + result.counts.misses, 0);
    }

    #[test]
    fn idle_session_misses_everything() {
        let result = run_session(chart(), &StageRigs::placeholder(), &Replay::default(), settings())
            .expect("session");
        assert_eq!(result.counts.misses, 4);
        assert_eq!(result.score, -40);
    }

    #[test]
    fn session_ends_when_the_track_plays_out() {
        let chart = chart();
        let track_end = chart.end_time() + TRACK_TAIL;
        let s = settings();
        let result = run_session(chart, &StageRigs::placeholder(), &Replay::default(), s).expect("session");
        assert!(result.time >= track_end, "ended early at {}", result.time);
        assert!(
            result.time <= track_end + s.extrap_window,
            "session ran on past the track: {}",
            result.time
        );
    }
}

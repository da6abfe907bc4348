use crate::core::audio::{AudioControl, AudioTimeTracker, EndAction};
use crate::core::fixed::{FRAC_BITS, Fixed, FixedTime};
use crate::core::input::{PadState, lane_buttons};
use crate::core::random::Random;
use crate::game::camera::Bumper;
use crate::game::chart::{
    Chart, Direction, Note, NoteKey, NoteStatus, STEPS_PER_BEAT, STEPS_PER_SECTION, Section,
};
use crate::game::hooks::{HookCtx, PlayHooks};
use crate::game::judgment::{self, JUDGE_WINDOW, Judgement, JudgementCounts, MISS_SCORE};
use crate::game::life::{
    HEALTH_START, HOLD_HEALTH, HealthFixed, HealthIcons, MISS_HEALTH, clamp_health, health_icons,
};
use log::{debug, info};
use std::sync::Arc;

pub const PRE_ROLL: FixedTime = Fixed::from_int(-4);

// Strum animation banks, offset by direction.
pub const STRUM_STATIC: usize = 0;
pub const STRUM_CONFIRM: usize = 4;
pub const STRUM_PRESS: usize = 8;

const SPLASH_DURATION: FixedTime = Fixed::from_f64(6.0 / 24.0);

// Playfield layout, centre-origin pixels.
pub const NOTE_X: [i32; NoteKey::COUNT] = [
    24,
    24 + 36,
    24 + 2 * 36,
    24 + 3 * 36,
    -(24 + 3 * 36),
    -(24 + 3 * 36) + 36,
    -(24 + 3 * 36) + 2 * 36,
    -(24 + 3 * 36) + 3 * 36,
];
pub const NOTE_Y: i32 = -84;
pub const NOTE_CULL: i32 = 140;
pub const HEALTH_W: i32 = 112;

// Health bar scale pulse on every beat, as a fraction of full size.
const HEALTH_BUMP: Fixed = Fixed::from_f64(0.25);

const SCORE_GLYPHS: usize = 8;
pub const SCORE_GLYPH_MINUS: u8 = 10;
pub const SCORE_GLYPH_BLANK: u8 = 0x80;
const SCORE_GLYPH_W: i32 = 7;

/* ============================== Score text ============================== */

/// Right-aligned score glyphs: digits 0..=9, [`SCORE_GLYPH_MINUS`], or
/// [`SCORE_GLYPH_BLANK`] for unused leading cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreDigits {
    pub glyphs: [u8; SCORE_GLYPHS],
    pub width: i32,
}

impl Default for ScoreDigits {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ScoreDigits {
    pub fn new(score: i32) -> Self {
        let mut glyphs = [SCORE_GLYPH_BLANK; SCORE_GLYPHS];
        // Seven digit cells plus the sign.
        let mut abs = score.unsigned_abs().min(9_999_999);
        let mut cell = SCORE_GLYPHS;
        loop {
            cell -= 1;
            glyphs[cell] = (abs % 10) as u8;
            abs /= 10;
            if abs == 0 {
                break;
            }
        }
        if score < 0 {
            cell -= 1;
            glyphs[cell] = SCORE_GLYPH_MINUS;
        }
        Self {
            glyphs,
            width: (SCORE_GLYPHS - cell) as i32 * SCORE_GLYPH_W,
        }
    }

    pub fn text(&self) -> String {
        self.glyphs
            .iter()
            .filter_map(|&g| match g {
                0..=9 => Some(char::from(b'0' + g)),
                SCORE_GLYPH_MINUS => Some('-'),
                _ => None,
            })
            .collect()
    }
}

/* ================================ Strums ================================ */

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Splash {
    pub anim: usize,
    pub age: FixedTime,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Strum {
    pub anim: usize,
    pub splash: Option<Splash>,
    pub hold_health_remaining: HealthFixed,
}

/* ============================= Draw snapshot ============================ */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawNote {
    pub key: NoteKey,
    pub x: i32,
    /// Head position; for a hold being held this is pinned to the strum line.
    pub y: i32,
    pub head_visible: bool,
    /// Tail end for holds, clipped to the field.
    pub tail_y: Option<i32>,
    /// Missed notes draw greyed out.
    pub dimmed: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawStrum {
    pub x: i32,
    pub anim: usize,
    pub splash: Option<usize>,
}

/// Everything the presentation layer needs for one frame. Rebuilt in place
/// at the end of each `process`.
#[derive(Clone, Debug, Default)]
pub struct DrawState {
    pub time: FixedTime,
    pub step: i32,
    pub beat: i32,
    pub notes: Vec<DrawNote>,
    pub strums: [DrawStrum; NoteKey::COUNT],
    pub health: HealthFixed,
    pub health_scale: Fixed,
    pub icon_x: i32,
    pub icons: HealthIcons,
    pub score: ScoreDigits,
    pub combo: u32,
}

/* ================================= State ================================ */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayResult {
    /// Song time when play stopped.
    pub time: FixedTime,
    pub score: i32,
    pub max_combo: u32,
    pub counts: JudgementCounts,
    pub health: HealthFixed,
    pub player_notes: usize,
}

pub struct State {
    pub chart: Chart,
    pub track: u8,
    pub end_action: EndAction,
    pub song_started: bool,

    pub time: FixedTime,
    pub step_time_c: i32,
    pub step_time: FixedTime,
    pub step_length: FixedTime,
    pub step: i32,
    pub beat: i32,

    pub section_cursor: usize,
    pub note_cursor: usize,

    pub score: i32,
    pub score_digits: ScoreDigits,
    pub combo: u32,
    pub max_combo: u32,
    pub counts: JudgementCounts,
    pub health: HealthFixed,
    pub health_bumper: Bumper,

    pub strums: [Strum; NoteKey::COUNT],

    tracker: Arc<AudioTimeTracker>,
    audio: Box<dyn AudioControl>,
    rng: Random,
    draw: DrawState,
    log_timer: FixedTime,
}

/// Builds an idle engine around its audio collaborators. Nothing is playable
/// until [`start`] hands it a chart.
pub fn init(tracker: Arc<AudioTimeTracker>, audio: Box<dyn AudioControl>, seed: u32) -> State {
    info!("Initializing play state (seed {seed:#010x})...");
    State {
        chart: Chart {
            scroll: FixedTime::ZERO,
            sections: Vec::new(),
            notes: Vec::new(),
        },
        track: 0,
        end_action: EndAction::Stop,
        song_started: false,
        time: PRE_ROLL,
        step_time_c: 0,
        step_time: FixedTime::ZERO,
        step_length: FixedTime::ZERO,
        step: 0,
        beat: 0,
        section_cursor: 0,
        note_cursor: 0,
        score: 0,
        score_digits: ScoreDigits::default(),
        combo: 0,
        max_combo: 0,
        counts: JudgementCounts::default(),
        health: HEALTH_START,
        health_bumper: Bumper::default(),
        strums: [Strum::default(); NoteKey::COUNT],
        tracker,
        audio,
        rng: Random::new(seed),
        draw: DrawState::default(),
        log_timer: FixedTime::ZERO,
    }
}

/// Loads a chart to play on `track` and resets all session state. Calling it
/// again mid-song restarts from the pre-roll.
pub fn start(state: &mut State, chart: Chart, track: u8) -> Result<(), String> {
    chart.validate()?;
    info!(
        "Starting chart on track {track}: {} sections, {} notes.",
        chart.sections.len(),
        chart.notes.len()
    );
    let visible = chart.notes.len().min(256);
    state.draw.notes.clear();
    state.draw.notes.reserve(visible);
    state.chart = chart;
    state.track = track;
    reset(state);
    Ok(())
}

fn reset(state: &mut State) {
    state.time = PRE_ROLL;
    state.step = 0;
    state.beat = 0;
    set_section(state, 0);

    state.note_cursor = 0;
    state.chart.reset_status();

    state.score = 0;
    state.combo = 0;
    state.max_combo = 0;
    state.counts = JudgementCounts::default();
    state.health = HEALTH_START;
    state.health_bumper = Bumper::default();
    add_score(state, 0);

    for (i, strum) in state.strums.iter_mut().enumerate() {
        *strum = Strum {
            anim: STRUM_STATIC + (i & 3),
            splash: None,
            hold_health_remaining: HealthFixed::ZERO,
        };
    }

    state.song_started = false;
    state.log_timer = FixedTime::ZERO;
    state.audio.seek_track_start(state.track);
    debug!(
        "Play state reset: {} sections, {} notes",
        state.chart.sections.len(),
        state.chart.notes.len()
    );
}

/* =============================== Accessors ============================== */

#[inline(always)]
pub fn draw_state(state: &State) -> &DrawState {
    &state.draw
}

#[inline(always)]
pub fn current_section(state: &State) -> &Section {
    &state.chart.sections[state.section_cursor]
}

pub fn summary(state: &State) -> PlayResult {
    PlayResult {
        time: state.time,
        score: state.score,
        max_combo: state.max_combo,
        counts: state.counts,
        health: state.health,
        player_notes: state.chart.player_note_count(),
    }
}

/// True once the song's track has played out without looping.
pub fn song_ended(state: &State) -> bool {
    state.song_started && state.tracker.has_ended()
}

fn ctx(state: &State) -> HookCtx {
    HookCtx {
        time: state.time,
        step: state.step,
        beat: state.beat,
        section: *current_section(state),
        section_index: state.section_cursor,
        score: state.score,
        combo: state.combo,
        health: state.health,
    }
}

/* ============================ Step sequencing =========================== */

pub fn set_step(state: &mut State, step: i32, hooks: &mut dyn PlayHooks) {
    state.step = step;
    hooks.step_hit(&ctx(state));

    state.beat = step / STEPS_PER_BEAT;
    if step & (STEPS_PER_BEAT - 1) == 0 {
        state.health_bumper.bump(HEALTH_BUMP);
        hooks.beat_hit(&ctx(state));
    }
}

pub fn set_section(state: &mut State, index: usize) {
    let section = state.chart.sections[index];
    state.section_cursor = index;
    state.step_time_c = STEPS_PER_SECTION;
    state.step_time = section.time;
    state.step_length = section.step_length();
    if index != 0 {
        debug!(
            "Section {index} at {} (must hit: {})",
            section.time,
            section.must_hit()
        );
    }
}

pub fn process_time(state: &mut State, dt: FixedTime, hooks: &mut dyn PlayHooks) {
    if state.song_started {
        state.time = state.tracker.tick(dt);
    } else {
        state.time += dt;
        if state.time >= FixedTime::ZERO {
            state.time = FixedTime::ZERO;
            state.song_started = true;
            state
                .tracker
                .play_track(state.track, state.end_action, state.audio.as_mut());
        }
    }

    while state.time >= state.step_time {
        if state.step_time_c != 0 {
            // First step of a section snaps to the section's start.
            let next = if state.step_time_c == STEPS_PER_SECTION {
                state.section_cursor as i32 * STEPS_PER_SECTION
            } else {
                state.step + 1
            };
            set_step(state, next, hooks);
            state.step_time_c -= 1;
            state.step_time += state.step_length;
        } else {
            let next = state.section_cursor + 1;
            if next == state.chart.sections.len() {
                // Past the last section: keep stepping, one step per frame.
                set_step(state, state.step + 1, hooks);
                state.step_time += state.step_length;
                break;
            }
            if state.time < state.chart.sections[next].time {
                break;
            }
            set_section(state, next);
        }
    }
}

/* ================================= Input ================================ */

pub fn key_press(state: &mut State, key: NoteKey, hooks: &mut dyn PlayHooks) {
    let mut can_ghost_tap = true;

    for i in state.note_cursor..state.chart.notes.len() {
        let note = &state.chart.notes[i];
        if note.time - JUDGE_WINDOW > state.time {
            break;
        }
        if note.time + JUDGE_WINDOW < state.time {
            continue;
        }
        if note.status() != NoteStatus::None {
            continue;
        }
        // Any pending player note in range rules out a free press.
        if !note.key.is_opponent() {
            can_ghost_tap = false;
        }
        if note.key != key {
            continue;
        }
        note_hit(state, i, hooks);
        return;
    }

    state.strums[key.index()].anim = STRUM_PRESS + key.direction().index();

    if !can_ghost_tap {
        note_miss(state, key, hooks);
    }
}

pub fn key_hold(state: &mut State, key: NoteKey, dt: FixedTime) {
    let strum = &mut state.strums[key.index()];
    let drain = (dt * HOLD_HEALTH).min(strum.hold_health_remaining);
    strum.hold_health_remaining -= drain;
    state.health += drain;
}

pub fn key_release(state: &mut State, key: NoteKey, hooks: &mut dyn PlayHooks) {
    let strum = &mut state.strums[key.index()];
    strum.hold_health_remaining = HealthFixed::ZERO;
    strum.anim = STRUM_STATIC + key.direction().index();

    for i in state.note_cursor..state.chart.notes.len() {
        let note = &mut state.chart.notes[i];
        if note.time - JUDGE_WINDOW > state.time {
            break;
        }
        if note.status() != NoteStatus::Holding || note.key != key {
            continue;
        }
        if note.end() - JUDGE_WINDOW > state.time {
            note.set_status(NoteStatus::Miss);
            debug!("Hold at {} released early at {}", note.time, state.time);
            note_miss(state, key, hooks);
        } else {
            note.set_status(NoteStatus::Hit);
        }
    }
}

pub fn process_keys(state: &mut State, dt: FixedTime, pad: &PadState, hooks: &mut dyn PlayHooks) {
    for dir in Direction::ALL {
        if pad.pressed(lane_buttons(dir.index())) {
            key_press(state, NoteKey::player(dir), hooks);
        }
    }
    for dir in Direction::ALL {
        if pad.is_held(lane_buttons(dir.index())) {
            key_hold(state, NoteKey::player(dir), dt);
        }
    }
    for dir in Direction::ALL {
        if pad.released(lane_buttons(dir.index())) {
            key_release(state, NoteKey::player(dir), hooks);
        }
    }
}

/* ============================ Note resolution =========================== */

pub fn process_notes(state: &mut State, hooks: &mut dyn PlayHooks) {
    for i in state.note_cursor..state.chart.notes.len() {
        let note = &mut state.chart.notes[i];
        if note.time > state.time {
            break;
        }
        match note.status() {
            NoteStatus::Holding => {
                if note.end() < state.time {
                    note.set_status(NoteStatus::Hit);
                }
            }
            NoteStatus::None => {
                if note.key.is_opponent() {
                    note_hit(state, i, hooks);
                } else if note.time + JUDGE_WINDOW < state.time {
                    note.set_status(NoteStatus::Miss);
                    let key = note.key;
                    debug!("Missed note at {} (now {})", note.time, state.time);
                    note_miss(state, key, hooks);
                }
            }
            NoteStatus::Miss | NoteStatus::Hit => {}
        }
    }
}

pub fn note_hit(state: &mut State, index: usize, hooks: &mut dyn PlayHooks) {
    let note: Note = {
        let note = &mut state.chart.notes[index];
        let status = if note.is_hold() { NoteStatus::Holding } else { NoteStatus::Hit };
        note.set_status(status);
        *note
    };
    let key = note.key;
    let dir = key.direction().index();

    if !key.is_opponent() {
        state.combo += 1;
        state.max_combo = state.max_combo.max(state.combo);

        let judgement = judgment::judge(state.time - note.time);
        state.counts.record(judgement);
        add_score(state, judgement.score());

        let strum = &mut state.strums[key.index()];
        if note.is_hold() {
            strum.hold_health_remaining = note.length * HOLD_HEALTH;
        } else {
            state.health += judgement.tap_health();
        }
        strum.anim = STRUM_CONFIRM + dir;

        if judgement == Judgement::Sick {
            let variant = state.rng.range(0, 1) as usize;
            strum.splash = Some(Splash {
                anim: variant * 4 + dir,
                age: FixedTime::ZERO,
            });
        }
        debug!(
            "{} on {:?} (error {}), combo {}",
            judgement.name(),
            key.direction(),
            state.time - note.time,
            state.combo
        );

        hooks.show_combo(&ctx(state), judgement);
    }

    hooks.note_hit(&ctx(state), &note);
}

pub fn note_miss(state: &mut State, key: NoteKey, hooks: &mut dyn PlayHooks) {
    add_score(state, MISS_SCORE);
    state.health += MISS_HEALTH;
    state.counts.record_miss();

    if state.combo != 0 {
        state.combo = 0;
        hooks.show_combo(&ctx(state), Judgement::Shit);
    }

    hooks.note_miss(&ctx(state), key);
}

fn add_score(state: &mut State, delta: i32) {
    state.score += delta;
    state.score_digits = ScoreDigits::new(state.score);
}

/* ============================ Cull + snapshot =========================== */

#[inline(always)]
fn scroll_y(at: FixedTime, now: FixedTime, scroll: Fixed) -> i32 {
    let px = (i64::from((at - now).raw()) * i64::from(scroll.raw())) >> (2 * FRAC_BITS);
    NOTE_Y + px.clamp(-(1 << 24), 1 << 24) as i32
}

/// Walks the visible notes, advancing the cursor past hit notes and past
/// missed notes that have scrolled off the top, and records what is left
/// on screen into the draw snapshot.
pub fn cull_notes(state: &mut State) {
    state.draw.notes.clear();
    let scroll = state.chart.scroll;

    for i in state.note_cursor..state.chart.notes.len() {
        let note = &state.chart.notes[i];
        let status = note.status();
        if status == NoteStatus::Hit {
            if state.note_cursor == i {
                state.note_cursor += 1;
            }
            continue;
        }

        let start_y = scroll_y(note.time, state.time, scroll);
        let end_y = if note.is_hold() {
            scroll_y(note.end(), state.time, scroll)
        } else {
            start_y
        };

        if end_y < -NOTE_CULL && status == NoteStatus::Miss {
            if state.note_cursor == i {
                state.note_cursor += 1;
            }
            continue;
        }
        if start_y > NOTE_CULL {
            break;
        }

        let holding = status == NoteStatus::Holding;
        let (y, tail_y) = if note.is_hold() {
            let y = if holding { NOTE_Y } else { start_y.max(-NOTE_CULL) };
            (y, Some(end_y.min(NOTE_CULL)))
        } else {
            (start_y, None)
        };
        state.draw.notes.push(DrawNote {
            key: note.key,
            x: NOTE_X[note.key.index()],
            y,
            head_visible: !holding,
            tail_y,
            dimmed: status == NoteStatus::Miss,
        });
    }
}

fn tick_strums(state: &mut State, dt: FixedTime) {
    for strum in &mut state.strums {
        if let Some(splash) = &mut strum.splash {
            splash.age += dt;
            if splash.age >= SPLASH_DURATION {
                strum.splash = None;
            }
        }
    }
}

fn snapshot(state: &mut State) {
    let draw = &mut state.draw;
    draw.time = state.time;
    draw.step = state.step;
    draw.beat = state.beat;
    for (i, (out, strum)) in draw.strums.iter_mut().zip(&state.strums).enumerate() {
        *out = DrawStrum {
            x: NOTE_X[i],
            anim: strum.anim,
            splash: strum.splash.map(|s| s.anim),
        };
    }
    draw.health = state.health;
    draw.health_scale = Fixed::ONE + state.health_bumper.get();
    draw.icon_x = ((state.health - Fixed::ONE) * -HEALTH_W).trunc_int();
    draw.icons = health_icons(state.health);
    draw.score = state.score_digits;
    draw.combo = state.combo;
}

/* ================================= Frame ================================ */

/// One frame: time, input, note sweep, cull, health clamp, snapshot.
pub fn process(state: &mut State, dt: FixedTime, pad: &PadState, hooks: &mut dyn PlayHooks) {
    state.audio.poll(dt, &state.tracker);

    process_time(state, dt, hooks);
    process_keys(state, dt, pad, hooks);
    process_notes(state, hooks);

    cull_notes(state);
    tick_strums(state, dt);

    state.health = clamp_health(state.health);
    snapshot(state);
    state.health_bumper.process(dt);

    state.log_timer += dt;
    if state.log_timer >= FixedTime::ONE {
        info!(
            "Step: {}, Beat: {}, Time: {}, Score: {}, Combo: {}, Health: {}",
            state.step, state.beat, state.time, state.score, state.combo, state.health
        );
        state.log_timer -= FixedTime::ONE;
    }
}

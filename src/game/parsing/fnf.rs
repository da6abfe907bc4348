// Compiler for the JSON chart format of the PC game.
//
// Times in the source are milliseconds. A section is always 16 steps of the
// tempo in effect, and note ownership in the source is relative to the
// section's `mustHitSection`, so it gets flipped back to absolute here.

use crate::core::fixed::Fixed;
use crate::game::chart::{Chart, Difficulty, Note, NoteFlags, Section, SectionFlags, STEPS_PER_SECTION};
use log::{debug, info};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use serde_json::Value;

// Base scroll of 0.45 px/ms, scaled from the 720p source to a 200 px field.
const BASE_SCROLL: f64 = 0.45 * 1000.0 * 200.0 / 720.0;

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(v) => v,
            Self::One(v) => vec![v],
        }
    }
}

#[derive(Deserialize)]
struct SongFile {
    song: SongInfo,
}

#[derive(Deserialize)]
struct SongInfo {
    bpm: f64,
    speed: OneOrMany<f64>,
    notes: OneOrMany<Vec<SourceSection>>,
}

#[derive(Deserialize)]
struct SourceSection {
    #[serde(rename = "mustHitSection", default)]
    must_hit: bool,
    #[serde(rename = "altAnim", default)]
    alt_anim: bool,
    #[serde(rename = "changeBPM", default)]
    change_bpm: bool,
    #[serde(default)]
    bpm: Option<f64>,
    #[serde(rename = "sectionNotes", default)]
    notes: Vec<Vec<Value>>,
}

#[inline(always)]
fn crochet(bpm: f64) -> f64 {
    60.0 * 1000.0 / 4.0 / bpm
}

#[inline(always)]
fn ms_to_fixed(ms: f64) -> Fixed {
    Fixed::from_f64(ms / 1000.0)
}

/// Compiles every difficulty present in `source`. Difficulties are ordered
/// the way they appear in the file (hard, easy, normal).
pub fn compile(source: &str) -> Result<Vec<Chart>, String> {
    let file: SongFile =
        serde_json::from_str(source).map_err(|e| format!("Failed to parse chart JSON: {e}"))?;
    let info = file.song;
    if !(info.bpm > 0.0) {
        return Err(format!("Invalid song bpm {}", info.bpm));
    }
    let speeds = info.speed.into_vec();
    let singles = info.notes.into_vec();

    let mut charts = Vec::with_capacity(singles.len());
    for (i, sections) in singles.iter().enumerate() {
        let speed = speeds
            .get(i)
            .or(speeds.last())
            .copied()
            .ok_or_else(|| "Chart has no scroll speed".to_string())?;
        let chart = compile_single(info.bpm, speed, sections)?;
        debug!(
            "Compiled difficulty {i}: {} sections, {} notes",
            chart.sections.len(),
            chart.notes.len()
        );
        charts.push(chart);
    }
    if charts.is_empty() {
        return Err("Chart has no note data".to_string());
    }
    info!("Compiled {} chart difficulties.", charts.len());
    Ok(charts)
}

/// Picks a difficulty, falling back to the first chart for single-chart files.
pub fn select(charts: Vec<Chart>, difficulty: Difficulty) -> Option<Chart> {
    let idx = if difficulty.index() < charts.len() { difficulty.index() } else { 0 };
    charts.into_iter().nth(idx)
}

fn compile_single(bpm: f64, speed: f64, source: &[SourceSection]) -> Result<Chart, String> {
    let mut bpm = bpm;
    let mut step_ms = crochet(bpm);
    let mut milli = 0.0;

    let mut sections = Vec::with_capacity(source.len());
    let mut notes: Vec<Note> = Vec::new();
    let mut seen: FxHashSet<(i32, i32, u8)> = FxHashSet::default();

    for (si, section) in source.iter().enumerate() {
        if section.change_bpm {
            if let Some(new_bpm) = section.bpm.filter(|b| *b > 0.0) {
                bpm = new_bpm;
                step_ms = crochet(bpm);
                debug!("Section {si}: tempo change to {bpm} bpm");
            }
        }
        let length = step_ms * f64::from(STEPS_PER_SECTION);
        let mut flags = SectionFlags::empty();
        flags.set(SectionFlags::MUST_HIT, section.must_hit);
        // Length is derived from the converted end points so sections stay
        // exactly contiguous after rounding.
        let time = ms_to_fixed(milli);
        milli += length;
        sections.push(Section {
            time,
            length: ms_to_fixed(milli) - time,
            flags,
        });

        for raw in &section.notes {
            let note = parse_note(raw, step_ms, section)
                .map_err(|e| format!("Section {si}: {e}"))?;
            // Duplicates and ordering are judged on the engine's time base.
            if seen.insert((note.time.raw(), note.length.raw(), note.flags().bits())) {
                notes.push(note);
            }
        }
    }

    notes.sort_by_key(|n| (n.time, n.flags().bits()));

    Ok(Chart {
        scroll: Fixed::from_f64(speed * BASE_SCROLL),
        sections,
        notes,
    })
}

fn parse_note(raw: &[Value], step_ms: f64, section: &SourceSection) -> Result<Note, String> {
    let time = raw
        .first()
        .and_then(Value::as_f64)
        .ok_or_else(|| format!("note {raw:?} has no time"))?;
    let lane = raw
        .get(1)
        .and_then(Value::as_i64)
        .ok_or_else(|| format!("note {raw:?} has no lane"))?;
    let length = raw.get(2).and_then(Value::as_f64).unwrap_or(0.0).max(0.0);

    // Lanes 0..4 belong to whoever owns the section, 4..8 to the other side.
    let mut flags = NoteFlags::from_bits_truncate((lane & 0b111) as u8);
    if !section.must_hit {
        flags.toggle(NoteFlags::OPPONENT);
    }
    if raw.get(3) == Some(&Value::Bool(true)) {
        flags.insert(NoteFlags::ALT_ANIM);
    }
    if flags.contains(NoteFlags::OPPONENT) && section.alt_anim {
        flags.insert(NoteFlags::ALT_ANIM);
    }

    // Holds snap down to whole steps.
    let length = (length / step_ms).floor() * step_ms;
    Ok(Note::from_flags(ms_to_fixed(time), ms_to_fixed(length), flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::chart::{Direction, NoteKey};

    const SONG: &str = r#"{
        "song": {
            "bpm": 150,
            "speed": [2.0, 1.0, 1.5],
            "notes": [
                [
                    { "mustHitSection": true, "sectionNotes": [[400, 1, 0], [0, 2, 250], [0, 2, 250], [0, 5, 0]] },
                    { "mustHitSection": false, "altAnim": true, "sectionNotes": [[1600, 0, 0], [1700, 4, 0, true]] },
                    { "mustHitSection": true, "changeBPM": true, "bpm": 75, "sectionNotes": [] }
                ],
                [
                    { "mustHitSection": true, "sectionNotes": [[0, 0, 0]] }
                ]
            ]
        }
    }"#;

    fn ms(v: f64) -> Fixed {
        ms_to_fixed(v)
    }

    #[test]
    fn sections_follow_tempo_changes() {
        let charts = compile(SONG).expect("compile");
        assert_eq!(charts.len(), 2);
        let hard = &charts[0];
        // 150 bpm: 100 ms per step, 1600 ms per section.
        assert_eq!(hard.sections[0].length, ms(1600.0));
        assert_eq!(hard.sections[1].time, ms(1600.0));
        assert_eq!(hard.sections[2].time, ms(3200.0));
        assert_eq!(hard.sections[2].length, ms(3200.0), "75 bpm doubles the section");
        assert!(hard.sections[0].must_hit());
        assert!(!hard.sections[1].must_hit());
    }

    #[test]
    fn notes_are_deduplicated_sorted_and_owned() {
        let charts = compile(SONG).expect("compile");
        let notes = &charts[0].notes;
        assert_eq!(notes.len(), 5, "exact duplicate must be dropped");
        assert_eq!(notes[0].key, NoteKey::player(Direction::Up));
        assert_eq!(notes[0].length, ms(200.0), "250 ms hold snaps to two steps");
        assert_eq!(notes[1].key, NoteKey::opponent(Direction::Down));
        assert_eq!(notes[2].time, ms(400.0));

        // Ownership flips in a section the player does not own.
        assert_eq!(notes[3].key, NoteKey::opponent(Direction::Left));
        assert!(notes[3].alt_anim, "section alt anim applies to opponent notes");
        assert_eq!(notes[4].key, NoteKey::player(Direction::Left));
        assert!(notes[4].alt_anim, "explicit alt flag");
    }

    #[test]
    fn scroll_speed_per_difficulty() {
        let charts = compile(SONG).expect("compile");
        assert_eq!(charts[0].scroll, Fixed::from_f64(2.0 * BASE_SCROLL));
        assert_eq!(charts[1].scroll, Fixed::from_f64(1.0 * BASE_SCROLL));
        let normal = select(charts, Difficulty::Normal).expect("fallback");
        assert_eq!(normal.notes.len(), 5, "missing difficulty falls back to the first chart");
    }

    #[test]
    fn compiled_charts_validate() {
        for chart in compile(SONG).expect("compile") {
            chart.validate().expect("compiled chart must satisfy engine invariants");
        }
    }

    #[test]
    fn near_simultaneous_notes_sort_on_fixed_time() {
        // 1 us apart in the source, identical once converted; the lane order
        // must then decide, not the source order.
        let single = r#"{"song":{"bpm":100,"speed":1,"notes":[
            {"mustHitSection":true,"sectionNotes":[[1000.001,0,0],[1000.0,3,0],[1000.0005,3,0]]}
        ]}}"#;
        let chart = compile(single).expect("compile").remove(0);
        chart.validate().expect("compiled chart must validate");
        assert_eq!(chart.notes.len(), 2, "notes equal after conversion collapse");
        assert_eq!(chart.notes[0].time, chart.notes[1].time);
        assert_eq!(chart.notes[0].key, NoteKey::player(Direction::Left));
        assert_eq!(chart.notes[1].key, NoteKey::player(Direction::Right));
    }

    #[test]
    fn bad_input_is_reported() {
        assert!(compile("{").is_err());
        assert!(compile(r#"{"song":{"bpm":0,"speed":1,"notes":[]}}"#).is_err());
        let single = r#"{"song":{"bpm":100,"speed":1.2,"notes":[{"sectionNotes":[[0,"x"]]}]}}"#;
        assert!(compile(single).is_err());
    }
}

use crate::core::fixed::{Fixed, FixedTime};
use crate::core::input::{PadButton, lane_buttons};
use crate::game::chart::Chart;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

// Tap notes are held for this long when a replay is generated from a chart.
const AUTOPLAY_TAP_HOLD: f64 = 2.0 / 30.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayButton {
    Left,
    Down,
    Up,
    Right,
    Start,
    Select,
}

impl ReplayButton {
    pub fn pad_mask(self) -> PadButton {
        match self {
            Self::Left => lane_buttons(0),
            Self::Down => lane_buttons(1),
            Self::Up => lane_buttons(2),
            Self::Right => lane_buttons(3),
            Self::Start => PadButton::START,
            Self::Select => PadButton::SELECT,
        }
    }

    const LANES: [Self; 4] = [Self::Left, Self::Down, Self::Up, Self::Right];
}

/// One button edge, in song seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayEvent {
    pub time: f64,
    pub button: ReplayButton,
    pub pressed: bool,
}

/// Scripted pad input for a headless session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Replay {
    #[serde(default)]
    pub seed: Option<u32>,
    #[serde(default)]
    pub events: Vec<ReplayEvent>,
}

impl Replay {
    pub fn from_json(source: &str) -> Result<Self, String> {
        let mut replay: Self =
            serde_json::from_str(source).map_err(|e| format!("Failed to parse replay: {e}"))?;
        if let Some(e) = replay.events.iter().find(|e| !e.time.is_finite()) {
            return Err(format!("Replay event for {:?} has no valid time", e.button));
        }
        replay.events.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(replay)
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read replay '{}': {e}", path.display()))?;
        let replay = Self::from_json(&source)?;
        info!("Loaded replay '{}' ({} events).", path.display(), replay.events.len());
        Ok(replay)
    }

    /// Presses every player note dead on time and holds through its tail.
    pub fn autoplay(chart: &Chart) -> Self {
        let mut events = Vec::with_capacity(chart.player_note_count() * 2);
        for note in chart.notes.iter().filter(|n| !n.key.is_opponent()) {
            let button = ReplayButton::LANES[note.key.direction().index()];
            let start = note.time.to_f64();
            let end = if note.is_hold() {
                note.end().to_f64()
            } else {
                start + AUTOPLAY_TAP_HOLD
            };
            events.push(ReplayEvent { time: start, button, pressed: true });
            events.push(ReplayEvent { time: end, button, pressed: false });
        }
        // Releases sort ahead of presses at the same instant.
        events.sort_by(|a, b| a.time.total_cmp(&b.time).then(a.pressed.cmp(&b.pressed)));
        Self { seed: None, events }
    }

    pub fn cursor(&self) -> ReplayCursor<'_> {
        ReplayCursor {
            events: &self.events,
            next: 0,
            held: PadButton::empty(),
        }
    }
}

/// Replays events in order, producing the held mask at a given song time.
#[derive(Debug)]
pub struct ReplayCursor<'a> {
    events: &'a [ReplayEvent],
    next: usize,
    held: PadButton,
}

impl ReplayCursor<'_> {
    /// Applies the events at or before `time`. Time must not go backwards.
    ///
    /// A button changes at most once per call; a second edge for it (a tap
    /// shorter than a frame) waits for the next call, along with everything
    /// queued behind it, so the pad still sees both edges.
    pub fn held_at(&mut self, time: FixedTime) -> PadButton {
        let mut touched = PadButton::empty();
        while let Some(event) = self.events.get(self.next) {
            if Fixed::from_f64(event.time) > time {
                break;
            }
            let mask = event.button.pad_mask();
            if touched.intersects(mask) {
                break;
            }
            touched |= mask;
            self.held.set(mask, event.pressed);
            self.next += 1;
        }
        self.held
    }

    pub fn finished(&self) -> bool {
        self.next >= self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::Pad;
    use crate::game::chart::{Direction, Note, NoteKey, Section, SectionFlags};

    const SCRIPT: &str = r#"{
        "seed": 99,
        "events": [
            { "time": 1.5, "button": "left", "pressed": false },
            { "time": 1.0, "button": "left", "pressed": true },
            { "time": 2.0, "button": "start", "pressed": true }
        ]
    }"#;

    #[test]
    fn parsed_events_are_time_ordered() {
        let replay = Replay::from_json(SCRIPT).expect("parse");
        assert_eq!(replay.seed, Some(99));
        assert_eq!(replay.events[0].time, 1.0);
        assert!(Replay::from_json(r#"{"events":[{"time":1,"button":"jump","pressed":true}]}"#).is_err());
    }

    #[test]
    fn cursor_tracks_held_buttons() {
        let replay = Replay::from_json(SCRIPT).expect("parse");
        let mut cursor = replay.cursor();
        assert!(cursor.held_at(Fixed::from_f64(0.5)).is_empty());
        assert_eq!(cursor.held_at(Fixed::ONE), lane_buttons(0));
        assert!(cursor.held_at(Fixed::from_f64(1.75)).is_empty());
        assert_eq!(cursor.held_at(Fixed::from_int(3)), PadButton::START);
        assert!(cursor.finished());
    }

    #[test]
    fn sub_frame_edges_carry_into_the_next_frame() {
        let replay = Replay::from_json(
            r#"{"events":[
                { "time": 1.0, "button": "left", "pressed": true },
                { "time": 1.005, "button": "left", "pressed": false },
                { "time": 1.01, "button": "left", "pressed": true },
                { "time": 1.01, "button": "up", "pressed": true }
            ]}"#,
        )
        .expect("parse");
        let mut cursor = replay.cursor();
        let mut pad = Pad::new();
        let frame = Fixed::from_f64(1.02);

        let first = pad.poll(cursor.held_at(frame));
        assert!(first.pressed(lane_buttons(0)), "the tap is not swallowed");
        let second = pad.poll(cursor.held_at(frame));
        assert!(second.released(lane_buttons(0)));
        let third = pad.poll(cursor.held_at(frame));
        assert!(third.pressed(lane_buttons(0)), "the re-press gets its own edge");
        assert!(third.pressed(lane_buttons(2)));
        assert!(cursor.finished());
    }

    #[test]
    fn autoplay_covers_player_notes_only() {
        let chart = Chart {
            scroll: Fixed::from_int(250),
            sections: vec![Section {
                time: Fixed::ZERO,
                length: Fixed::from_int(2),
                flags: SectionFlags::MUST_HIT,
            }],
            notes: vec![
                Note::new(Fixed::ONE, Fixed::ZERO, NoteKey::player(Direction::Up), false),
                Note::new(Fixed::ONE, Fixed::ZERO, NoteKey::opponent(Direction::Up), false),
                Note::new(Fixed::from_f64(1.5), Fixed::from_f64(0.25), NoteKey::player(Direction::Right), false),
            ],
        };
        let replay = Replay::autoplay(&chart);
        assert_eq!(replay.events.len(), 4);
        assert_eq!(replay.events[0].button, ReplayButton::Up);
        let last = replay.events[3];
        assert_eq!(last.button, ReplayButton::Right);
        assert!(!last.pressed);
        assert_eq!(last.time, Fixed::from_f64(1.75).to_f64());

        let json = serde_json::to_string_pretty(&replay).expect("encode");
        assert_eq!(Replay::from_json(&json).expect("decode"), replay);
    }
}

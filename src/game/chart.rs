use crate::core::fixed::FixedTime;
use bitflags::bitflags;
use std::fmt;
use std::str::FromStr;

pub const STEPS_PER_SECTION: i32 = 16;
pub const STEPS_PER_BEAT: i32 = 4;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SectionFlags: u32 {
        /// The player owns this section; the camera favours their side.
        const MUST_HIT = 1 << 0;
    }
}

bitflags! {
    /// Packed note type byte as stored in chart blobs.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NoteFlags: u8 {
        const DIRECTION = 0b0011;
        const OPPONENT  = 1 << 2;
        const ALT_ANIM  = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Section {
    pub time: FixedTime,
    pub length: FixedTime,
    pub flags: SectionFlags,
}

impl Section {
    #[inline(always)]
    pub fn end(&self) -> FixedTime {
        self.time + self.length
    }

    #[inline(always)]
    pub fn step_length(&self) -> FixedTime {
        self.length / STEPS_PER_SECTION
    }

    #[inline(always)]
    pub fn must_hit(&self) -> bool {
        self.flags.contains(SectionFlags::MUST_HIT)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    Left = 0,
    Down = 1,
    Up = 2,
    Right = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Self::Left, Self::Down, Self::Up, Self::Right];

    #[inline(always)]
    pub const fn from_index(i: usize) -> Self {
        Self::ALL[i & 3]
    }

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Direction plus owner. Player keys are 0..4, opponent keys 4..8.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteKey(u8);

impl NoteKey {
    pub const COUNT: usize = 8;
    const OPPONENT_BIT: u8 = 1 << 2;

    #[inline(always)]
    pub const fn new(direction: Direction, opponent: bool) -> Self {
        let owner = if opponent { Self::OPPONENT_BIT } else { 0 };
        Self(direction as u8 | owner)
    }

    #[inline(always)]
    pub const fn player(direction: Direction) -> Self {
        Self::new(direction, false)
    }

    #[cfg(test)]
    pub const fn opponent(direction: Direction) -> Self {
        Self::new(direction, true)
    }

    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline(always)]
    pub const fn direction(self) -> Direction {
        Direction::from_index((self.0 & 3) as usize)
    }

    #[inline(always)]
    pub const fn is_opponent(self) -> bool {
        self.0 & Self::OPPONENT_BIT != 0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NoteStatus {
    #[default]
    None,
    Holding,
    Miss,
    Hit,
}

impl NoteStatus {
    #[inline(always)]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Miss | Self::Hit)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Note {
    pub time: FixedTime,
    /// Zero for taps.
    pub length: FixedTime,
    pub key: NoteKey,
    pub alt_anim: bool,
    status: NoteStatus,
}

impl Note {
    pub const fn new(time: FixedTime, length: FixedTime, key: NoteKey, alt_anim: bool) -> Self {
        Self {
            time,
            length,
            key,
            alt_anim,
            status: NoteStatus::None,
        }
    }

    pub fn from_flags(time: FixedTime, length: FixedTime, flags: NoteFlags) -> Self {
        let direction = Direction::from_index((flags & NoteFlags::DIRECTION).bits() as usize);
        Self::new(
            time,
            length,
            NoteKey::new(direction, flags.contains(NoteFlags::OPPONENT)),
            flags.contains(NoteFlags::ALT_ANIM),
        )
    }

    pub fn flags(&self) -> NoteFlags {
        let mut flags = NoteFlags::from_bits_truncate(self.key.direction() as u8);
        flags.set(NoteFlags::OPPONENT, self.key.is_opponent());
        flags.set(NoteFlags::ALT_ANIM, self.alt_anim);
        flags
    }

    #[inline(always)]
    pub const fn status(&self) -> NoteStatus {
        self.status
    }

    #[inline(always)]
    pub const fn is_hold(&self) -> bool {
        self.length.raw() != 0
    }

    #[inline(always)]
    pub fn end(&self) -> FixedTime {
        self.time + self.length
    }

    /// Moves the note forward in its lifecycle. Hit and Miss are final: a
    /// write from either is refused and reported as `false`.
    pub fn set_status(&mut self, status: NoteStatus) -> bool {
        debug_assert!(
            !self.status.is_terminal(),
            "note at {} already resolved as {:?}",
            self.time,
            self.status
        );
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }

    fn clear_status(&mut self) {
        self.status = NoteStatus::None;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chart {
    /// Pixels per second.
    pub scroll: FixedTime,
    pub sections: Vec<Section>,
    pub notes: Vec<Note>,
}

impl Chart {
    /// Checks the ordering and contiguity guarantees the engine relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.sections.is_empty() {
            return Err("chart has no sections".to_string());
        }
        for (i, pair) in self.sections.windows(2).enumerate() {
            if pair[1].time != pair[0].end() {
                return Err(format!(
                    "section {} starts at {} but section {} ends at {}",
                    i + 1,
                    pair[1].time,
                    i,
                    pair[0].end()
                ));
            }
        }
        for (i, pair) in self.notes.windows(2).enumerate() {
            let (a, b) = (&pair[0], &pair[1]);
            let ordered = a.time < b.time || (a.time == b.time && a.flags().bits() <= b.flags().bits());
            if !ordered {
                return Err(format!("note {} at {} sorts after note {} at {}", i, a.time, i + 1, b.time));
            }
        }
        if let Some(n) = self.notes.iter().find(|n| n.length.is_negative()) {
            return Err(format!("note at {} has negative length {}", n.time, n.length));
        }
        Ok(())
    }

    pub fn reset_status(&mut self) {
        for note in &mut self.notes {
            note.clear_status();
        }
    }

    /// Time of the last authored event, whichever ends later.
    pub fn end_time(&self) -> FixedTime {
        let sections = self.sections.last().map_or(FixedTime::ZERO, Section::end);
        let notes = self.notes.iter().map(Note::end).max().unwrap_or(FixedTime::ZERO);
        sections.max(notes)
    }

    pub fn player_note_count(&self) -> usize {
        self.notes.iter().filter(|n| !n.key.is_opponent()).count()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Difficulty {
    #[default]
    Hard = 0,
    Easy = 1,
    Normal = 2,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Self::Hard, Self::Easy, Self::Normal];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Easy => "easy",
            Self::Normal => "normal",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hard" => Ok(Self::Hard),
            "easy" => Ok(Self::Easy),
            "normal" => Ok(Self::Normal),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(v: f64) -> FixedTime {
        FixedTime::from_f64(v)
    }

    fn section(time: f64, length: f64) -> Section {
        Section {
            time: secs(time),
            length: secs(length),
            flags: SectionFlags::MUST_HIT,
        }
    }

    #[test]
    fn note_key_packs_direction_and_owner() {
        let k = NoteKey::opponent(Direction::Up);
        assert_eq!(k.index(), 6);
        assert!(k.is_opponent());
        assert_eq!(k.direction(), Direction::Up);
        assert_eq!(NoteKey::new(Direction::Down, false).index(), 1);
    }

    #[test]
    fn flags_round_trip_through_note() {
        let flags = NoteFlags::OPPONENT | NoteFlags::ALT_ANIM | NoteFlags::from_bits_truncate(3);
        let note = Note::from_flags(secs(1.0), FixedTime::ZERO, flags);
        assert_eq!(note.key, NoteKey::opponent(Direction::Right));
        assert!(note.alt_anim);
        assert_eq!(note.flags(), flags);
    }

    #[test]
    fn status_moves_forward_only() {
        let mut note = Note::new(secs(1.0), secs(0.5), NoteKey::player(Direction::Left), false);
        assert!(note.set_status(NoteStatus::Holding));
        assert!(note.set_status(NoteStatus::Hit));
        assert_eq!(note.status(), NoteStatus::Hit);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "already resolved")]
    fn rewriting_terminal_status_is_caught() {
        let mut note = Note::new(secs(1.0), FixedTime::ZERO, NoteKey::player(Direction::Left), false);
        note.set_status(NoteStatus::Miss);
        note.set_status(NoteStatus::Hit);
    }

    #[test]
    fn validate_rejects_gaps_and_unsorted_notes() {
        let mut chart = Chart {
            scroll: FixedTime::from_int(100),
            sections: vec![section(0.0, 2.0), section(2.0, 2.0)],
            notes: vec![
                Note::new(secs(1.0), FixedTime::ZERO, NoteKey::player(Direction::Left), false),
                Note::new(secs(1.0), FixedTime::ZERO, NoteKey::player(Direction::Up), false),
            ],
        };
        assert!(chart.validate().is_ok());

        chart.sections[1].time = secs(2.5);
        assert!(chart.validate().is_err(), "gap between sections must be rejected");
        chart.sections[1].time = secs(2.0);

        chart.notes.swap(0, 1);
        assert!(chart.validate().is_err(), "same-time notes must sort by type");
    }

    #[test]
    fn reset_and_end_time() {
        let mut chart = Chart {
            scroll: FixedTime::from_int(100),
            sections: vec![section(0.0, 2.0)],
            notes: vec![Note::new(secs(1.5), secs(1.0), NoteKey::player(Direction::Left), false)],
        };
        chart.notes[0].set_status(NoteStatus::Holding);
        chart.notes[0].set_status(NoteStatus::Miss);
        chart.reset_status();
        assert_eq!(chart.notes[0].status(), NoteStatus::None);
        assert_eq!(chart.end_time(), secs(2.5));
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("Normal".parse::<Difficulty>(), Ok(Difficulty::Normal));
        assert_eq!(Difficulty::Easy.index(), 1);
        assert!("expert".parse::<Difficulty>().is_err());
    }
}

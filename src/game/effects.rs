use crate::core::fixed::{Fixed, FixedTime};
use crate::core::random::Random;
use crate::game::judgment::Judgement;
use smallvec::SmallVec;

/* ============================== Combo popup ============================== */

const POPUP_DELAY: FixedTime = Fixed::from_f64(-0.4);
// Rows of the piece eaten per second once the delay runs out.
const TRIM_RATE: i32 = 80;
const GRAVITY: i32 = 180;

pub const JUDGEMENT_PIECE_HEIGHT: u32 = 32;
pub const DIGIT_PIECE_HEIGHT: u32 = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComboGlyph {
    Judgement(Judgement),
    Digit(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComboPiece {
    pub glyph: ComboGlyph,
    pub x: Fixed,
    pub y: Fixed,
    xsp: Fixed,
    ysp: Fixed,
    pub height: u32,
}

impl ComboPiece {
    fn new(glyph: ComboGlyph, x: i32, y: i32, height: u32, rng: &mut Random) -> Self {
        Self {
            glyph,
            x: Fixed::from_int(x),
            y: Fixed::from_int(y),
            xsp: rng.range_fixed(Fixed::from_int(-2), Fixed::from_int(2)),
            ysp: rng.range_fixed(Fixed::from_int(-66), Fixed::from_int(-48)),
            height,
        }
    }

    #[inline(always)]
    pub const fn is_trimmed(&self, trim: u32) -> bool {
        trim >= self.height
    }

    fn process(&mut self, dt: FixedTime, trim: u32) {
        if self.is_trimmed(trim) {
            return;
        }
        self.x += self.xsp * dt;
        self.y += self.ysp * dt;
        self.ysp += dt * GRAVITY;
    }
}

/// Judgement word plus, for long combos and combo breaks, three digits.
/// Pieces hop up, fall, and are eaten from the bottom after a short delay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComboPopup {
    time: FixedTime,
    pieces: SmallVec<[ComboPiece; 4]>,
}

impl ComboPopup {
    pub fn new(combo: u32, judgement: Judgement, rng: &mut Random) -> Self {
        let mut pieces = SmallVec::new();
        pieces.push(ComboPiece::new(
            ComboGlyph::Judgement(judgement),
            0,
            -32,
            JUDGEMENT_PIECE_HEIGHT,
            rng,
        ));
        if combo == 0 || combo >= 10 {
            for (i, div) in [100u32, 10, 1].into_iter().enumerate() {
                let digit = ((combo / div) % 10) as u8;
                pieces.push(ComboPiece::new(
                    ComboGlyph::Digit(digit),
                    -32 + i as i32 * 13,
                    0,
                    DIGIT_PIECE_HEIGHT,
                    rng,
                ));
            }
        }
        Self {
            time: POPUP_DELAY,
            pieces,
        }
    }

    /// Rows trimmed off the bottom of every piece.
    pub fn trim(&self) -> u32 {
        if self.time > FixedTime::ZERO {
            self.time.mul_int(TRIM_RATE).floor_int().max(0) as u32
        } else {
            0
        }
    }

    pub fn pieces(&self) -> &[ComboPiece] {
        &self.pieces
    }

    /// Returns false once every piece is fully trimmed.
    fn process(&mut self, dt: FixedTime) -> bool {
        self.time += dt;
        let trim = self.trim();
        for piece in &mut self.pieces {
            piece.process(dt, trim);
        }
        !self.pieces.iter().all(|p| p.is_trimmed(trim))
    }
}

/* ================================ Arena ================================= */

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Combo(ComboPopup),
}

impl Effect {
    fn process(&mut self, dt: FixedTime) -> bool {
        match self {
            Self::Combo(popup) => popup.process(dt),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EffectId(usize);

/// Slot storage for transient effects. Ids stay valid until the effect
/// expires; freed slots are reused before the vector grows.
#[derive(Debug, Default)]
pub struct EffectArena {
    slots: Vec<Option<Effect>>,
    free: Vec<usize>,
}

impl EffectArena {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            slots: Vec::with_capacity(n),
            free: Vec::with_capacity(n),
        }
    }

    pub fn spawn(&mut self, effect: Effect) -> EffectId {
        if let Some(i) = self.free.pop() {
            self.slots[i] = Some(effect);
            EffectId(i)
        } else {
            self.slots.push(Some(effect));
            EffectId(self.slots.len() - 1)
        }
    }

    /// Advances every live effect and frees the slots of those that finished.
    pub fn process(&mut self, dt: FixedTime) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            let keep = slot.as_mut().is_some_and(|e| e.process(dt));
            if !keep && slot.take().is_some() {
                self.free.push(i);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (EffectId, &Effect)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|e| (EffectId(i), e)))
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn popup(combo: u32) -> ComboPopup {
        ComboPopup::new(combo, Judgement::Sick, &mut Random::new(1))
    }

    #[test]
    fn digits_only_for_breaks_and_long_combos() {
        assert_eq!(popup(5).pieces().len(), 1);
        assert_eq!(popup(0).pieces().len(), 4);
        let p = popup(123);
        let digits: Vec<_> = p.pieces()[1..].iter().map(|p| p.glyph).collect();
        assert_eq!(
            digits,
            vec![ComboGlyph::Digit(1), ComboGlyph::Digit(2), ComboGlyph::Digit(3)]
        );
    }

    #[test]
    fn pieces_hop_then_fall() {
        let mut p = popup(1);
        let y0 = p.pieces()[0].y;
        let dt = Fixed::from_ratio(1, 60);
        p.process(dt);
        assert!(p.pieces()[0].y < y0, "initial speed is upward");
        for _ in 0..30 {
            p.process(dt);
        }
        assert!(p.pieces()[0].ysp > Fixed::ZERO, "gravity wins after half a second");
    }

    #[test]
    fn arena_reuses_slots_and_expires_popups() {
        let mut arena = EffectArena::with_capacity(4);
        let a = arena.spawn(Effect::Combo(popup(1)));
        let b = arena.spawn(Effect::Combo(popup(20)));
        assert_eq!(arena.len(), 2);

        let dt = Fixed::from_ratio(1, 60);
        // Delay 0.4 s plus 32 rows at 80 rows/s.
        for _ in 0..60 {
            arena.process(dt);
        }
        assert!(arena.is_empty(), "popups must expire");
        assert_eq!(arena.iter().count(), 0);

        let c = arena.spawn(Effect::Combo(popup(2)));
        assert!(c == a || c == b, "freed slot must be reused");
        assert_eq!(arena.len(), 1);
    }
}

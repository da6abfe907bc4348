use crate::core::fixed::FixedTime;
use crate::game::character::{AnimSet, Character};
use crate::game::chart::{Note, NoteKey};
use crate::game::hooks::HookCtx;
use std::sync::Arc;

/// Animation numbers a singer maps its states onto. Sing, alt-sing and miss
/// are the first of four consecutive directional animations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SingerAnims {
    pub idle: usize,
    pub sing: usize,
    pub alt_sing: usize,
    pub miss: usize,
}

/// Character that sings notes and falls back to idle once the phrase is over.
#[derive(Clone, Debug)]
pub struct Singer {
    character: Character,
    anims: SingerAnims,
    sing_end: FixedTime,
}

impl Singer {
    pub fn new(set: Arc<AnimSet>, anims: SingerAnims) -> Self {
        let mut character = Character::new(set);
        character.set_animation(anims.idle);
        Self {
            character,
            anims,
            sing_end: FixedTime::MIN,
        }
    }

    pub fn tick(&mut self, dt: FixedTime, time: FixedTime) {
        self.character.tick(dt);
        if self.character.animation() != self.anims.idle
            && time >= self.sing_end
            && self.character.ended()
        {
            self.character.set_animation(self.anims.idle);
        }
    }

    /// Restarts idle, but only when idle has finished playing.
    pub fn dance(&mut self) {
        if self.character.animation() == self.anims.idle && self.character.ended() {
            self.character.set_animation(self.anims.idle);
        }
    }

    pub fn sing_animation(&mut self, i: usize, ctx: &HookCtx) {
        self.character.set_animation(i);
        self.sing_end = ctx.time + ctx.section.length / 4;
    }

    pub fn sing(&mut self, note: &Note, ctx: &HookCtx) {
        let base = if note.alt_anim { self.anims.alt_sing } else { self.anims.sing };
        self.character.set_animation(base + note.key.direction().index());
        self.sing_end = note.end() + ctx.section.length / 4;
    }

    pub fn miss(&mut self, key: NoteKey, ctx: &HookCtx) {
        self.character.set_animation(self.anims.miss + key.direction().index());
        self.sing_end = ctx.time + ctx.section.length / 4;
    }

    #[inline(always)]
    pub const fn character(&self) -> &Character {
        &self.character
    }

    #[inline(always)]
    pub const fn sing_end(&self) -> FixedTime {
        self.sing_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::chart::{Direction, Section, SectionFlags};
    use crate::game::life::HEALTH_START;

    const BF: SingerAnims = SingerAnims { idle: 0, sing: 1, alt_sing: 0, miss: 5 };

    fn ctx(time: f64) -> HookCtx {
        HookCtx {
            time: FixedTime::from_f64(time),
            step: 0,
            beat: 0,
            section: Section {
                time: FixedTime::ZERO,
                length: FixedTime::from_int(2),
                flags: SectionFlags::MUST_HIT,
            },
            section_index: 0,
            score: 0,
            combo: 0,
            health: HEALTH_START,
        }
    }

    #[test]
    fn sing_holds_until_phrase_end_then_idles() {
        let mut bf = Singer::new(Arc::new(AnimSet::uniform(10)), BF);
        let note = Note::new(FixedTime::ONE, FixedTime::ZERO, NoteKey::player(Direction::Up), false);
        bf.sing(&note, &ctx(1.0));
        assert_eq!(bf.character().animation(), 3);
        assert_eq!(bf.sing_end(), FixedTime::from_f64(1.5));

        let dt = FixedTime::from_ratio(1, 60);
        let mut t = FixedTime::ONE;
        while t < FixedTime::from_f64(1.45) {
            t += dt;
            bf.tick(dt, t);
            assert_eq!(bf.character().animation(), 3, "still singing at {t}");
        }
        for _ in 0..10 {
            t += dt;
            bf.tick(dt, t);
        }
        assert_eq!(bf.character().animation(), 0);
    }

    #[test]
    fn miss_uses_direction_offset() {
        let mut bf = Singer::new(Arc::new(AnimSet::uniform(10)), BF);
        bf.miss(NoteKey::player(Direction::Right), &ctx(3.0));
        assert_eq!(bf.character().animation(), 8);
    }

    #[test]
    fn dance_waits_for_idle_to_finish() {
        let mut bf = Singer::new(Arc::new(AnimSet::uniform(10)), BF);
        bf.sing_animation(9, &ctx(0.0));
        bf.dance();
        assert_eq!(bf.character().animation(), 9, "dance must not interrupt a sing");
    }
}

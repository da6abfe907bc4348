use crate::core::fixed::{Fixed, FixedTime};
use crate::core::input::{PadButton, PadState};
use crate::core::random::Random;
use crate::game::camera::{Camera, DEFAULT_DIVISOR, DEFAULT_Z};
use crate::game::character::{AnimSet, Character};
use crate::game::chart::{Note, NoteKey};
use crate::game::effects::{ComboPopup, Effect, EffectArena};
use crate::game::hooks::{HookCtx, PlayHooks};
use crate::game::judgment::Judgement;
use crate::game::singer::{Singer, SingerAnims};
use log::debug;
use std::sync::Arc;

pub const BF_ANIMS: SingerAnims = SingerAnims { idle: 0, sing: 1, alt_sing: 0, miss: 5 };
pub const DAD_ANIMS: SingerAnims = SingerAnims { idle: 0, sing: 1, alt_sing: 0, miss: 0 };

pub const BF_ANIM_COUNT: usize = 10;
pub const DAD_ANIM_COUNT: usize = 5;
pub const GF_ANIM_COUNT: usize = 2;
const BF_HEY: usize = 9;
// The cheer stops once the song gets going.
const HEY_BEAT_LIMIT: i32 = 128;

const CAMERA_BUMP: Fixed = Fixed::from_int(12);
const EFFECT_CAPACITY: usize = 16;

/// Animation sets the stage rigs are built from.
#[derive(Clone, Debug)]
pub struct StageRigs {
    pub bf: Arc<AnimSet>,
    pub dad: Arc<AnimSet>,
    pub gf: Arc<AnimSet>,
}

impl StageRigs {
    /// Evenly timed stand-ins with the right animation counts.
    pub fn placeholder() -> Self {
        Self {
            bf: Arc::new(AnimSet::uniform(BF_ANIM_COUNT)),
            dad: Arc::new(AnimSet::uniform(DAD_ANIM_COUNT)),
            gf: Arc::new(AnimSet::uniform(GF_ANIM_COUNT)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerIcon {
    Bf,
    BfOld,
}

/// Week 1 stage: player, opponent and a bopping girlfriend, with the camera
/// following whoever owns the current section.
pub struct Stage {
    pub bf: Singer,
    pub dad: Singer,
    pub gf: Character,
    pub camera: Camera,
    pub effects: EffectArena,
    pub icon: PlayerIcon,
    rng: Random,
}

impl Stage {
    pub fn new(rigs: &StageRigs, seed: u32) -> Self {
        let mut gf = Character::new(rigs.gf.clone());
        gf.set_animation(0);
        Self {
            bf: Singer::new(rigs.bf.clone(), BF_ANIMS),
            dad: Singer::new(rigs.dad.clone(), DAD_ANIMS),
            gf,
            camera: Camera::new(Fixed::ZERO, Fixed::ZERO),
            effects: EffectArena::with_capacity(EFFECT_CAPACITY),
            icon: PlayerIcon::Bf,
            rng: Random::new(seed),
        }
    }

    /// Stage-level buttons. Select swaps the player health icon.
    pub fn handle_pad(&mut self, pad: &PadState) {
        if pad.pressed(PadButton::SELECT) {
            self.icon = match self.icon {
                PlayerIcon::Bf => PlayerIcon::BfOld,
                PlayerIcon::BfOld => PlayerIcon::Bf,
            };
            debug!("Player icon: {:?}", self.icon);
        }
    }

    pub fn tick(&mut self, dt: FixedTime, time: FixedTime) {
        self.bf.tick(dt, time);
        self.dad.tick(dt, time);
        self.gf.tick(dt);
        self.camera.process(dt);
        if !self.effects.is_empty() {
            self.effects.process(dt);
        }
    }
}

impl PlayHooks for Stage {
    fn beat_hit(&mut self, ctx: &HookCtx) {
        if ctx.beat & 1 == 0 {
            self.bf.dance();
            self.dad.dance();
        }
        self.gf.set_animation((ctx.beat & 1) as usize);

        if ctx.beat < HEY_BEAT_LIMIT && ctx.beat & 7 == 7 {
            self.bf.sing_animation(BF_HEY, ctx);
        }

        if ctx.section.must_hit() {
            self.camera
                .set_target(Fixed::from_int(40), Fixed::from_int(15), DEFAULT_Z, DEFAULT_DIVISOR);
        } else {
            self.camera
                .set_target(Fixed::from_int(-40), Fixed::from_int(-20), DEFAULT_Z, DEFAULT_DIVISOR);
        }
        if ctx.beat & 3 == 0 {
            self.camera.bump(CAMERA_BUMP);
        }
    }

    fn note_hit(&mut self, ctx: &HookCtx, note: &Note) {
        if note.key.is_opponent() {
            self.dad.sing(note, ctx);
        } else {
            self.bf.sing(note, ctx);
        }
    }

    fn note_miss(&mut self, ctx: &HookCtx, key: NoteKey) {
        self.bf.miss(key, ctx);
    }

    fn show_combo(&mut self, ctx: &HookCtx, judgement: Judgement) {
        let popup = ComboPopup::new(ctx.combo, judgement, &mut self.rng);
        self.effects.spawn(Effect::Combo(popup));
    }
}

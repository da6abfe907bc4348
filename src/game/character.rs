use crate::core::fixed::{Fixed, FixedTime};
use bincode::{Decode, Encode};
use log::warn;
use std::sync::Arc;

// Animation code word layout:
//   bits 14..16  op (0 = frame, 1 = back)
//   frame: bits 0..9 frame index, bits 9..14 duration in 1/24 s units
//   back:  bits 0..14 number of code words to jump back; marks the animation ended
const OP_SHIFT: u16 = 14;
const OP_FRAME: u16 = 0;
const OP_BACK: u16 = 1;
const FRAME_MASK: u16 = 0x1FF;
const DURATION_SHIFT: u16 = 9;
const DURATION_MASK: u16 = 0x1F;
const BACK_MASK: u16 = 0x3FFF;

const FRAME_UNIT: FixedTime = Fixed::from_f64(1.0 / 24.0);
// Upper bound on code words consumed by a single tick. Only reached by
// malformed scripts made entirely of zero-length frames.
const MAX_CODES_PER_TICK: usize = 256;

#[inline(always)]
pub const fn frame_code(frame: u16, duration: u16) -> u16 {
    (OP_FRAME << OP_SHIFT) | ((duration & DURATION_MASK) << DURATION_SHIFT) | (frame & FRAME_MASK)
}

#[inline(always)]
pub const fn back_code(words: u16) -> u16 {
    (OP_BACK << OP_SHIFT) | (words & BACK_MASK)
}

/// Animation scripts for one character, indexed by animation number.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct AnimSet {
    pub animations: Vec<Vec<u16>>,
}

impl AnimSet {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        bincode::decode_from_slice::<Self, _>(bytes, bincode::config::standard())
            .map(|(set, _)| set)
            .map_err(|e| format!("Failed to decode animation set: {e}"))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| format!("Failed to encode animation set: {e}"))
    }

    /// Four held frames per animation, each ending in a one-word back jump
    /// onto its last frame. `count` animations, frames numbered consecutively.
    pub fn uniform(count: usize) -> Self {
        let animations = (0..count)
            .map(|i| {
                let base = (i * 4) as u16;
                vec![
                    frame_code(base, 2),
                    frame_code(base + 1, 2),
                    frame_code(base + 2, 2),
                    frame_code(base + 3, 2),
                    back_code(1),
                ]
            })
            .collect();
        Self { animations }
    }
}

/// Playback cursor over one [`AnimSet`].
#[derive(Clone, Debug)]
pub struct Character {
    set: Arc<AnimSet>,
    animation: usize,
    pos: usize,
    frame: u16,
    timer: FixedTime,
    ended: bool,
}

impl Character {
    pub fn new(set: Arc<AnimSet>) -> Self {
        Self {
            set,
            animation: 0,
            pos: 0,
            frame: 0,
            timer: FixedTime::ZERO,
            ended: true,
        }
    }

    pub fn set_animation(&mut self, i: usize) {
        if i >= self.set.animations.len() {
            warn!("Animation {i} out of range ({} defined)", self.set.animations.len());
            return;
        }
        self.animation = i;
        self.pos = 0;
        self.ended = false;
        self.timer = FixedTime::ZERO;
        self.tick(FixedTime::ZERO);
    }

    pub fn tick(&mut self, dt: FixedTime) {
        self.timer -= dt;
        let Some(codes) = self.set.animations.get(self.animation) else {
            return;
        };
        let mut budget = MAX_CODES_PER_TICK;
        while self.timer <= FixedTime::ZERO && budget > 0 {
            budget -= 1;
            let Some(&code) = codes.get(self.pos) else {
                // Ran off the script without a back jump; hold the last frame.
                self.ended = true;
                self.timer = FixedTime::ZERO;
                break;
            };
            match code >> OP_SHIFT {
                OP_FRAME => {
                    self.frame = code & FRAME_MASK;
                    self.timer += FRAME_UNIT * i32::from((code >> DURATION_SHIFT) & DURATION_MASK);
                    self.pos += 1;
                }
                OP_BACK => {
                    self.ended = true;
                    self.pos = self.pos.saturating_sub(usize::from(code & BACK_MASK));
                }
                _ => {
                    self.pos += 1;
                }
            }
        }
    }

    #[inline(always)]
    pub const fn animation(&self) -> usize {
        self.animation
    }

    #[inline(always)]
    pub const fn frame(&self) -> u16 {
        self.frame
    }

    #[inline(always)]
    pub const fn ended(&self) -> bool {
        self.ended
    }
}

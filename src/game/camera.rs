use crate::core::fixed::{Fixed, FixedTime};

const BUMP_DECAY: Fixed = Fixed::from_f64(0.91);
const BUMP_FRAMES: i32 = 30;
pub const DEFAULT_DIVISOR: Fixed = Fixed::from_f64(1.0 / 24.0);
pub const DEFAULT_Z: Fixed = Fixed::from_int(256);

/// Short decaying pulse. Decays per processed frame, not per second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Bumper {
    bump: Fixed,
    timer: i32,
}

impl Bumper {
    pub fn bump(&mut self, amount: Fixed) {
        self.bump = amount;
        self.timer = BUMP_FRAMES;
    }

    #[inline(always)]
    pub const fn get(&self) -> Fixed {
        self.bump
    }

    pub fn process(&mut self, _dt: FixedTime) {
        if self.timer > 0 {
            self.bump *= BUMP_DECAY;
            self.timer -= 1;
        } else {
            self.bump = Fixed::ZERO;
        }
    }
}

/// Eased follow camera. Each frame closes `divisor` of the gap to the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Camera {
    cx: Fixed,
    cy: Fixed,
    cz: Fixed,
    tx: Fixed,
    ty: Fixed,
    tz: Fixed,
    divisor: Fixed,
    bumper: Bumper,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Fixed::ZERO, Fixed::ZERO)
    }
}

impl Camera {
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self {
            cx: x,
            cy: y,
            cz: DEFAULT_Z,
            tx: x,
            ty: y,
            tz: DEFAULT_Z,
            divisor: Fixed::ZERO,
            bumper: Bumper { bump: Fixed::ZERO, timer: 0 },
        }
    }

    pub fn set_target(&mut self, x: Fixed, y: Fixed, z: Fixed, divisor: Fixed) {
        self.tx = x;
        self.ty = y;
        self.tz = z;
        self.divisor = divisor;
    }

    pub fn bump(&mut self, amount: Fixed) {
        self.bumper.bump(amount);
    }

    pub fn process(&mut self, dt: FixedTime) {
        self.cx += (self.tx - self.cx) * self.divisor;
        self.cy += (self.ty - self.cy) * self.divisor;
        self.cz += (self.tz - self.cz) * self.divisor;
        self.bumper.process(dt);
    }

    /// Position scaled for a parallax layer. A scroll of one is the focus layer.
    pub fn x(&self, scroll: Fixed) -> i32 {
        (self.cx * scroll).trunc_int()
    }

    pub fn y(&self, scroll: Fixed) -> i32 {
        (self.cy * scroll).trunc_int()
    }

    pub fn z(&self, scroll: Fixed) -> i32 {
        ((self.cz - self.bumper.get()) * scroll).trunc_int()
    }
}

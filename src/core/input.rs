use bitflags::bitflags;

bitflags! {
    /// Controller button bits, laid out the way the pad reports them.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PadButton: u16 {
        const SELECT   = 1 << 0;
        const L3       = 1 << 1;
        const R3       = 1 << 2;
        const START    = 1 << 3;
        const UP       = 1 << 4;
        const RIGHT    = 1 << 5;
        const DOWN     = 1 << 6;
        const LEFT     = 1 << 7;
        const L2       = 1 << 8;
        const R2       = 1 << 9;
        const L1       = 1 << 10;
        const R1       = 1 << 11;
        const TRIANGLE = 1 << 12;
        const CIRCLE   = 1 << 13;
        const CROSS    = 1 << 14;
        const SQUARE   = 1 << 15;
    }
}

/// Buttons that drive each lane (Left, Down, Up, Right). Either the d-pad or
/// the matching face button counts.
pub const LANE_BUTTONS: [PadButton; 4] = [
    PadButton::LEFT.union(PadButton::SQUARE),
    PadButton::DOWN.union(PadButton::CROSS),
    PadButton::UP.union(PadButton::TRIANGLE),
    PadButton::RIGHT.union(PadButton::CIRCLE),
];

#[inline(always)]
pub const fn lane_buttons(lane: usize) -> PadButton {
    LANE_BUTTONS[lane & 3]
}

/// Per-frame pad snapshot with edges already derived.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PadState {
    pub held: PadButton,
    pub press: PadButton,
    pub release: PadButton,
}

impl PadState {
    #[inline(always)]
    pub fn pressed(&self, buttons: PadButton) -> bool {
        self.press.intersects(buttons)
    }

    #[inline(always)]
    pub fn is_held(&self, buttons: PadButton) -> bool {
        self.held.intersects(buttons)
    }

    #[inline(always)]
    pub fn released(&self, buttons: PadButton) -> bool {
        self.release.intersects(buttons)
    }
}

/// Edge detector. Feed it the raw held mask once per frame.
#[derive(Debug, Default)]
pub struct Pad {
    prev: PadButton,
}

impl Pad {
    pub const fn new() -> Self {
        Self {
            prev: PadButton::empty(),
        }
    }

    pub fn poll(&mut self, now_held: PadButton) -> PadState {
        let state = PadState {
            held: now_held,
            press: now_held & !self.prev,
            release: self.prev & !now_held,
        };
        self.prev = now_held;
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_follow_held_mask() {
        let mut pad = Pad::new();
        let a = pad.poll(PadButton::LEFT | PadButton::CROSS);
        assert_eq!(a.press, PadButton::LEFT | PadButton::CROSS);
        assert!(a.release.is_empty());

        let b = pad.poll(PadButton::LEFT);
        assert!(b.press.is_empty(), "held button must not re-press");
        assert_eq!(b.release, PadButton::CROSS);

        let c = pad.poll(PadButton::empty());
        assert_eq!(c.release, PadButton::LEFT);
    }

    #[test]
    fn lane_buttons_accept_dpad_or_face() {
        let state = PadState {
            held: PadButton::TRIANGLE,
            press: PadButton::TRIANGLE,
            release: PadButton::empty(),
        };
        assert!(state.pressed(lane_buttons(2)));
        assert!(!state.pressed(lane_buttons(0)));
        assert!(state.is_held(lane_buttons(2)));
    }
}

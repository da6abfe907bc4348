use crate::core::fixed::Fixed;

/// Health runs from 0 (player lost) to 2 (opponent lost), starting at 1.
pub type HealthFixed = Fixed;

#[inline(always)]
pub const fn health_percent(percent: f64) -> HealthFixed {
    Fixed::from_f64(percent / 100.0 * 2.0)
}

pub const HEALTH_START: HealthFixed = Fixed::ONE;
pub const HEALTH_MIN: HealthFixed = Fixed::ZERO;
pub const HEALTH_MAX: HealthFixed = Fixed::from_int(2);

pub const MISS_HEALTH: HealthFixed = health_percent(-3.5);
/// Per second of hold, and per second of hold length when the budget is set.
pub const HOLD_HEALTH: HealthFixed = health_percent(7.5);

// Icon swap thresholds.
pub const PLAYER_DEAD_BELOW: HealthFixed = Fixed::from_f64(0.4);
pub const OPPONENT_DEAD_ABOVE: HealthFixed = Fixed::from_f64(1.6);

#[inline(always)]
pub fn clamp_health(health: HealthFixed) -> HealthFixed {
    health.clamp(HEALTH_MIN, HEALTH_MAX)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HealthIcons {
    pub player_dead: bool,
    pub opponent_dead: bool,
}

pub fn health_icons(health: HealthFixed) -> HealthIcons {
    HealthIcons {
        player_dead: health < PLAYER_DEAD_BELOW,
        opponent_dead: health > OPPONENT_DEAD_ABOVE,
    }
}

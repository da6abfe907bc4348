use crate::core::fixed::{Fixed, FixedTime};
use crate::game::life::{HealthFixed, health_percent};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Judgement {
    Sick,
    Good,
    Bad,
    Shit,
}

impl Judgement {
    pub const ALL: [Judgement; 4] = [Self::Sick, Self::Good, Self::Bad, Self::Shit];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub const fn score(self) -> i32 {
        JUDGE_SCORE[self as usize]
    }

    /// Health granted by a tap note at this tier. Holds pay out over their
    /// length instead.
    #[inline(always)]
    pub const fn tap_health(self) -> HealthFixed {
        JUDGE_HEALTH[self as usize]
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Sick => "Sick",
            Self::Good => "Good",
            Self::Bad => "Bad",
            Self::Shit => "Shit",
        }
    }
}

// Ten frames at 60 Hz, about 166 ms.
pub const JUDGE_WINDOW: FixedTime = Fixed::from_f64(10.0 / 60.0);
pub const JUDGE_BAD: FixedTime = JUDGE_WINDOW.const_mul(Fixed::from_f64(0.8));
pub const JUDGE_GOOD: FixedTime = JUDGE_WINDOW.const_mul(Fixed::from_f64(0.55));
pub const JUDGE_SICK: FixedTime = JUDGE_WINDOW.const_mul(Fixed::from_f64(0.2));

pub const JUDGE_SCORE: [i32; 4] = [350, 200, 100, 50];
pub const MISS_SCORE: i32 = -10;

pub const JUDGE_HEALTH: [HealthFixed; 4] = [
    health_percent(1.65 * 1.0),
    health_percent(1.65 * 0.78),
    health_percent(1.65 * 0.2),
    health_percent(1.65 * 0.0),
];

/// Tier for an absolute timing error. Thresholds are exclusive, so a delta
/// sitting exactly on a boundary falls to the next tier down.
#[inline(always)]
pub fn judge(delta: FixedTime) -> Judgement {
    let delta = delta.abs();
    if delta < JUDGE_SICK {
        Judgement::Sick
    } else if delta < JUDGE_GOOD {
        Judgement::Good
    } else if delta < JUDGE_BAD {
        Judgement::Bad
    } else {
        Judgement::Shit
    }
}

/// Per-tier tally kept for the results screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JudgementCounts {
    pub tiers: [u32; 4],
    pub misses: u32,
}

impl JudgementCounts {
    #[inline(always)]
    pub fn record(&mut self, judgement: Judgement) {
        self.tiers[judgement.index()] += 1;
    }

    #[inline(always)]
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn get(&self, judgement: Judgement) -> u32 {
        self.tiers[judgement.index()]
    }

    pub fn hits(&self) -> u32 {
        self.tiers.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_strictly_ordered() {
        assert!(FixedTime::ZERO < JUDGE_SICK);
        assert!(JUDGE_SICK < JUDGE_GOOD);
        assert!(JUDGE_GOOD < JUDGE_BAD);
        assert!(JUDGE_BAD < JUDGE_WINDOW);
    }

    #[test]
    fn boundaries_fall_to_the_lower_tier() {
        assert_eq!(judge(FixedTime::ZERO), Judgement::Sick);
        assert_eq!(judge(JUDGE_SICK - FixedTime::EPSILON), Judgement::Sick);
        assert_eq!(judge(JUDGE_SICK), Judgement::Good);
        assert_eq!(judge(JUDGE_GOOD), Judgement::Bad);
        assert_eq!(judge(JUDGE_BAD), Judgement::Shit);
        assert_eq!(judge(JUDGE_WINDOW - FixedTime::EPSILON), Judgement::Shit);
    }

    #[test]
    fn sign_of_error_does_not_matter() {
        let d = FixedTime::from_f64(0.12);
        assert_eq!(judge(d), Judgement::Bad);
        assert_eq!(judge(-d), Judgement::Bad);
    }

    #[test]
    fn score_and_health_tables_descend() {
        for pair in Judgement::ALL.windows(2) {
            assert!(pair[0].score() > pair[1].score());
            assert!(pair[0].tap_health() > pair[1].tap_health());
        }
        assert_eq!(Judgement::Shit.tap_health(), HealthFixed::ZERO);
        assert!(MISS_SCORE < 0);
    }

    #[test]
    fn counts_track_tiers_and_misses() {
        let mut counts = JudgementCounts::default();
        counts.record(Judgement::Sick);
        counts.record(Judgement::Sick);
        counts.record(Judgement::Bad);
        counts.record_miss();
        assert_eq!(counts.get(Judgement::Sick), 2);
        assert_eq!(counts.hits(), 3);
        assert_eq!(counts.misses, 1);
    }
}

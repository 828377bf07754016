use serde::{Deserialize, Serialize};
use std::fmt;

/// Readiness condition, ordered from most severe (level 1) to most relaxed
/// (level 5). COCKED PISTOL is sticky: once reached it is latched for the
/// configured cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    CockedPistol,
    FastPace,
    RoundHouse,
    DoubleTake,
    FadeOut,
}

impl Condition {
    pub const MOST_SEVERE: Condition = Condition::CockedPistol;

    /// All conditions in severity order, for display collaborators.
    pub const ALL: [Condition; 5] = [
        Condition::CockedPistol,
        Condition::FastPace,
        Condition::RoundHouse,
        Condition::DoubleTake,
        Condition::FadeOut,
    ];

    /// Numeric level, 1 (most severe) through 5 (most relaxed).
    pub fn level(self) -> u8 {
        match self {
            Condition::CockedPistol => 1,
            Condition::FastPace => 2,
            Condition::RoundHouse => 3,
            Condition::DoubleTake => 4,
            Condition::FadeOut => 5,
        }
    }

    /// Condition for a numeric level, clamped into 1..=5.
    pub fn from_level(level: i64) -> Condition {
        match level {
            i64::MIN..=1 => Condition::CockedPistol,
            2 => Condition::FastPace,
            3 => Condition::RoundHouse,
            4 => Condition::DoubleTake,
            _ => Condition::FadeOut,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Condition::CockedPistol => "COCKED PISTOL",
            Condition::FastPace => "FAST PACE",
            Condition::RoundHouse => "ROUND HOUSE",
            Condition::DoubleTake => "DOUBLE TAKE",
            Condition::FadeOut => "FADE OUT",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

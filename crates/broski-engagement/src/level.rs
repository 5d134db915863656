//! # XP Levels
//!
//! Challenge levels are a pure function of total XP: every 50 XP is one
//! level, starting at level 1. The level name is a pure function of the
//! level. Neither is ever stored independently of `total_xp`.

use serde::{Deserialize, Serialize};

/// XP required per level step.
pub const XP_PER_LEVEL: u32 = 50;

/// Named tiers of challenge levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelName {
    /// Levels 1–4.
    Rookie,
    /// Levels 5–14.
    SmoothStarter,
    /// Levels 15–29.
    FlirtExpert,
    /// Level 30 and above.
    BroskiElite,
}

impl LevelName {
    /// The name for a level number.
    pub fn for_level(level: u32) -> Self {
        match level {
            0..=4 => Self::Rookie,
            5..=14 => Self::SmoothStarter,
            15..=29 => Self::FlirtExpert,
            _ => Self::BroskiElite,
        }
    }

    /// Display label shown to users.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rookie => "Rookie",
            Self::SmoothStarter => "Smooth Starter",
            Self::FlirtExpert => "Flirt Expert",
            Self::BroskiElite => "Broski Elite",
        }
    }
}

impl std::fmt::Display for LevelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A challenge level derived from total XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    /// Level number, starting at 1.
    pub number: u32,
    /// Named tier for `number`.
    pub name: LevelName,
}

impl Level {
    /// Derive the level for a total XP amount.
    pub fn from_xp(total_xp: u32) -> Self {
        let number = total_xp / XP_PER_LEVEL + 1;
        Self {
            number,
            name: LevelName::for_level(number),
        }
    }

    /// Smallest total XP that reaches this level.
    pub fn min_xp(&self) -> u32 {
        self.number.saturating_sub(1).saturating_mul(XP_PER_LEVEL)
    }
}

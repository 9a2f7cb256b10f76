//! Dice rolling primitives.
//!
//! Every random decision in the crate goes through a [`DiceSource`], so a
//! session can run on a seeded RNG and tests can script exact die faces.
//! Supports the dice notation used by the data tables: `XdY`, `XdY+Z`,
//! `XdY-Z` and keep-highest (`4d6kh3`).

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("Cannot keep {keep} dice when only rolling {count} (in {notation})")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        notation: String,
    },
}

// ============================================================================
// Dice Source
// ============================================================================

/// A source of die faces.
///
/// Any `rand` generator is a dice source. The trait is object safe so the
/// session can hold a `Box<dyn DiceSource>` and swap in scripted dice.
pub trait DiceSource {
    /// Roll one die with `sides` faces, uniform in `1..=sides`.
    fn roll_d(&mut self, sides: u32) -> u32;

    /// Roll `count` dice with `sides` faces each.
    fn roll_dice(&mut self, count: u32, sides: u32) -> DiceRoll {
        let rolls: Vec<u32> = (0..count).map(|_| self.roll_d(sides)).collect();
        let total = rolls.iter().sum::<u32>() as i32;
        DiceRoll { rolls, total }
    }

    /// True with probability `numerator / denominator`.
    fn chance(&mut self, numerator: u32, denominator: u32) -> bool {
        self.roll_d(denominator) <= numerator
    }

    /// Uniform integer in `low..=high`.
    fn between(&mut self, low: i32, high: i32) -> i32 {
        if high <= low {
            return low;
        }
        low + self.roll_d((high - low + 1) as u32) as i32 - 1
    }
}

impl<R: RngCore> DiceSource for R {
    fn roll_d(&mut self, sides: u32) -> u32 {
        self.gen_range(1..=sides.max(1))
    }
}

/// The individual faces of a roll and their sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub rolls: Vec<u32>,
    pub total: i32,
}

/// Ability modifier for a score: `floor((score - 10) / 2)`.
pub fn ability_mod(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Roll 4d6 and drop the lowest die.
pub fn roll_4d6_drop_lowest<D: DiceSource + ?Sized>(dice: &mut D) -> i32 {
    let mut rolls = dice.roll_dice(4, 6).rolls;
    rolls.sort_unstable();
    rolls[1..].iter().sum::<u32>() as i32
}

// ============================================================================
// Dice Expressions
// ============================================================================

/// A single-term dice expression such as `2d8+4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub count: u32,
    pub sides: u32,
    pub modifier: i32,
    pub keep_highest: Option<u32>,
}

impl DiceExpression {
    pub const fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self {
            count,
            sides,
            modifier,
            keep_highest: None,
        }
    }

    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation: String = notation
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let invalid = || DiceError::InvalidNotation(notation.clone());

        let d_pos = notation.find('d').ok_or(DiceError::NoDice)?;
        let count: u32 = match &notation[..d_pos] {
            "" => 1,
            digits => digits.parse().map_err(|_| invalid())?,
        };
        if count == 0 {
            return Err(DiceError::NoDice);
        }

        let rest = &notation[d_pos + 1..];
        let (body, modifier) = match rest.find(['+', '-']) {
            Some(pos) => {
                let value: i32 = rest[pos + 1..].parse().map_err(|_| invalid())?;
                let sign = if rest.as_bytes()[pos] == b'-' { -1 } else { 1 };
                (&rest[..pos], sign * value)
            }
            None => (rest, 0),
        };

        let (sides_str, keep_highest) = match body.find("kh") {
            Some(kh_pos) => {
                let keep: u32 = body[kh_pos + 2..].parse().map_err(|_| invalid())?;
                (&body[..kh_pos], Some(keep))
            }
            None => (body, None),
        };

        let sides: u32 = sides_str.parse().map_err(|_| invalid())?;
        if sides < 2 {
            return Err(DiceError::InvalidDieSize(sides));
        }

        if let Some(keep) = keep_highest {
            if keep > count {
                return Err(DiceError::InvalidKeepCount {
                    keep,
                    count,
                    notation: notation.clone(),
                });
            }
        }

        Ok(DiceExpression {
            count,
            sides,
            modifier,
            keep_highest,
        })
    }

    /// Roll the expression. `total` includes the modifier and only the kept dice.
    pub fn roll<D: DiceSource + ?Sized>(&self, dice: &mut D) -> DiceRoll {
        let roll = dice.roll_dice(self.count, self.sides);
        let kept: u32 = match self.keep_highest {
            Some(keep) => {
                let mut sorted = roll.rolls.clone();
                sorted.sort_unstable_by(|a, b| b.cmp(a));
                sorted.iter().take(keep as usize).sum()
            }
            None => roll.rolls.iter().sum(),
        };
        DiceRoll {
            rolls: roll.rolls,
            total: kept as i32 + self.modifier,
        }
    }

    /// Roll only the dice part, ignoring the modifier (critical hit extra dice).
    pub fn roll_dice_only<D: DiceSource + ?Sized>(&self, dice: &mut D) -> i32 {
        dice.roll_dice(self.count, self.sides).total
    }

    pub fn min(&self) -> i32 {
        self.keep_highest.unwrap_or(self.count) as i32 + self.modifier
    }

    pub fn max(&self) -> i32 {
        (self.keep_highest.unwrap_or(self.count) * self.sides) as i32 + self.modifier
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        if let Some(keep) = self.keep_highest {
            write!(f, "kh{keep}")?;
        }
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{m}"),
            m => write!(f, "{m}"),
        }
    }
}

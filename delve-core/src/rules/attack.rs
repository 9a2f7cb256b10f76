//! Attack rolls and damage arithmetic shared by players, monsters and allies.

use super::{Actor, Event};
use crate::dice::{DiceExpression, DiceSource};

/// One resolved d20 attack roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackRoll {
    pub natural: u32,
    pub total: i32,
    pub target_ac: i32,
    pub hit: bool,
    pub critical: bool,
}

impl AttackRoll {
    pub fn event(&self, attacker: Actor, target: Actor) -> Event {
        if self.hit {
            Event::AttackHit {
                attacker,
                target,
                natural: self.natural,
                total: self.total,
                target_ac: self.target_ac,
                critical: self.critical,
            }
        } else {
            Event::AttackMissed {
                attacker,
                target,
                natural: self.natural,
                total: self.total,
                target_ac: self.target_ac,
            }
        }
    }
}

/// Whether an attack hits, and whether it is a critical hit.
///
/// A natural 20 always hits and crits, a natural 1 always misses.
pub fn attack_hits(natural: u32, total: i32, target_ac: i32) -> (bool, bool) {
    match natural {
        20 => (true, true),
        1 => (false, false),
        _ => (total >= target_ac, false),
    }
}

pub fn roll_attack<D: DiceSource + ?Sized>(dice: &mut D, bonus: i32, target_ac: i32) -> AttackRoll {
    let natural = dice.roll_d(20);
    let total = natural as i32 + bonus;
    let (hit, critical) = attack_hits(natural, total, target_ac);
    AttackRoll {
        natural,
        total,
        target_ac,
        hit,
        critical,
    }
}

/// Roll hit damage: the expression plus a flat bonus, with the dice rolled a
/// second time on a critical.
pub fn roll_hit_damage<D: DiceSource + ?Sized>(
    dice: &mut D,
    damage: &DiceExpression,
    flat_bonus: i32,
    critical: bool,
) -> i32 {
    let mut total = damage.roll(dice).total + flat_bonus;
    if critical {
        total += damage.roll_dice_only(dice);
    }
    total
}

/// Apply damage reduction to a hit. A hit always deals at least 1.
pub fn finalize_damage(raw: i32, reduction: i32) -> i32 {
    (raw - reduction.max(0)).max(1)
}

/// Damage after a save: halved (rounding down) or negated on success.
pub fn save_damage(rolled: i32, saved: bool, half_on_save: bool) -> i32 {
    match (saved, half_on_save) {
        (false, _) => rolled,
        (true, true) => rolled / 2,
        (true, false) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDice;

    #[test]
    fn test_natural_twenty_always_hits() {
        assert_eq!(attack_hits(20, 21, 30), (true, true));
        assert_eq!(attack_hits(20, 25, 10), (true, true));
    }

    #[test]
    fn test_natural_one_always_misses() {
        assert_eq!(attack_hits(1, 30, 5), (false, false));
    }

    #[test]
    fn test_total_meets_armor_class() {
        assert_eq!(attack_hits(15, 19, 17), (true, false));
        assert_eq!(attack_hits(12, 17, 17), (true, false));
        assert_eq!(attack_hits(11, 16, 17), (false, false));
    }

    #[test]
    fn test_roll_attack_uses_one_d20() {
        let mut dice = ScriptedDice::new([15]);
        let roll = roll_attack(&mut dice, 4, 17);
        assert_eq!(roll.natural, 15);
        assert_eq!(roll.total, 19);
        assert!(roll.hit);
        assert_eq!(dice.consumed(), 1);
    }

    #[test]
    fn test_critical_doubles_dice_not_bonus() {
        let expr = DiceExpression::new(1, 8, 0);
        let mut dice = ScriptedDice::new([6, 3]);
        assert_eq!(roll_hit_damage(&mut dice, &expr, 3, true), 12);

        let mut dice = ScriptedDice::new([6, 3]);
        assert_eq!(roll_hit_damage(&mut dice, &expr, 3, false), 9);
    }

    #[test]
    fn test_damage_floor() {
        assert_eq!(finalize_damage(2, 3), 1);
        assert_eq!(finalize_damage(-4, 0), 1);
        assert_eq!(finalize_damage(7, 3), 4);
    }

    #[test]
    fn test_save_halves_without_clamp() {
        assert_eq!(save_damage(7, true, true), 3);
        assert_eq!(save_damage(1, true, true), 0);
        assert_eq!(save_damage(7, true, false), 0);
        assert_eq!(save_damage(7, false, true), 7);
    }
}

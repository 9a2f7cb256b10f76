//! Timed status effects carried by the player and by monsters.

use crate::dice::DiceSource;
use serde::{Deserialize, Serialize};

/// AC bonus granted while an effect of kind [`EffectKind::Shielded`] is up.
pub const SHIELDED_AC_BONUS: i32 = 2;

/// Kinds of timed status effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Takes 1d(magnitude) damage on each tick.
    Poisoned,
    /// Loses its next action.
    Stunned,
    /// Player movement is halved; monsters cannot move.
    Slowed,
    /// Adds magnitude to attack and damage rolls.
    Blessed,
    /// Subtracts magnitude from incoming hit damage.
    Shielded,
}

impl EffectKind {
    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Poisoned => "Poisoned",
            EffectKind::Stunned => "Stunned",
            EffectKind::Slowed => "Slowed",
            EffectKind::Blessed => "Blessed",
            EffectKind::Shielded => "Shielded",
        }
    }

    /// Whether the effect outlives the fight it was applied in. Only poison
    /// does; an antidote or the next fight's ticks deal with it.
    pub fn lingers(&self) -> bool {
        matches!(self, EffectKind::Poisoned)
    }
}

/// One timed effect owned by exactly one combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub kind: EffectKind,
    pub remaining_turns: u32,
    pub magnitude: i32,
}

impl ActiveEffect {
    pub fn new(kind: EffectKind, turns: u32) -> Self {
        Self {
            kind,
            remaining_turns: turns,
            magnitude: 0,
        }
    }

    pub fn with_magnitude(mut self, magnitude: i32) -> Self {
        self.magnitude = magnitude;
        self
    }
}

/// What a tick did to the owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Poison damage to apply to the owner.
    pub poison_damage: i32,
    /// Effects that ran out this tick.
    pub expired: Vec<EffectKind>,
}

/// The effects currently on one combatant. At most one effect per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveEffects {
    effects: Vec<ActiveEffect>,
}

impl ActiveEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an effect. Re-applying a kind keeps the longer duration and the
    /// larger magnitude.
    pub fn apply(&mut self, effect: ActiveEffect) {
        if effect.remaining_turns == 0 {
            return;
        }
        match self.effects.iter_mut().find(|e| e.kind == effect.kind) {
            Some(existing) => {
                existing.remaining_turns = existing.remaining_turns.max(effect.remaining_turns);
                existing.magnitude = existing.magnitude.max(effect.magnitude);
            }
            None => self.effects.push(effect),
        }
    }

    pub fn has(&self, kind: EffectKind) -> bool {
        self.effects.iter().any(|e| e.kind == kind)
    }

    pub fn get(&self, kind: EffectKind) -> Option<&ActiveEffect> {
        self.effects.iter().find(|e| e.kind == kind)
    }

    /// Magnitude of the effect, or 0 when absent.
    pub fn magnitude(&self, kind: EffectKind) -> i32 {
        self.get(kind).map(|e| e.magnitude).unwrap_or(0)
    }

    /// Remove an effect outright. Returns whether it was present.
    pub fn remove(&mut self, kind: EffectKind) -> bool {
        let before = self.effects.len();
        self.effects.retain(|e| e.kind != kind);
        self.effects.len() != before
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveEffect> {
        self.effects.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Drop every effect that ends with combat. Returns the kinds removed.
    pub fn end_combat(&mut self) -> Vec<EffectKind> {
        let mut ended = Vec::new();
        self.effects.retain(|effect| {
            if effect.kind.lingers() {
                true
            } else {
                ended.push(effect.kind);
                false
            }
        });
        ended
    }

    /// Advance every effect by one turn: roll poison damage, decrement the
    /// counters and drop whatever reached zero.
    pub fn tick<D: DiceSource + ?Sized>(&mut self, dice: &mut D) -> TickReport {
        let mut report = TickReport::default();

        if let Some(poison) = self.get(EffectKind::Poisoned) {
            let sides = poison.magnitude.max(1) as u32;
            report.poison_damage = dice.roll_d(sides) as i32;
        }

        self.effects.retain_mut(|effect| {
            effect.remaining_turns = effect.remaining_turns.saturating_sub(1);
            if effect.remaining_turns == 0 {
                report.expired.push(effect.kind);
                false
            } else {
                true
            }
        });

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDice;

    #[test]
    fn test_apply_refreshes_same_kind() {
        let mut effects = ActiveEffects::new();
        effects.apply(ActiveEffect::new(EffectKind::Blessed, 2).with_magnitude(1));
        effects.apply(ActiveEffect::new(EffectKind::Blessed, 3).with_magnitude(2));
        assert_eq!(effects.iter().count(), 1);
        let bless = effects.get(EffectKind::Blessed).unwrap();
        assert_eq!(bless.remaining_turns, 3);
        assert_eq!(bless.magnitude, 2);
    }

    #[test]
    fn test_zero_duration_is_ignored() {
        let mut effects = ActiveEffects::new();
        effects.apply(ActiveEffect::new(EffectKind::Stunned, 0));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_poison_ticks_and_expires() {
        let mut effects = ActiveEffects::new();
        effects.apply(ActiveEffect::new(EffectKind::Poisoned, 2).with_magnitude(4));
        let mut dice = ScriptedDice::new([3, 4]);

        let first = effects.tick(&mut dice);
        assert_eq!(first.poison_damage, 3);
        assert!(first.expired.is_empty());

        let second = effects.tick(&mut dice);
        assert_eq!(second.poison_damage, 4);
        assert_eq!(second.expired, vec![EffectKind::Poisoned]);
        assert!(!effects.has(EffectKind::Poisoned));
    }

    #[test]
    fn test_tick_without_poison_rolls_nothing() {
        let mut effects = ActiveEffects::new();
        effects.apply(ActiveEffect::new(EffectKind::Stunned, 1));
        let mut dice = ScriptedDice::new(Vec::<u32>::new());
        let report = effects.tick(&mut dice);
        assert_eq!(report.poison_damage, 0);
        assert_eq!(report.expired, vec![EffectKind::Stunned]);
        assert_eq!(dice.consumed(), 0);
    }

    #[test]
    fn test_remove_and_magnitude() {
        let mut effects = ActiveEffects::new();
        effects.apply(ActiveEffect::new(EffectKind::Shielded, 2).with_magnitude(3));
        assert_eq!(effects.magnitude(EffectKind::Shielded), 3);
        assert_eq!(effects.magnitude(EffectKind::Blessed), 0);
        assert!(effects.remove(EffectKind::Shielded));
        assert!(!effects.remove(EffectKind::Shielded));
    }

    #[test]
    fn test_end_combat_keeps_only_poison() {
        let mut effects = ActiveEffects::new();
        effects.apply(ActiveEffect::new(EffectKind::Shielded, 2).with_magnitude(3));
        effects.apply(ActiveEffect::new(EffectKind::Poisoned, 3).with_magnitude(4));
        effects.apply(ActiveEffect::new(EffectKind::Slowed, 1));

        assert_eq!(effects.end_combat(), vec![EffectKind::Shielded, EffectKind::Slowed]);
        assert!(effects.has(EffectKind::Poisoned));
        assert_eq!(effects.iter().count(), 1);
    }
}

//! Per-class data: creation stats and the ability descriptor table.
//!
//! Every class has four ability slots. Slot 0 is the basic weapon attack;
//! slots 1-3 are the class specials. The combat engine never matches on the
//! class to resolve an ability, it only interprets the [`AbilityEffect`]
//! stored in the descriptor.

use crate::character::{Ability, CharacterClass};
use crate::conditions::{ActiveEffect, EffectKind};
use crate::dice::DiceExpression;
use serde::{Deserialize, Serialize};

/// Number of ability slots per class, basic attack included.
pub const ABILITY_SLOTS: usize = 4;

/// Range of the standard ranged abilities, in tiles.
pub const SPELL_RANGE: i32 = 6;

/// Class-specific data for character creation and combat.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassData {
    /// Starting HP before the CON modifier.
    pub base_hp: i32,
    /// Die rolled for HP on level-up.
    pub hit_die: u32,
    pub base_ac: i32,
    /// Armor bonus from starting equipment.
    pub equipment_bonus: i32,
    /// Stat used for weapon attack and damage rolls.
    pub attack_stat: Ability,
    /// Stat used for spell attacks, save DCs and heals.
    pub casting_stat: Ability,
    pub weapon_damage: DiceExpression,
    /// Ability scores are assigned in this order, highest roll first.
    /// The first entry is the primary stat raised on level-up.
    pub stat_priority: [Ability; 6],
}

/// What an ability costs to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityCost {
    Free,
    /// Limited number of uses, restored on a new floor, rest or level-up.
    PerFloor(u8),
    Mana(u32),
    PactPoints(u32),
}

/// Who an ability can be aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityRange {
    SelfOnly,
    /// Adjacent monsters only.
    Melee,
    /// Monsters within this many tiles.
    Ranged(i32),
}

impl AbilityRange {
    pub fn needs_target(&self) -> bool {
        !matches!(self, AbilityRange::SelfOnly)
    }

    pub fn reach(&self) -> i32 {
        match self {
            AbilityRange::SelfOnly => 0,
            AbilityRange::Melee => 1,
            AbilityRange::Ranged(tiles) => *tiles,
        }
    }
}

/// Stat block of a summoned ally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllyTemplate {
    pub name: &'static str,
    pub attack_bonus: i32,
    pub damage: DiceExpression,
    pub range: i32,
    pub turns: u32,
}

/// The mechanical effect of an ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AbilityEffect {
    /// Attack roll with the attack stat. `None` uses the class weapon dice.
    WeaponAttack {
        damage: Option<DiceExpression>,
        on_hit: Option<ActiveEffect>,
    },
    /// Attack roll with the casting stat.
    SpellAttack {
        damage: DiceExpression,
        add_modifier: bool,
        on_hit: Option<ActiveEffect>,
    },
    /// Damage without an attack roll.
    AutoHit { damage: DiceExpression },
    /// DEX save against the caster's DC. A radius of 0 hits only the target.
    Save {
        damage: DiceExpression,
        radius: i32,
        half_on_save: bool,
    },
    Heal {
        dice: DiceExpression,
        add_level: bool,
        add_modifier: bool,
    },
    SelfBuff(ActiveEffect),
    ExtraAction,
    ExtraMovement(u32),
    Hex,
    Summon(AllyTemplate),
}

/// One entry of a class ability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AbilityDescriptor {
    pub name: &'static str,
    pub cost: AbilityCost,
    pub range: AbilityRange,
    /// Whether using it spends the turn's action.
    pub uses_action: bool,
    pub effect: AbilityEffect,
}

impl AbilityDescriptor {
    fn new(name: &'static str, cost: AbilityCost, range: AbilityRange, effect: AbilityEffect) -> Self {
        Self {
            name,
            cost,
            range,
            uses_action: true,
            effect,
        }
    }

    fn free_action(mut self) -> Self {
        self.uses_action = false;
        self
    }

    /// Per-floor use allowance, 0 for abilities paid some other way.
    pub fn per_floor_uses(&self) -> u8 {
        match self.cost {
            AbilityCost::PerFloor(uses) => uses,
            _ => 0,
        }
    }
}

fn basic_attack() -> AbilityDescriptor {
    AbilityDescriptor::new(
        "Attack",
        AbilityCost::Free,
        AbilityRange::Melee,
        AbilityEffect::WeaponAttack {
            damage: None,
            on_hit: None,
        },
    )
}

impl CharacterClass {
    /// Get class data for creation and combat.
    pub fn data(&self) -> ClassData {
        use Ability::*;
        match self {
            CharacterClass::Fighter => ClassData {
                base_hp: 12,
                hit_die: 8,
                base_ac: 16,
                equipment_bonus: 1,
                attack_stat: Strength,
                casting_stat: Strength,
                weapon_damage: DiceExpression::new(1, 8, 0),
                stat_priority: [Strength, Constitution, Dexterity, Wisdom, Charisma, Intelligence],
            },
            CharacterClass::Rogue => ClassData {
                base_hp: 8,
                hit_die: 6,
                base_ac: 14,
                equipment_bonus: 0,
                attack_stat: Dexterity,
                casting_stat: Dexterity,
                weapon_damage: DiceExpression::new(1, 6, 0),
                stat_priority: [Dexterity, Constitution, Intelligence, Wisdom, Charisma, Strength],
            },
            CharacterClass::Cleric => ClassData {
                base_hp: 10,
                hit_die: 8,
                base_ac: 16,
                equipment_bonus: 0,
                attack_stat: Strength,
                casting_stat: Wisdom,
                weapon_damage: DiceExpression::new(1, 6, 0),
                stat_priority: [Wisdom, Constitution, Strength, Charisma, Dexterity, Intelligence],
            },
            CharacterClass::Wizard => ClassData {
                base_hp: 6,
                hit_die: 4,
                base_ac: 12,
                equipment_bonus: 0,
                attack_stat: Intelligence,
                casting_stat: Intelligence,
                weapon_damage: DiceExpression::new(1, 4, 0),
                stat_priority: [Intelligence, Constitution, Dexterity, Wisdom, Charisma, Strength],
            },
            CharacterClass::Warlock => ClassData {
                base_hp: 8,
                hit_die: 8,
                base_ac: 13,
                equipment_bonus: 0,
                attack_stat: Charisma,
                casting_stat: Charisma,
                weapon_damage: DiceExpression::new(1, 10, 0),
                stat_priority: [Charisma, Constitution, Dexterity, Wisdom, Intelligence, Strength],
            },
        }
    }

    /// The four ability slots of the class. Slot 0 is always the basic attack.
    pub fn ability_table(&self) -> [AbilityDescriptor; ABILITY_SLOTS] {
        use AbilityCost::*;
        use AbilityRange::*;
        match self {
            CharacterClass::Fighter => [
                basic_attack(),
                AbilityDescriptor::new(
                    "Second Wind",
                    PerFloor(1),
                    SelfOnly,
                    AbilityEffect::Heal {
                        dice: DiceExpression::new(1, 10, 0),
                        add_level: true,
                        add_modifier: false,
                    },
                ),
                AbilityDescriptor::new("Action Surge", PerFloor(1), SelfOnly, AbilityEffect::ExtraAction)
                    .free_action(),
                AbilityDescriptor::new(
                    "Shield Bash",
                    PerFloor(2),
                    Melee,
                    AbilityEffect::WeaponAttack {
                        damage: Some(DiceExpression::new(1, 4, 0)),
                        on_hit: Some(ActiveEffect::new(EffectKind::Stunned, 1)),
                    },
                ),
            ],
            CharacterClass::Rogue => [
                basic_attack(),
                AbilityDescriptor::new("Cunning Action", PerFloor(3), SelfOnly, AbilityEffect::ExtraMovement(6))
                    .free_action(),
                AbilityDescriptor::new(
                    "Poisoned Blade",
                    PerFloor(2),
                    Melee,
                    AbilityEffect::WeaponAttack {
                        damage: None,
                        on_hit: Some(ActiveEffect::new(EffectKind::Poisoned, 3).with_magnitude(4)),
                    },
                ),
                AbilityDescriptor::new(
                    "Evasion",
                    PerFloor(1),
                    SelfOnly,
                    AbilityEffect::SelfBuff(ActiveEffect::new(EffectKind::Shielded, 2).with_magnitude(3)),
                ),
            ],
            CharacterClass::Cleric => [
                basic_attack(),
                AbilityDescriptor::new(
                    "Healing Word",
                    PerFloor(3),
                    SelfOnly,
                    AbilityEffect::Heal {
                        dice: DiceExpression::new(1, 8, 0),
                        add_level: false,
                        add_modifier: true,
                    },
                ),
                AbilityDescriptor::new(
                    "Sacred Flame",
                    PerFloor(3),
                    Ranged(SPELL_RANGE),
                    AbilityEffect::Save {
                        damage: DiceExpression::new(1, 8, 0),
                        radius: 0,
                        half_on_save: false,
                    },
                ),
                AbilityDescriptor::new(
                    "Bless",
                    PerFloor(2),
                    SelfOnly,
                    AbilityEffect::SelfBuff(ActiveEffect::new(EffectKind::Blessed, 3).with_magnitude(2)),
                ),
            ],
            CharacterClass::Wizard => [
                basic_attack(),
                AbilityDescriptor::new(
                    "Magic Missile",
                    Mana(2),
                    Ranged(SPELL_RANGE),
                    AbilityEffect::AutoHit {
                        damage: DiceExpression::new(3, 4, 3),
                    },
                ),
                AbilityDescriptor::new(
                    "Fireball",
                    Mana(5),
                    Ranged(SPELL_RANGE),
                    AbilityEffect::Save {
                        damage: DiceExpression::new(8, 6, 0),
                        radius: 2,
                        half_on_save: true,
                    },
                ),
                AbilityDescriptor::new(
                    "Ray of Frost",
                    Mana(1),
                    Ranged(SPELL_RANGE),
                    AbilityEffect::SpellAttack {
                        damage: DiceExpression::new(1, 8, 0),
                        add_modifier: false,
                        on_hit: Some(ActiveEffect::new(EffectKind::Slowed, 2)),
                    },
                ),
            ],
            CharacterClass::Warlock => [
                basic_attack(),
                AbilityDescriptor::new(
                    "Eldritch Blast",
                    Free,
                    Ranged(SPELL_RANGE),
                    AbilityEffect::SpellAttack {
                        damage: DiceExpression::new(1, 10, 0),
                        add_modifier: true,
                        on_hit: None,
                    },
                ),
                AbilityDescriptor::new("Hex", PactPoints(1), SelfOnly, AbilityEffect::Hex),
                AbilityDescriptor::new(
                    "Summon Imp",
                    PactPoints(2),
                    SelfOnly,
                    AbilityEffect::Summon(AllyTemplate {
                        name: "Imp",
                        attack_bonus: 4,
                        damage: DiceExpression::new(1, 4, 2),
                        range: 4,
                        turns: 3,
                    }),
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_class_has_basic_attack_in_slot_zero() {
        for class in CharacterClass::all() {
            let table = class.ability_table();
            assert_eq!(table[0].name, "Attack");
            assert_eq!(table[0].range, AbilityRange::Melee);
            assert!(table[0].uses_action);
        }
    }

    #[test]
    fn test_primary_stat_is_never_constitution() {
        for class in CharacterClass::all() {
            let data = class.data();
            assert_ne!(data.stat_priority[0], Ability::Constitution);
            let mut sorted = data.stat_priority.to_vec();
            sorted.sort_by_key(|a| *a as u8);
            sorted.dedup();
            assert_eq!(sorted.len(), 6, "{class:?} priority repeats a stat");
        }
    }

    #[test]
    fn test_resource_kinds_match_class() {
        let wizard = CharacterClass::Wizard.ability_table();
        assert!(wizard[1..].iter().all(|a| matches!(a.cost, AbilityCost::Mana(_))));

        let warlock = CharacterClass::Warlock.ability_table();
        assert_eq!(warlock[2].cost, AbilityCost::PactPoints(1));
        assert_eq!(warlock[3].cost, AbilityCost::PactPoints(2));

        let fighter = CharacterClass::Fighter.ability_table();
        assert_eq!(fighter[1].per_floor_uses(), 1);
        assert!(!fighter[2].uses_action);
    }

    #[test]
    fn test_range_reach() {
        assert_eq!(AbilityRange::Melee.reach(), 1);
        assert_eq!(AbilityRange::Ranged(6).reach(), 6);
        assert!(!AbilityRange::SelfOnly.needs_target());
    }
}

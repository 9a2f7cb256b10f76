//! The player character: ability scores, class, hit points and resources.

use crate::class_data::{ClassData, ABILITY_SLOTS};
use crate::conditions::{ActiveEffects, EffectKind, SHIELDED_AC_BONUS};
use crate::dice::{ability_mod, roll_4d6_drop_lowest, DiceSource};
use crate::items::Inventory;
use crate::world::Pos;
use serde::{Deserialize, Serialize};

/// Tiles a character may walk per turn.
pub const MOVEMENT_TILES: u32 = 6;

/// Highest attainable level.
pub const MAX_LEVEL: u32 = 7;

/// Ability scores never rise above this.
pub const MAX_ABILITY_SCORE: i32 = 20;

// ============================================================================
// Ability Scores
// ============================================================================

/// The six core abilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

/// Ability scores for a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl AbilityScores {
    pub fn new(str: i32, dex: i32, con: i32, int: i32, wis: i32, cha: i32) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    /// Roll six "4d6 drop lowest" scores and assign them in the class
    /// priority order, highest first.
    pub fn roll_for_class<D: DiceSource + ?Sized>(class: CharacterClass, dice: &mut D) -> Self {
        let mut rolls: Vec<i32> = (0..6).map(|_| roll_4d6_drop_lowest(dice)).collect();
        rolls.sort_unstable_by(|a, b| b.cmp(a));
        Self::assign(class, &rolls)
    }

    /// Assign already-sorted values (highest first) in the class priority order.
    pub fn assign(class: CharacterClass, sorted_high_to_low: &[i32]) -> Self {
        let mut scores = Self::new(10, 10, 10, 10, 10, 10);
        for (ability, value) in class.data().stat_priority.iter().zip(sorted_high_to_low) {
            scores.set(*ability, *value);
        }
        scores
    }

    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn set(&mut self, ability: Ability, value: i32) {
        match ability {
            Ability::Strength => self.strength = value,
            Ability::Dexterity => self.dexterity = value,
            Ability::Constitution => self.constitution = value,
            Ability::Intelligence => self.intelligence = value,
            Ability::Wisdom => self.wisdom = value,
            Ability::Charisma => self.charisma = value,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        ability_mod(self.get(ability))
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Classes
// ============================================================================

/// Playable classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterClass {
    Fighter,
    Rogue,
    Cleric,
    Wizard,
    Warlock,
}

impl CharacterClass {
    pub fn all() -> [CharacterClass; 5] {
        [
            CharacterClass::Fighter,
            CharacterClass::Rogue,
            CharacterClass::Cleric,
            CharacterClass::Wizard,
            CharacterClass::Warlock,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            CharacterClass::Fighter => "Fighter",
            CharacterClass::Rogue => "Rogue",
            CharacterClass::Cleric => "Cleric",
            CharacterClass::Wizard => "Wizard",
            CharacterClass::Warlock => "Warlock",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<CharacterClass> {
        Self::all()
            .into_iter()
            .find(|class| class.name().eq_ignore_ascii_case(name.trim()))
    }
}

// ============================================================================
// Hit Points and Resources
// ============================================================================

/// Hit points tracking. `current` may drop below zero; anything at or below
/// zero is dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub maximum: i32,
}

impl HitPoints {
    pub fn new(maximum: i32) -> Self {
        Self {
            current: maximum,
            maximum,
        }
    }

    /// Subtract damage and return the new current value.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        self.current -= amount.max(0);
        self.current
    }

    /// Heal up to the maximum. Returns the amount actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let old = self.current;
        self.current = (self.current + amount.max(0)).min(self.maximum);
        self.current - old
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0
    }

    pub fn below_half(&self) -> bool {
        self.current * 2 < self.maximum
    }
}

/// A refillable resource such as mana or pact points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub current: u32,
    pub maximum: u32,
}

impl Pool {
    pub fn full(maximum: u32) -> Self {
        Self {
            current: maximum,
            maximum,
        }
    }

    /// Spend `amount` if available.
    pub fn spend(&mut self, amount: u32) -> bool {
        if self.current < amount {
            return false;
        }
        self.current -= amount;
        true
    }

    /// Restore up to the maximum. Returns the amount actually restored.
    pub fn restore(&mut self, amount: u32) -> u32 {
        let old = self.current;
        self.current = (self.current + amount).min(self.maximum);
        self.current - old
    }

    pub fn refill(&mut self) {
        self.current = self.maximum;
    }
}

// ============================================================================
// Player Character
// ============================================================================

/// The player's character for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerCharacter {
    pub name: String,
    pub class: CharacterClass,
    pub level: u32,
    pub experience: u32,
    pub ability_scores: AbilityScores,
    pub hit_points: HitPoints,
    pub position: Pos,
    pub movement_remaining: u32,
    pub actions_remaining: u32,
    /// Remaining per-floor uses for each ability slot.
    pub uses_remaining: [u8; ABILITY_SLOTS],
    pub mana: Pool,
    pub pact_points: Pool,
    /// Warlock hex: extra 1d6 on every hit until the floor ends.
    pub hex_active: bool,
    pub effects: ActiveEffects,
    pub inventory: Inventory,
    pub kills: u32,
}

impl PlayerCharacter {
    /// Build a level 1 character from already assigned scores.
    pub fn new(name: impl Into<String>, class: CharacterClass, ability_scores: AbilityScores) -> Self {
        let data = class.data();
        let max_hp = (data.base_hp + ability_scores.modifier(Ability::Constitution)).max(1);
        let mut character = Self {
            name: name.into(),
            class,
            level: 1,
            experience: 0,
            ability_scores,
            hit_points: HitPoints::new(max_hp),
            position: Pos::default(),
            movement_remaining: MOVEMENT_TILES,
            actions_remaining: 1,
            uses_remaining: [0; ABILITY_SLOTS],
            mana: Pool::default(),
            pact_points: Pool::default(),
            hex_active: false,
            effects: ActiveEffects::new(),
            inventory: Inventory::starting(),
            kills: 0,
        };
        character.refresh_resources();
        character
    }

    /// Roll ability scores and build a level 1 character.
    pub fn create<D: DiceSource + ?Sized>(name: impl Into<String>, class: CharacterClass, dice: &mut D) -> Self {
        let scores = AbilityScores::roll_for_class(class, dice);
        Self::new(name, class, scores)
    }

    pub fn data(&self) -> ClassData {
        self.class.data()
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        self.ability_scores.modifier(ability)
    }

    pub fn proficiency_bonus(&self) -> i32 {
        2 + (self.level as i32 - 1) / 4
    }

    /// Base AC plus equipment plus any shield effect.
    pub fn armor_class(&self) -> i32 {
        let data = self.data();
        let shield = if self.effects.has(EffectKind::Shielded) {
            SHIELDED_AC_BONUS
        } else {
            0
        };
        data.base_ac + data.equipment_bonus + shield
    }

    /// Weapon attack bonus: attack stat + proficiency + bless.
    pub fn attack_bonus(&self) -> i32 {
        self.modifier(self.data().attack_stat) + self.proficiency_bonus() + self.effects.magnitude(EffectKind::Blessed)
    }

    /// Spell attack bonus: casting stat + proficiency + bless.
    pub fn spell_attack_bonus(&self) -> i32 {
        self.modifier(self.data().casting_stat) + self.proficiency_bonus() + self.effects.magnitude(EffectKind::Blessed)
    }

    /// DC monsters save against: 8 + casting stat + proficiency.
    pub fn spell_save_dc(&self) -> i32 {
        8 + self.modifier(self.data().casting_stat) + self.proficiency_bonus()
    }

    pub fn is_alive(&self) -> bool {
        !self.hit_points.is_dead()
    }

    /// Tiles per turn, halved while slowed.
    pub fn movement_budget(&self) -> u32 {
        if self.effects.has(EffectKind::Slowed) {
            MOVEMENT_TILES / 2
        } else {
            MOVEMENT_TILES
        }
    }

    /// Refill movement and actions for a new turn. A stunned character gets
    /// neither. Returns whether the character is stunned.
    pub fn begin_turn(&mut self) -> bool {
        let stunned = self.effects.has(EffectKind::Stunned);
        if stunned {
            self.movement_remaining = 0;
            self.actions_remaining = 0;
        } else {
            self.movement_remaining = self.movement_budget();
            self.actions_remaining = 1;
        }
        stunned
    }

    pub fn max_mana(&self) -> u32 {
        match self.class {
            CharacterClass::Wizard => 4 + 2 * self.level + self.modifier(Ability::Intelligence).max(0) as u32,
            _ => 0,
        }
    }

    pub fn max_pact_points(&self) -> u32 {
        match self.class {
            CharacterClass::Warlock => 2 + (self.level + 1) / 2,
            _ => 0,
        }
    }

    /// Restore per-floor uses, mana and pact points to their maximums.
    pub fn refresh_resources(&mut self) {
        for (slot, ability) in self.class.ability_table().iter().enumerate() {
            self.uses_remaining[slot] = ability.per_floor_uses();
        }
        self.mana = Pool::full(self.max_mana());
        self.pact_points = Pool::full(self.max_pact_points());
    }

    /// Called when a new floor begins.
    pub fn enter_floor(&mut self, spawn: Pos) {
        self.position = spawn;
        self.hex_active = false;
        self.movement_remaining = self.movement_budget();
        self.actions_remaining = 1;
        self.refresh_resources();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDice;

    #[test]
    fn test_scores_assigned_by_priority() {
        let scores = AbilityScores::assign(CharacterClass::Wizard, &[16, 15, 14, 13, 12, 8]);
        assert_eq!(scores.intelligence, 16);
        assert_eq!(scores.constitution, 15);
        assert_eq!(scores.dexterity, 14);
        assert_eq!(scores.wisdom, 13);
        assert_eq!(scores.charisma, 12);
        assert_eq!(scores.strength, 8);
    }

    #[test]
    fn test_rolled_scores_are_sorted_into_priority() {
        // Six 4d6 rolls; the lowest die of each group is dropped.
        let mut dice = ScriptedDice::new([
            6, 6, 6, 1, // 18
            2, 2, 2, 2, // 6
            5, 5, 5, 5, // 15
            3, 4, 4, 4, // 12
            6, 5, 4, 1, // 15
            1, 1, 1, 1, // 3
        ]);
        let scores = AbilityScores::roll_for_class(CharacterClass::Fighter, &mut dice);
        assert_eq!(scores.strength, 18);
        assert_eq!(scores.constitution, 15);
        assert_eq!(scores.dexterity, 15);
        assert_eq!(scores.wisdom, 12);
        assert_eq!(scores.charisma, 6);
        assert_eq!(scores.intelligence, 3);
    }

    #[test]
    fn test_starting_hit_points_and_ac() {
        let scores = AbilityScores::assign(CharacterClass::Fighter, &[16, 14, 12, 10, 10, 8]);
        let fighter = PlayerCharacter::new("Brakka", CharacterClass::Fighter, scores);
        assert_eq!(fighter.hit_points.maximum, 14);
        assert_eq!(fighter.armor_class(), 17);
        assert_eq!(fighter.attack_bonus(), 5);
        assert_eq!(fighter.uses_remaining, [0, 1, 1, 2]);
    }

    #[test]
    fn test_hit_points_never_below_one_at_creation() {
        let scores = AbilityScores::assign(CharacterClass::Wizard, &[10, 3, 3, 3, 3, 3]);
        let wizard = PlayerCharacter::new("Frail", CharacterClass::Wizard, scores);
        assert_eq!(wizard.hit_points.maximum, 2);
        assert!(wizard.hit_points.maximum >= 1);
    }

    #[test]
    fn test_class_resources() {
        let scores = AbilityScores::assign(CharacterClass::Wizard, &[16, 14, 12, 10, 10, 8]);
        let wizard = PlayerCharacter::new("Ilsa", CharacterClass::Wizard, scores);
        assert_eq!(wizard.mana.maximum, 9);
        assert_eq!(wizard.pact_points.maximum, 0);

        let scores = AbilityScores::assign(CharacterClass::Warlock, &[16, 14, 12, 10, 10, 8]);
        let warlock = PlayerCharacter::new("Vex", CharacterClass::Warlock, scores);
        assert_eq!(warlock.pact_points.current, 3);
        assert_eq!(warlock.mana.maximum, 0);
    }

    #[test]
    fn test_proficiency_by_level() {
        let mut pc = PlayerCharacter::new("P", CharacterClass::Rogue, AbilityScores::default());
        assert_eq!(pc.proficiency_bonus(), 2);
        pc.level = 5;
        assert_eq!(pc.proficiency_bonus(), 3);
        pc.level = 7;
        assert_eq!(pc.proficiency_bonus(), 3);
    }

    #[test]
    fn test_begin_turn_respects_stun_and_slow() {
        use crate::conditions::ActiveEffect;
        let mut pc = PlayerCharacter::new("P", CharacterClass::Rogue, AbilityScores::default());
        pc.effects.apply(ActiveEffect::new(EffectKind::Slowed, 2));
        assert!(!pc.begin_turn());
        assert_eq!(pc.movement_remaining, MOVEMENT_TILES / 2);

        pc.effects.apply(ActiveEffect::new(EffectKind::Stunned, 1));
        assert!(pc.begin_turn());
        assert_eq!(pc.movement_remaining, 0);
        assert_eq!(pc.actions_remaining, 0);
    }

    #[test]
    fn test_pool_spend_and_restore() {
        let mut pool = Pool::full(3);
        assert!(pool.spend(2));
        assert!(!pool.spend(2));
        assert_eq!(pool.current, 1);
        assert_eq!(pool.restore(5), 2);
        assert_eq!(pool.current, 3);
    }

    #[test]
    fn test_class_from_name() {
        assert_eq!(CharacterClass::from_name("warlock"), Some(CharacterClass::Warlock));
        assert_eq!(CharacterClass::from_name(" Fighter "), Some(CharacterClass::Fighter));
        assert_eq!(CharacterClass::from_name("bard"), None);
    }
}

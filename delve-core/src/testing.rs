//! Testing utilities for the simulation.
//!
//! This module provides tools for deterministic tests:
//! - `ScriptedDice` replays exact die faces
//! - `TestHarness` sets up hand-placed arena fights
//! - Assertion helpers for verifying game state

use crate::character::{AbilityScores, CharacterClass, PlayerCharacter};
use crate::dice::DiceSource;
use crate::dungeon::{Dungeon, GeneratorConfig, Tile};
use crate::monster::{Monster, MonsterId, MonsterKind};
use crate::rules::{ActionError, CombatState, Event, Intent, Phase, Resolution, RulesEngine};
use crate::world::{Floor, GameWorld, Location, Pos};
use std::collections::VecDeque;

/// Scores used by harness characters, highest first.
pub const STANDARD_ARRAY: [i32; 6] = [16, 14, 14, 12, 10, 8];

/// Where harness characters stand.
pub const HARNESS_START: Pos = Pos::new(3, 3);

/// Side length of the harness arena.
pub const HARNESS_ARENA: i32 = 16;

/// A dice source that replays scripted faces.
///
/// Each face is clamped to the die being rolled. Once the script runs out
/// every roll comes up 1.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    faces: VecDeque<u32>,
    consumed: usize,
}

impl ScriptedDice {
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
            consumed: 0,
        }
    }

    /// Number of dice rolled so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Scripted faces not yet used.
    pub fn remaining(&self) -> usize {
        self.faces.len()
    }

    pub fn push(&mut self, face: u32) {
        self.faces.push_back(face);
    }
}

impl DiceSource for ScriptedDice {
    fn roll_d(&mut self, sides: u32) -> u32 {
        self.consumed += 1;
        self.faces.pop_front().unwrap_or(1).clamp(1, sides.max(1))
    }
}

/// Test harness for running combat scenarios on an open arena.
pub struct TestHarness {
    /// The rules engine.
    pub engine: RulesEngine,
    /// The game world.
    pub world: GameWorld,
}

impl TestHarness {
    /// A level 1 character of `class` with the standard array, standing on
    /// an empty arena on floor 1.
    pub fn new(class: CharacterClass) -> Self {
        let scores = AbilityScores::assign(class, &STANDARD_ARRAY);
        Self::with_character(PlayerCharacter::new("Test Hero", class, scores))
    }

    /// Create a test harness with a custom character.
    pub fn with_character(mut character: PlayerCharacter) -> Self {
        let mut dungeon = Dungeon::arena(HARNESS_ARENA, HARNESS_ARENA);
        dungeon.spawn = HARNESS_START;
        character.enter_floor(HARNESS_START);

        let mut world = GameWorld::new(character);
        world.location = Location::Dungeon;
        world.floor = Some(Floor::new(1, dungeon));
        world.deepest_floor = 1;

        Self {
            engine: RulesEngine::new(GeneratorConfig::default()),
            world,
        }
    }

    /// Place a monster. Returns its id.
    pub fn spawn(&mut self, kind: MonsterKind, position: Pos) -> MonsterId {
        let floor = self.floor_mut();
        let id = MonsterId(floor.monsters.len());
        floor.monsters.push(Monster::new(id, kind, position));
        id
    }

    /// Put every living monster into a fight and hand the turn to the
    /// player, as if combat had just started.
    pub fn start_fight(&mut self) -> &mut Self {
        let combatants = self
            .world
            .floor
            .as_ref()
            .map(|f| f.living().map(|m| m.id).collect())
            .unwrap_or_default();
        let mut combat = CombatState::new(combatants, false);
        combat.round = 1;
        self.world.combat = Some(combat);
        self.world.phase = Phase::PlayerTurn;
        self
    }

    pub fn resolve(&mut self, dice: &mut ScriptedDice, intent: Intent) -> Result<Resolution, ActionError> {
        self.engine.resolve(&mut self.world, dice, intent)
    }

    /// Use the ability in `slot`.
    pub fn ability(
        &mut self,
        dice: &mut ScriptedDice,
        slot: usize,
        target: Option<MonsterId>,
    ) -> Result<Resolution, ActionError> {
        self.resolve(dice, Intent::UseAbility { slot, target })
    }

    pub fn player(&self) -> &PlayerCharacter {
        &self.world.player
    }

    /// Panics if the id was never spawned.
    pub fn monster(&self, id: MonsterId) -> &Monster {
        &self.world.monsters()[id.0]
    }

    pub fn monster_mut(&mut self, id: MonsterId) -> &mut Monster {
        &mut self.floor_mut().monsters[id.0]
    }

    pub fn tile(&self, pos: Pos) -> Tile {
        self.world
            .floor
            .as_ref()
            .map(|f| f.dungeon.tile(pos))
            .unwrap_or(Tile::Wall)
    }

    pub fn set_tile(&mut self, pos: Pos, tile: Tile) {
        self.floor_mut().dungeon.set_tile(pos, tile);
    }

    fn floor_mut(&mut self) -> &mut Floor {
        self.world
            .floor
            .get_or_insert_with(|| Floor::new(1, Dungeon::arena(HARNESS_ARENA, HARNESS_ARENA)))
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert player HP is at expected values.
#[track_caller]
pub fn assert_hp(harness: &TestHarness, current: i32, max: i32) {
    let hp = harness.player().hit_points;
    assert_eq!(
        (hp.current, hp.maximum),
        (current, max),
        "Expected HP {current}/{max}, got {}/{}",
        hp.current,
        hp.maximum
    );
}

/// Assert player is in combat.
#[track_caller]
pub fn assert_in_combat(harness: &TestHarness) {
    assert!(harness.world.in_combat(), "Expected to be in combat");
}

/// Assert player is NOT in combat.
#[track_caller]
pub fn assert_not_in_combat(harness: &TestHarness) {
    assert!(!harness.world.in_combat(), "Expected to NOT be in combat");
}

/// Assert a resolution contains an event matching the predicate.
#[track_caller]
pub fn assert_event(resolution: &Resolution, predicate: impl Fn(&Event) -> bool) {
    assert!(
        resolution.events.iter().any(predicate),
        "No matching event in {:?}",
        resolution.events
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_dice_clamps_and_falls_back() {
        let mut dice = ScriptedDice::new([9, 0, 3]);
        assert_eq!(dice.roll_d(6), 6);
        assert_eq!(dice.roll_d(6), 1);
        assert_eq!(dice.roll_d(6), 3);
        assert_eq!(dice.roll_d(20), 1);
        assert_eq!(dice.consumed(), 4);
        assert_eq!(dice.remaining(), 0);
    }

    #[test]
    fn test_harness_setup() {
        let mut h = TestHarness::new(CharacterClass::Fighter);
        assert_hp(&h, 14, 14);
        assert_not_in_combat(&h);
        let goblin = h.spawn(MonsterKind::Goblin, Pos::new(5, 5));
        h.start_fight();
        assert_in_combat(&h);
        assert_eq!(h.monster(goblin).position, Pos::new(5, 5));
        assert_eq!(h.world.combat.as_ref().map(|c| c.combatants.clone()), Some(vec![goblin]));
    }
}

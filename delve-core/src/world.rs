//! Game world state: grid positions, the current floor and the aggregate
//! world the session owns.

use crate::character::PlayerCharacter;
use crate::dungeon::Dungeon;
use crate::monster::{Monster, MonsterId};
use crate::progression::QuestLog;
use crate::rules::{CombatState, Phase};
use serde::{Deserialize, Serialize};

// ============================================================================
// Positions
// ============================================================================

/// A grid cell. `x` grows to the right, `y` grows downward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Tile distance with diagonal steps (Chebyshev). Used for adjacency,
    /// ranges and areas.
    pub fn distance(self, other: Pos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub fn manhattan(self, other: Pos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn distance_squared(self, other: Pos) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn is_adjacent(self, other: Pos) -> bool {
        self != other && self.distance(other) <= 1
    }

    /// The eight surrounding cells.
    pub fn neighbors(self) -> [Pos; 8] {
        [
            self.offset(-1, -1),
            self.offset(0, -1),
            self.offset(1, -1),
            self.offset(-1, 0),
            self.offset(1, 0),
            self.offset(-1, 1),
            self.offset(0, 1),
            self.offset(1, 1),
        ]
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ============================================================================
// Floors
// ============================================================================

/// A generated map together with the monsters living on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Floor {
    /// Dungeon depth, 0 for a roadside ambush arena.
    pub number: u32,
    pub dungeon: Dungeon,
    /// Monster arena; a monster's id is its index. Dead monsters stay.
    pub monsters: Vec<Monster>,
}

impl Floor {
    /// Instantiate the dungeon's monster spawns.
    pub fn new(number: u32, dungeon: Dungeon) -> Self {
        let monsters = dungeon
            .monster_spawns
            .iter()
            .enumerate()
            .map(|(index, spawn)| Monster::new(MonsterId(index), spawn.kind, spawn.position))
            .collect();
        Self {
            number,
            dungeon,
            monsters,
        }
    }

    pub fn monster(&self, id: MonsterId) -> Option<&Monster> {
        self.monsters.get(id.0)
    }

    pub fn monster_mut(&mut self, id: MonsterId) -> Option<&mut Monster> {
        self.monsters.get_mut(id.0)
    }

    pub fn living(&self) -> impl Iterator<Item = &Monster> {
        self.monsters.iter().filter(|m| m.is_alive())
    }

    /// The living monster standing on `pos`, if any.
    pub fn occupant(&self, pos: Pos) -> Option<MonsterId> {
        self.living().find(|m| m.position == pos).map(|m| m.id)
    }

    pub fn is_occupied(&self, pos: Pos) -> bool {
        self.occupant(pos).is_some()
    }
}

// ============================================================================
// Game World
// ============================================================================

/// Where the player currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    Town,
    /// On the road between town and the dungeon.
    Road,
    Dungeon,
}

/// Everything the simulation knows about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameWorld {
    pub player: PlayerCharacter,
    pub location: Location,
    /// The dungeon floor or ambush arena in play.
    pub floor: Option<Floor>,
    /// Deepest dungeon floor entered so far.
    pub deepest_floor: u32,
    pub phase: Phase,
    pub combat: Option<CombatState>,
    pub quests: QuestLog,
}

impl GameWorld {
    pub fn new(player: PlayerCharacter) -> Self {
        Self {
            player,
            location: Location::Town,
            floor: None,
            deepest_floor: 0,
            phase: Phase::Exploring,
            combat: None,
            quests: QuestLog::new(),
        }
    }

    pub fn in_combat(&self) -> bool {
        matches!(self.phase, Phase::Encountered | Phase::PlayerTurn | Phase::EnemyTurn)
    }

    pub fn is_game_over(&self) -> bool {
        self.phase.is_defeat()
    }

    pub fn monsters(&self) -> &[Monster] {
        self.floor.as_ref().map(|f| f.monsters.as_slice()).unwrap_or(&[])
    }
}

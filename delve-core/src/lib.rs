//! Simulation core for a turn-based, grid-based dungeon crawler.
//!
//! This crate provides:
//! - Dice and injectable randomness
//! - Characters, classes and monsters
//! - Procedural dungeon floors and BFS pathfinding
//! - An Intent/Resolution combat engine with a synchronous enemy turn
//! - Experience, level-ups and quests
//!
//! Rendering, input and audio belong to the front end, which reads state from
//! a [`Session`] and renders the [`Resolution`]s it returns.
//!
//! # Quick Start
//!
//! ```no_run
//! use delve_core::{CharacterClass, Session, SessionConfig};
//!
//! let config = SessionConfig::new(CharacterClass::Rogue).with_seed(7);
//! let mut session = Session::new(config);
//!
//! session.travel()?;
//! if session.location() == delve_core::Location::Road {
//!     let resolution = session.enter_dungeon()?;
//!     println!("{}", resolution.to_json()?);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod character;
pub mod class_data;
pub mod conditions;
pub mod dice;
pub mod dungeon;
pub mod items;
pub mod monster;
pub mod pathfinding;
pub mod progression;
pub mod rules;
pub mod session;
pub mod testing;
pub mod world;

// Primary public API
pub use character::{Ability, AbilityScores, CharacterClass, PlayerCharacter};
pub use dice::{DiceError, DiceExpression, DiceSource};
pub use dungeon::{Dungeon, GeneratorConfig, Tile};
pub use items::ItemKind;
pub use monster::{Monster, MonsterId, MonsterKind};
pub use progression::{Quest, QuestId};
pub use rules::{ActionError, CombatOutcome, Event, Intent, Phase, Resolution, RulesEngine};
pub use session::{ConfigError, Session, SessionConfig};
pub use testing::{ScriptedDice, TestHarness};
pub use world::{Floor, GameWorld, Location, Pos};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::bfs_path;

    #[test]
    fn test_seeded_sessions_are_reproducible() {
        let config = SessionConfig::new(CharacterClass::Wizard).with_seed(1234);
        let mut a = Session::new(config.clone());
        let mut b = Session::new(config);
        assert_eq!(a.player(), b.player());

        let floor_a = a.generate_floor(1).unwrap().clone();
        let floor_b = b.generate_floor(1).unwrap().clone();
        assert_eq!(floor_a, floor_b);
    }

    #[test]
    fn test_generated_stairs_reachable() {
        let mut session = Session::new(SessionConfig::new(CharacterClass::Fighter).with_seed(99));
        let floor = session.generate_floor(1).unwrap();
        let dungeon = &floor.dungeon;
        let stairs = dungeon.stairs.unwrap();
        assert!(!bfs_path(dungeon, dungeon.spawn, stairs, &dungeon::WALKABLE).is_empty());
    }
}

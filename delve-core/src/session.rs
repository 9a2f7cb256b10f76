//! Session - the primary public API for a run.
//!
//! A [`Session`] owns the world, the rules engine and the dice. Front ends
//! forward player input to it and render the [`Resolution`]s it returns.
//! Every operation validates before it mutates, so an `Err` leaves the run
//! exactly as it was.

use crate::character::{CharacterClass, PlayerCharacter};
use crate::dice::DiceSource;
use crate::dungeon::{Dungeon, GeneratorConfig, MonsterSpawn};
use crate::items::{consumable, ItemKind, INN_PRICE};
use crate::monster::{Monster, MonsterId, MonsterKind};
use crate::pathfinding::reachable_within;
use crate::progression::{award_experience, Quest, QuestId, QUEST_BOARD};
use crate::rules::{
    ActionError, Actor, CombatState, Event, Intent, Phase, Resolution, RulesEngine,
};
use crate::world::{Floor, GameWorld, Location, Pos};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::info;

/// One in this many journeys is interrupted by an ambush.
pub const AMBUSH_ODDS: u32 = 5;

/// Side length of the roadside ambush arena.
pub const AMBUSH_ARENA: i32 = 12;

/// Errors from reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown class '{0}' - expected Fighter, Rogue, Cleric, Wizard or Warlock")]
    UnknownClass(String),

    #[error("Invalid seed '{0}' - expected an unsigned integer")]
    InvalidSeed(String),
}

/// Configuration for creating a new session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Player character name.
    pub character_name: String,

    /// Player character class.
    pub class: CharacterClass,

    /// Seed for reproducible runs; `None` draws from entropy.
    pub seed: Option<u64>,

    /// Dungeon generator settings.
    pub generator: GeneratorConfig,
}

impl SessionConfig {
    pub fn new(class: CharacterClass) -> Self {
        Self {
            character_name: "Adventurer".to_string(),
            class,
            seed: None,
            generator: GeneratorConfig::default(),
        }
    }

    /// Set the player character name.
    pub fn with_character_name(mut self, name: impl Into<String>) -> Self {
        self.character_name = name.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_generator(mut self, generator: GeneratorConfig) -> Self {
        self.generator = generator;
        self
    }

    /// Read `DELVE_CLASS`, `DELVE_SEED` and `DELVE_NAME`. Unset variables
    /// keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let class = match lookup("DELVE_CLASS") {
            Some(name) => CharacterClass::from_name(&name).ok_or(ConfigError::UnknownClass(name))?,
            None => CharacterClass::Fighter,
        };
        let mut config = Self::new(class);
        if let Some(seed) = lookup("DELVE_SEED") {
            let parsed = seed.trim().parse().map_err(|_| ConfigError::InvalidSeed(seed.clone()))?;
            config = config.with_seed(parsed);
        }
        if let Some(name) = lookup("DELVE_NAME") {
            config = config.with_character_name(name);
        }
        Ok(config)
    }
}

/// One run of the game.
pub struct Session {
    world: GameWorld,
    engine: RulesEngine,
    dice: Box<dyn DiceSource>,
    /// Every event the session has produced, oldest first.
    history: Vec<Event>,
}

impl Session {
    /// Start a run in town with a freshly rolled character.
    pub fn new(config: SessionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_dice(config, Box::new(rng))
    }

    /// Start a run with an explicit dice source.
    pub fn with_dice(config: SessionConfig, mut dice: Box<dyn DiceSource>) -> Self {
        let player = PlayerCharacter::create(config.character_name, config.class, dice.as_mut());
        info!(name = %player.name, class = player.class.name(), seed = ?config.seed, "new run");
        Self {
            world: GameWorld::new(player),
            engine: RulesEngine::new(config.generator),
            dice,
            history: Vec::new(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn world(&self) -> &GameWorld {
        &self.world
    }

    pub fn player(&self) -> &PlayerCharacter {
        &self.world.player
    }

    pub fn floor(&self) -> Option<&Floor> {
        self.world.floor.as_ref()
    }

    pub fn monsters(&self) -> &[Monster] {
        self.world.monsters()
    }

    pub fn combat(&self) -> Option<&CombatState> {
        self.world.combat.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.world.phase
    }

    pub fn location(&self) -> Location {
        self.world.location
    }

    /// Quests the player has accepted.
    pub fn quests(&self) -> &[Quest] {
        self.world.quests.quests()
    }

    /// Quests on offer in town.
    pub fn quest_board(&self) -> &'static [Quest] {
        QUEST_BOARD.as_slice()
    }

    pub fn history(&self) -> &[Event] {
        &self.history
    }

    pub fn is_game_over(&self) -> bool {
        self.world.is_game_over()
    }

    /// Cells the player can walk to right now, sorted.
    pub fn reachable_cells(&self) -> Vec<Pos> {
        let Some(floor) = self.world.floor.as_ref() else {
            return Vec::new();
        };
        let player = &self.world.player;
        let budget = match self.world.phase {
            Phase::PlayerTurn => player.movement_remaining,
            Phase::Exploring => player.movement_budget(),
            _ => return Vec::new(),
        };
        let dungeon = &floor.dungeon;
        let mut cells: Vec<Pos> = reachable_within(dungeon, player.position, budget, |pos| {
            dungeon.is_walkable(pos) && !floor.is_occupied(pos)
        })
        .into_keys()
        .filter(|pos| *pos != player.position)
        .collect();
        cells.sort();
        cells
    }

    // ========================================================================
    // Dungeon and combat
    // ========================================================================

    /// Resolve any intent through the rules engine.
    pub fn resolve(&mut self, intent: Intent) -> Result<Resolution, ActionError> {
        let resolution = self.engine.resolve(&mut self.world, self.dice.as_mut(), intent)?;
        Ok(self.record(resolution))
    }

    pub fn move_player(&mut self, to: Pos) -> Result<Resolution, ActionError> {
        self.resolve(Intent::Move { to })
    }

    pub fn start_combat(&mut self) -> Result<Resolution, ActionError> {
        self.resolve(Intent::StartCombat)
    }

    pub fn use_ability(&mut self, slot: usize, target: Option<MonsterId>) -> Result<Resolution, ActionError> {
        self.resolve(Intent::UseAbility { slot, target })
    }

    pub fn end_player_turn(&mut self) -> Result<Resolution, ActionError> {
        self.resolve(Intent::EndTurn)
    }

    pub fn use_item(&mut self, item: ItemKind) -> Result<Resolution, ActionError> {
        self.resolve(Intent::UseItem { item })
    }

    /// Generate dungeon floor `number` and put the player on it.
    pub fn generate_floor(&mut self, number: u32) -> Result<&Floor, ActionError> {
        self.ensure_exploring("change floors")?;
        let resolution = self
            .engine
            .enter_floor(&mut self.world, self.dice.as_mut(), number.max(1));
        self.record(resolution);
        self.world
            .floor
            .as_ref()
            .ok_or(ActionError::WrongLocation("generate a floor"))
    }

    /// Walk from the road into the dungeon's first floor.
    pub fn enter_dungeon(&mut self) -> Result<Resolution, ActionError> {
        self.ensure_exploring("enter the dungeon")?;
        if self.world.location != Location::Road {
            return Err(ActionError::WrongLocation("enter the dungeon"));
        }
        let resolution = self.engine.enter_floor(&mut self.world, self.dice.as_mut(), 1);
        Ok(self.record(resolution))
    }

    /// Climb out of the dungeon back onto the road.
    pub fn leave_dungeon(&mut self) -> Result<Resolution, ActionError> {
        self.ensure_exploring("leave the dungeon")?;
        if self.world.location != Location::Dungeon {
            return Err(ActionError::WrongLocation("leave the dungeon"));
        }
        self.world.location = Location::Road;
        self.world.floor = None;
        self.world.player.hex_active = false;

        let mut resolution = Resolution::new();
        resolution.narrate("You climb back into daylight.");
        Ok(self.record(resolution))
    }

    /// Travel between town and the dungeon road. One journey in five is
    /// ambushed.
    pub fn travel(&mut self) -> Result<Resolution, ActionError> {
        self.ensure_exploring("travel")?;
        let destination = match self.world.location {
            Location::Town => Location::Road,
            Location::Road => Location::Town,
            Location::Dungeon => return Err(ActionError::WrongLocation("travel")),
        };
        self.world.location = destination;

        let mut resolution = Resolution::new();
        if self.dice.chance(1, AMBUSH_ODDS) {
            // The ambush happens on the road, whichever way the party was headed.
            self.world.location = Location::Road;
            resolution.absorb(self.ambush());
        } else if destination == Location::Town {
            resolution.narrate("You arrive back in town.");
        } else {
            resolution.narrate("The road to the dungeon is quiet.");
        }
        Ok(self.record(resolution))
    }

    fn ambush(&mut self) -> Resolution {
        let mut arena = Dungeon::arena(AMBUSH_ARENA, AMBUSH_ARENA);
        let center = arena.spawn;
        let kinds = MonsterKind::unlocked_at(1);
        let count = self.dice.between(1, 2) as usize;
        for position in [center.offset(3, 0), center.offset(-3, 1)].into_iter().take(count) {
            let index = self.dice.roll_d(kinds.len() as u32) as usize - 1;
            if let Some(kind) = kinds.get(index) {
                arena.monster_spawns.push(MonsterSpawn { kind: *kind, position });
            }
        }

        let floor = Floor::new(0, arena);
        let combatants: Vec<MonsterId> = floor.monsters.iter().map(|m| m.id).collect();
        self.world.floor = Some(floor);
        self.world.player.position = center;
        self.world.combat = Some(CombatState::new(combatants.clone(), true));
        self.world.phase = Phase::Encountered;

        info!(count = combatants.len(), "roadside ambush");
        let mut resolution = Resolution::new().with_event(Event::EncounterStarted {
            combatants,
            ambush: true,
        });
        resolution.narrate("Bandits of the deep leap from the roadside brush!");
        resolution
    }

    // ========================================================================
    // Town
    // ========================================================================

    /// Buy one consumable at the town shop.
    pub fn purchase(&mut self, item: ItemKind) -> Result<Resolution, ActionError> {
        self.ensure_in_town("shop")?;
        let entry = consumable(item).ok_or_else(|| ActionError::InvalidTarget(format!("{item:?} is not sold")))?;
        let inventory = &mut self.world.player.inventory;
        if !inventory.spend_gold(entry.price) {
            return Err(ActionError::InsufficientResource("gold".to_string()));
        }
        inventory.add(item, 1);

        let mut resolution = Resolution::new()
            .with_event(Event::GoldChanged {
                amount: -(entry.price as i32),
                total: inventory.gold,
            })
            .with_event(Event::ItemGained { item });
        resolution.narrate(format!("You buy a {} for {} gold.", entry.name, entry.price));
        Ok(self.record(resolution))
    }

    /// Spend the night at the inn: full HP, refreshed resources, effects
    /// cleared.
    pub fn rest(&mut self) -> Result<Resolution, ActionError> {
        self.ensure_in_town("rest")?;
        let player = &mut self.world.player;
        if !player.inventory.spend_gold(INN_PRICE) {
            return Err(ActionError::InsufficientResource("gold".to_string()));
        }
        let healed = player.hit_points.heal(player.hit_points.maximum);
        player.refresh_resources();
        player.effects.clear();

        let mut resolution = Resolution::new()
            .with_event(Event::GoldChanged {
                amount: -(INN_PRICE as i32),
                total: player.inventory.gold,
            })
            .with_event(Event::Healed {
                target: Actor::Player,
                amount: healed,
                hp_after: player.hit_points.current,
            });
        resolution.narrate("You sleep soundly at the inn.");
        Ok(self.record(resolution))
    }

    /// Accept a quest from the board.
    pub fn accept_quest(&mut self, id: QuestId) -> Result<&[Quest], ActionError> {
        self.ensure_alive()?;
        let events = self.world.quests.accept(id, self.world.deepest_floor)?;
        self.history.extend(events);
        Ok(self.world.quests.quests())
    }

    /// Turn in a completed quest for its XP and gold. Any level-up lands in
    /// the session history.
    pub fn turn_in_quest(&mut self, id: QuestId) -> Result<&[Quest], ActionError> {
        self.ensure_in_town("turn in quests")?;
        let (xp, gold) = self.world.quests.turn_in(id)?;

        let player = &mut self.world.player;
        player.inventory.gold += gold;
        self.history.push(Event::QuestTurnedIn { id });
        self.history.push(Event::GoldChanged {
            amount: gold as i32,
            total: player.inventory.gold,
        });
        let events = award_experience(player, xp, self.dice.as_mut());
        self.history.extend(events);

        info!(quest = %id, xp, gold, "quest turned in");
        Ok(self.world.quests.quests())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn record(&mut self, resolution: Resolution) -> Resolution {
        self.history.extend(resolution.events.iter().cloned());
        resolution
    }

    fn ensure_alive(&self) -> Result<(), ActionError> {
        if self.world.is_game_over() {
            return Err(ActionError::GameOver);
        }
        Ok(())
    }

    fn ensure_exploring(&self, action: &'static str) -> Result<(), ActionError> {
        self.ensure_alive()?;
        if self.world.phase != Phase::Exploring {
            return Err(ActionError::WrongPhase {
                action,
                phase: self.world.phase,
            });
        }
        Ok(())
    }

    fn ensure_in_town(&self, action: &'static str) -> Result<(), ActionError> {
        self.ensure_exploring(action)?;
        if self.world.location != Location::Town {
            return Err(ActionError::WrongLocation(action));
        }
        Ok(())
    }
}
